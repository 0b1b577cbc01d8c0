//! JavaScript minification with oxc.

use std::path::Path;

use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;

use crate::class::AssetClass;
use crate::traits::{utf8, Transform, TransformError};

/// Options for the script transform.
#[derive(Debug, Clone)]
pub struct ScriptOptions {
    /// Rename local bindings to shorter names
    pub mangle: bool,

    /// Apply compression passes (dead code, constant folding)
    pub compress: bool,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            mangle: true,
            compress: true,
        }
    }
}

/// Minifies and mangles browser scripts.
#[derive(Debug, Clone, Default)]
pub struct ScriptTransform {
    options: ScriptOptions,
}

impl ScriptTransform {
    pub fn new(options: ScriptOptions) -> Self {
        Self { options }
    }

    /// Minify JavaScript source code.
    ///
    /// Sources are parsed as classic scripts, so top-level declarations stay
    /// visible to other scripts on the page.
    pub fn minify(&self, source: &str, path: &Path) -> Result<String, TransformError> {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, source, SourceType::script()).parse();

        if let Some(error) = ret.errors.first() {
            return Err(TransformError::Syntax {
                path: path.to_path_buf(),
                message: error.to_string(),
            });
        }

        let mut program = ret.program;
        let options = MinifierOptions {
            mangle: self.options.mangle.then(MangleOptions::default),
            compress: self.options.compress.then(CompressOptions::smallest),
        };
        let ret = Minifier::new(options).minify(&allocator, &mut program);

        let code = Codegen::new()
            .with_options(CodegenOptions {
                minify: true,
                comments: CommentOptions::disabled(),
                ..CodegenOptions::default()
            })
            .with_scoping(ret.scoping)
            .build(&program)
            .code;

        Ok(code)
    }
}

impl Transform for ScriptTransform {
    fn class(&self) -> AssetClass {
        AssetClass::Script
    }

    fn transform(&self, content: &[u8], path: &Path) -> Result<Vec<u8>, TransformError> {
        let source = utf8(content, path)?;
        self.minify(source, path).map(String::into_bytes)
    }
}
