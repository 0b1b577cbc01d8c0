//! SCSS compilation with grass, minification with lightningcss.

use std::path::{Path, PathBuf};

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};

use crate::class::AssetClass;
use crate::traits::{utf8, Transform, TransformError};

/// Options for the stylesheet transform.
#[derive(Debug, Clone)]
pub struct StylesheetOptions {
    /// Minify the compiled CSS
    pub minify: bool,

    /// Extra directories searched by `@use` and `@import`
    pub load_paths: Vec<PathBuf>,
}

impl Default for StylesheetOptions {
    fn default() -> Self {
        Self {
            minify: true,
            load_paths: Vec::new(),
        }
    }
}

/// Compiles SCSS to flat CSS, then minifies it.
#[derive(Debug, Clone, Default)]
pub struct StylesheetTransform {
    options: StylesheetOptions,
}

impl StylesheetTransform {
    pub fn new(options: StylesheetOptions) -> Self {
        Self { options }
    }

    /// Compile SCSS source to CSS.
    ///
    /// The directory of `path` is on the load path, so partials next to the
    /// entry file resolve.
    pub fn compile(&self, source: &str, path: &Path) -> Result<String, TransformError> {
        let mut options = grass::Options::default().style(grass::OutputStyle::Expanded);
        if let Some(dir) = path.parent() {
            options = options.load_path(dir);
        }
        for dir in &self.options.load_paths {
            options = options.load_path(dir);
        }

        grass::from_string(source.to_string(), &options).map_err(|e| TransformError::Compile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Minify CSS using lightningcss.
    pub fn minify(&self, css: &str, path: &Path) -> Result<String, TransformError> {
        let parser_options = ParserOptions {
            filename: path.display().to_string(),
            ..ParserOptions::default()
        };

        let stylesheet =
            StyleSheet::parse(css, parser_options).map_err(|e| TransformError::Compile {
                path: path.to_path_buf(),
                message: format!("CSS parse error: {}", e),
            })?;

        let minified = stylesheet
            .to_css(PrinterOptions {
                minify: true,
                ..PrinterOptions::default()
            })
            .map_err(|e| TransformError::Compile {
                path: path.to_path_buf(),
                message: format!("CSS minify error: {}", e),
            })?;

        Ok(minified.code)
    }
}

impl Transform for StylesheetTransform {
    fn class(&self) -> AssetClass {
        AssetClass::Stylesheet
    }

    fn transform(&self, content: &[u8], path: &Path) -> Result<Vec<u8>, TransformError> {
        let source = utf8(content, path)?;
        let css = self.compile(source, path)?;

        let css = if self.options.minify {
            self.minify(&css, path)?
        } else {
            css
        };

        Ok(css.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCSS: &str = r#"
$brand: #336699;

.button {
    color: $brand;
    &:hover {
        color: darken($brand, 10%);
    }
}
"#;

    #[test]
    fn compiles_and_minifies_scss() {
        let transform = StylesheetTransform::default();

        let out = transform
            .transform(SCSS.as_bytes(), Path::new("src/scss/main.scss"))
            .unwrap();
        let css = String::from_utf8(out).unwrap();

        assert!(css.contains(".button"));
        assert!(css.contains(".button:hover"));
        assert!(!css.contains("$brand"));
        assert!(!css.contains('\n'));
    }

    #[test]
    fn output_is_deterministic() {
        let transform = StylesheetTransform::default();
        let path = Path::new("main.scss");

        let first = transform.transform(SCSS.as_bytes(), path).unwrap();
        let second = transform.transform(SCSS.as_bytes(), path).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn reports_syntax_errors_with_path() {
        let transform = StylesheetTransform::default();

        let err = transform
            .transform(b".broken { color: red;", Path::new("broken.scss"))
            .unwrap_err();

        assert!(matches!(err, TransformError::Compile { .. }));
        assert!(err.to_string().contains("broken.scss"));
    }

    #[test]
    fn skips_minification_when_disabled() {
        let transform = StylesheetTransform::new(StylesheetOptions {
            minify: false,
            ..Default::default()
        });

        let out = transform
            .transform(b".a { .b { color: red; } }", Path::new("x.scss"))
            .unwrap();
        let css = String::from_utf8(out).unwrap();

        assert!(css.contains(".a .b"));
        assert!(css.contains('\n'));
    }
}
