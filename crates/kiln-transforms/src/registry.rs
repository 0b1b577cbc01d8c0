//! Lookup of the transform for each asset class.

use std::path::Path;
use std::sync::Arc;

use crate::class::AssetClass;
use crate::image::{ImageOptions, ImageTransform};
use crate::script::{ScriptOptions, ScriptTransform};
use crate::stylesheet::{StylesheetOptions, StylesheetTransform};
use crate::traits::{Transform, TransformError};

/// Identity transform for classes that are copied verbatim (html after
/// include expansion, fonts).
#[derive(Debug, Clone, Copy)]
pub struct CopyTransform {
    class: AssetClass,
}

impl CopyTransform {
    pub fn new(class: AssetClass) -> Self {
        Self { class }
    }
}

impl Transform for CopyTransform {
    fn class(&self) -> AssetClass {
        self.class
    }

    fn transform(&self, content: &[u8], _path: &Path) -> Result<Vec<u8>, TransformError> {
        Ok(content.to_vec())
    }
}

/// Options for every configurable transform.
#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    pub stylesheet: StylesheetOptions,
    pub script: ScriptOptions,
    pub image: ImageOptions,
}

/// One transform per asset class.
#[derive(Clone)]
pub struct TransformSet {
    html: Arc<dyn Transform>,
    stylesheet: Arc<dyn Transform>,
    script: Arc<dyn Transform>,
    image: Arc<dyn Transform>,
    font: Arc<dyn Transform>,
}

impl TransformSet {
    /// Build the standard transforms from `options`.
    pub fn new(options: TransformOptions) -> Self {
        Self {
            html: Arc::new(CopyTransform::new(AssetClass::Html)),
            stylesheet: Arc::new(StylesheetTransform::new(options.stylesheet)),
            script: Arc::new(ScriptTransform::new(options.script)),
            image: Arc::new(ImageTransform::new(options.image)),
            font: Arc::new(CopyTransform::new(AssetClass::Font)),
        }
    }

    /// Replace the transform for the class it reports.
    pub fn with(mut self, transform: Arc<dyn Transform>) -> Self {
        match transform.class() {
            AssetClass::Html => self.html = transform,
            AssetClass::Stylesheet => self.stylesheet = transform,
            AssetClass::Script => self.script = transform,
            AssetClass::Image => self.image = transform,
            AssetClass::Font => self.font = transform,
        }
        self
    }

    /// Transform for `class`.
    pub fn get(&self, class: AssetClass) -> Arc<dyn Transform> {
        match class {
            AssetClass::Html => Arc::clone(&self.html),
            AssetClass::Stylesheet => Arc::clone(&self.stylesheet),
            AssetClass::Script => Arc::clone(&self.script),
            AssetClass::Image => Arc::clone(&self.image),
            AssetClass::Font => Arc::clone(&self.font),
        }
    }
}

impl Default for TransformSet {
    fn default() -> Self {
        Self::new(TransformOptions::default())
    }
}

impl std::fmt::Debug for TransformSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformSet").finish_non_exhaustive()
    }
}
