//! Asset transforms for kiln.
//!
//! Every asset class (stylesheet, script, image, plus pass-through classes)
//! exposes the same [`Transform`] contract: bytes and a path in, bytes or a
//! [`TransformError`] out. Transforms hold their own options and no mutable
//! state, so the pipeline runs them concurrently across files.

pub mod class;
pub mod image;
pub mod registry;
pub mod script;
pub mod stylesheet;
pub mod traits;

pub use class::{AssetClass, UnknownClass};
pub use image::{ImageKind, ImageOptions, ImageTransform};
pub use registry::{CopyTransform, TransformOptions, TransformSet};
pub use script::{ScriptOptions, ScriptTransform};
pub use stylesheet::{StylesheetOptions, StylesheetTransform};
pub use traits::{Transform, TransformError};
