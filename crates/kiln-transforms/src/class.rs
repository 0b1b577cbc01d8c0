//! Asset class tags.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Category of source file, selecting the transform and naming convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Html,
    Stylesheet,
    Script,
    Image,
    Font,
}

impl AssetClass {
    /// All classes, in build order.
    pub const ALL: [AssetClass; 5] = [
        AssetClass::Html,
        AssetClass::Image,
        AssetClass::Stylesheet,
        AssetClass::Script,
        AssetClass::Font,
    ];

    /// Short name used in logs and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            AssetClass::Html => "html",
            AssetClass::Stylesheet => "css",
            AssetClass::Script => "js",
            AssetClass::Image => "images",
            AssetClass::Font => "fonts",
        }
    }

    /// Whether `@@include` directives are expanded before the transform.
    pub fn expands_includes(self) -> bool {
        matches!(self, AssetClass::Html | AssetClass::Script)
    }

    /// Whether outputs carry a `.min` marker before the extension.
    pub fn is_minified(self) -> bool {
        matches!(self, AssetClass::Stylesheet | AssetClass::Script)
    }

    /// Whether up-to-date outputs are skipped instead of recomputed.
    pub fn is_incremental(self) -> bool {
        matches!(self, AssetClass::Image)
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a class name is not recognized.
#[derive(Debug, thiserror::Error)]
#[error("Unknown asset class '{0}' (expected html, css, js, images or fonts)")]
pub struct UnknownClass(pub String);

impl FromStr for AssetClass {
    type Err = UnknownClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "html" => Ok(AssetClass::Html),
            "css" | "scss" | "stylesheet" | "styles" => Ok(AssetClass::Stylesheet),
            "js" | "script" | "scripts" => Ok(AssetClass::Script),
            "images" | "image" | "img" => Ok(AssetClass::Image),
            "fonts" | "font" => Ok(AssetClass::Font),
            _ => Err(UnknownClass(s.to_string())),
        }
    }
}
