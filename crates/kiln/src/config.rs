//! kiln.toml loading.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

use kiln_pipeline::{Orchestrator, PathConfig, TracingNotifier};
use kiln_transforms::{ImageOptions, TransformOptions, TransformSet};

/// Configuration file structure (kiln.toml).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct KilnConfig {
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub images: ImagesSection,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsSection {
    #[serde(default = "default_src")]
    pub src: PathBuf,
    #[serde(default = "default_dist")]
    pub dist: PathBuf,
    /// Empty disables bundling
    #[serde(default = "default_bundle")]
    pub stylesheet_bundle: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub open: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImagesSection {
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_src() -> PathBuf {
    PathBuf::from("src")
}
fn default_dist() -> PathBuf {
    PathBuf::from("dist")
}
fn default_bundle() -> String {
    "styles.css".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_jpeg_quality() -> u8 {
    75
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            src: default_src(),
            dist: default_dist(),
            stylesheet_bundle: default_bundle(),
        }
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            open: false,
        }
    }
}

impl Default for ImagesSection {
    fn default() -> Self {
        Self {
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl KilnConfig {
    pub fn path_config(&self) -> PathConfig {
        PathConfig::new(&self.paths.src, &self.paths.dist)
            .with_stylesheet_bundle(Some(self.paths.stylesheet_bundle.clone()))
    }

    pub fn transform_options(&self) -> TransformOptions {
        TransformOptions {
            image: ImageOptions {
                jpeg_quality: self.images.jpeg_quality.clamp(1, 100),
            },
            ..TransformOptions::default()
        }
    }

    /// An orchestrator that reports through `tracing`.
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            Arc::new(self.path_config()),
            TransformSet::new(self.transform_options()),
            Arc::new(TracingNotifier),
        )
    }
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load(path: &Path) -> Result<KilnConfig> {
    if !path.exists() {
        tracing::debug!("No {}, using defaults", path.display());
        return Ok(KilnConfig::default());
    }

    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let config: KilnConfig =
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn missing_file_means_defaults() {
        let temp = tempdir().unwrap();
        let config = load(&temp.path().join("kiln.toml")).unwrap();

        assert_eq!(config.paths.src, PathBuf::from("src"));
        assert_eq!(config.paths.dist, PathBuf::from("dist"));
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.images.jpeg_quality, 75);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("kiln.toml");
        fs::write(&path, "[paths]\ndist = \"public\"\n\n[server]\nopen = true\n").unwrap();

        let config = load(&path).unwrap();

        assert_eq!(config.paths.dist, PathBuf::from("public"));
        assert_eq!(config.paths.src, PathBuf::from("src"));
        assert!(config.server.open);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("kiln.toml");
        fs::write(&path, "[server]\nport = \"not a number\"\n").unwrap();

        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn empty_bundle_name_disables_bundling() {
        let config: KilnConfig = toml::from_str("[paths]\nstylesheet_bundle = \"\"\n").unwrap();
        assert_eq!(config.path_config().stylesheet_bundle, None);

        let config = KilnConfig::default();
        assert_eq!(
            config.path_config().stylesheet_bundle,
            Some("styles.css".to_string())
        );
    }

    #[test]
    fn jpeg_quality_is_clamped() {
        let config: KilnConfig = toml::from_str("[images]\njpeg_quality = 0\n").unwrap();
        assert_eq!(config.transform_options().image.jpeg_quality, 1);
    }
}
