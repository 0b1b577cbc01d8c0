//! Source and output layout per asset class.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern, PatternError};
use walkdir::WalkDir;

use kiln_transforms::AssetClass;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Where one asset class reads from and writes to.
#[derive(Debug, Clone)]
pub struct ClassPaths {
    /// Directory under the source root that relative output paths start from
    pub base: PathBuf,

    /// Files built by the pipeline (relative to the source root)
    pub source: Pattern,

    /// Files whose change triggers a rebuild (relative to the source root)
    pub watch: Pattern,

    /// Allowed extensions, lowercase; empty allows any
    pub extensions: Vec<String>,

    /// Output directory under the output root
    pub output: PathBuf,
}

impl ClassPaths {
    pub fn new(
        base: impl Into<PathBuf>,
        source: &str,
        watch: &str,
        extensions: &[&str],
        output: impl Into<PathBuf>,
    ) -> Result<Self, PatternError> {
        Ok(Self {
            base: base.into(),
            source: Pattern::new(source)?,
            watch: Pattern::new(watch)?,
            extensions: extensions.iter().map(|e| e.to_ascii_lowercase()).collect(),
            output: output.into(),
        })
    }

    fn allows_extension(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }
}

/// A discovered source file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceFile {
    /// Path on disk
    pub path: PathBuf,

    /// Path relative to the class base directory
    pub relative: PathBuf,
}

/// Errors that can occur while discovering sources.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("Failed to read source directory {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Immutable layout of the whole project.
#[derive(Debug, Clone)]
pub struct PathConfig {
    /// Root of all sources (`src/`)
    pub source_root: PathBuf,

    /// Root of all outputs (`dist/`)
    pub output_root: PathBuf,

    /// File name all compiled stylesheets are concatenated into, if any
    pub stylesheet_bundle: Option<String>,

    classes: BTreeMap<AssetClass, ClassPaths>,
}

impl PathConfig {
    /// The standard layout rooted at `source_root` and `output_root`.
    pub fn new(source_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        let mut classes = BTreeMap::new();
        let defaults = [
            (AssetClass::Html, "", "*.html", "**/*.html", &["html"][..], ""),
            (
                AssetClass::Stylesheet,
                "scss",
                "scss/*.scss",
                "scss/**/*.scss",
                &["scss"][..],
                "css",
            ),
            (AssetClass::Script, "js", "js/*.js", "js/**/*.js", &["js"][..], "js"),
            (
                AssetClass::Image,
                "images",
                "images/**/*",
                "images/**/*",
                &["jpeg", "jpg", "png", "gif", "webp", "svg"][..],
                "images",
            ),
            (
                AssetClass::Font,
                "fonts",
                "fonts/**/*",
                "fonts/**/*",
                &["woff", "woff2", "ttf", "eot", "svg"][..],
                "fonts",
            ),
        ];

        for (class, base, source, watch, extensions, output) in defaults {
            let paths = ClassPaths::new(base, source, watch, extensions, output)
                .expect("Invalid default class pattern");
            classes.insert(class, paths);
        }

        Self {
            source_root: source_root.into(),
            output_root: output_root.into(),
            stylesheet_bundle: Some("styles.css".to_string()),
            classes,
        }
    }

    /// Replace the layout of one class.
    pub fn with_class(mut self, class: AssetClass, paths: ClassPaths) -> Self {
        self.classes.insert(class, paths);
        self
    }

    /// Set (or disable) the stylesheet bundle name.
    pub fn with_stylesheet_bundle(mut self, name: Option<String>) -> Self {
        self.stylesheet_bundle = name.filter(|n| !n.is_empty());
        self
    }

    /// Layout of `class`.
    pub fn class(&self, class: AssetClass) -> &ClassPaths {
        // Every class is inserted in `new`, and `with_class` only replaces.
        &self.classes[&class]
    }

    /// Absolute-or-relative base directory of `class` sources.
    pub fn class_base(&self, class: AssetClass) -> PathBuf {
        self.source_root.join(&self.class(class).base)
    }

    /// Output directory of `class`.
    pub fn output_dir(&self, class: AssetClass) -> PathBuf {
        self.output_root.join(&self.class(class).output)
    }

    /// Path of `path` relative to the source root, if it lies inside it.
    pub fn relative_to_source(&self, path: &Path) -> Option<PathBuf> {
        if let Ok(rel) = path.strip_prefix(&self.source_root) {
            return Some(rel.to_path_buf());
        }
        // Watch events carry canonical paths.
        let root = fs::canonicalize(&self.source_root).ok()?;
        path.strip_prefix(root).ok().map(Path::to_path_buf)
    }

    /// Whether `path` is a build input of `class`.
    pub fn is_source(&self, class: AssetClass, path: &Path) -> bool {
        let paths = self.class(class);
        let Some(rel) = self.relative_to_source(path) else {
            return false;
        };
        if class == AssetClass::Stylesheet && is_partial(&rel) {
            return false;
        }
        paths.allows_extension(&rel) && paths.source.matches_path_with(&rel, MATCH_OPTIONS)
    }

    /// Whether a change to `path` should re-run `class`.
    pub fn is_watched(&self, class: AssetClass, path: &Path) -> bool {
        let paths = self.class(class);
        let Some(rel) = self.relative_to_source(path) else {
            return false;
        };
        paths.allows_extension(&rel) && paths.watch.matches_path_with(&rel, MATCH_OPTIONS)
    }

    /// Classes whose watch pattern matches `path`.
    pub fn watching(&self, path: &Path) -> Vec<AssetClass> {
        AssetClass::ALL
            .into_iter()
            .filter(|class| self.is_watched(*class, path))
            .collect()
    }

    /// Enumerate the build inputs of `class`, sorted by path.
    ///
    /// A missing base directory means there is nothing to build.
    pub fn discover(&self, class: AssetClass) -> Result<Vec<SourceFile>, PathError> {
        let base = self.class_base(class);
        if !base.exists() {
            tracing::debug!("No {} sources: {} does not exist", class, base.display());
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&base).follow_links(true) {
            let entry = entry.map_err(|source| PathError::Walk {
                path: base.clone(),
                source,
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if !self.is_source(class, path) {
                continue;
            }

            let relative = path.strip_prefix(&base).unwrap_or(path).to_path_buf();
            files.push(SourceFile {
                path: path.to_path_buf(),
                relative,
            });
        }

        files.sort();
        Ok(files)
    }

    /// Output location of `file`: the class output directory plus the
    /// relative sub-path, renamed per the class convention.
    pub fn output_path(&self, class: AssetClass, file: &SourceFile) -> PathBuf {
        let dir = self.output_dir(class);
        let parent = file.relative.parent().unwrap_or(Path::new(""));
        let name = file
            .relative
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        dir.join(parent).join(output_file_name(class, name))
    }

    /// Output location of the stylesheet bundle, if bundling is enabled.
    pub fn bundle_path(&self) -> Option<PathBuf> {
        self.stylesheet_bundle.as_ref().map(|name| {
            self.output_dir(AssetClass::Stylesheet)
                .join(output_file_name(AssetClass::Stylesheet, name))
        })
    }
}

/// Apply the naming convention of `class` to a file name.
///
/// Stylesheets become `<stem>.min.css`, scripts `<stem>.min.<ext>`; other
/// classes keep their name.
pub fn output_file_name(class: AssetClass, name: &str) -> String {
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    match class {
        AssetClass::Stylesheet => format!("{}.min.css", stem),
        AssetClass::Script => {
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("js");
            format!("{}.min.{}", stem, ext)
        }
        AssetClass::Html | AssetClass::Image | AssetClass::Font => name.to_string(),
    }
}

/// Sass partials (`_name.scss`) are imported, never compiled on their own.
fn is_partial(rel: &Path) -> bool {
    rel.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn renames_minified_classes() {
        assert_eq!(output_file_name(AssetClass::Stylesheet, "main.scss"), "main.min.css");
        assert_eq!(output_file_name(AssetClass::Script, "app.js"), "app.min.js");
        assert_eq!(output_file_name(AssetClass::Image, "logo.png"), "logo.png");
        assert_eq!(output_file_name(AssetClass::Html, "index.html"), "index.html");
    }

    #[test]
    fn output_path_keeps_sub_path() {
        let config = PathConfig::new("src", "dist");
        let file = SourceFile {
            path: PathBuf::from("src/images/icons/star.svg"),
            relative: PathBuf::from("icons/star.svg"),
        };

        assert_eq!(
            config.output_path(AssetClass::Image, &file),
            PathBuf::from("dist/images/icons/star.svg")
        );
    }

    #[test]
    fn html_source_is_top_level_only_but_watch_is_recursive() {
        let config = PathConfig::new("src", "dist");
        let nested = Path::new("src/partials/header.html");

        assert!(config.is_source(AssetClass::Html, Path::new("src/index.html")));
        assert!(!config.is_source(AssetClass::Html, nested));
        assert!(config.is_watched(AssetClass::Html, nested));
    }

    #[test]
    fn watch_classification_is_exclusive() {
        let config = PathConfig::new("src", "dist");

        assert_eq!(
            config.watching(Path::new("src/scss/base/_reset.scss")),
            vec![AssetClass::Stylesheet]
        );
        assert_eq!(
            config.watching(Path::new("src/images/a/b.JPG")),
            vec![AssetClass::Image]
        );
        assert_eq!(
            config.watching(Path::new("src/fonts/icons.svg")),
            vec![AssetClass::Font]
        );
        assert!(config.watching(Path::new("src/notes.txt")).is_empty());
        assert!(config.watching(Path::new("elsewhere/index.html")).is_empty());
    }

    #[test]
    fn discovers_sorted_sources_and_skips_partials() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        touch(&src.join("scss/main.scss"));
        touch(&src.join("scss/_vars.scss"));
        touch(&src.join("scss/admin.scss"));
        touch(&src.join("scss/nested/deep.scss"));

        let config = PathConfig::new(&src, temp.path().join("dist"));
        let found: Vec<_> = config
            .discover(AssetClass::Stylesheet)
            .unwrap()
            .into_iter()
            .map(|f| f.relative)
            .collect();

        assert_eq!(
            found,
            vec![PathBuf::from("admin.scss"), PathBuf::from("main.scss")]
        );
    }

    #[test]
    fn discovers_images_by_extension() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        touch(&src.join("images/a.png"));
        touch(&src.join("images/sub/b.svg"));
        touch(&src.join("images/readme.txt"));

        let config = PathConfig::new(&src, temp.path().join("dist"));
        let found = config.discover(AssetClass::Image).unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found[1].relative, PathBuf::from("sub/b.svg"));
    }

    #[test]
    fn missing_class_directory_is_empty() {
        let temp = tempdir().unwrap();
        let config = PathConfig::new(temp.path().join("src"), temp.path().join("dist"));

        assert!(config.discover(AssetClass::Font).unwrap().is_empty());
    }

    #[test]
    fn bundle_can_be_disabled() {
        let config = PathConfig::new("src", "dist");
        assert_eq!(
            config.bundle_path(),
            Some(PathBuf::from("dist/css/styles.min.css"))
        );

        let config = config.with_stylesheet_bundle(Some(String::new()));
        assert_eq!(config.bundle_path(), None);
    }
}
