//! Recursive include expansion.

use std::fs;
use std::path::{Path, PathBuf};

use crate::directive::{find_directives, substitute_vars, DirectiveError, IncludeContext};

/// Default limit on include nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Errors that can occur while expanding includes.
#[derive(Debug, thiserror::Error)]
pub enum IncludeError {
    #[error("Missing include: {} (included from {})", .path.display(), .included_from.display())]
    Missing { path: PathBuf, included_from: PathBuf },

    #[error("Circular include: {}", format_chain(.chain))]
    Circular { chain: Vec<PathBuf> },

    #[error("Include nesting deeper than {limit} levels at {}", .path.display())]
    TooDeep { path: PathBuf, limit: usize },

    #[error(transparent)]
    Directive(#[from] DirectiveError),

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Expands `@@include` directives.
#[derive(Debug, Clone)]
pub struct Includer {
    max_depth: usize,
}

impl Default for Includer {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Includer {
    /// Create an includer with the default depth limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the nesting limit.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Expand all includes in `content`, resolving paths against `base`.
    ///
    /// `base` is the directory of the file `content` came from.
    pub fn include(&self, content: &str, base: &Path) -> Result<String, IncludeError> {
        let mut stack = Vec::new();
        self.expand(content, base, &mut stack, &IncludeContext::new())
    }

    /// Read `path` and expand its includes.
    ///
    /// The file itself is on the include stack, so a partial that pulls its
    /// parent back in is reported as circular.
    pub fn include_file(&self, path: &Path) -> Result<String, IncludeError> {
        let content = fs::read_to_string(path).map_err(|source| IncludeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.include_from(&content, path)
    }

    /// Expand `content`, which was read from the existing file `path`.
    pub fn include_from(&self, content: &str, path: &Path) -> Result<String, IncludeError> {
        let base = path.parent().unwrap_or(Path::new(""));
        let mut stack = vec![canonical(path)?];
        self.expand(content, base, &mut stack, &IncludeContext::new())
    }

    fn expand(
        &self,
        content: &str,
        base: &Path,
        stack: &mut Vec<PathBuf>,
        context: &IncludeContext,
    ) -> Result<String, IncludeError> {
        let directives = find_directives(content)?;
        if directives.is_empty() {
            return Ok(content.to_string());
        }

        let mut output = String::with_capacity(content.len());
        let mut cursor = 0;

        for directive in directives {
            output.push_str(&content[cursor..directive.range.start]);
            cursor = directive.range.end;

            let target = base.join(&directive.path);
            if !target.is_file() {
                return Err(IncludeError::Missing {
                    path: target,
                    included_from: stack.last().cloned().unwrap_or_else(|| base.to_path_buf()),
                });
            }

            let resolved = canonical(&target)?;
            if stack.contains(&resolved) {
                let mut chain = stack.clone();
                chain.push(resolved);
                return Err(IncludeError::Circular { chain });
            }
            if stack.len() >= self.max_depth {
                return Err(IncludeError::TooDeep {
                    path: resolved,
                    limit: self.max_depth,
                });
            }

            let raw = fs::read_to_string(&resolved).map_err(|source| IncludeError::Io {
                path: resolved.clone(),
                source,
            })?;

            // Inner contexts shadow outer ones.
            let mut scope = context.clone();
            if let Some(local) = directive.context {
                scope.extend(local);
            }
            let partial = substitute_vars(&raw, &scope);

            let partial_base = resolved.parent().unwrap_or(Path::new("")).to_path_buf();
            stack.push(resolved);
            let expanded = self.expand(&partial, &partial_base, stack, &scope);
            stack.pop();

            output.push_str(&expanded?);
        }

        output.push_str(&content[cursor..]);
        Ok(output)
    }
}

fn canonical(path: &Path) -> Result<PathBuf, IncludeError> {
    fs::canonicalize(path).map_err(|source| IncludeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Expand includes with a default [`Includer`].
pub fn include(content: &str, base: &Path) -> Result<String, IncludeError> {
    Includer::new().include(content, base)
}
