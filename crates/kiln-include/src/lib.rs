//! Partial expansion for HTML and script sources.
//!
//! This crate finds `@@include('path')` directives, resolves the referenced
//! files relative to the including file, and splices their (recursively
//! expanded) content in place.

pub mod directive;
pub mod includer;

pub use directive::{find_directives, substitute_vars, Directive, IncludeContext};
pub use includer::{include, IncludeError, Includer};
