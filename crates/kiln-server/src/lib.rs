//! File watching and a live-reload development server for kiln.
//!
//! A [`WatchSession`] routes source changes to one worker per asset class,
//! re-runs that class's pipeline and tells connected browsers to refresh
//! through the [`ReloadHub`]. The [`DevServer`] serves the output tree.

pub mod reload;
pub mod server;
pub mod session;
pub mod watcher;

pub use reload::{reload_client_script, ReloadHub, ReloadMessage};
pub use server::{inject_reload_tag, DevServer, DevServerConfig, ServerError};
pub use session::{ClassWorkers, Trigger, WatchSession, DEFAULT_DEBOUNCE};
pub use watcher::{ChangeKind, FileWatcher, WatchEvent};
