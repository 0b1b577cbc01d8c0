//! Source tree watching.

use std::path::PathBuf;
use std::sync::{mpsc, Arc};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

use kiln_pipeline::PathConfig;
use kiln_transforms::AssetClass;

/// Kind of change to a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// A change to a file watched by one asset class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub class: AssetClass,
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Recursive watcher over the source root.
///
/// Dropping it stops the watch and closes the event channel.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Watch `paths.source_root`.
    ///
    /// Returns the watcher and a channel of classified events. A path watched
    /// by several classes yields one event per class.
    pub fn new(
        paths: Arc<PathConfig>,
    ) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), std::io::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            match res {
                Ok(event) => {
                    let _ = sync_tx.send(event);
                }
                Err(e) => tracing::warn!("Watch error: {}", e),
            }
        })
        .map_err(std::io::Error::other)?;

        watcher
            .watch(&paths.source_root, RecursiveMode::Recursive)
            .map_err(std::io::Error::other)?;
        tracing::debug!("Watching {}", paths.source_root.display());

        std::thread::spawn(move || {
            while let Ok(event) = sync_rx.recv() {
                for watch_event in classify(&paths, &event) {
                    if async_tx.blocking_send(watch_event).is_err() {
                        return;
                    }
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

/// Map a notify event onto the classes that watch its paths.
pub(crate) fn classify(paths: &PathConfig, event: &notify::Event) -> Vec<WatchEvent> {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Remove(_) => ChangeKind::Removed,
        _ => return Vec::new(),
    };

    event
        .paths
        .iter()
        .flat_map(|path| {
            paths.watching(path).into_iter().map(move |class| WatchEvent {
                class,
                path: path.clone(),
                kind,
            })
        })
        .collect()
}
