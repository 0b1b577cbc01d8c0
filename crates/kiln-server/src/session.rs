//! Watch mode: re-run a class pipeline when its sources change.
//!
//! Every asset class has one worker task fed by a queue of capacity one. A
//! change arriving while the class is idle or running fills the queue; further
//! changes coalesce into that pending run. So at most one run is in flight per
//! class and at most one more is waiting behind it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use kiln_pipeline::Orchestrator;
use kiln_transforms::AssetClass;

use crate::reload::{ReloadHub, ReloadMessage};
use crate::server::ServerError;
use crate::watcher::{FileWatcher, WatchEvent};

/// How long a worker waits for a burst of changes to settle.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// What happened to a change handed to a class worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A run is now pending
    Queued,
    /// A run was already pending; this change joins it
    Coalesced,
    /// The worker has stopped
    Closed,
}

/// One worker task per asset class.
pub struct ClassWorkers {
    senders: HashMap<AssetClass, mpsc::Sender<WatchEvent>>,
    handles: Vec<JoinHandle<()>>,
}

impl ClassWorkers {
    /// Spawn a worker for every class onto the current runtime.
    pub fn spawn(orchestrator: Orchestrator, hub: ReloadHub, debounce: Duration) -> Self {
        let mut senders = HashMap::new();
        let mut handles = Vec::new();

        for class in AssetClass::ALL {
            let (tx, rx) = mpsc::channel(1);
            senders.insert(class, tx);
            handles.push(tokio::spawn(class_worker(
                class,
                orchestrator.clone(),
                hub.clone(),
                rx,
                debounce,
            )));
        }

        Self { senders, handles }
    }

    /// Hand a change to the worker of `event.class`.
    pub fn trigger(&self, event: WatchEvent) -> Trigger {
        let Some(sender) = self.senders.get(&event.class) else {
            return Trigger::Closed;
        };
        match sender.try_send(event) {
            Ok(()) => Trigger::Queued,
            Err(TrySendError::Full(_)) => Trigger::Coalesced,
            Err(TrySendError::Closed(_)) => Trigger::Closed,
        }
    }

    /// Abort every worker. A pipeline already on the blocking pool finishes
    /// on its own, but nothing is queued after it.
    pub fn stop(&self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

impl Drop for ClassWorkers {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn class_worker(
    class: AssetClass,
    orchestrator: Orchestrator,
    hub: ReloadHub,
    mut rx: mpsc::Receiver<WatchEvent>,
    debounce: Duration,
) {
    while let Some(event) = rx.recv().await {
        tracing::info!("{} changed: {:?} {}", class, event.kind, event.path.display());

        tokio::time::sleep(debounce).await;
        while rx.try_recv().is_ok() {}

        // Errors are reported through the orchestrator's notifier.
        if let Ok(report) = orchestrator.run_class(class).await {
            tracing::info!(
                "Rebuilt {}: {} written, {} failed ({}ms)",
                class,
                report.written.len(),
                report.failures.len(),
                report.duration_ms
            );
            hub.send(match class {
                AssetClass::Stylesheet => ReloadMessage::Style,
                _ => ReloadMessage::Reload,
            });
        }
    }
}

/// File watcher plus class workers, live until [`WatchSession::stop`].
pub struct WatchSession {
    workers: Arc<ClassWorkers>,
    router: JoinHandle<()>,
    _watcher: FileWatcher,
}

impl WatchSession {
    /// Watch the orchestrator's source root and re-run classes on change.
    pub fn start(orchestrator: Orchestrator, hub: ReloadHub) -> Result<Self, ServerError> {
        let (watcher, events) = FileWatcher::new(orchestrator.paths().clone())
            .map_err(|e| ServerError::WatchError(e.to_string()))?;

        let workers = Arc::new(ClassWorkers::spawn(orchestrator, hub, DEFAULT_DEBOUNCE));
        let router = tokio::spawn(route_events(events, Arc::clone(&workers)));

        Ok(Self {
            workers,
            router,
            _watcher: watcher,
        })
    }

    /// Stop routing changes and abort the class workers.
    pub fn stop(self) {
        self.router.abort();
        self.workers.stop();
        tracing::debug!("Watch session stopped");
    }
}

/// Forward watcher events to their class workers until the watcher closes.
async fn route_events(mut events: mpsc::Receiver<WatchEvent>, workers: Arc<ClassWorkers>) {
    while let Some(event) = events.recv().await {
        let class = event.class;
        match workers.trigger(event) {
            Trigger::Queued => tracing::debug!("Queued {} rebuild", class),
            Trigger::Coalesced => tracing::debug!("{} rebuild already pending", class),
            Trigger::Closed => {
                tracing::warn!("{} worker has stopped; change ignored", class);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::ChangeKind;
    use kiln_pipeline::{CollectingNotifier, PathConfig};
    use kiln_transforms::{Transform, TransformError, TransformSet};
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    /// Script transform that takes a while, so runs can overlap with changes.
    struct SlowScript(Duration);

    impl Transform for SlowScript {
        fn class(&self) -> AssetClass {
            AssetClass::Script
        }

        fn transform(&self, content: &[u8], _path: &Path) -> Result<Vec<u8>, TransformError> {
            std::thread::sleep(self.0);
            Ok(content.to_vec())
        }
    }

    struct Fixture {
        _temp: tempfile::TempDir,
        script: PathBuf,
        notifier: Arc<CollectingNotifier>,
        orchestrator: Orchestrator,
    }

    fn fixture(run_time: Duration) -> Fixture {
        let temp = tempdir().unwrap();
        let script = temp.path().join("src/js/app.js");
        fs::create_dir_all(script.parent().unwrap()).unwrap();
        fs::write(&script, "var a = 1;").unwrap();

        let notifier = Arc::new(CollectingNotifier::new());
        let orchestrator = Orchestrator::new(
            Arc::new(PathConfig::new(
                temp.path().join("src"),
                temp.path().join("dist"),
            )),
            TransformSet::default().with(Arc::new(SlowScript(run_time))),
            notifier.clone(),
        );

        Fixture {
            _temp: temp,
            script,
            notifier,
            orchestrator,
        }
    }

    fn change(fx: &Fixture) -> WatchEvent {
        WatchEvent {
            class: AssetClass::Script,
            path: fx.script.clone(),
            kind: ChangeKind::Modified,
        }
    }

    fn runs(notifier: &CollectingNotifier, class: &str) -> usize {
        let finished = format!("finished {class}");
        notifier
            .notices()
            .iter()
            .filter(|n| **n == finished)
            .count()
    }

    async fn wait_for_runs(notifier: &CollectingNotifier, class: &str, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while runs(notifier, class) < count {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("timed out waiting for pipeline runs");
    }

    #[tokio::test]
    async fn burst_of_changes_runs_once() {
        let fx = fixture(Duration::ZERO);
        let hub = ReloadHub::new();
        let mut reloads = hub.subscribe();
        let workers = ClassWorkers::spawn(fx.orchestrator.clone(), hub, Duration::from_millis(200));

        for _ in 0..5 {
            workers.trigger(change(&fx));
        }

        wait_for_runs(&fx.notifier, "js", 1).await;
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(runs(&fx.notifier, "js"), 1);
        assert_eq!(reloads.recv().await.unwrap(), ReloadMessage::Reload);
    }

    #[tokio::test]
    async fn changes_during_a_run_coalesce_into_one_rerun() {
        let fx = fixture(Duration::from_millis(400));
        let workers =
            ClassWorkers::spawn(fx.orchestrator.clone(), ReloadHub::new(), Duration::from_millis(20));

        assert_eq!(workers.trigger(change(&fx)), Trigger::Queued);

        // Let the first run start.
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(workers.trigger(change(&fx)), Trigger::Queued);
        assert_eq!(workers.trigger(change(&fx)), Trigger::Coalesced);
        assert_eq!(workers.trigger(change(&fx)), Trigger::Coalesced);

        wait_for_runs(&fx.notifier, "js", 2).await;
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(runs(&fx.notifier, "js"), 2);
    }

    #[tokio::test]
    async fn a_change_reruns_only_its_class() {
        let fx = fixture(Duration::ZERO);
        fs::write(fx.orchestrator.paths().source_root.join("index.html"), "<p>").unwrap();
        let workers =
            ClassWorkers::spawn(fx.orchestrator.clone(), ReloadHub::new(), Duration::from_millis(10));

        workers.trigger(change(&fx));
        wait_for_runs(&fx.notifier, "js", 1).await;

        let dist = fx.orchestrator.paths().output_root.clone();
        assert!(dist.join("js/app.min.js").exists());
        assert!(!dist.join("index.html").exists());
        assert_eq!(runs(&fx.notifier, "html"), 0);
    }

    #[tokio::test]
    async fn stylesheet_runs_send_style_refresh() {
        let fx = fixture(Duration::ZERO);
        let scss = fx.orchestrator.paths().source_root.join("scss/main.scss");
        fs::create_dir_all(scss.parent().unwrap()).unwrap();
        fs::write(&scss, "a { color: red; }").unwrap();

        let hub = ReloadHub::new();
        let mut reloads = hub.subscribe();
        let workers = ClassWorkers::spawn(fx.orchestrator.clone(), hub, Duration::from_millis(10));

        workers.trigger(WatchEvent {
            class: AssetClass::Stylesheet,
            path: scss,
            kind: ChangeKind::Modified,
        });

        let msg = tokio::time::timeout(Duration::from_secs(5), reloads.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg, ReloadMessage::Style);
    }

    #[tokio::test]
    async fn stopped_workers_report_closed() {
        let fx = fixture(Duration::ZERO);
        let workers = ClassWorkers::spawn(fx.orchestrator.clone(), ReloadHub::new(), DEFAULT_DEBOUNCE);

        workers.stop();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(workers.trigger(change(&fx)), Trigger::Closed);
    }

    #[tokio::test]
    async fn routed_events_reach_their_class_worker() {
        let fx = fixture(Duration::ZERO);
        let workers = Arc::new(ClassWorkers::spawn(
            fx.orchestrator.clone(),
            ReloadHub::new(),
            Duration::from_millis(100),
        ));
        let (tx, rx) = mpsc::channel(8);
        let router = tokio::spawn(route_events(rx, Arc::clone(&workers)));

        for _ in 0..3 {
            tx.send(change(&fx)).await.unwrap();
        }
        drop(tx);
        router.await.unwrap();

        wait_for_runs(&fx.notifier, "js", 1).await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(runs(&fx.notifier, "js"), 1);
        assert_eq!(runs(&fx.notifier, "html"), 0);
    }
}
