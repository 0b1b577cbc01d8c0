//! A small task graph of named blocking steps.
//!
//! Steps are added after their dependencies, so the graph is acyclic by
//! construction. [`TaskGraph::run`] starts every step whose dependencies have
//! completed, concurrently, and returns once nothing is left to start. A
//! failed or panicked step skips everything downstream of it.

use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};

use tokio::task::JoinSet;

type StepFn<T, E> = Box<dyn FnOnce() -> Result<T, E> + Send + 'static>;

/// Errors building a graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Step '{0}' is already defined")]
    Duplicate(String),

    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },
}

/// What happened to a step.
#[derive(Debug)]
pub enum StepOutcome<T, E> {
    Completed(T),
    Failed(E),
    Panicked(String),
    /// Not run because an upstream step did not complete
    Skipped { blocked_by: String },
}

impl<T, E> StepOutcome<T, E> {
    pub fn is_completed(&self) -> bool {
        matches!(self, StepOutcome::Completed(_))
    }
}

/// Outcomes of one graph run, in the order steps were added.
#[derive(Debug)]
pub struct GraphRun<T, E> {
    pub outcomes: Vec<(String, StepOutcome<T, E>)>,
}

impl<T, E> GraphRun<T, E> {
    pub fn all_completed(&self) -> bool {
        self.outcomes.iter().all(|(_, o)| o.is_completed())
    }

    pub fn outcome(&self, name: &str) -> Option<&StepOutcome<T, E>> {
        self.outcomes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, o)| o)
    }
}

struct Node<T, E> {
    name: String,
    dependencies: Vec<usize>,
    run: Option<StepFn<T, E>>,
}

/// Named steps with dependency edges.
pub struct TaskGraph<T, E> {
    nodes: Vec<Node<T, E>>,
    index: HashMap<String, usize>,
}

impl<T, E> Default for TaskGraph<T, E> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T, E> TaskGraph<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a step that runs after every step in `after`.
    pub fn add_step<F>(&mut self, name: &str, after: &[&str], run: F) -> Result<(), GraphError>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        if self.index.contains_key(name) {
            return Err(GraphError::Duplicate(name.to_string()));
        }

        let dependencies = after
            .iter()
            .map(|dep| {
                self.index
                    .get(*dep)
                    .copied()
                    .ok_or_else(|| GraphError::UnknownDependency {
                        step: name.to_string(),
                        dependency: dep.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.index.insert(name.to_string(), self.nodes.len());
        self.nodes.push(Node {
            name: name.to_string(),
            dependencies,
            run: Some(Box::new(run)),
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Run every step, each on the blocking thread pool.
    pub async fn run(mut self) -> GraphRun<T, E> {
        let count = self.nodes.len();
        let mut waiting: Vec<usize> = self.nodes.iter().map(|n| n.dependencies.len()).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (i, node) in self.nodes.iter().enumerate() {
            for &dep in &node.dependencies {
                dependents[dep].push(i);
            }
        }

        let mut outcomes: Vec<Option<StepOutcome<T, E>>> = (0..count).map(|_| None).collect();
        let mut ready: VecDeque<usize> = (0..count).filter(|&i| waiting[i] == 0).collect();
        let mut running = JoinSet::new();

        loop {
            while let Some(i) = ready.pop_front() {
                let Some(run) = self.nodes[i].run.take() else {
                    continue;
                };
                tracing::debug!("Starting step '{}'", self.nodes[i].name);
                running.spawn_blocking(move || (i, catch_unwind(AssertUnwindSafe(run))));
            }

            let Some(joined) = running.join_next().await else {
                break;
            };

            let (i, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    // Only reachable if the runtime cancels the task.
                    tracing::error!("Step task was cancelled: {}", e);
                    continue;
                }
            };

            let outcome = match result {
                Ok(Ok(value)) => StepOutcome::Completed(value),
                Ok(Err(error)) => StepOutcome::Failed(error),
                Err(panic) => StepOutcome::Panicked(panic_message(panic.as_ref())),
            };

            if outcome.is_completed() {
                for &d in &dependents[i] {
                    waiting[d] -= 1;
                    if waiting[d] == 0 {
                        ready.push_back(d);
                    }
                }
            } else {
                let blocked_by = self.nodes[i].name.clone();
                let mut stack = dependents[i].clone();
                while let Some(d) = stack.pop() {
                    if outcomes[d].is_none() {
                        outcomes[d] = Some(StepOutcome::Skipped {
                            blocked_by: blocked_by.clone(),
                        });
                        stack.extend(dependents[d].iter().copied());
                    }
                }
            }
            outcomes[i] = Some(outcome);
        }

        let outcomes = self
            .nodes
            .into_iter()
            .zip(outcomes)
            .map(|(node, outcome)| {
                let outcome = outcome.unwrap_or_else(|| StepOutcome::Skipped {
                    blocked_by: "cancelled".to_string(),
                });
                (node.name, outcome)
            })
            .collect();

        GraphRun { outcomes }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    #[tokio::test]
    async fn runs_dependents_after_dependencies() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut graph: TaskGraph<(), String> = TaskGraph::new();

        let l = Arc::clone(&log);
        graph
            .add_step("clean", &[], move || {
                thread::sleep(Duration::from_millis(30));
                l.lock().unwrap().push("clean");
                Ok(())
            })
            .unwrap();
        for name in ["html", "css", "js"] {
            let l = Arc::clone(&log);
            graph
                .add_step(name, &["clean"], move || {
                    l.lock().unwrap().push(name);
                    Ok(())
                })
                .unwrap();
        }

        let run = graph.run().await;

        assert!(run.all_completed());
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 4);
        assert_eq!(log[0], "clean");
    }

    #[tokio::test]
    async fn siblings_run_concurrently() {
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let mut graph: TaskGraph<(), String> = TaskGraph::new();

        // "wait" only finishes if "signal" runs while it is still blocked.
        graph
            .add_step("wait", &[], move || {
                rx.recv_timeout(Duration::from_secs(5))
                    .map_err(|e| e.to_string())
            })
            .unwrap();
        graph
            .add_step("signal", &[], move || tx.send(()).map_err(|e| e.to_string()))
            .unwrap();

        let run = graph.run().await;

        assert!(run.all_completed());
    }

    #[tokio::test]
    async fn failure_skips_downstream_only() {
        let mut graph: TaskGraph<u32, String> = TaskGraph::new();
        graph.add_step("a", &[], || Err("boom".to_string())).unwrap();
        graph.add_step("b", &["a"], || Ok(1)).unwrap();
        graph.add_step("c", &["b"], || Ok(2)).unwrap();
        graph.add_step("d", &[], || Ok(3)).unwrap();

        let run = graph.run().await;

        assert!(matches!(run.outcome("a"), Some(StepOutcome::Failed(e)) if e == "boom"));
        assert!(matches!(
            run.outcome("b"),
            Some(StepOutcome::Skipped { blocked_by }) if blocked_by == "a"
        ));
        assert!(matches!(run.outcome("c"), Some(StepOutcome::Skipped { .. })));
        assert!(matches!(run.outcome("d"), Some(StepOutcome::Completed(3))));
    }

    #[tokio::test]
    async fn panics_are_captured() {
        let mut graph: TaskGraph<(), String> = TaskGraph::new();
        graph
            .add_step("explode", &[], || panic!("step exploded"))
            .unwrap();

        let run = graph.run().await;

        assert!(matches!(
            run.outcome("explode"),
            Some(StepOutcome::Panicked(msg)) if msg == "step exploded"
        ));
    }

    #[test]
    fn rejects_unknown_and_duplicate_steps() {
        let mut graph: TaskGraph<(), ()> = TaskGraph::new();
        graph.add_step("a", &[], || Ok(())).unwrap();

        assert!(matches!(
            graph.add_step("a", &[], || Ok(())),
            Err(GraphError::Duplicate(_))
        ));
        assert!(matches!(
            graph.add_step("b", &["missing"], || Ok(())),
            Err(GraphError::UnknownDependency { .. })
        ));
        assert_eq!(graph.len(), 1);
    }
}
