use std::fmt;
use std::future::Future;

use tokio::task::{AbortHandle, JoinSet};

/// How one supervised task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Failed,
    Panicked,
    Cancelled,
}

/// Tally returned by [`TaskSupervisor::join_all`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorReport {
    pub completed: usize,
    pub failed: usize,
    pub panicked: usize,
    pub cancelled: usize,
}

impl SupervisorReport {
    fn record(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Completed => self.completed += 1,
            TaskOutcome::Failed => self.failed += 1,
            TaskOutcome::Panicked => self.panicked += 1,
            TaskOutcome::Cancelled => self.cancelled += 1,
        }
    }
}

/// Scope for streaming tasks where a failure stays with its task.
///
/// Each task runs on its own tokio task. Errors and panics are logged under
/// the task's name; siblings keep running. Must be used inside a runtime.
#[derive(Default)]
pub struct TaskSupervisor {
    watchers: JoinSet<TaskOutcome>,
    running: Vec<AbortHandle>,
}

impl TaskSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F, E>(&mut self, name: impl Into<String>, task: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let name = name.into();
        let handle = tokio::spawn(task);
        self.running.push(handle.abort_handle());

        self.watchers.spawn(async move {
            match handle.await {
                Ok(Ok(())) => {
                    log::debug!("Task {} completed", name);
                    TaskOutcome::Completed
                }
                Ok(Err(err)) => {
                    log::error!("Task {} failed: {}", name, err);
                    TaskOutcome::Failed
                }
                Err(err) if err.is_panic() => {
                    log::error!("Task {} panicked", name);
                    TaskOutcome::Panicked
                }
                Err(_) => {
                    log::debug!("Task {} cancelled", name);
                    TaskOutcome::Cancelled
                }
            }
        });
    }

    /// Tasks not yet collected by [`TaskSupervisor::join_all`]
    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }

    /// Cancel every running task; outcomes are still collected by `join_all`
    pub fn cancel_all(&mut self) {
        for handle in self.running.drain(..) {
            handle.abort();
        }
    }

    /// Wait for every task and tally how each ended
    pub async fn join_all(&mut self) -> SupervisorReport {
        let mut report = SupervisorReport::default();
        while let Some(joined) = self.watchers.join_next().await {
            match joined {
                Ok(outcome) => report.record(outcome),
                Err(err) => {
                    log::error!("Task watcher stopped: {}", err);
                    report.record(TaskOutcome::Cancelled);
                }
            }
        }
        self.running.clear();
        report
    }
}

impl fmt::Debug for TaskSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSupervisor")
            .field("tasks", &self.watchers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_failure_does_not_cancel_siblings() {
        let finished = Arc::new(AtomicUsize::new(0));
        let mut supervisor = TaskSupervisor::new();

        supervisor.spawn("fails", async { Err::<(), _>("boom") });
        supervisor.spawn("panics", async {
            if true {
                panic!("stream broke");
            }
            Ok::<(), String>(())
        });
        for i in 0..3 {
            let finished = finished.clone();
            supervisor.spawn(format!("ok-{i}"), async move {
                tokio::task::yield_now().await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok::<(), String>(())
            });
        }
        assert_eq!(supervisor.len(), 5);

        let report = supervisor.join_all().await;
        assert_eq!(
            report,
            SupervisorReport {
                completed: 3,
                failed: 1,
                panicked: 1,
                cancelled: 0,
            }
        );
        assert_eq!(finished.load(Ordering::SeqCst), 3);
        assert!(supervisor.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_all() {
        let mut supervisor = TaskSupervisor::new();
        supervisor.spawn("forever", async {
            std::future::pending::<()>().await;
            Ok::<(), String>(())
        });
        supervisor.cancel_all();
        assert_eq!(supervisor.join_all().await.cancelled, 1);
    }
}
