//! Compensation scope for multi-step provisioning
//!
//! A [`CrashCleaner`] collects undo actions while an operation makes side
//! effects on the controller and the store. When the operation succeeds the
//! actions are discarded; when it fails they run in reverse registration
//! order and the original error is returned unchanged.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut cleaner = CrashCleaner::enter("allocate_address");
//! let outcome = async {
//!     let view = controller.create_address(&spec).await?;
//!     let undo = Arc::clone(&controller);
//!     let external_id = view.external_id.clone();
//!     cleaner.add_cleanup("delete address object", async move {
//!         undo.delete_address(&external_id).await
//!     });
//!     store.add(&record).await?;
//!     Ok(record)
//! }
//! .await;
//! cleaner.settle(outcome).await
//! ```
//!
//! Undo actions are futures, so nothing runs until the scope unwinds. Every
//! action runs even if an earlier one fails; failures are logged and never
//! replace the original error.

use std::future::Future;
use std::pin::Pin;

use tracing::{debug, error, warn};

use crate::Result;

type CleanupFuture = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

struct CleanupAction {
    description: String,
    action: CleanupFuture,
}

/// Outcome of an unwind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnwindReport {
    /// Operation whose scope unwound
    pub operation: &'static str,
    /// Number of undo actions executed
    pub executed: usize,
    /// Number of undo actions that failed
    pub failed: usize,
}

/// Scoped list of pending compensations
pub struct CrashCleaner {
    operation: &'static str,
    actions: Vec<CleanupAction>,
}

impl CrashCleaner {
    /// Open a scope for an operation
    pub fn enter(operation: &'static str) -> Self {
        Self {
            operation,
            actions: Vec::new(),
        }
    }

    /// Register an undo action
    ///
    /// The action only runs if the scope settles with an error.
    pub fn add_cleanup<F>(&mut self, description: impl Into<String>, action: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let description = description.into();
        debug!(
            "{}: registered compensation #{}: {}",
            self.operation,
            self.actions.len() + 1,
            description
        );
        self.actions.push(CleanupAction {
            description,
            action: Box::pin(action),
        });
    }

    /// Number of pending compensations
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether no compensation is pending
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Close the scope
    ///
    /// On `Ok` the pending actions are discarded. On `Err` they run in
    /// reverse order and the same error is returned.
    pub async fn settle<T>(self, outcome: Result<T>) -> Result<T> {
        self.settle_with_report(outcome).await.0
    }

    /// Close the scope, also reporting the unwind if one happened
    pub async fn settle_with_report<T>(
        mut self,
        outcome: Result<T>,
    ) -> (Result<T>, Option<UnwindReport>) {
        match outcome {
            Ok(value) => {
                self.actions.clear();
                (Ok(value), None)
            }
            Err(err) => {
                warn!(
                    "{} failed: {}. Running {} compensation(s)",
                    self.operation,
                    err,
                    self.actions.len()
                );
                let report = self.unwind().await;
                (Err(err), Some(report))
            }
        }
    }

    async fn unwind(&mut self) -> UnwindReport {
        let mut report = UnwindReport {
            operation: self.operation,
            executed: 0,
            failed: 0,
        };

        while let Some(CleanupAction {
            description,
            action,
        }) = self.actions.pop()
        {
            report.executed += 1;
            match action.await {
                Ok(()) => debug!("{}: compensation done: {}", self.operation, description),
                Err(e) => {
                    report.failed += 1;
                    error!(
                        "{}: compensation failed: {}: {}",
                        self.operation, description, e
                    );
                }
            }
        }

        report
    }
}

impl Drop for CrashCleaner {
    fn drop(&mut self) {
        if !self.actions.is_empty() {
            warn!(
                "{}: scope dropped without settling, {} compensation(s) abandoned",
                self.operation,
                self.actions.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::{Arc, Mutex};

    fn recorder() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    async fn push(log: Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Result<()> {
        log.lock().unwrap().push(name);
        Ok(())
    }

    #[tokio::test]
    async fn test_success_discards_actions() {
        let log = recorder();
        let mut cleaner = CrashCleaner::enter("test");
        cleaner.add_cleanup("first", push(Arc::clone(&log), "first"));
        cleaner.add_cleanup("second", push(Arc::clone(&log), "second"));
        assert_eq!(cleaner.len(), 2);

        let result = cleaner.settle(Ok::<_, Error>(7)).await;
        assert_eq!(result.unwrap(), 7);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_unwinds_in_reverse_order() {
        let log = recorder();
        let mut cleaner = CrashCleaner::enter("test");
        cleaner.add_cleanup("first", push(Arc::clone(&log), "first"));
        cleaner.add_cleanup("second", push(Arc::clone(&log), "second"));
        cleaner.add_cleanup("third", push(Arc::clone(&log), "third"));

        let (result, report) = cleaner
            .settle_with_report::<()>(Err(Error::not_found("boom")))
            .await;

        assert!(matches!(result, Err(Error::NotFound(ref m)) if m == "boom"));
        assert_eq!(*log.lock().unwrap(), vec!["third", "second", "first"]);
        assert_eq!(
            report,
            Some(UnwindReport {
                operation: "test",
                executed: 3,
                failed: 0
            })
        );
    }

    #[tokio::test]
    async fn test_failing_compensation_does_not_stop_unwind() {
        let log = recorder();
        let mut cleaner = CrashCleaner::enter("test");
        cleaner.add_cleanup("first", push(Arc::clone(&log), "first"));
        cleaner.add_cleanup("broken", async { Err(Error::store("disk full")) });
        cleaner.add_cleanup("third", push(Arc::clone(&log), "third"));

        let (result, report) = cleaner
            .settle_with_report::<()>(Err(Error::already_associated("original")))
            .await;

        // Original error survives, both healthy compensations ran
        assert!(matches!(result, Err(Error::ResourceAlreadyAssociated(_))));
        assert_eq!(*log.lock().unwrap(), vec!["third", "first"]);
        let report = report.unwrap();
        assert_eq!(report.executed, 3);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn test_empty_scope_failure() {
        let cleaner = CrashCleaner::enter("test");
        assert!(cleaner.is_empty());
        let (result, report) = cleaner
            .settle_with_report::<()>(Err(Error::AddressLimitExceeded))
            .await;
        assert!(matches!(result, Err(Error::AddressLimitExceeded)));
        assert_eq!(report.unwrap().executed, 0);
    }
}
