//! Compensable action sequences.
//!
//! Actions run forward one at a time. When one fails, the undo of every
//! action that already succeeded runs in reverse order.

use futures::future::BoxFuture;

type Step<E> = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), E>> + Send>;

/// An action paired with its inverse.
pub(crate) struct CompensableAction<E> {
    label: String,
    apply: Step<E>,
    undo: Step<E>,
}

impl<E> CompensableAction<E> {
    pub(crate) fn new<A, U>(label: impl Into<String>, apply: A, undo: U) -> Self
    where
        A: FnOnce() -> BoxFuture<'static, Result<(), E>> + Send + 'static,
        U: FnOnce() -> BoxFuture<'static, Result<(), E>> + Send + 'static,
    {
        CompensableAction {
            label: label.into(),
            apply: Box::new(apply),
            undo: Box::new(undo),
        }
    }
}

/// Why a saga did not complete.
#[derive(Debug, PartialEq)]
pub(crate) enum SagaFailure<E> {
    /// An action failed and every completed action was undone.
    Failed(E),
    /// An action failed and at least one undo failed too. Holds the original
    /// failure followed by the undo failures.
    Critical(Vec<E>),
}

pub(crate) struct Saga<E> {
    actions: Vec<CompensableAction<E>>,
}

impl<E: std::fmt::Display> Saga<E> {
    pub(crate) fn new() -> Self {
        Saga {
            actions: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, action: CompensableAction<E>) {
        self.actions.push(action);
    }

    pub(crate) async fn run(self) -> Result<(), SagaFailure<E>> {
        let mut undo_log: Vec<(String, Step<E>)> = Vec::with_capacity(self.actions.len());

        for action in self.actions {
            match (action.apply)().await {
                Ok(()) => undo_log.push((action.label, action.undo)),
                Err(err) => {
                    log::debug!("saga step {} failed: {}", action.label, err);
                    let mut errors = vec![err];
                    while let Some((label, undo)) = undo_log.pop() {
                        if let Err(undo_err) = undo().await {
                            log::error!("failed to undo {}: {}", label, undo_err);
                            errors.push(undo_err);
                        }
                    }
                    return Err(if errors.len() > 1 {
                        SagaFailure::Critical(errors)
                    } else {
                        SagaFailure::Failed(errors.remove(0))
                    });
                }
            }
        }
        Ok(())
    }
}
