//! Fan-out helpers for the concurrent operation variants
//!
//! Both helpers run every task on its own scoped thread and join them all
//! before returning, so tasks may borrow from the caller (in practice, a
//! shared `&Transaction`). Neither cancels in-flight work.

use std::any::Any;

use crossbeam::channel;

use crate::error::{Result, StoreError};

/// A unit of work for one thread
pub type Task<'env> = Box<dyn FnOnce() -> Result<()> + Send + 'env>;

/// Run all tasks concurrently and wait for them, discarding their errors
///
/// A panicking task is logged and otherwise ignored.
pub fn wait_group(tasks: Vec<Task<'_>>) {
    let outcome = crossbeam::thread::scope(|scope| {
        for task in tasks {
            scope.spawn(move |_| {
                if let Err(e) = task() {
                    tracing::debug!("wait-group task error discarded: {}", e);
                }
            });
        }
    });

    if let Err(panic) = outcome {
        tracing::warn!("wait-group task panicked: {}", panic_message(panic.as_ref()));
    }
}

/// Run all tasks concurrently, wait for them, and return the first error
///
/// "First" is the first task to finish with an error. Later errors are
/// dropped. A panic counts as an error only if no task returned one.
pub fn error_group(tasks: Vec<Task<'_>>) -> Result<()> {
    let (sender, receiver) = channel::unbounded::<StoreError>();

    let outcome = crossbeam::thread::scope(|scope| {
        for task in tasks {
            let sender = sender.clone();
            scope.spawn(move |_| {
                if let Err(e) = task() {
                    // The receiver outlives the scope
                    let _ = sender.send(e);
                }
            });
        }
    });
    drop(sender);

    if let Ok(first) = receiver.try_recv() {
        return Err(first);
    }
    outcome.map_err(|panic| StoreError::TaskPanicked(panic_message(panic.as_ref())))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
