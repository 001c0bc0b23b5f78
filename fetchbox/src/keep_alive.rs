//! Background work tracking.
//!
//! Work registered with [`KeepAlive::wait_until`] is spawned on the tokio
//! runtime right away and tracked in registration order. Whoever owns the
//! surrounding context calls [`KeepAlive::done_waiting`] before tearing it
//! down.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use smol_str::SmolStr;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info_span, warn};

use crate::error::Error;
use crate::metrics::keep_alive_gauge;

type Task = (SmolStr, JoinHandle<Result<(), Error>>);

/// Queue of background tasks that must finish before a context is released.
#[derive(Clone, Debug, Default)]
pub struct KeepAlive {
    queue: Arc<Mutex<VecDeque<Task>>>,
}

impl KeepAlive {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<Task>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns `task` and appends it to the queue.
    ///
    /// The kind labels the task span and log lines.
    pub fn wait_until<F>(&self, kind: impl Into<SmolStr>, task: F)
    where
        F: Future<Output = Result<(), Error>> + Send + 'static,
    {
        let kind = kind.into();
        let span = info_span!("keep_alive", kind = %kind);
        keep_alive_gauge(1.0);
        let handle = tokio::spawn(
            async move {
                let result = task.await;
                keep_alive_gauge(-1.0);
                result
            }
            .instrument(span),
        );
        self.queue().push_back((kind, handle));
    }

    /// Number of tasks not drained yet.
    pub fn pending(&self) -> usize {
        self.queue().len()
    }

    /// Awaits every queued task in registration order.
    ///
    /// Tasks registered while draining are awaited too. Every task is awaited
    /// even after a failure; the first failure is returned.
    pub async fn done_waiting(&self) -> Result<(), Error> {
        let mut first_error = None;
        loop {
            let next = self.queue().pop_front();
            let Some((kind, handle)) = next else {
                break;
            };
            let result = match handle.await {
                Ok(result) => result,
                Err(join_error) => Err(Error::BackgroundTask(join_error)),
            };
            match result {
                Ok(()) => debug!(%kind, "background task finished"),
                Err(error) => {
                    warn!(%kind, %error, "background task failed");
                    first_error.get_or_insert(error);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
