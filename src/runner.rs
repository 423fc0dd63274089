//! Background execution with lifecycle notifications.
//!
//! [`TaskRunner::submit`] spawns an operation on the tokio runtime and returns a
//! [`TaskHandle`]. Observers obtained through [`TaskRunner::subscribe`] receive,
//! for each operation, `Started` followed by exactly one of `Completed`,
//! `Cancelled` or `Error`. The interactive thread drains its receiver; no
//! worker ever touches presentation state.
//!
//! Cancellation is cooperative: the operation receives a [`CancellationToken`]
//! it may check between steps. Whoever first moves an operation out of
//! `RUNNING` (the worker finishing, or a cancel) publishes the terminal event;
//! the other side stays silent. A cancelled operation therefore never reports
//! `Completed`, even if its result arrives afterwards. A panicking operation
//! is reported as `Error` with the panic message.

use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

const RUNNING: u8 = 0;
const FINISHED: u8 = 1;
const CANCELLED: u8 = 2;

/// Lifecycle notification for one operation.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent<T> {
    Started { id: Uuid },
    Completed { id: Uuid, result: T },
    Cancelled { id: Uuid },
    Error { id: Uuid, message: String },
}

impl<T> TaskEvent<T> {
    pub fn id(&self) -> Uuid {
        match self {
            TaskEvent::Started { id }
            | TaskEvent::Completed { id, .. }
            | TaskEvent::Cancelled { id }
            | TaskEvent::Error { id, .. } => *id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskEvent::Started { .. })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct TaskControl {
    id: Uuid,
    token: CancellationToken,
    state: AtomicU8,
}

impl TaskControl {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            token: CancellationToken::new(),
            state: AtomicU8::new(RUNNING),
        }
    }

    /// Leave `RUNNING` for `to`. Only the first caller succeeds.
    fn settle(&self, to: u8) -> bool {
        self.state
            .compare_exchange(RUNNING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

struct Observers<T> {
    senders: Mutex<Vec<UnboundedSender<TaskEvent<T>>>>,
}

impl<T: Clone> Observers<T> {
    fn publish(&self, event: TaskEvent<T>) {
        let mut senders = lock(&self.senders);
        senders.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Handle to one submitted operation.
pub struct TaskHandle<T> {
    control: Arc<TaskControl>,
    observers: Arc<Observers<T>>,
    join: JoinHandle<()>,
}

impl<T: Clone> TaskHandle<T> {
    pub fn id(&self) -> Uuid {
        self.control.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.control.token.is_cancelled()
    }

    /// Cancel this operation. Returns `false` if it already finished.
    pub fn cancel(&self) -> bool {
        cancel_control(&self.control, &self.observers)
    }

    /// Wait for the worker to exit. Its terminal event has been published by then.
    pub async fn wait(self) {
        if let Err(e) = self.join.await {
            warn!(id = %self.control.id, error = %e, "background task aborted");
        }
    }
}

/// Move `control` to `CANCELLED` and publish it, unless it already settled.
fn cancel_control<T: Clone>(control: &TaskControl, observers: &Observers<T>) -> bool {
    if !control.settle(CANCELLED) {
        return false;
    }
    control.token.cancel();
    info!(id = %control.id, "operation cancelled");
    observers.publish(TaskEvent::Cancelled { id: control.id });
    true
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "operation panicked".to_string())
}

/// Runs one tracked operation at a time off the interactive thread.
pub struct TaskRunner<T> {
    observers: Arc<Observers<T>>,
    active: Mutex<Option<Arc<TaskControl>>>,
}

impl<T: Clone + Send + 'static> Default for TaskRunner<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> TaskRunner<T> {
    pub fn new() -> Self {
        Self {
            observers: Arc::new(Observers {
                senders: Mutex::new(Vec::new()),
            }),
            active: Mutex::new(None),
        }
    }

    /// Register an observer. Events published before this call are not replayed.
    pub fn subscribe(&self) -> UnboundedReceiver<TaskEvent<T>> {
        let (tx, rx) = unbounded_channel();
        lock(&self.observers.senders).push(tx);
        rx
    }

    /// Id of the operation currently tracked, finished or not.
    pub fn active_id(&self) -> Option<Uuid> {
        lock(&self.active).as_ref().map(|c| c.id)
    }

    /// Start `operation` in the background. A previously tracked operation
    /// that is still running is cancelled first.
    pub fn submit<F, Fut, E>(&self, operation: F) -> TaskHandle<T>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let control = Arc::new(TaskControl::new());
        {
            // Held until `Started` is out so a concurrent cancel cannot overtake it.
            let mut active = lock(&self.active);
            if let Some(previous) = active.replace(Arc::clone(&control)) {
                if cancel_control(&previous, &self.observers) {
                    debug!(superseded = %previous.id, by = %control.id, "operation superseded");
                }
            }
            info!(id = %control.id, "operation started");
            self.observers.publish(TaskEvent::Started { id: control.id });
        }

        let future = operation(control.token.clone());
        let observers = Arc::clone(&self.observers);
        let worker_control = Arc::clone(&control);
        let join = tokio::spawn(async move {
            // A separate task so a panicking operation still gets its terminal event.
            let result = match tokio::spawn(future).await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(e) if e.is_panic() => Err(panic_message(e.into_panic().as_ref())),
                Err(e) => Err(e.to_string()),
            };
            let id = worker_control.id;
            if !worker_control.settle(FINISHED) {
                debug!(%id, "discarding result of cancelled operation");
                return;
            }
            let event = match result {
                Ok(result) => {
                    info!(%id, "operation completed");
                    TaskEvent::Completed { id, result }
                }
                Err(message) => {
                    warn!(%id, error = %message, "operation failed");
                    TaskEvent::Error { id, message }
                }
            };
            observers.publish(event);
        });

        TaskHandle {
            control,
            observers: Arc::clone(&self.observers),
            join,
        }
    }

    /// Cancel the tracked operation. Returns `false` if it already finished.
    pub fn cancel(&self) -> bool {
        let active = lock(&self.active).clone();
        match active {
            Some(control) => cancel_control(&control, &self.observers),
            None => false,
        }
    }
}
