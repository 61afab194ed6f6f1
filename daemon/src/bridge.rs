/// Single-listener bridge between the capture source and the downstream sink.
///
/// The session (stopped / listening plus the active listener) sits behind one
/// mutex, so [`EventBridge::start`], [`EventBridge::stop`] and
/// [`EventBridge::deliver`] serialize against each other.
///
/// Delivery goes through a bounded queue drained by one consumer task per
/// session; the consumer hands each event to the listener on the blocking pool.  `deliver` never waits on the listener: it enqueues with
/// `try_send` and returns, keeping per-source FIFO order.  Events are delivered
/// at most once; a full queue or a failing listener loses the event.
///
/// `stop` drains: events accepted before `stop` still reach the listener
/// before `stop` returns, and nothing delivered after it is accepted.
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::PipelineError;
use crate::model::ClassifiedEvent;
use crate::permission::PermissionGate;

/// Downstream consumer of classified notifications.
///
/// Called on tokio's blocking pool, one event at a time, in delivery order.
pub trait EventListener: Send + Sync {
    fn on_classified_event(&self, event: &ClassifiedEvent) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Stopped,
    Listening,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartAck {
    Started,
    /// A listener was already registered; it was kept.
    AlreadyListening,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopAck {
    Stopped,
    AlreadyStopped,
}

/// What [`EventBridge::deliver`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Enqueued for the active listener.
    Queued,
    /// No session is active.
    Ignored,
    /// The queue was full or its consumer is gone.
    Dropped,
}

/// Snapshot of the bridge counters since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub delivered: u64,
    pub ignored: u64,
    pub dropped: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    delivered: AtomicU64,
    ignored: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

enum Session {
    Stopped,
    Listening {
        listener: Arc<dyn EventListener>,
        queue: mpsc::Sender<ClassifiedEvent>,
        consumer: JoinHandle<()>,
    },
}

pub struct EventBridge {
    gate: PermissionGate,
    capacity: usize,
    session: Mutex<Session>,
    counters: Arc<Counters>,
}

impl EventBridge {
    /// Creates a stopped bridge whose queue holds up to `capacity` events.
    pub fn new(gate: PermissionGate, capacity: usize) -> Self {
        Self {
            gate,
            capacity: capacity.max(1),
            session: Mutex::new(Session::Stopped),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn gate(&self) -> &PermissionGate {
        &self.gate
    }

    pub fn state(&self) -> SessionState {
        match *self.lock() {
            Session::Stopped => SessionState::Stopped,
            Session::Listening { .. } => SessionState::Listening,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.state() == SessionState::Listening
    }

    /// True when `listener` is the registered handle.
    #[cfg(test)]
    pub fn is_active_listener(&self, listener: &Arc<dyn EventListener>) -> bool {
        match &*self.lock() {
            Session::Listening { listener: active, .. } => Arc::ptr_eq(active, listener),
            Session::Stopped => false,
        }
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            ignored: self.counters.ignored.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Registers `listener` and begins forwarding events to it.
    ///
    /// Must be called from within a tokio runtime, which hosts the consumer
    /// task.  Calling it while already listening keeps the existing listener.
    pub fn start(&self, listener: Arc<dyn EventListener>) -> Result<StartAck, PipelineError> {
        let granted = self
            .gate
            .check()
            .map_err(|e| PipelineError::Generic(format!("Failed to check notification access: {e:#}")))?;
        if !granted {
            return Err(PipelineError::PermissionDenied);
        }

        let mut session = self.lock();
        if let Session::Listening { listener: active, .. } = &*session {
            if !Arc::ptr_eq(active, &listener) {
                warn!("A listener is already registered; keeping it");
            }
            return Ok(StartAck::AlreadyListening);
        }

        let runtime = Handle::try_current().map_err(|e| {
            PipelineError::Generic(format!("No async runtime to deliver events on: {e}"))
        })?;
        let (queue, rx) = mpsc::channel(self.capacity);
        let consumer = runtime.spawn(run_consumer(
            rx,
            Arc::clone(&listener),
            Arc::clone(&self.counters),
        ));
        *session = Session::Listening {
            listener,
            queue,
            consumer,
        };

        info!(capacity = self.capacity, "Started listening to notifications");
        Ok(StartAck::Started)
    }

    /// Unregisters the listener after draining events already queued for it.
    pub async fn stop(&self) -> StopAck {
        let previous = {
            let mut session = self.lock();
            std::mem::replace(&mut *session, Session::Stopped)
        };

        match previous {
            Session::Stopped => StopAck::AlreadyStopped,
            Session::Listening {
                queue, consumer, ..
            } => {
                // Closing the queue lets the consumer finish once it is empty.
                drop(queue);
                if let Err(e) = consumer.await {
                    warn!("Event consumer ended abnormally: {e}");
                }
                info!("Stopped listening to notifications");
                StopAck::Stopped
            }
        }
    }

    /// Unconditional stop for when the owning context goes away.
    pub async fn teardown(&self) {
        let ack = self.stop().await;
        debug!(?ack, "Bridge torn down");
    }

    /// Forwards one classified event to the active listener, if any.
    pub fn deliver(&self, event: ClassifiedEvent) -> Delivery {
        let session = self.lock();
        let Session::Listening { queue, .. } = &*session else {
            self.counters.ignored.fetch_add(1, Ordering::Relaxed);
            debug!(package = %event.package_name, "Not listening; notification ignored");
            return Delivery::Ignored;
        };

        match queue.try_send(event) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(event)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    package = %event.package_name,
                    capacity = self.capacity,
                    "Listener queue full; notification dropped"
                );
                Delivery::Dropped
            }
            Err(TrySendError::Closed(event)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(package = %event.package_name, "Event consumer gone; notification dropped");
                Delivery::Dropped
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for EventBridge {
    fn drop(&mut self) {
        let session = self.session.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Session::Listening { .. } = std::mem::replace(session, Session::Stopped) {
            debug!("Bridge dropped while listening; queued events drain in the background");
        }
    }
}

async fn run_consumer(
    mut rx: mpsc::Receiver<ClassifiedEvent>,
    listener: Arc<dyn EventListener>,
    counters: Arc<Counters>,
) {
    while let Some(event) = rx.recv().await {
        // Listeners do blocking I/O; keep them off the async workers.
        let worker = Arc::clone(&listener);
        let outcome = tokio::task::spawn_blocking(move || {
            let result = dispatch(worker.as_ref(), &event);
            (event, result)
        })
        .await;

        match outcome {
            Ok((_, Ok(()))) => {
                counters.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Ok((event, Err(e))) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                error!(package = %event.package_name, category = %event.category, "{e}");
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                error!("Listener task failed: {e}");
            }
        }
    }
    debug!("Event consumer drained");
}

/// Invokes the listener, turning both errors and panics into `ListenerFailure`.
fn dispatch(listener: &dyn EventListener, event: &ClassifiedEvent) -> Result<(), PipelineError> {
    match catch_unwind(AssertUnwindSafe(|| listener.on_classified_event(event))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(PipelineError::ListenerFailure(format!("{e:#}"))),
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "listener panicked".to_string());
            Err(PipelineError::ListenerFailure(reason))
        }
    }
}
