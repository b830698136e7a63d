//! Merges log streams from many services into one chronological stream.
//!
//! Producers push into a staging list under a short mutex. A background
//! task periodically swaps that list out, stable-sorts the snapshot by
//! timestamp and writes it into the target [`LogBuffer`], so producers
//! never contend on the buffer's lock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

use crate::log_buffer::LogBuffer;
use crate::log_entry::LogEntry;

/// How often staged entries are flushed when no interval is given.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(50);

const STAGING_CAPACITY: usize = 100;

#[derive(Debug)]
struct Shared {
    staging: Mutex<Vec<LogEntry>>,
    output: Arc<LogBuffer>,
}

impl Shared {
    fn staging(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        self.staging.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn flush(&self) -> usize {
        let mut batch = {
            let mut staging = self.staging();
            if staging.is_empty() {
                return 0;
            }
            std::mem::replace(&mut *staging, Vec::with_capacity(STAGING_CAPACITY))
        };

        // `sort_by` is stable: equal timestamps keep their arrival order.
        batch.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        let count = batch.len();
        for entry in batch {
            self.output.add(entry);
        }
        trace!(count, "flushed interleaved log entries");
        count
    }
}

#[derive(Debug)]
enum Lifecycle {
    Idle,
    Running {
        shutdown: oneshot::Sender<()>,
        handle: JoinHandle<()>,
    },
    Stopped,
}

/// Timestamp-ordering front end for a shared [`LogBuffer`].
#[derive(Debug)]
pub struct LogInterleaver {
    shared: Arc<Shared>,
    interval: Duration,
    lifecycle: Mutex<Lifecycle>,
}

impl LogInterleaver {
    pub fn new(output: Arc<LogBuffer>) -> Self {
        Self::with_interval(output, DEFAULT_FLUSH_INTERVAL)
    }

    pub fn with_interval(output: Arc<LogBuffer>, interval: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                staging: Mutex::new(Vec::with_capacity(STAGING_CAPACITY)),
                output,
            }),
            interval,
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    /// The buffer entries are flushed into.
    pub fn output(&self) -> &Arc<LogBuffer> {
        &self.shared.output
    }

    /// Queue an entry for the next flush. Never blocks on the output buffer.
    pub fn add(&self, entry: LogEntry) {
        self.shared.staging().push(entry);
    }

    /// Number of entries waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.shared.staging().len()
    }

    /// Sort and drain everything staged so far. Returns how many entries
    /// were written.
    pub fn flush(&self) -> usize {
        self.shared.flush()
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn the periodic flush task on the current tokio runtime.
    ///
    /// Only the first call has an effect; later calls (including after
    /// [`stop`](Self::stop)) are no-ops.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime, like [`tokio::spawn`].
    pub fn start(&self) {
        let mut lifecycle = self.lifecycle();
        if !matches!(*lifecycle, Lifecycle::Idle) {
            return;
        }

        let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();
        let shared = Arc::clone(&self.shared);
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        shared.flush();
                    }
                    // Fires on an explicit stop or when the sender is dropped.
                    _ = &mut shutdown_rx => {
                        shared.flush();
                        break;
                    }
                }
            }
        });

        debug!(interval_ms = interval.as_millis() as u64, "log interleaver started");
        *lifecycle = Lifecycle::Running { shutdown, handle };
    }

    /// Stop the flush task and wait for it to exit.
    ///
    /// Everything added before this call is in the output buffer once it
    /// returns, whether or not [`start`](Self::start) was ever called.
    pub async fn stop(&self) {
        let previous = std::mem::replace(&mut *self.lifecycle(), Lifecycle::Stopped);

        match previous {
            Lifecycle::Running { shutdown, handle } => {
                let _ = shutdown.send(());
                if let Err(e) = handle.await {
                    warn!(error = %e, "log interleaver task ended abnormally");
                }
                debug!("log interleaver stopped");
            }
            Lifecycle::Idle | Lifecycle::Stopped => {}
        }

        // Catch anything added while the task was winding down.
        self.shared.flush();
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.lifecycle(), Lifecycle::Running { .. })
    }
}
