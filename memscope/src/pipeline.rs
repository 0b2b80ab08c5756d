//! Background persistence pipeline.
//!
//! Probes run on the interpreter thread and must never wait on disk, so
//! entries travel through an unbounded channel to one consumer thread that
//! owns all sink I/O. Shutdown is cooperative: a sentinel asks the
//! consumer to drain and stop, a flag backstops a wedged queue, and the
//! sink is closed regardless of how the consumer ended.

use crate::domain::ProfileEntry;
use crate::sink::ProfileSink;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// How long a dequeue waits before rechecking the stop flag.
const DEQUEUE_WAIT: Duration = Duration::from_millis(500);

enum Command {
    Entry(ProfileEntry),
    /// Drain whatever is already queued, then stop.
    Stop,
}

type SinkSlot = Arc<Mutex<Option<Box<dyn ProfileSink>>>>;

/// Cheap cloneable producer handle.
///
/// Emitting never blocks and never fails the caller; entries sent after
/// shutdown are dropped with a debug line.
#[derive(Clone)]
pub struct PipelineHandle {
    tx: Sender<Command>,
}

impl PipelineHandle {
    pub fn emit(&self, entry: ProfileEntry) {
        if self.tx.send(Command::Entry(entry)).is_err() {
            log::debug!("profile entry dropped: pipeline is shut down");
        }
    }
}

pub struct Pipeline {
    tx: Sender<Command>,
    stop: Arc<AtomicBool>,
    sink: SinkSlot,
    consumer: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// Start the consumer thread. No sink is attached yet; entries that
    /// arrive before [`Pipeline::set_sink`] are dropped with a log line.
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        let stop = Arc::new(AtomicBool::new(false));
        let sink: SinkSlot = Arc::new(Mutex::new(None));
        let consumer = {
            let stop = Arc::clone(&stop);
            let sink = Arc::clone(&sink);
            std::thread::spawn(move || consume(&rx, &stop, &sink))
        };
        Self { tx, stop, sink, consumer: Some(consumer) }
    }

    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle { tx: self.tx.clone() }
    }

    /// Install `sink`, closing the previous one first so its store is
    /// finalized before the replacement receives anything.
    pub fn set_sink(&self, sink: Box<dyn ProfileSink>) {
        let Ok(mut slot) = self.sink.lock() else {
            log::error!("sink lock poisoned; new sink not installed");
            return;
        };
        if let Some(old) = slot.take() {
            if let Err(err) = old.close() {
                log::error!("failed to close previous sink: {err}");
            }
        }
        *slot = Some(sink);
    }

    /// Drain queued entries, wait up to `timeout` for the consumer, then
    /// close the sink whether or not the consumer finished.
    pub fn shutdown(mut self, timeout: Duration) {
        self.shutdown_inner(timeout);
    }

    fn shutdown_inner(&mut self, timeout: Duration) {
        self.stop.store(true, Ordering::Relaxed);
        // Consumer may already be gone; the stop flag covers that.
        let _ = self.tx.send(Command::Stop);

        if let Some(consumer) = self.consumer.take() {
            let deadline = Instant::now() + timeout;
            while !consumer.is_finished() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(10));
            }
            if consumer.is_finished() {
                if consumer.join().is_err() {
                    log::warn!("pipeline consumer panicked");
                }
            } else {
                log::warn!("pipeline consumer still draining after {timeout:?}; detaching");
            }
        }

        match self.sink.lock() {
            Ok(mut slot) => {
                if let Some(sink) = slot.take() {
                    if let Err(err) = sink.close() {
                        log::error!("failed to close sink: {err}");
                    }
                }
            }
            Err(_) => log::error!("sink lock poisoned during shutdown"),
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.consumer.is_some() {
            self.shutdown_inner(Duration::from_secs(2));
        }
    }
}

fn consume(rx: &Receiver<Command>, stop: &AtomicBool, sink: &SinkSlot) {
    loop {
        match rx.recv_timeout(DEQUEUE_WAIT) {
            Ok(Command::Entry(entry)) => persist(sink, &entry),
            Ok(Command::Stop) => break,
            Err(RecvTimeoutError::Timeout) => {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    // Entries can sit behind the sentinel; drain them so shutdown never
    // loses a recorded call.
    while let Ok(command) = rx.try_recv() {
        if let Command::Entry(entry) = command {
            persist(sink, &entry);
        }
    }
}

fn persist(sink: &SinkSlot, entry: &ProfileEntry) {
    let Ok(slot) = sink.lock() else {
        log::error!("sink lock poisoned; dropping entry for `{}`", entry.func);
        return;
    };
    match slot.as_ref() {
        Some(sink) => {
            // One bad entry must not take the rest of the run down.
            if let Err(err) = sink.handle(entry) {
                log::error!("failed to persist entry for `{}`: {err}", entry.func);
            }
        }
        None => log::debug!("no sink attached; dropping entry for `{}`", entry.func),
    }
}
