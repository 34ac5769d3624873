//! Periodic process memory reporter
//!
//! Runs on its own thread with no data dependency on the pipeline. The
//! thread wakes every interval, samples this process's resident memory and
//! hands it to a callback. Dropping or stopping the [`MemoryMonitor`] ends
//! the thread.

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use sysinfo::{Pid, System};
use tracing::debug;

/// Bytes per mebibyte
const BYTES_PER_MB: u64 = 1024 * 1024;

/// Handle to the background memory reporter
pub struct MemoryMonitor {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MemoryMonitor {
    /// Start reporting every `interval`
    pub fn spawn<F>(interval: Duration, report: F) -> Self
    where
        F: Fn(u64) + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("ipdedup-memory".to_string())
            .spawn(move || {
                let mut system = System::new();
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            report(process_memory_bytes(&mut system) / BYTES_PER_MB);
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("Memory monitor stopped");
            })
            .ok();

        Self {
            stop: Some(stop_tx),
            handle,
        }
    }

    /// Stop the reporter and wait for its thread
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MemoryMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Resident memory of the current process in bytes (0 if unavailable)
pub fn process_memory_bytes(system: &mut System) -> u64 {
    system.refresh_all();
    let pid = Pid::from_u32(std::process::id());
    system.process(pid).map(|p| p.memory()).unwrap_or(0)
}
