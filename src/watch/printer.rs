/**
 * Console printer for `ConfigMap` watch events
 *
 * Owns the console and the lock that serializes every write to it.
 */
use super::event::ConfigMapEvent;
use crate::error::{Error, Result};
use crate::k8s::configmaps::data_value;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Line written for every deleted event
pub const DELETED_NOTICE: &str = "Configmap deleted";

/// Line written for event kinds other than added/modified/deleted
pub const FALLBACK_NOTICE: &str = "In the default case";

/// Prefix of the line written when the watched key is present
pub const VERSION_PREFIX: &str = "new policyversion";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrinterStats {
    pub lock_acquisitions: u64,
    pub lines_written: u64,
}

pub struct EventPrinter<W> {
    console: Mutex<W>,
    key: String,
    lock_acquisitions: AtomicU64,
    lines_written: AtomicU64,
}

impl EventPrinter<std::io::Stdout> {
    #[must_use]
    pub fn stdout(key: impl Into<String>) -> Self {
        Self::new(std::io::stdout(), key)
    }
}

impl<W: Write + Send> EventPrinter<W> {
    pub fn new(console: W, key: impl Into<String>) -> Self {
        Self {
            console: Mutex::new(console),
            key: key.into(),
            lock_acquisitions: AtomicU64::new(0),
            lines_written: AtomicU64::new(0),
        }
    }

    /// Print one event
    ///
    /// Added and modified events print the watched key when it is present and
    /// nothing otherwise. The console lock is held for the whole branch.
    ///
    /// # Errors
    ///
    /// Returns `Error::Console` only if writing to the console fails
    pub async fn print(&self, event: &ConfigMapEvent) -> Result<()> {
        match event {
            ConfigMapEvent::Added(cm) | ConfigMapEvent::Modified(cm) => {
                let mut console = self.lock().await;
                if let Some(value) = data_value(cm, &self.key) {
                    self.write_line(&mut console, &format!("{VERSION_PREFIX} {value}"))?;
                } else {
                    debug!(
                        "📝 {} event without key {:?}, skipping",
                        event.kind(),
                        self.key
                    );
                }
            }
            ConfigMapEvent::Deleted(_) => {
                let mut console = self.lock().await;
                self.write_line(&mut console, DELETED_NOTICE)?;
            }
            ConfigMapEvent::Other(description) => {
                warn!("Unhandled watch event: {}", description);
                let mut console = self.lock().await;
                self.write_line(&mut console, FALLBACK_NOTICE)?;
            }
        }
        Ok(())
    }

    async fn lock(&self) -> MutexGuard<'_, W> {
        let guard = self.console.lock().await;
        self.lock_acquisitions.fetch_add(1, Ordering::Relaxed);
        guard
    }

    fn write_line(&self, console: &mut W, line: &str) -> Result<()> {
        writeln!(console, "{line}").map_err(Error::Console)?;
        console.flush().map_err(Error::Console)?;
        self.lines_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    #[must_use]
    pub fn stats(&self) -> PrinterStats {
        PrinterStats {
            lock_acquisitions: self.lock_acquisitions.load(Ordering::Relaxed),
            lines_written: self.lines_written.load(Ordering::Relaxed),
        }
    }

    /// Give back the console, e.g. to inspect captured output
    pub fn into_inner(self) -> W {
        self.console.into_inner()
    }
}
