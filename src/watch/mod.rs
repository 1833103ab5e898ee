pub mod config;
pub mod event;
pub mod printer;
pub mod source;
pub mod watcher;

pub use config::{Backoff, WatchConfig};
pub use event::{ConfigMapEvent, decode_line};
pub use printer::{EventPrinter, PrinterStats};
pub use source::{ApiWatchSource, EventStream, WatchSource};
pub use watcher::{ConfigMapWatcher, WatchOutcome, WatchState, WatchStats};
