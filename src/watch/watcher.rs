/**
 * `ConfigMap` watch loop
 *
 * Keeps one subscription open at a time. A stream the server closes is
 * re-opened immediately; failures are retried with bounded exponential backoff
 * until the retry budget runs out.
 */
use super::config::WatchConfig;
use super::printer::EventPrinter;
use super::source::{EventStream, WatchSource};
use crate::error::{Error, Result};
use futures::StreamExt;
use std::io::Write;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// No subscription open, about to open one
    Idle,
    /// Consuming events from an open subscription
    Subscribed,
    /// The server closed the subscription
    Draining,
}

/// How a watch run ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchStats {
    pub subscriptions_opened: u64,
    pub streams_closed: u64,
    pub failures: u64,
    pub events_seen: u64,
}

enum Drained {
    Closed,
    Cancelled,
}

pub struct ConfigMapWatcher<S> {
    source: S,
    config: WatchConfig,
    state: WatchState,
    stats: WatchStats,
}

impl<S: WatchSource> ConfigMapWatcher<S> {
    pub const fn new(source: S, config: WatchConfig) -> Self {
        Self {
            source,
            config,
            state: WatchState::Idle,
            stats: WatchStats {
                subscriptions_opened: 0,
                streams_closed: 0,
                failures: 0,
                events_seen: 0,
            },
        }
    }

    #[must_use]
    pub const fn state(&self) -> WatchState {
        self.state
    }

    #[must_use]
    pub const fn stats(&self) -> &WatchStats {
        &self.stats
    }

    /// Watch until cancelled, printing every event
    ///
    /// # Errors
    ///
    /// Returns `Error::WatchRetriesExhausted` once `max_restarts` consecutive
    /// attempts have failed to open or read a subscription, and
    /// `Error::Console` as soon as an event cannot be written
    pub async fn run<W: Write + Send>(
        &mut self,
        printer: &EventPrinter<W>,
        cancel: &CancellationToken,
    ) -> Result<WatchOutcome> {
        let mut backoff = self.config.backoff();
        let mut failures: u32 = 0;

        info!(
            "🔍 Starting ConfigMap watcher for {}/{}",
            self.config.namespace, self.config.name
        );

        loop {
            self.transition(WatchState::Idle);

            let opened = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                opened = self.source.subscribe() => Some(opened),
            };
            let Some(opened) = opened else {
                return Ok(self.cancelled());
            };

            let result = match opened {
                Ok(stream) => {
                    self.stats.subscriptions_opened += 1;
                    self.transition(WatchState::Subscribed);
                    self.drain(stream, printer, cancel).await
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(Drained::Closed) => {
                    self.stats.streams_closed += 1;
                    self.transition(WatchState::Draining);
                    info!("🔍 ConfigMap watch stream ended normally, restarting...");
                    backoff.reset();
                    failures = 0;
                }
                Ok(Drained::Cancelled) => return Ok(self.cancelled()),
                Err(e @ Error::Console(_)) => {
                    error!("❌ Cannot write to the console, stopping ConfigMap watcher: {}", e);
                    self.transition(WatchState::Idle);
                    return Err(e);
                }
                Err(e) => {
                    failures += 1;
                    self.stats.failures += 1;
                    if failures >= self.config.max_restarts {
                        error!(
                            "❌ ConfigMap watcher exceeded maximum restart attempts ({}), stopping",
                            self.config.max_restarts
                        );
                        return Err(Error::WatchRetriesExhausted {
                            attempts: failures,
                            last: Box::new(e),
                        });
                    }

                    let delay = backoff.next_delay();
                    error!(
                        "❌ ConfigMap watcher failed (attempt {}/{}): {}, restarting in {:?}",
                        failures, self.config.max_restarts, e, delay
                    );
                    let cancelled = tokio::select! {
                        biased;
                        () = cancel.cancelled() => true,
                        () = sleep(delay) => false,
                    };
                    if cancelled {
                        return Ok(self.cancelled());
                    }
                }
            }
        }
    }

    async fn drain<W: Write + Send>(
        &mut self,
        mut stream: EventStream,
        printer: &EventPrinter<W>,
        cancel: &CancellationToken,
    ) -> Result<Drained> {
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(Drained::Cancelled),
                next = stream.next() => next,
            };
            match next {
                Some(Ok(event)) => {
                    self.stats.events_seen += 1;
                    debug!("📡 {} event", event.kind());
                    printer.print(&event).await?;
                }
                Some(Err(e)) => return Err(e),
                None => return Ok(Drained::Closed),
            }
        }
    }

    fn transition(&mut self, next: WatchState) {
        debug!("watch state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn cancelled(&mut self) -> WatchOutcome {
        info!("🔍 ConfigMap watcher shutting down");
        self.transition(WatchState::Idle);
        WatchOutcome::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watch::event::ConfigMapEvent;
    use async_trait::async_trait;
    use futures::stream;
    use k8s_openapi::api::core::v1::ConfigMap;
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;

    /// One scripted subscription: either an open failure or a finite stream
    enum Step {
        Fail,
        Events(Vec<Result<ConfigMapEvent>>),
    }

    /// Replays scripted subscriptions, then hands out streams that never end
    #[derive(Clone, Default)]
    struct FakeSource {
        script: Arc<Mutex<VecDeque<Step>>>,
        opened_at: Arc<Mutex<Vec<Instant>>>,
        always_fail: bool,
    }

    impl FakeSource {
        fn scripted(steps: Vec<Step>) -> Self {
            Self {
                script: Arc::new(Mutex::new(steps.into())),
                ..Self::default()
            }
        }

        fn failing() -> Self {
            Self {
                always_fail: true,
                ..Self::default()
            }
        }

        fn calls(&self) -> usize {
            self.opened_at.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl WatchSource for FakeSource {
        async fn subscribe(&self) -> Result<EventStream> {
            self.opened_at.lock().unwrap().push(Instant::now());
            if self.always_fail {
                return Err(Error::Custom("Unable to create watcher".to_string()));
            }
            let step = self.script.lock().unwrap().pop_front();
            match step {
                Some(Step::Fail) => Err(Error::Custom("Unable to create watcher".to_string())),
                Some(Step::Events(events)) => Ok(stream::iter(events).boxed()),
                None => Ok(stream::pending().boxed()),
            }
        }
    }

    fn modified(version: &str) -> Result<ConfigMapEvent> {
        Ok(ConfigMapEvent::Modified(ConfigMap {
            data: Some(BTreeMap::from([("version".to_string(), version.to_string())])),
            ..ConfigMap::default()
        }))
    }

    fn config() -> WatchConfig {
        WatchConfig::new("l7cplane", "anjana-test-configmap").max_restarts(5)
    }

    async fn wait_for_calls(source: &FakeSource, calls: usize) {
        while source.calls() < calls {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_stream_reopens_exactly_once() {
        let source = FakeSource::scripted(vec![Step::Events(vec![modified("v1")])]);
        let printer = Arc::new(EventPrinter::new(Vec::new(), "version"));
        let cancel = CancellationToken::new();

        let handle = {
            let source = source.clone();
            let printer = printer.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let mut watcher = ConfigMapWatcher::new(source, config());
                let outcome = watcher.run(&*printer, &cancel).await;
                (outcome, watcher.stats().clone())
            })
        };

        wait_for_calls(&source, 2).await;
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(source.calls(), 2);

        cancel.cancel();
        let (outcome, stats) = handle.await.unwrap();
        assert_eq!(outcome.unwrap(), WatchOutcome::Cancelled);
        assert_eq!(stats.subscriptions_opened, 2);
        assert_eq!(stats.streams_closed, 1);
        assert_eq!(stats.failures, 0);

        let opened_at = source.opened_at.lock().unwrap().clone();
        assert_eq!(opened_at[1] - opened_at[0], Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_failure_exhausts_retries() {
        let source = FakeSource::failing();
        let printer = EventPrinter::new(Vec::new(), "version");
        let cancel = CancellationToken::new();
        let mut watcher = ConfigMapWatcher::new(source.clone(), config());

        let result = watcher.run(&printer, &cancel).await;
        match result {
            Err(Error::WatchRetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 5);
                assert!(matches!(*last, Error::Custom(_)));
            }
            other => panic!("expected exhausted retries, got {other:?}"),
        }
        assert_eq!(source.calls(), 5);
        assert_eq!(watcher.stats().failures, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_back_off_exponentially() {
        let source = FakeSource::failing();
        let printer = EventPrinter::new(Vec::new(), "version");
        let cancel = CancellationToken::new();
        let mut watcher = ConfigMapWatcher::new(source.clone(), config());

        let _ = watcher.run(&printer, &cancel).await;

        let opened_at = source.opened_at.lock().unwrap().clone();
        let gaps: Vec<u64> = opened_at
            .windows(2)
            .map(|w| (w[1] - w[0]).as_secs())
            .collect();
        assert_eq!(gaps, vec![1, 2, 4, 8]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failure_budget() {
        let source = FakeSource::scripted(vec![
            Step::Fail,
            Step::Fail,
            Step::Events(vec![]),
            Step::Fail,
            Step::Fail,
            Step::Fail,
            Step::Fail,
            Step::Events(vec![modified("v3")]),
        ]);
        let printer = Arc::new(EventPrinter::new(Vec::new(), "version"));
        let cancel = CancellationToken::new();

        let handle = {
            let source = source.clone();
            let printer = printer.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let mut watcher = ConfigMapWatcher::new(source, config());
                watcher.run(&*printer, &cancel).await
            })
        };

        wait_for_calls(&source, 9).await;
        cancel.cancel();
        assert_eq!(handle.await.unwrap().unwrap(), WatchOutcome::Cancelled);

        let printer = Arc::try_unwrap(printer).ok().unwrap();
        assert_eq!(String::from_utf8(printer.into_inner()).unwrap(), "new policyversion v3\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_error_counts_as_failure() {
        let source = FakeSource::scripted(vec![Step::Events(vec![
            modified("v1"),
            Err(Error::Custom("connection reset".to_string())),
        ])]);
        let printer = Arc::new(EventPrinter::new(Vec::new(), "version"));
        let cancel = CancellationToken::new();

        let handle = {
            let source = source.clone();
            let printer = printer.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let mut watcher = ConfigMapWatcher::new(source, config());
                let outcome = watcher.run(&*printer, &cancel).await;
                (outcome, watcher.stats().clone())
            })
        };

        wait_for_calls(&source, 2).await;
        cancel.cancel();
        let (outcome, stats) = handle.await.unwrap();
        assert_eq!(outcome.unwrap(), WatchOutcome::Cancelled);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.events_seen, 1);

        let opened_at = source.opened_at.lock().unwrap().clone();
        assert_eq!(opened_at[1] - opened_at[0], Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let source = FakeSource::default();
        let printer = EventPrinter::new(Vec::new(), "version");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut watcher = ConfigMapWatcher::new(source.clone(), config());
        let outcome = watcher.run(&printer, &cancel).await.unwrap();
        assert_eq!(outcome, WatchOutcome::Cancelled);
        assert_eq!(watcher.state(), WatchState::Idle);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_end_to_end_print_sequence() {
        let source = FakeSource::scripted(vec![Step::Events(vec![
            modified("v1"),
            modified("v2"),
            Ok(ConfigMapEvent::Deleted(ConfigMap::default())),
        ])]);
        let printer = Arc::new(EventPrinter::new(Vec::new(), "version"));
        let cancel = CancellationToken::new();

        let handle = {
            let source = source.clone();
            let printer = printer.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let mut watcher = ConfigMapWatcher::new(source, config());
                watcher.run(&*printer, &cancel).await
            })
        };

        wait_for_calls(&source, 2).await;
        cancel.cancel();
        assert!(handle.await.unwrap().is_ok());

        let printer = Arc::try_unwrap(printer).ok().unwrap();
        let stats = printer.stats();
        assert_eq!(stats.lock_acquisitions, 3);
        assert_eq!(stats.lines_written, 3);
        assert_eq!(
            String::from_utf8(printer.into_inner()).unwrap(),
            "new policyversion v1\nnew policyversion v2\nConfigmap deleted\n"
        );
    }

    /// Console that rejects every write
    struct ClosedConsole;

    impl Write for ClosedConsole {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_console_failure_stops_without_retry() {
        let source = FakeSource::scripted(vec![Step::Events(vec![modified("v1")])]);
        let printer = EventPrinter::new(ClosedConsole, "version");
        let cancel = CancellationToken::new();
        let mut watcher = ConfigMapWatcher::new(source.clone(), config());

        let result = watcher.run(&printer, &cancel).await;
        assert!(matches!(result, Err(Error::Console(_))));
        assert_eq!(source.calls(), 1);
        assert_eq!(watcher.stats().failures, 0);
        assert_eq!(watcher.state(), WatchState::Idle);
    }
}
