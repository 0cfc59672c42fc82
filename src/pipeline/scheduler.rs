// src/pipeline/scheduler.rs

//! Bounded fan-out of watch tasks.

use std::sync::Arc;

use futures::future;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::models::{ErrorKind, ProcessingOutcome, RunReport, Watch};
use crate::pipeline::process::WatchContext;

/// Runs one task per enabled watch, at most `limit` at a time.
pub struct Scheduler {
    context: Arc<WatchContext>,
    semaphore: Arc<Semaphore>,
}

impl Scheduler {
    pub fn new(context: Arc<WatchContext>, limit: usize) -> Self {
        Self {
            context,
            semaphore: Arc::new(Semaphore::new(limit.max(1))),
        }
    }

    /// Dispatch every enabled watch and wait for all dispatched tasks.
    ///
    /// Once `cancel` fires no further watch is dispatched; tasks already
    /// running observe the same token.
    pub async fn run(&self, watches: &[Watch], cancel: &CancellationToken) -> RunReport {
        let mut report = RunReport::default();
        let mut handles = Vec::new();

        for (index, watch) in watches.iter().enumerate() {
            if !watch.is_enabled() {
                log::debug!("skipping disabled watch {}", watch.name);
                report.skipped += 1;
                continue;
            }

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = Arc::clone(&self.semaphore).acquire_owned() => permit.ok(),
            };

            let Some(permit) = permit else {
                let remaining = &watches[index..];
                let enabled = remaining.iter().filter(|w| w.is_enabled()).count();
                report.not_dispatched += enabled;
                report.skipped += remaining.len() - enabled;
                log::warn!("run cancelled, {} watches not dispatched", enabled);
                break;
            };

            let context = Arc::clone(&self.context);
            let watch = watch.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let outcome = context.run_watch(&watch, &cancel).await;
                if !outcome.updates_snapshot() {
                    log::debug!("snapshot entry for {} left untouched", watch.name);
                }
                outcome
            }));
        }

        for joined in future::join_all(handles).await {
            let outcome = joined.unwrap_or_else(|error| {
                log::error!("watch task failed: {}", error);
                ProcessingOutcome::FatalError {
                    kind: ErrorKind::Fatal,
                    message: error.to_string(),
                }
            });
            report.record(&outcome);
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::Config;
    use crate::pipeline::fakes::{FakeFetcher, RecordingNotifier, context, ok};

    fn watches(count: usize) -> Vec<Watch> {
        (0..count)
            .map(|i| Watch::new(format!("w{i}"), format!("https://example.com/{i}")))
            .collect()
    }

    fn fetcher_for(watches: &[Watch]) -> FakeFetcher {
        watches
            .iter()
            .fold(FakeFetcher::new(), |f, w| f.respond(&w.url, ok("body")))
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_enabled_watches_are_processed() {
        let watches = watches(10);
        let fetcher = fetcher_for(&watches).with_delay(Duration::from_millis(100));
        let ctx = Arc::new(context(
            Config::default(),
            fetcher,
            RecordingNotifier::new(),
        ));
        let scheduler = Scheduler::new(Arc::clone(&ctx), 3);

        let report = scheduler.run(&watches, &CancellationToken::new()).await;

        assert_eq!(report.new_resources, 10);
        assert_eq!(report.processed(), 10);
        assert_eq!(ctx.store.len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_in_flight_never_exceeds_limit() {
        let watches = watches(8);
        let fetcher = Arc::new(fetcher_for(&watches).with_delay(Duration::from_millis(50)));
        let mut ctx = context(Config::default(), FakeFetcher::new(), RecordingNotifier::new());
        ctx.fetcher = fetcher.clone();
        let scheduler = Scheduler::new(Arc::new(ctx), 2);

        scheduler.run(&watches, &CancellationToken::new()).await;

        assert_eq!(fetcher.calls(), 8);
        assert_eq!(fetcher.max_in_flight(), 2);
    }

    #[tokio::test]
    async fn test_disabled_watches_are_skipped() {
        let mut watches = watches(3);
        watches[1].disabled = true;
        let fetcher = Arc::new(fetcher_for(&watches));
        let mut ctx = context(Config::default(), FakeFetcher::new(), RecordingNotifier::new());
        ctx.fetcher = fetcher.clone();
        let ctx = Arc::new(ctx);

        let report = Scheduler::new(Arc::clone(&ctx), 4)
            .run(&watches, &CancellationToken::new())
            .await;

        assert_eq!(report.skipped, 1);
        assert_eq!(report.new_resources, 2);
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(ctx.store.get(&watches[1].url), None);
    }

    #[tokio::test]
    async fn test_cancelled_run_dispatches_nothing() {
        let watches = watches(4);
        let fetcher = Arc::new(fetcher_for(&watches));
        let mut ctx = context(Config::default(), FakeFetcher::new(), RecordingNotifier::new());
        ctx.fetcher = fetcher.clone();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = Scheduler::new(Arc::new(ctx), 2).run(&watches, &cancel).await;

        assert_eq!(report.not_dispatched, 4);
        assert_eq!(report.processed(), 0);
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_one_failing_watch_does_not_affect_siblings() {
        let watches = watches(3);
        // w1 has no scripted response and fails with a transport error.
        let fetcher = FakeFetcher::new()
            .respond(&watches[0].url, ok("a"))
            .respond(&watches[2].url, ok("c"));
        let notifier = RecordingNotifier::new();
        let ctx = Arc::new(context(Config::default(), fetcher, notifier.clone()));

        let report = Scheduler::new(Arc::clone(&ctx), 2)
            .run(&watches, &CancellationToken::new())
            .await;

        assert_eq!(report.new_resources, 2);
        assert_eq!(report.fatal_errors, 1);
        assert_eq!(notifier.events().len(), 1);
        assert_eq!(notifier.events()[0].0, "w1");
    }
}
