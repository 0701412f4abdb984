//! Priority-ordered race over retrieval paths.
//!
//! Each search submission walks an ordered list of render attempts — each
//! with its own timeout — evaluated by a single coordinator:
//!
//! 1. **Pre-render**: content fetched ahead of navigation; fastest when ready.
//! 2. **Cache-first**: only when a same-query marker was stored just before
//!    this page load; probes the cache, then fetches against the warm entry.
//! 3. **Standard**: the plain fetch. Never skipped once reached — it is the
//!    guaranteed-correct baseline.
//!
//! First success wins and stops evaluation. A branch's timeout or failure is
//! a negative result that falls through to the next branch, never a
//! user-visible error. Submissions carry a monotonic sequence number; a
//! completion only renders if its number is still the latest issued, so a
//! slow old response can never clobber a newer one. Issuing a new submission
//! cancels the abandoned branches of the previous one.

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Which retrieval path served a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    PreRender,
    CacheFirst,
    Standard,
}

/// The retrieval paths a submission can race. Implemented over the real
/// endpoints in production and over fakes in tests.
#[async_trait]
pub trait SearchPaths: Send + Sync {
    /// Content readied by an earlier prepare-for-redirect step, if any.
    async fn pre_rendered(&self, query: &str) -> Option<String>;

    /// Cheap cache-existence check. Never returns the payload.
    async fn probe(&self, query: &str) -> bool;

    /// The full fetch (server-side handler still checks cache first).
    async fn fetch(&self, query: &str) -> anyhow::Result<String>;
}

/// One search submission.
#[derive(Debug, Clone)]
pub struct Submission {
    pub query: String,
    /// True when a same-query marker was stored just before this page load,
    /// making the cache-first branch worth attempting.
    pub same_query_marker: bool,
}

/// The result of a settled submission.
#[derive(Debug)]
pub struct RenderOutcome {
    pub branch: Branch,
    pub body: String,
    pub sequence: u64,
    /// False when a newer submission was issued while this one was in
    /// flight — the caller must not render a stale body.
    pub current: bool,
}

/// Per-branch timeout bounds. Exceeding one is a negative result, not an
/// error shown to the user.
#[derive(Debug, Clone)]
pub struct BranchTimeouts {
    pub pre_render: Duration,
    pub probe: Duration,
}

impl Default for BranchTimeouts {
    fn default() -> Self {
        Self {
            pre_render: Duration::from_millis(500),
            probe: Duration::from_secs(1),
        }
    }
}

/// Telemetry observer: which branch served, and whether the render applied.
/// Infallible and decoupled from the render path.
pub type BranchHook = std::sync::Arc<dyn Fn(Branch, bool) + Send + Sync>;

pub struct Orchestrator<P: SearchPaths> {
    paths: P,
    timeouts: BranchTimeouts,
    /// Monotonic sequence of issued submissions.
    sequence: AtomicU64,
    /// Cancellation for the currently in-flight submission's branches.
    current_flight: Mutex<CancellationToken>,
    telemetry: Option<BranchHook>,
}

impl<P: SearchPaths> Orchestrator<P> {
    pub fn new(paths: P, timeouts: BranchTimeouts, telemetry: Option<BranchHook>) -> Self {
        Self {
            paths,
            timeouts,
            sequence: AtomicU64::new(0),
            current_flight: Mutex::new(CancellationToken::new()),
            telemetry,
        }
    }

    /// Race the retrieval paths for one submission.
    ///
    /// Returns `Ok(None)` when the submission was superseded before any
    /// branch produced content. Only standard-path fetch failures surface
    /// as errors.
    pub async fn submit(&self, submission: Submission) -> anyhow::Result<Option<RenderOutcome>> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        {
            let mut current = self.current_flight.lock().expect("flight lock");
            // Abandon the previous submission's remaining branches.
            current.cancel();
            *current = token.clone();
        }

        // Branch 1: pre-render.
        let pre_render = tokio::select! {
            _ = token.cancelled() => return Ok(None),
            result = tokio::time::timeout(
                self.timeouts.pre_render,
                self.paths.pre_rendered(&submission.query),
            ) => result.ok().flatten(),
        };
        if let Some(body) = pre_render {
            return Ok(Some(self.settle(Branch::PreRender, body, sequence)));
        }

        // Branch 2: cache-first, only behind a same-query marker.
        if submission.same_query_marker {
            let warm = tokio::select! {
                _ = token.cancelled() => return Ok(None),
                result = tokio::time::timeout(
                    self.timeouts.probe,
                    self.paths.probe(&submission.query),
                ) => result.unwrap_or(false),
            };
            if warm {
                let fetched = tokio::select! {
                    _ = token.cancelled() => return Ok(None),
                    result = self.paths.fetch(&submission.query) => result,
                };
                match fetched {
                    Ok(body) => {
                        return Ok(Some(self.settle(Branch::CacheFirst, body, sequence)));
                    }
                    Err(e) => {
                        debug!(error = %e, "cache-first fetch failed, falling through");
                    }
                }
            }
        }

        // Branch 3: standard. The guaranteed-correct baseline — errors here
        // are the only ones the caller surfaces.
        let body = tokio::select! {
            _ = token.cancelled() => return Ok(None),
            result = self.paths.fetch(&submission.query) => result?,
        };
        Ok(Some(self.settle(Branch::Standard, body, sequence)))
    }

    /// Most recently issued sequence number.
    pub fn latest_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    fn settle(&self, branch: Branch, body: String, sequence: u64) -> RenderOutcome {
        // A completion only renders if its submission is still the latest.
        let current = self.sequence.load(Ordering::SeqCst) == sequence;
        if let Some(hook) = &self.telemetry {
            hook(branch, current);
        }
        RenderOutcome {
            branch,
            body,
            sequence,
            current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    /// Configurable fake over the three retrieval paths.
    #[derive(Default)]
    struct FakePaths {
        pre_rendered: Option<String>,
        pre_render_hangs: bool,
        probe_result: bool,
        probe_hangs: bool,
        fetch_fails: bool,
        fetch_delay: Option<Duration>,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl SearchPaths for Arc<FakePaths> {
        async fn pre_rendered(&self, _query: &str) -> Option<String> {
            if self.pre_render_hangs {
                std::future::pending::<()>().await;
            }
            self.pre_rendered.clone()
        }

        async fn probe(&self, _query: &str) -> bool {
            if self.probe_hangs {
                std::future::pending::<()>().await;
            }
            self.probe_result
        }

        async fn fetch(&self, query: &str) -> anyhow::Result<String> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.fetch_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fetch_fails {
                anyhow::bail!("origin unavailable");
            }
            Ok(format!("results for {query}"))
        }
    }

    fn orchestrator(paths: Arc<FakePaths>) -> Orchestrator<Arc<FakePaths>> {
        let timeouts = BranchTimeouts {
            pre_render: Duration::from_millis(50),
            probe: Duration::from_millis(50),
        };
        Orchestrator::new(paths, timeouts, None)
    }

    fn submission(query: &str, marker: bool) -> Submission {
        Submission {
            query: query.to_owned(),
            same_query_marker: marker,
        }
    }

    #[tokio::test]
    async fn pre_render_wins_and_skips_everything_else() {
        let paths = Arc::new(FakePaths {
            pre_rendered: Some("ready".to_owned()),
            probe_result: true,
            ..Default::default()
        });
        let coordinator = orchestrator(paths.clone());

        let outcome = coordinator
            .submit(submission("nursing", true))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.branch, Branch::PreRender);
        assert_eq!(outcome.body, "ready");
        assert!(outcome.current);
        // Early exit: no fetch was issued.
        assert_eq!(paths.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cache_first_requires_the_marker() {
        let paths = Arc::new(FakePaths {
            probe_result: true,
            ..Default::default()
        });
        let coordinator = orchestrator(paths);

        let with_marker = coordinator
            .submit(submission("q", true))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(with_marker.branch, Branch::CacheFirst);

        let without_marker = coordinator
            .submit(submission("q", false))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(without_marker.branch, Branch::Standard);
    }

    #[tokio::test]
    async fn hanging_branches_time_out_into_the_standard_path() {
        let paths = Arc::new(FakePaths {
            pre_render_hangs: true,
            probe_hangs: true,
            ..Default::default()
        });
        let coordinator = orchestrator(paths);

        let start = std::time::Instant::now();
        let outcome = coordinator
            .submit(submission("q", true))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.branch, Branch::Standard);
        // Both timeouts are 50ms; the whole race stays tightly bounded.
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn standard_path_errors_surface() {
        let paths = Arc::new(FakePaths {
            fetch_fails: true,
            ..Default::default()
        });
        let coordinator = orchestrator(paths);
        assert!(coordinator.submit(submission("q", false)).await.is_err());
    }

    #[tokio::test]
    async fn newer_submission_marks_older_completion_stale() {
        let paths = Arc::new(FakePaths {
            fetch_delay: Some(Duration::from_millis(100)),
            ..Default::default()
        });
        let coordinator = Arc::new(orchestrator(paths));

        let slow = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.submit(submission("first", false)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        // Issuing the second submission supersedes the first.
        let fast = coordinator.submit(submission("second", false)).await;

        let fast = fast.unwrap().unwrap();
        assert!(fast.current);
        assert_eq!(fast.body, "results for second");

        // The first either observed cancellation or settled as stale.
        if let Some(outcome) = slow.await.unwrap().unwrap() {
            assert!(!outcome.current);
        }
    }

    #[tokio::test]
    async fn telemetry_records_the_serving_branch() {
        let observed: Arc<Mutex<Vec<(Branch, bool)>>> = Arc::default();
        let sink = observed.clone();
        let paths = Arc::new(FakePaths::default());
        let coordinator = Orchestrator::new(
            paths,
            BranchTimeouts::default(),
            Some(Arc::new(move |branch, applied| {
                sink.lock().unwrap().push((branch, applied));
            })),
        );

        coordinator.submit(submission("q", false)).await.unwrap();
        assert_eq!(*observed.lock().unwrap(), vec![(Branch::Standard, true)]);
    }
}
