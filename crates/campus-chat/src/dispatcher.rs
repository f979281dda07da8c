//! Query dispatcher: fans a classified turn out to its data sources.
//!
//! Every planned source call runs under its own deadline. The dispatcher
//! waits for all of them, records each outcome in its category slot, and
//! returns a [`Context`] whose slot order never depends on which source
//! finished first.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use campus_core::config::DispatcherConfig;
use campus_core::{Category, Clock, Intent};
use futures::future::join_all;
use futures::FutureExt;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::{Context, SlotResult};
use crate::error::SourceError;
use crate::pool::WorkerPool;
use crate::task::{SourceTask, Sources};

/// How a turn's source calls will be executed.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// General question; nothing to call.
    Empty,
    /// A single source, awaited on the calling task.
    Inline(SourceTask),
    /// Several sources, run concurrently on the worker pool.
    FanOut(Vec<SourceTask>),
}

impl Plan {
    pub fn len(&self) -> usize {
        match self {
            Plan::Empty => 0,
            Plan::Inline(_) => 1,
            Plan::FanOut(tasks) => tasks.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Plan::Empty)
    }
}

/// Plans, runs, and merges the source calls of one turn.
pub struct Dispatcher {
    sources: Sources,
    pool: Arc<WorkerPool>,
    clock: Arc<dyn Clock>,
    deadline: Duration,
}

impl Dispatcher {
    pub fn new(
        sources: Sources,
        pool: Arc<WorkerPool>,
        clock: Arc<dyn Clock>,
        deadline: Duration,
    ) -> Self {
        Self {
            sources,
            pool,
            clock,
            deadline,
        }
    }

    /// Build a dispatcher using the configured deadline. The pool is passed
    /// in so that every dispatcher in the process shares one.
    pub fn from_config(
        sources: Sources,
        pool: Arc<WorkerPool>,
        clock: Arc<dyn Clock>,
        config: &DispatcherConfig,
    ) -> Self {
        Self::new(
            sources,
            pool,
            clock,
            Duration::from_millis(config.source_deadline_ms),
        )
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Decide how the categories of `intent` will be fetched.
    pub fn plan(&self, text: &str, intent: &Intent) -> Plan {
        let now = self.clock.now();
        let mut tasks: Vec<SourceTask> = intent
            .iter()
            .map(|category| SourceTask::new(category, text, now, self.deadline))
            .collect();
        match tasks.len() {
            0 => Plan::Empty,
            1 => Plan::Inline(tasks.remove(0)),
            _ => Plan::FanOut(tasks),
        }
    }

    /// Run every source the intent needs and merge the outcomes.
    ///
    /// Always returns a fully populated context, even when every source
    /// failed.
    pub async fn dispatch(&self, text: &str, intent: &Intent, session_id: Uuid) -> Context {
        let started = Instant::now();
        let plan = self.plan(text, intent);
        let planned = plan.len();

        let slots = match plan {
            Plan::Empty => BTreeMap::new(),
            Plan::Inline(task) => {
                let category = task.category;
                let result = self.run_inline(task, intent.clone(), started).await;
                BTreeMap::from([(category, result)])
            }
            Plan::FanOut(tasks) => self.fan_out(tasks, intent, started).await,
        };

        let failed = slots.values().filter(|r| r.is_err()).count();
        info!(
            session_id = %session_id,
            intent = %intent,
            sources = planned,
            failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Dispatch complete"
        );

        Context::from_slots(text, intent.clone(), slots)
    }

    async fn run_inline(&self, task: SourceTask, intent: Intent, started: Instant) -> SlotResult {
        let category = task.category;
        let deadline = task.deadline;
        let work = AssertUnwindSafe(self.sources.run(task, intent)).catch_unwind();
        match timeout_at(started + deadline, work).await {
            Ok(Ok(result)) => result,
            Ok(Err(_panic)) => {
                warn!(category = %category, "Source task panicked");
                Err(SourceError::UpstreamUnavailable {
                    category,
                    reason: "source task panicked".to_string(),
                })
            }
            Err(_) => timed_out(category, deadline),
        }
    }

    async fn fan_out(
        &self,
        tasks: Vec<SourceTask>,
        intent: &Intent,
        started: Instant,
    ) -> BTreeMap<Category, SlotResult> {
        let pending = tasks.into_iter().map(|task| {
            let category = task.category;
            let deadline = task.deadline;
            let sources = self.sources.clone();
            let intent = intent.clone();
            let handle = self.pool.submit(async move { sources.run(task, intent).await });

            // Dropping the handle on expiry detaches the pooled task.
            async move {
                let result = match timeout_at(started + deadline, handle).await {
                    Ok(Ok(Some(result))) => result,
                    Ok(Ok(None)) => Err(SourceError::UpstreamUnavailable {
                        category,
                        reason: "worker pool closed".to_string(),
                    }),
                    Ok(Err(join_err)) => {
                        warn!(category = %category, error = %join_err, "Source task failed to complete");
                        Err(SourceError::UpstreamUnavailable {
                            category,
                            reason: if join_err.is_panic() {
                                "source task panicked".to_string()
                            } else {
                                "source task was cancelled".to_string()
                            },
                        })
                    }
                    Err(_) => timed_out(category, deadline),
                };
                (category, result)
            }
        });

        let slots: BTreeMap<Category, SlotResult> = join_all(pending).await.into_iter().collect();
        debug!(slots = slots.len(), "Fan-out joined");
        slots
    }
}

fn timed_out(category: Category, after: Duration) -> SlotResult {
    warn!(category = %category, deadline_ms = after.as_millis() as u64, "Source timed out");
    Err(SourceError::UpstreamTimeout { category, after })
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pool_size", &self.pool.size())
            .field("deadline", &self.deadline)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use campus_core::{FixedClock, Liveness, Popularity, Reading};
    use campus_crowd::{CrowdError, PeakProfile, ResolutionMethod, VenueEstimate};
    use chrono::{NaiveDate, NaiveDateTime};

    use crate::adapters::{CrowdLevelProvider, SourcePayload, StructuredDataAdapter};
    use crate::error::StructuredDataError;

    // ---- Fakes ----

    struct SlowCrowd {
        delay: Duration,
        calls: AtomicUsize,
        panic: bool,
    }

    impl SlowCrowd {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                calls: AtomicUsize::new(0),
                panic: false,
            }
        }
    }

    #[async_trait]
    impl CrowdLevelProvider for SlowCrowd {
        async fn estimate(
            &self,
            _venue_text: &str,
            _at: Option<NaiveDateTime>,
        ) -> Result<VenueEstimate, CrowdError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.panic {
                panic!("crowd backend exploded");
            }
            Ok(VenueEstimate {
                venue_id: "busch-sc".to_string(),
                name: "Busch Student Center".to_string(),
                method: ResolutionMethod::Direct,
                reading: Reading::Known(Popularity::new(45).unwrap()),
                liveness: Liveness::Live,
                target: NaiveDate::from_ymd_opt(2025, 3, 4)
                    .unwrap()
                    .and_hms_opt(14, 0, 0)
                    .unwrap(),
                current: true,
                samples: 1,
            })
        }

        async fn peak_profile(
            &self,
            venue_text: &str,
            _day: NaiveDate,
        ) -> Result<PeakProfile, CrowdError> {
            Err(CrowdError::VenueNotFound(venue_text.to_string()))
        }
    }

    struct SlowRecords {
        delay: Duration,
        calls: AtomicUsize,
    }

    impl SlowRecords {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl StructuredDataAdapter for SlowRecords {
        async fn query(
            &self,
            _intent: &Intent,
            category: Category,
            _text: &str,
        ) -> Result<Vec<serde_json::Value>, StructuredDataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(vec![serde_json::json!({ "category": category.to_string() })])
        }
    }

    fn dispatcher(
        crowd: Arc<SlowCrowd>,
        records: Arc<SlowRecords>,
        pool_size: usize,
    ) -> Dispatcher {
        let clock = FixedClock::at(2025, 3, 4, 14, 10).unwrap();
        Dispatcher::new(
            Sources::new(crowd, records),
            Arc::new(WorkerPool::new(pool_size)),
            Arc::new(clock),
            Duration::from_secs(3),
        )
    }

    fn intent(cats: &[Category]) -> Intent {
        cats.iter().copied().collect()
    }

    // ---- Planning ----

    #[test]
    fn test_plan_shapes() {
        let d = dispatcher(
            Arc::new(SlowCrowd::new(Duration::ZERO)),
            Arc::new(SlowRecords::new(Duration::ZERO)),
            8,
        );
        assert_eq!(d.plan("hello", &Intent::empty()), Plan::Empty);

        match d.plan("is busch busy", &intent(&[Category::CrowdLevel])) {
            Plan::Inline(task) => assert_eq!(task.category, Category::CrowdLevel),
            other => panic!("expected inline plan, got {other:?}"),
        }

        let plan = d.plan("q", &intent(&[Category::Events, Category::CrowdLevel]));
        assert_eq!(plan.len(), 2);
        match plan {
            Plan::FanOut(tasks) => {
                let cats: Vec<Category> = tasks.iter().map(|t| t.category).collect();
                assert_eq!(cats, vec![Category::CrowdLevel, Category::Events]);
            }
            other => panic!("expected fan-out plan, got {other:?}"),
        }
    }

    // ---- Dispatch ----

    #[tokio::test(start_paused = true)]
    async fn test_empty_intent_calls_nothing() {
        let crowd = Arc::new(SlowCrowd::new(Duration::ZERO));
        let records = Arc::new(SlowRecords::new(Duration::ZERO));
        let d = dispatcher(Arc::clone(&crowd), Arc::clone(&records), 8);

        let ctx = d.dispatch("who are you", &Intent::empty(), Uuid::new_v4()).await;
        assert_eq!(ctx.slot_count(), 0);
        assert_eq!(crowd.calls.load(Ordering::SeqCst), 0);
        assert_eq!(records.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fan_out_runs_concurrently() {
        let d = dispatcher(
            Arc::new(SlowCrowd::new(Duration::from_secs(2))),
            Arc::new(SlowRecords::new(Duration::from_secs(2))),
            8,
        );
        let started = Instant::now();
        let ctx = d
            .dispatch(
                "is busch busy and what events are on",
                &intent(&[Category::CrowdLevel, Category::Events]),
                Uuid::new_v4(),
            )
            .await;
        assert!(started.elapsed() < Duration::from_millis(3500));
        assert_eq!(ctx.slot_count(), 2);
        assert!(ctx.slots().all(|(_, r)| r.is_ok()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slot_per_category_in_order() {
        let d = dispatcher(
            Arc::new(SlowCrowd::new(Duration::from_millis(500))),
            Arc::new(SlowRecords::new(Duration::from_millis(10))),
            8,
        );
        let cats = [
            Category::Events,
            Category::GymHours,
            Category::CrowdLevel,
            Category::DiningMenu,
        ];
        let ctx = d.dispatch("q", &intent(&cats), Uuid::new_v4()).await;
        let got: Vec<Category> = ctx.slots().map(|(c, _)| c).collect();
        assert_eq!(
            got,
            vec![
                Category::CrowdLevel,
                Category::DiningMenu,
                Category::GymHours,
                Category::Events
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_times_out_sibling_intact() {
        let d = dispatcher(
            Arc::new(SlowCrowd::new(Duration::from_secs(10))),
            Arc::new(SlowRecords::new(Duration::from_secs(1))),
            8,
        );
        let started = Instant::now();
        let ctx = d
            .dispatch(
                "q",
                &intent(&[Category::CrowdLevel, Category::Events]),
                Uuid::new_v4(),
            )
            .await;
        assert!(started.elapsed() < Duration::from_secs(4));

        assert_eq!(
            ctx.slot(Category::CrowdLevel),
            Some(&Err(SourceError::UpstreamTimeout {
                category: Category::CrowdLevel,
                after: Duration::from_secs(3),
            }))
        );
        match ctx.slot(Category::Events) {
            Some(Ok(SourcePayload::Records(records))) => {
                assert_eq!(records[0]["category"], "events");
            }
            other => panic!("unexpected events slot: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_inline_source_times_out() {
        let d = dispatcher(
            Arc::new(SlowCrowd::new(Duration::from_secs(10))),
            Arc::new(SlowRecords::new(Duration::ZERO)),
            8,
        );
        let ctx = d
            .dispatch("is busch busy", &intent(&[Category::CrowdLevel]), Uuid::new_v4())
            .await;
        assert!(matches!(
            ctx.slot(Category::CrowdLevel),
            Some(Err(SourceError::UpstreamTimeout { .. }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_includes_queueing() {
        // One permit: the second structured call waits 2s for it and then
        // needs 2s more, which overruns the 3s deadline.
        let d = dispatcher(
            Arc::new(SlowCrowd::new(Duration::ZERO)),
            Arc::new(SlowRecords::new(Duration::from_secs(2))),
            1,
        );
        let ctx = d
            .dispatch(
                "q",
                &intent(&[Category::GymHours, Category::Events]),
                Uuid::new_v4(),
            )
            .await;
        let timeouts = ctx
            .slots()
            .filter(|(_, r)| matches!(r, Err(SourceError::UpstreamTimeout { .. })))
            .count();
        assert_eq!(timeouts, 1);
        assert_eq!(ctx.slot_count(), 2);
    }

    #[tokio::test]
    async fn test_panicking_pool_task_is_unavailable() {
        let mut crowd = SlowCrowd::new(Duration::ZERO);
        crowd.panic = true;
        let d = dispatcher(
            Arc::new(crowd),
            Arc::new(SlowRecords::new(Duration::ZERO)),
            8,
        );
        let ctx = d
            .dispatch(
                "q",
                &intent(&[Category::CrowdLevel, Category::LibraryHours]),
                Uuid::new_v4(),
            )
            .await;
        assert!(matches!(
            ctx.slot(Category::CrowdLevel),
            Some(Err(SourceError::UpstreamUnavailable { .. }))
        ));
        assert!(matches!(ctx.slot(Category::LibraryHours), Some(Ok(_))));
    }

    #[tokio::test]
    async fn test_panicking_inline_task_is_unavailable() {
        let mut crowd = SlowCrowd::new(Duration::ZERO);
        crowd.panic = true;
        let d = dispatcher(
            Arc::new(crowd),
            Arc::new(SlowRecords::new(Duration::ZERO)),
            8,
        );
        let ctx = d
            .dispatch("is busch busy", &intent(&[Category::CrowdLevel]), Uuid::new_v4())
            .await;
        assert!(matches!(
            ctx.slot(Category::CrowdLevel),
            Some(Err(SourceError::UpstreamUnavailable { .. }))
        ));
    }
}
