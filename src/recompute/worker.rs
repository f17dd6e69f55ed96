use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::compiler::build_query;
use crate::error::{EngineError, Result};
use crate::model::{
    ChangelogRow, CohortDefinition, CohortId, CurrentStateRow, MembershipSign, Transition, UserId,
};
use crate::storage::{AnalyticalQueryExecutor, ChangelogStore, CurrentStateStore};

use super::job::{JobId, JobStatus, Progress, RecomputeJob};

/// Capacity of the job queue `trigger` enqueues onto (spec.md §4.3
/// "Execution": "Serialize jobs from a bounded queue (capacity 100)").
pub const RECOMPUTE_QUEUE_CAPACITY: usize = 100;

/// Runs full recomputes for a cohort definition (spec.md §4.3).
///
/// Job bookkeeping is a small `parking_lot::Mutex`-guarded map, the same
/// short-critical-section idiom the teacher uses for its in-process job
/// registries (`src/orchestration/actor.rs`'s mailbox table). The heavy
/// work -- running the compiled query and diffing against current state --
/// happens outside the lock. Execution itself is serialized through a
/// bounded `tokio::sync::mpsc` queue drained by a single task
/// (`spawn_drain`), grounded in the teacher's actor mailbox pattern
/// (`ActorRef`'s bounded `mpsc::Sender`) rather than running inline on the
/// caller, so a burst of activations cannot run recomputes concurrently.
pub struct RecomputeWorker<Q, C, L> {
    query_executor: Arc<Q>,
    current_state: Arc<C>,
    changelog: Arc<L>,
    jobs: Mutex<HashMap<JobId, RecomputeJob>>,
    in_flight: Mutex<HashMap<CohortId, JobId>>,
    queue_tx: mpsc::Sender<(JobId, CohortDefinition)>,
    queue_rx: StdMutex<Option<mpsc::Receiver<(JobId, CohortDefinition)>>>,
}

impl<Q, C, L> RecomputeWorker<Q, C, L>
where
    Q: AnalyticalQueryExecutor,
    C: CurrentStateStore,
    L: ChangelogStore,
{
    pub fn new(query_executor: Arc<Q>, current_state: Arc<C>, changelog: Arc<L>) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(RECOMPUTE_QUEUE_CAPACITY);
        Self {
            query_executor,
            current_state,
            changelog,
            jobs: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            queue_tx,
            queue_rx: StdMutex::new(Some(queue_rx)),
        }
    }

    /// Registers a recompute for `cohort`, rejecting a second concurrent
    /// recompute of the same cohort (spec.md §4.3 edge case, §5). Does not
    /// execute it; callers that need serialized, queued execution should
    /// use [`trigger`](Self::trigger) instead.
    pub fn start(&self, cohort: &CohortDefinition) -> Result<JobId> {
        let mut in_flight = self.in_flight.lock();
        if in_flight.contains_key(&cohort.id) {
            return Err(EngineError::RecomputeInProgress(cohort.id));
        }

        let job = RecomputeJob::new(cohort.id, Utc::now());
        let job_id = job.id;
        in_flight.insert(cohort.id, job_id);
        self.jobs.lock().insert(job_id, job);
        Ok(job_id)
    }

    /// Registers `cohort`'s recompute and enqueues it onto the bounded job
    /// queue (spec.md §4.3's public `TriggerRecompute` contract). Returns
    /// once the job is queued, not once it has run; [`spawn_drain`]'s task
    /// is what actually executes queued jobs, one at a time. Backpressures
    /// the caller (awaits) if the queue is at its 100-job capacity.
    pub async fn trigger(&self, cohort: &CohortDefinition) -> Result<JobId> {
        let job_id = self.start(cohort)?;
        self.queue_tx
            .send((job_id, cohort.clone()))
            .await
            .map_err(|_| EngineError::Storage("recompute queue has no drain task running".into()))?;
        Ok(job_id)
    }

    /// Spawns the single task that drains the job queue and runs each job
    /// in turn (spec.md §4.3 "Serialize jobs from a bounded queue"). Call
    /// exactly once per worker; a second call panics, the same
    /// single-consumer convention `InMemoryBus` uses for its topics.
    pub fn spawn_drain(self: Arc<Self>) -> JoinHandle<()>
    where
        Q: 'static,
        C: 'static,
        L: 'static,
    {
        let mut rx = self
            .queue_rx
            .lock()
            .unwrap()
            .take()
            .expect("recompute queue already has a drain task");
        tokio::spawn(async move {
            while let Some((job_id, cohort)) = rx.recv().await {
                if let Err(err) = self.run(job_id, &cohort).await {
                    warn!(error = %err, "queued recompute job failed");
                }
            }
        })
    }

    pub fn job(&self, job_id: JobId) -> Result<RecomputeJob> {
        self.jobs
            .lock()
            .get(&job_id)
            .cloned()
            .ok_or(EngineError::RecomputeJobNotFound(job_id))
    }

    /// Executes the recompute previously registered by [`start`]: runs the
    /// compiled query, diffs against current state, and writes reconciling
    /// rows (spec.md §4.3 steps 1-5).
    #[instrument(skip(self, cohort), fields(cohort_id = %cohort.id, job_id = %job_id))]
    pub async fn run(&self, job_id: JobId, cohort: &CohortDefinition) -> Result<()> {
        self.transition(job_id, JobStatus::Running, None);

        let outcome = self.execute(job_id, cohort).await;

        self.in_flight.lock().remove(&cohort.id);

        match outcome {
            Ok(()) => {
                self.finish(job_id, JobStatus::Completed, None);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "recompute failed");
                self.finish(job_id, JobStatus::Failed, Some(err.to_string()));
                Err(err)
            }
        }
    }

    async fn execute(&self, job_id: JobId, cohort: &CohortDefinition) -> Result<()> {
        let compiled = build_query(&cohort.rules, Utc::now())?;
        let authoritative = self.query_executor.execute(&compiled).await?;

        self.update_progress(job_id, |p| {
            p.members_found = authoritative.len();
        });

        let current = self.current_state.present_members(cohort.id).await?;

        let to_add: Vec<&UserId> = authoritative.difference(&current).collect();
        let to_remove: Vec<&UserId> = current.difference(&authoritative).collect();

        let now = Utc::now();
        let mut state_rows = Vec::with_capacity(to_add.len() + to_remove.len());
        let mut changelog_rows = Vec::with_capacity(to_add.len() + to_remove.len());

        for user_id in &to_add {
            let transition = Transition::new(
                cohort.id,
                cohort.name.clone(),
                (*user_id).clone(),
                MembershipSign::Out,
                MembershipSign::In,
                now,
                None,
            );
            state_rows.push(CurrentStateRow::from(&transition));
            changelog_rows.push(ChangelogRow::from(&transition));
        }
        for user_id in &to_remove {
            let transition = Transition::new(
                cohort.id,
                cohort.name.clone(),
                (*user_id).clone(),
                MembershipSign::In,
                MembershipSign::Out,
                now,
                None,
            );
            state_rows.push(CurrentStateRow::from(&transition));
            changelog_rows.push(ChangelogRow::from(&transition));
        }

        self.update_progress(job_id, |p| {
            p.members_added = to_add.len();
            p.members_removed = to_remove.len();
            p.total_users = to_add.len() + to_remove.len();
            p.processed_users = p.total_users;
        });

        if !state_rows.is_empty() {
            self.current_state.insert_batch(state_rows).await?;
            self.changelog.insert_batch(changelog_rows).await?;
        }

        info!(added = to_add.len(), removed = to_remove.len(), "recompute reconciled");
        Ok(())
    }

    fn transition(&self, job_id: JobId, status: JobStatus, error: Option<String>) {
        if let Some(job) = self.jobs.lock().get_mut(&job_id) {
            job.status = status;
            job.error = error;
        }
    }

    fn finish(&self, job_id: JobId, status: JobStatus, error: Option<String>) {
        if let Some(job) = self.jobs.lock().get_mut(&job_id) {
            job.status = status;
            job.error = error;
            job.completed_at = Some(Utc::now());
        }
    }

    fn update_progress(&self, job_id: JobId, f: impl FnOnce(&mut Progress)) {
        if let Some(job) = self.jobs.lock().get_mut(&job_id) {
            f(&mut job.progress);
        }
    }
}
