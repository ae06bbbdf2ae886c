//! crates/stylecal_core/src/jobs.rs
//!
//! Lease-guarded background jobs.
//!
//! A job takes a lease row keyed by its job type before running and releases
//! it on every exit path. While the job runs, the holder keeps pushing the
//! expiry forward, so a long run never looks abandoned. A holder that dies
//! without releasing loses the lease once it expires, so a later trigger can
//! take over.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::domain::{CatalogRefreshReport, JobLease};
use crate::error::JobError;
use crate::ports::{CatalogRefresher, LeaseStore};

/// The kinds of lease-guarded jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    CatalogRefresh,
}

impl JobKind {
    pub fn key(&self) -> &'static str {
        match self {
            JobKind::CatalogRefresh => "catalog-refresh",
        }
    }
}

/// Runs closures while holding a job lease.
#[derive(Clone)]
pub struct JobRunner {
    leases: Arc<dyn LeaseStore>,
    holder: String,
}

impl JobRunner {
    /// `holder` identifies this process instance in the lease table.
    pub fn new(leases: Arc<dyn LeaseStore>, holder: impl Into<String>) -> Self {
        Self {
            leases,
            holder: holder.into(),
        }
    }

    /// Runs `job` if the lease for `kind` can be taken, otherwise returns
    /// [`JobError::AlreadyRunning`] without running anything.
    ///
    /// The lease is renewed every third of `ttl` until the job finishes. If
    /// another holder has taken the lease in the meantime, the job is dropped
    /// and [`JobError::LeaseLost`] is returned.
    pub async fn run_exclusive<F, Fut, T>(
        &self,
        kind: JobKind,
        ttl: Duration,
        now: DateTime<Utc>,
        job: F,
    ) -> Result<T, JobError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, JobError>>,
    {
        let lease = JobLease::new(kind.key(), &self.holder, now, ttl);
        if !self.leases.try_acquire(&lease, now).await? {
            info!("Job '{}' is already running elsewhere", kind.key());
            return Err(JobError::AlreadyRunning(kind.key().to_string()));
        }

        let outcome = self.hold_while(kind, ttl, now, job()).await;

        if let Err(e) = self.leases.release(kind.key(), &self.holder).await {
            // The lease still expires on its own.
            warn!("Failed to release lease '{}': {}", kind.key(), e);
        }
        outcome
    }

    async fn hold_while<Fut, T>(
        &self,
        kind: JobKind,
        ttl: Duration,
        acquired_at: DateTime<Utc>,
        job: Fut,
    ) -> Result<T, JobError>
    where
        Fut: Future<Output = Result<T, JobError>>,
    {
        let started = Instant::now();
        let mut heartbeat = tokio::time::interval(renew_every(ttl));
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        heartbeat.tick().await;

        tokio::pin!(job);
        loop {
            tokio::select! {
                outcome = &mut job => return outcome,
                _ = heartbeat.tick() => {
                    let elapsed = Duration::from_std(started.elapsed()).unwrap_or(ttl);
                    let expires_at = acquired_at + elapsed + ttl;
                    match self.leases.renew(kind.key(), &self.holder, expires_at).await {
                        Ok(true) => debug!("Renewed lease '{}' until {}", kind.key(), expires_at),
                        Ok(false) => {
                            warn!("Lease '{}' was taken over, stopping the job", kind.key());
                            return Err(JobError::LeaseLost(kind.key().to_string()));
                        }
                        // Retried on the next tick.
                        Err(e) => warn!("Failed to renew lease '{}': {}", kind.key(), e),
                    }
                }
            }
        }
    }
}

fn renew_every(ttl: Duration) -> std::time::Duration {
    (ttl / 3)
        .to_std()
        .unwrap_or_default()
        .max(std::time::Duration::from_secs(1))
}

/// Timestamp-derived run id shared by all steps of one refresh, e.g.
/// `2026-03-01T09-00-00-000Z`.
pub fn run_id(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H-%M-%S-%3fZ").to_string()
}

/// Admin-triggered refresh of the product catalog by external commands.
#[derive(Clone)]
pub struct CatalogRefreshJob {
    runner: JobRunner,
    refresher: Arc<dyn CatalogRefresher>,
    lease_ttl: Duration,
}

impl CatalogRefreshJob {
    pub fn new(runner: JobRunner, refresher: Arc<dyn CatalogRefresher>, lease_ttl: Duration) -> Self {
        Self {
            runner,
            refresher,
            lease_ttl,
        }
    }

    /// Runs one refresh. A step exiting non-zero is reported in the returned
    /// report, not as an error.
    pub async fn trigger(&self, now: DateTime<Utc>) -> Result<CatalogRefreshReport, JobError> {
        let run_id = run_id(now);
        self.runner
            .run_exclusive(JobKind::CatalogRefresh, self.lease_ttl, now, || async {
                info!("Catalog refresh {} started", run_id);
                let report = self
                    .refresher
                    .refresh(&run_id)
                    .await
                    .map_err(|e| JobError::Failed(e.to_string()));
                if let Ok(report) = &report {
                    info!("Catalog refresh {} finished with {} step(s)", run_id, report.steps.len());
                }
                report
            })
            .await
    }
}
