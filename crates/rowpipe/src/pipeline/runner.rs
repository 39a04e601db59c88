//! Job runner: drives jobs one after another through the pipeline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};

use crate::config::LoaderConfig;
use crate::core::traits::{SourceReader, TargetWriter};
use crate::error::{EtlError, Result};
use crate::schema::{SchemaDiscoverer, TypeRegistry};
use crate::statement::WriteStatement;

use super::channel::row_channel;
use super::extract::Extractor;
use super::job::{Job, JobStats};
use super::load::BatchLoader;
use super::progress::Progress;

/// Result of a complete run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Completed jobs, in run order.
    pub jobs: Vec<JobStats>,
    /// Rows committed across all jobs.
    pub total_rows: u64,
    /// Wall time in seconds.
    pub elapsed_secs: f64,
}

impl RunSummary {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Connectivity of both databases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub healthy: bool,
    pub source_connected: bool,
    pub source_latency_ms: u64,
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    pub target_error: Option<String>,
}

/// Runs jobs against one source and one target.
///
/// Each job gets a fresh type registry, row channel and counters. The extractor
/// runs on its own task while the loader runs on the caller's; both finish
/// before the next job starts. The first failing job stops the run.
pub struct JobRunner {
    source: Arc<dyn SourceReader>,
    target: Arc<dyn TargetWriter>,
    loader: LoaderConfig,
}

impl JobRunner {
    pub fn new(
        source: Arc<dyn SourceReader>,
        target: Arc<dyn TargetWriter>,
        loader: LoaderConfig,
    ) -> Self {
        Self {
            source,
            target,
            loader,
        }
    }

    /// Parse a job's write statement for this runner's target.
    pub fn prepare(&self, job: &Job) -> Result<WriteStatement> {
        WriteStatement::parse(
            &job.write,
            self.target.placeholder_style(),
            self.loader.column_case,
        )
        .map_err(|e| EtlError::Config(format!("job '{}': {}", job.name, e)))
    }

    /// Run `jobs` in order.
    pub async fn run(&self, jobs: &[Job], cancel: &CancellationToken) -> Result<RunSummary> {
        let start = Instant::now();
        let statements = jobs
            .iter()
            .map(|job| self.prepare(job))
            .collect::<Result<Vec<_>>>()?;

        let mut summary = RunSummary::default();
        for (job, statement) in jobs.iter().zip(statements) {
            if cancel.is_cancelled() {
                return Err(EtlError::Cancelled);
            }

            let span = info_span!("job", name = %job.name);
            let stats = self
                .run_job(job, statement, cancel)
                .instrument(span)
                .await?;
            summary.total_rows += stats.rows_received;
            summary.jobs.push(stats);
        }

        summary.elapsed_secs = start.elapsed().as_secs_f64();
        info!(
            "Finished {} jobs, {} rows in {:.1}s",
            summary.jobs.len(),
            summary.total_rows,
            summary.elapsed_secs
        );
        Ok(summary)
    }

    async fn run_job(
        &self,
        job: &Job,
        statement: WriteStatement,
        cancel: &CancellationToken,
    ) -> Result<JobStats> {
        info!("Start job");
        let start = Instant::now();

        let registry = Arc::new(TypeRegistry::new());
        let progress = Arc::new(Progress::new());
        let (tx, rx) = row_channel(self.loader.channel_capacity);

        let extractor = Extractor::new(
            &job.name,
            SchemaDiscoverer::new(registry.clone(), self.loader.column_case),
            tx,
            progress.clone(),
            self.loader.progress_interval,
        );
        let handle = tokio::spawn(
            extractor
                .run(self.source.clone(), job.extract.clone())
                .in_current_span(),
        );

        let loader = BatchLoader::new(
            &job.name,
            self.target.clone(),
            statement,
            registry,
            self.loader.chunk_size,
            progress.clone(),
            self.loader.progress_interval,
        );

        let load = match loader.run(rx, cancel).await {
            Ok(load) => load,
            Err(e) => {
                handle.abort();
                let _ = handle.await;
                error!(
                    "Job failed after {} rows sent, {} rows received: {}",
                    progress.sent(),
                    progress.received(),
                    e
                );
                return Err(e);
            }
        };

        // The loader saw a clean close, so the extractor has returned.
        let sent = match handle.await {
            Ok(result) => result?,
            Err(e) => {
                return Err(EtlError::extract(
                    &job.name,
                    EtlError::Source(format!("extract task failed: {}", e)),
                ))
            }
        };

        let stats = JobStats {
            name: job.name.clone(),
            rows_sent: sent,
            rows_received: load.rows,
            batches: load.batches,
            elapsed_secs: start.elapsed().as_secs_f64(),
        };
        info!(
            "Finish load in {}s, All Send {}, All Rec {}",
            start.elapsed().as_secs(),
            stats.rows_sent,
            stats.rows_received
        );
        info!("End job");
        Ok(stats)
    }

    /// Check both connections.
    pub async fn health_check(&self) -> HealthCheckResult {
        let mut result = HealthCheckResult::default();

        let (ok, latency, err) = timed(self.source.test_connection()).await;
        result.source_connected = ok;
        result.source_latency_ms = latency;
        result.source_error = err;

        let (ok, latency, err) = timed(self.target.test_connection()).await;
        result.target_connected = ok;
        result.target_latency_ms = latency;
        result.target_error = err;

        result.healthy = result.source_connected && result.target_connected;
        debug!("Health check: {:?}", result);
        result
    }

    /// Close both pools.
    pub async fn close(&self) {
        self.source.close().await;
        self.target.close().await;
    }
}

async fn timed<F>(check: F) -> (bool, u64, Option<String>)
where
    F: std::future::Future<Output = Result<()>>,
{
    let start = Instant::now();
    let result = check.await;
    let latency = millis(start.elapsed());
    match result {
        Ok(()) => (true, latency, None),
        Err(e) => (false, latency, Some(e.to_string())),
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
