//! Batch loader: drains the row channel into chunked batch writes.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::record::Record;
use crate::core::traits::TargetWriter;
use crate::error::{EtlError, Result};
use crate::schema::TypeRegistry;
use crate::statement::WriteStatement;

use super::channel::RowReceiver;
use super::progress::{crossed_interval, Progress};

/// Rows and batches committed by one loader run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub rows: u64,
    pub batches: usize,
}

/// Consumer side of one job.
pub struct BatchLoader {
    job: String,
    target: Arc<dyn TargetWriter>,
    statement: WriteStatement,
    registry: Arc<TypeRegistry>,
    chunk_size: usize,
    progress: Arc<Progress>,
    progress_interval: u64,
}

impl BatchLoader {
    pub fn new(
        job: impl Into<String>,
        target: Arc<dyn TargetWriter>,
        statement: WriteStatement,
        registry: Arc<TypeRegistry>,
        chunk_size: usize,
        progress: Arc<Progress>,
        progress_interval: u64,
    ) -> Self {
        Self {
            job: job.into(),
            target,
            statement,
            registry,
            chunk_size: chunk_size.max(1),
            progress,
            progress_interval,
        }
    }

    /// Receive until the channel closes, writing every full chunk and the
    /// final partial one.
    ///
    /// An error message on the channel stops the loader without writing the
    /// buffered rows. A failed batch stops it too; batches committed before
    /// stay committed.
    pub async fn run(&self, mut rx: RowReceiver, cancel: &CancellationToken) -> Result<LoadStats> {
        let mut chunk: Vec<Record> = Vec::with_capacity(self.chunk_size);
        let mut stats = LoadStats::default();

        loop {
            let message = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("Cancelled with {} rows buffered", chunk.len());
                    return Err(EtlError::Cancelled);
                }
                message = rx.recv() => message,
            };

            match message {
                Some(Ok(record)) => {
                    chunk.push(record);
                    if chunk.len() >= self.chunk_size {
                        self.write_chunk(&mut chunk, &mut stats).await?;
                    }
                }
                Some(Err(e)) => {
                    if !chunk.is_empty() {
                        warn!("Discarding {} buffered rows after extract failure", chunk.len());
                    }
                    return Err(e);
                }
                None => break,
            }
        }

        if !chunk.is_empty() {
            self.write_chunk(&mut chunk, &mut stats).await?;
        }

        Ok(stats)
    }

    async fn write_chunk(&self, chunk: &mut Vec<Record>, stats: &mut LoadStats) -> Result<()> {
        let batch = stats.batches + 1;
        let start = Instant::now();

        let types = self.registry.snapshot();
        let rows = self.statement.bind(chunk, &types)?;
        let count = chunk.len() as u64;

        self.target
            .execute_batch(&self.statement, rows)
            .await
            .map_err(|e| EtlError::load(&self.job, batch, e))?;
        chunk.clear();

        stats.batches = batch;
        stats.rows += count;
        debug!(
            "Batch {} committed: {} rows in {:?}",
            batch,
            count,
            start.elapsed()
        );

        let received = self.progress.add_received(count);
        if crossed_interval(received - count, received, self.progress_interval) {
            info!("All Rec {}", received);
        }
        Ok(())
    }
}
