//! Extractor: runs a job's query and feeds the row channel.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::core::traits::{DriverRow, RowSink, SourceReader};
use crate::error::{EtlError, Result};
use crate::schema::SchemaDiscoverer;

use super::channel::RowSender;
use super::progress::{crossed_interval, Progress};

/// Producer side of one job.
///
/// Every row the source hands over is turned into a record by the schema
/// discoverer and sent on the row channel. Registry entries for a column are
/// written before the first record carrying it is sent.
pub struct Extractor {
    job: String,
    discoverer: SchemaDiscoverer,
    tx: RowSender,
    progress: Arc<Progress>,
    progress_interval: u64,
}

impl Extractor {
    pub fn new(
        job: impl Into<String>,
        discoverer: SchemaDiscoverer,
        tx: RowSender,
        progress: Arc<Progress>,
        progress_interval: u64,
    ) -> Self {
        Self {
            job: job.into(),
            discoverer,
            tx,
            progress,
            progress_interval,
        }
    }

    /// Stream `sql` from `source` into the channel, then close it.
    ///
    /// On failure the cause is wrapped in an [`EtlError::Extract`] naming the
    /// job. The loader gets it as the last message and the same error is
    /// returned here.
    pub async fn run(mut self, source: Arc<dyn SourceReader>, sql: String) -> Result<u64> {
        let start = Instant::now();
        self.discoverer.reset();

        match source.query(&sql, &mut self).await {
            Ok(rows) => {
                info!(
                    "Finish extract of {} rows in {}s",
                    rows,
                    start.elapsed().as_secs()
                );
                Ok(rows)
            }
            Err(e) => {
                error!(
                    "Extract failed after {} rows: {}",
                    self.progress.sent(),
                    e
                );
                let cause = Arc::new(e);
                let forwarded = EtlError::Extract {
                    job: self.job.clone(),
                    source: cause.clone(),
                };
                if self.tx.fail(forwarded).await.is_err() {
                    debug!("Loader already stopped, extract error not forwarded");
                }
                Err(EtlError::Extract {
                    job: self.job,
                    source: cause,
                })
            }
        }
    }
}

#[async_trait]
impl RowSink for Extractor {
    async fn accept(&mut self, row: &dyn DriverRow) -> Result<()> {
        let record = self.discoverer.map_row(row)?;
        self.tx.send(Ok(record)).await?;

        let sent = self.progress.add_sent(1);
        if crossed_interval(sent - 1, sent, self.progress_interval) {
            info!("All Send {}", sent);
        }
        Ok(())
    }
}
