//! Extract/load pipeline.
//!
//! Per job, an [`Extractor`] streams the extract query into a row channel
//! while a [`BatchLoader`] drains it into chunked batch writes. The
//! [`JobRunner`] wires the two together and runs jobs one after another.
//!
//! ```text
//! SourceReader ──rows──▶ Extractor ──Record──▶ row channel ──▶ BatchLoader ──chunks──▶ TargetWriter
//!                           │                                      ▲
//!                           └──────── TypeRegistry (per job) ──────┘
//! ```

pub mod channel;
mod extract;
mod job;
mod load;
mod progress;
mod runner;

pub use channel::{row_channel, RowMessage, RowReceiver, RowSender};
pub use extract::Extractor;
pub use job::{select_jobs, Job, JobStats};
pub use load::{BatchLoader, LoadStats};
pub use progress::Progress;
pub use runner::{HealthCheckResult, JobRunner, RunSummary};
