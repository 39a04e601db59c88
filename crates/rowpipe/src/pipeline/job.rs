//! Job descriptors and per-job results.

use serde::{Deserialize, Serialize};

use crate::config::JobConfig;
use crate::error::{EtlError, Result};

/// One extract/write pair, processed end to end by one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Name used in logs and results.
    pub name: String,
    /// Query run against the source.
    pub extract: String,
    /// Statement run against the target for every extracted row.
    pub write: String,
}

impl Job {
    pub fn new(
        name: impl Into<String>,
        extract: impl Into<String>,
        write: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            extract: extract.into(),
            write: write.into(),
        }
    }
}

impl From<&JobConfig> for Job {
    fn from(config: &JobConfig) -> Self {
        Job::new(&config.name, &config.extract, &config.write)
    }
}

/// Pick the configured jobs to run.
///
/// An empty selection means every job, in configuration order. Otherwise the
/// selected jobs run in configuration order, and unknown names are an error.
pub fn select_jobs(configured: &[JobConfig], names: &[String]) -> Result<Vec<Job>> {
    if let Some(unknown) = names
        .iter()
        .find(|name| !configured.iter().any(|job| &job.name == *name))
    {
        return Err(EtlError::Config(format!("unknown job '{}'", unknown)));
    }

    Ok(configured
        .iter()
        .filter(|job| names.is_empty() || names.contains(&job.name))
        .map(Job::from)
        .collect())
}

/// Outcome of one completed job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStats {
    /// Job name.
    pub name: String,
    /// Rows the extractor put on the channel.
    pub rows_sent: u64,
    /// Rows the loader committed.
    pub rows_received: u64,
    /// Batches committed.
    pub batches: usize,
    /// Wall time in seconds.
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> Vec<JobConfig> {
        ["addresses", "customers", "orders"]
            .iter()
            .map(|name| JobConfig {
                name: name.to_string(),
                extract: format!("SELECT * FROM {}", name),
                write: format!("INSERT INTO {} VALUES (?)", name),
            })
            .collect()
    }

    #[test]
    fn test_select_all_when_empty() {
        let jobs = select_jobs(&configured(), &[]).unwrap();
        let names: Vec<_> = jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["addresses", "customers", "orders"]);
    }

    #[test]
    fn test_select_keeps_configuration_order() {
        let jobs = select_jobs(
            &configured(),
            &["orders".to_string(), "addresses".to_string()],
        )
        .unwrap();
        let names: Vec<_> = jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["addresses", "orders"]);
    }

    #[test]
    fn test_select_unknown_job() {
        let err = select_jobs(&configured(), &["invoices".to_string()]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("unknown job 'invoices'"));
    }
}
