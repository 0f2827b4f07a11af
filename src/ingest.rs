//! Ingestion driver: scan the vault, batch it and feed each batch to a
//! [`GraphBuilder`].
//!
//! Configuration and filesystem errors abort before any batch runs. Builder
//! errors are handled per batch according to [`FailurePolicy`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future;
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info};

use crate::batch::{batch_count, batches};
use crate::config::Config;
use crate::kg::{BatchReport, GraphBuilder};
use crate::{metrics, vault, Error, Result};

/// What to do when a batch fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record the failure and keep going.
    #[default]
    Continue,
    /// Stop scheduling new batches after the first failure. Batches already
    /// in flight still run to completion and are reported.
    FailFast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    pub failure_policy: FailurePolicy,
    /// Maximum number of batches in flight; 1 is strictly sequential.
    pub concurrency: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::Continue,
            concurrency: 1,
        }
    }
}

/// A batch that the builder could not complete.
#[derive(Debug)]
pub struct BatchFailure {
    pub index: usize,
    pub files: Vec<PathBuf>,
    pub error: Error,
}

/// Outcome of one ingestion run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub total_files: usize,
    pub total_batches: usize,
    /// Batches the builder was actually called for
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: Vec<BatchFailure>,
    pub report: BatchReport,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.attempted == self.total_batches
    }

    pub fn failed_batches(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.index).collect()
    }
}

/// Run one full ingestion of `config.vault_path` through `builder`.
pub async fn run<B>(config: &Config, builder: &B, options: IngestOptions) -> Result<RunSummary>
where
    B: GraphBuilder + ?Sized,
{
    let files = vault::scan(&config.vault_path)?;
    info!(
        "Found {} markdown files in {}",
        files.len(),
        config.vault_path.display()
    );

    let mut summary = RunSummary {
        total_files: files.len(),
        total_batches: batch_count(files.len(), config.batch_size),
        ..Default::default()
    };

    if files.is_empty() {
        info!("No markdown files found in the vault, nothing to do");
        return Ok(summary);
    }

    debug!(
        "Processing {} batches of up to {} files ({:?})",
        summary.total_batches, config.batch_size, options
    );

    let stop = AtomicBool::new(false);
    let mut results = stream::iter(batches(&files, config.batch_size))
        .take_while(|_| future::ready(!stop.load(Ordering::SeqCst)))
        .map(|batch| async move {
            let guard = metrics::start_batch();
            let result = builder.build(&batch).await;
            guard.finish(result.is_ok());
            (batch, result)
        })
        .buffered(options.concurrency.max(1));

    while let Some((batch, result)) = results.next().await {
        summary.attempted += 1;
        match result {
            Ok(report) => {
                summary.succeeded += 1;
                summary.report += report;
                info!(
                    "Processed batch {}/{} ({} files)",
                    batch.index,
                    batch.total,
                    batch.len()
                );
            }
            Err(err) => {
                let err = Error::delegate(batch.index, err);
                error!(
                    "Batch {}/{} failed: {} (files: {})",
                    batch.index,
                    batch.total,
                    err,
                    batch
                        .files
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                summary.failures.push(BatchFailure {
                    index: batch.index,
                    files: batch.files.to_vec(),
                    error: err,
                });

                if options.failure_policy == FailurePolicy::FailFast
                    && !stop.swap(true, Ordering::SeqCst)
                {
                    info!(
                        "Not starting new batches after failed batch {}",
                        batch.index
                    );
                }
            }
        }
    }

    info!(
        "Ingestion finished: {}/{} batches succeeded, {} failed",
        summary.succeeded,
        summary.total_batches,
        summary.failures.len()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Batch;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingBuilder {
        calls: Mutex<Vec<Vec<PathBuf>>>,
        fail_on: Vec<usize>,
        /// Per-batch delay in milliseconds, keyed by batch index
        delays: HashMap<usize, u64>,
    }

    #[async_trait]
    impl GraphBuilder for RecordingBuilder {
        async fn build(&self, batch: &Batch<'_>) -> Result<BatchReport> {
            self.calls.lock().unwrap().push(batch.files.to_vec());
            if let Some(ms) = self.delays.get(&batch.index) {
                tokio::time::sleep(std::time::Duration::from_millis(*ms)).await;
            }
            if self.fail_on.contains(&batch.index) {
                return Err(Error::OpenAi("rate limited".into()));
            }
            Ok(BatchReport {
                notes: batch.len(),
                ..Default::default()
            })
        }
    }

    fn config(vault: &TempDir, batch_size: usize) -> Config {
        let env: HashMap<&str, String> = [
            ("NEO4J_URI", "bolt://localhost:7687".to_string()),
            ("NEO4J_USERNAME", "neo4j".to_string()),
            ("NEO4J_PASSWORD", "pw".to_string()),
            ("NEO4J_DATABASE", "neo4j".to_string()),
            ("OPENAI_API_KEY", "sk-test".to_string()),
            (
                "OBSIDIAN_VAULT_PATH",
                vault.path().to_string_lossy().to_string(),
            ),
            ("BATCH_SIZE", batch_size.to_string()),
        ]
        .into_iter()
        .collect();
        Config::from_lookup(|key| env.get(key).cloned()).unwrap()
    }

    fn vault_with(n: usize) -> TempDir {
        let dir = TempDir::new().unwrap();
        for i in 0..n {
            std::fs::write(dir.path().join(format!("note-{:02}.md", i)), "# x").unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn empty_vault_makes_no_calls() {
        let vault = vault_with(0);
        let builder = RecordingBuilder::default();

        let summary = run(&config(&vault, 10), &builder, IngestOptions::default())
            .await
            .unwrap();

        assert!(summary.is_success());
        assert_eq!(summary.total_batches, 0);
        assert!(builder.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sequential_run_preserves_order() {
        let vault = vault_with(7);
        let builder = RecordingBuilder::default();

        let summary = run(&config(&vault, 3), &builder, IngestOptions::default())
            .await
            .unwrap();

        let calls = builder.calls.lock().unwrap();
        let sizes: Vec<usize> = calls.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(calls.concat(), vault::scan(vault.path()).unwrap());
        assert!(summary.is_success());
        assert_eq!(summary.report.notes, 7);
    }

    #[tokio::test]
    async fn continue_policy_attempts_every_batch() {
        let vault = vault_with(9);
        let builder = RecordingBuilder {
            fail_on: vec![2],
            ..Default::default()
        };

        let summary = run(&config(&vault, 3), &builder, IngestOptions::default())
            .await
            .unwrap();

        assert_eq!(builder.calls.lock().unwrap().len(), 3);
        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed_batches(), vec![2]);
        assert_eq!(summary.failures[0].files.len(), 3);
        assert!(matches!(
            summary.failures[0].error,
            Error::Delegate { batch: 2, .. }
        ));
        assert!(!summary.is_success());
    }

    #[tokio::test]
    async fn fail_fast_stops_after_first_failure() {
        let vault = vault_with(9);
        let builder = RecordingBuilder {
            fail_on: vec![2],
            ..Default::default()
        };
        let options = IngestOptions {
            failure_policy: FailurePolicy::FailFast,
            concurrency: 1,
        };

        let summary = run(&config(&vault, 3), &builder, options).await.unwrap();

        assert_eq!(builder.calls.lock().unwrap().len(), 2);
        assert_eq!(summary.attempted, 2);
        assert!(!summary.is_success());
    }

    #[tokio::test]
    async fn fail_fast_reports_batches_already_in_flight() {
        let vault = vault_with(3);
        let builder = RecordingBuilder {
            fail_on: vec![1],
            delays: [(1, 50), (2, 10), (3, 100)].into_iter().collect(),
            ..Default::default()
        };
        let options = IngestOptions {
            failure_policy: FailurePolicy::FailFast,
            concurrency: 3,
        };

        let summary = run(&config(&vault, 1), &builder, options).await.unwrap();

        assert_eq!(builder.calls.lock().unwrap().len(), 3);
        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed_batches(), vec![1]);
        assert_eq!(summary.report.notes, 2);
        assert!(!summary.is_success());
    }

    #[tokio::test]
    async fn fail_fast_does_not_start_batches_after_failure() {
        let vault = vault_with(4);
        let builder = RecordingBuilder {
            fail_on: vec![1],
            delays: [(1, 20), (2, 40)].into_iter().collect(),
            ..Default::default()
        };
        let options = IngestOptions {
            failure_policy: FailurePolicy::FailFast,
            concurrency: 2,
        };

        let summary = run(&config(&vault, 1), &builder, options).await.unwrap();

        assert_eq!(builder.calls.lock().unwrap().len(), 2);
        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.total_batches, 4);
    }

    #[tokio::test]
    async fn concurrent_run_covers_all_files() {
        let vault = vault_with(23);
        let builder = RecordingBuilder::default();
        let options = IngestOptions {
            concurrency: 4,
            ..Default::default()
        };

        let summary = run(&config(&vault, 5), &builder, options).await.unwrap();

        let mut seen = builder.calls.lock().unwrap().concat();
        seen.sort();
        assert_eq!(seen, vault::scan(vault.path()).unwrap());
        assert_eq!(summary.succeeded, 5);
        assert!(summary.is_success());
    }

    #[tokio::test]
    async fn missing_vault_is_filesystem_error() {
        let vault = vault_with(1);
        let mut cfg = config(&vault, 10);
        cfg.vault_path = vault.path().join("moved-away");
        let builder = RecordingBuilder::default();

        let err = run(&cfg, &builder, IngestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Filesystem { .. }));
    }
}
