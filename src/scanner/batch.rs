//! Parallel scanning of many inputs
//!
//! Each input is scanned independently on a rayon pool. A file that is not
//! valid UTF-8 becomes a [`FileFailure`]; the rest of the batch continues.
//! Cancellation is checked before each file starts, never mid-file.

use crate::report::{BatchAggregator, BatchReport, FileFailure, FileReport};
use crate::scanner::engine::ScanEngine;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// One file's identity and contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInput {
    pub id: String,
    pub bytes: Vec<u8>,
}

impl SourceInput {
    pub fn new(id: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            bytes: bytes.into(),
        }
    }
}

/// Shared flag that stops a batch from starting new files
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Called with the file id after each file finishes (scanned or failed)
pub type ProgressCallback = Box<dyn Fn(&str) + Send + Sync>;

enum Outcome {
    Scanned(FileReport),
    Failed(FileFailure),
    Skipped(String),
}

/// Scan every input on a pool of `workers` threads
pub fn scan_batch(
    engine: &ScanEngine<'_>,
    inputs: &[SourceInput],
    workers: usize,
    cancel: &CancellationToken,
    progress: Option<&ProgressCallback>,
) -> Result<BatchReport> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .context("Failed to build scan thread pool")?;

    info!("Scanning {} files with {} workers", inputs.len(), workers.max(1));

    let outcomes: Vec<Outcome> = pool.install(|| {
        inputs
            .par_iter()
            .map(|input| {
                if cancel.is_cancelled() {
                    return Outcome::Skipped(input.id.clone());
                }
                let outcome = match engine.scan_bytes(&input.id, &input.bytes) {
                    Ok(report) => Outcome::Scanned(report),
                    Err(e) => {
                        warn!("{}", e);
                        Outcome::Failed(FileFailure {
                            file: e.file().to_string(),
                            error: e.to_string(),
                        })
                    }
                };
                if let Some(callback) = progress {
                    callback(&input.id);
                }
                outcome
            })
            .collect()
    });

    let mut aggregator = BatchAggregator::new();
    for outcome in outcomes {
        match outcome {
            Outcome::Scanned(report) => aggregator.add_report(report),
            Outcome::Failed(failure) => aggregator.add_failure(failure),
            Outcome::Skipped(id) => aggregator.add_skipped(id),
        }
    }
    let report = aggregator.finish();

    info!(
        "Scanned {} files: {} findings, {} failed, {} skipped",
        report.files.len(),
        report.total_findings(),
        report.failures.len(),
        report.skipped.len()
    );
    Ok(report)
}
