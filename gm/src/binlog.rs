//! Bounded worker pool for parsing binlog files into SQL

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command as AsyncCommand;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};

use crate::config::BinlogConfig;

#[async_trait]
pub trait BinlogParser: Send + Sync {
    /// Parse one binlog file and return the path of the produced SQL file
    async fn parse(&self, file: &str) -> Result<PathBuf>;
}

/// Runs `mysqlbinlog <dir>/<file> --result-file=<out>/<file>.sql`
pub struct MysqlBinlogParser {
    program: String,
    binlog_dir: PathBuf,
    output_dir: PathBuf,
}

impl MysqlBinlogParser {
    pub fn new(config: &BinlogConfig, binlog_dir: impl AsRef<Path>, output_dir: impl AsRef<Path>) -> Self {
        Self {
            program: config.mysqlbinlog_path.clone(),
            binlog_dir: binlog_dir.as_ref().to_path_buf(),
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl BinlogParser for MysqlBinlogParser {
    async fn parse(&self, file: &str) -> Result<PathBuf> {
        let source = self.binlog_dir.join(file);
        let parsed = self.output_dir.join(format!("{}.sql", file));
        debug!("parse {} into {}", source.display(), parsed.display());

        let output = AsyncCommand::new(&self.program)
            .arg(&source)
            .arg(format!("--result-file={}", parsed.display()))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| anyhow!("Failed to spawn {}: {}", self.program, e))?;

        if output.status.success() {
            Ok(parsed)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(anyhow!("fail to parse {}: {}", file, stderr.trim()))
        }
    }
}

/// Parse `files` with at most `concurrency` parsers running at once.
///
/// Every file is attempted; the first error seen is returned once all
/// workers are done. Results keep the order of `files`.
pub async fn parse_binlog_files(
    files: &[String],
    concurrency: usize,
    parser: Arc<dyn BinlogParser>,
) -> Result<Vec<PathBuf>> {
    let concurrency = concurrency.max(1);
    info!(
        "start to parse {} binlog files with concurrency {}",
        files.len(),
        concurrency
    );

    let (work_tx, work_rx) = mpsc::channel::<(usize, String)>(concurrency);
    let (result_tx, mut result_rx) = mpsc::channel::<(usize, Result<PathBuf>)>(concurrency);
    let work_rx = Arc::new(Mutex::new(work_rx));

    let mut workers = Vec::with_capacity(concurrency);
    for _ in 0..concurrency {
        let work_rx = work_rx.clone();
        let result_tx = result_tx.clone();
        let parser = parser.clone();
        workers.push(tokio::spawn(async move {
            loop {
                let next = work_rx.lock().await.recv().await;
                let Some((index, file)) = next else {
                    break;
                };
                let result = parser.parse(&file).await;
                if let Err(e) = &result {
                    error!("parse {} failed: {}", file, e);
                }
                if result_tx.send((index, result)).await.is_err() {
                    break;
                }
            }
        }));
    }
    drop(result_tx);

    let work: Vec<(usize, String)> = files.iter().cloned().enumerate().collect();
    let feeder = tokio::spawn(async move {
        for item in work {
            if work_tx.send(item).await.is_err() {
                break;
            }
        }
    });

    let mut parsed: Vec<Option<PathBuf>> = vec![None; files.len()];
    let mut first_error = None;
    while let Some((index, result)) = result_rx.recv().await {
        match result {
            Ok(path) => parsed[index] = Some(path),
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    feeder
        .await
        .map_err(|e| anyhow!("binlog feeder task failed: {}", e))?;
    for worker in workers {
        worker
            .await
            .map_err(|e| anyhow!("binlog parse worker failed: {}", e))?;
    }

    if let Some(e) = first_error {
        return Err(e);
    }
    info!("all binlog finish");
    Ok(parsed.into_iter().flatten().collect())
}
