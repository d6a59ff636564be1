//! Append-only JSON lines output of new results and status changes.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::DeliveryError;
use serde::Serialize;

use crate::models::{ResultRecord, StatusChange};
use crate::report::ReportSink;

/// Appends one JSON object per new result to a file.
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn append<T: Serialize>(&self, records: &[T]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, record)?;
            buf.push(b'\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&buf).await?;
        file.flush().await
    }
}

#[async_trait]
impl ReportSink for JsonLinesSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn report(&self, records: &[ResultRecord]) -> Result<(), DeliveryError> {
        self.append(records)
            .await
            .map_err(|e| DeliveryError::new(self.name(), format!("{}: {e}", self.path.display())))
    }

    async fn report_status(&self, changes: &[StatusChange]) -> Result<(), DeliveryError> {
        let lines: Vec<StatusLine<'_>> = changes
            .iter()
            .map(|change| StatusLine {
                event: change.event(),
                change,
            })
            .collect();
        self.append(&lines)
            .await
            .map_err(|e| DeliveryError::new(self.name(), format!("{}: {e}", self.path.display())))
    }
}

/// A status change tagged so it can share a file with result lines.
#[derive(Serialize)]
struct StatusLine<'a> {
    event: &'static str,
    #[serde(flatten)]
    change: &'a StatusChange,
}
