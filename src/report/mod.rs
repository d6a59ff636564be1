//! Report sinks for newly discovered results and known-repository status
//! changes.
//!
//! Delivery is best effort: a failing sink is logged and never blocks the
//! state commit that follows reporting.

mod jsonl;

use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::models::{ReportConfig, RepoStatus, ResultRecord, StatusChange};

pub use jsonl::JsonLinesSink;

/// Receives each cycle's batch of new results.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Deliver an ordered, non-empty batch.
    async fn report(&self, records: &[ResultRecord]) -> Result<(), DeliveryError>;

    /// Deliver known repositories that were removed or restored.
    async fn report_status(&self, _changes: &[StatusChange]) -> Result<(), DeliveryError> {
        Ok(())
    }
}

/// Logs each new result as one line.
#[derive(Debug, Clone)]
pub struct LogSink {
    template: String,
}

impl LogSink {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

#[async_trait]
impl ReportSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn report(&self, records: &[ResultRecord]) -> Result<(), DeliveryError> {
        log::info!("{} new result(s):", records.len());
        for record in records {
            log::info!("  NEW {}", record.format(&self.template));
        }
        Ok(())
    }

    async fn report_status(&self, changes: &[StatusChange]) -> Result<(), DeliveryError> {
        for change in changes {
            match change.current {
                RepoStatus::Removed => log::warn!("  REMOVED {} ({})", change.repo, change.url),
                RepoStatus::Active => log::info!("  RESTORED {} ({})", change.repo, change.url),
            }
        }
        Ok(())
    }
}

/// Delivers to every configured sink in order.
#[derive(Default)]
pub struct ReportFanout {
    sinks: Vec<Box<dyn ReportSink>>,
}

impl ReportFanout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the sinks named in the report configuration.
    pub fn from_config(config: &ReportConfig) -> Self {
        let mut fanout = Self::new();
        if config.console {
            fanout.push(LogSink::new(config.template.clone()));
        }
        if let Some(path) = &config.jsonl_path {
            fanout.push(JsonLinesSink::new(path));
        }
        fanout
    }

    pub fn push(&mut self, sink: impl ReportSink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Deliver to all sinks, returning the failures.
    pub async fn deliver(&self, records: &[ResultRecord]) -> Vec<DeliveryError> {
        let mut failures = Vec::new();
        if records.is_empty() {
            return failures;
        }

        for sink in &self.sinks {
            if let Err(e) = sink.report(records).await {
                log::error!("Report sink '{}' failed: {}", sink.name(), e);
                failures.push(e);
            }
        }
        failures
    }

    /// Deliver status changes to all sinks, returning the failures.
    pub async fn deliver_status(&self, changes: &[StatusChange]) -> Vec<DeliveryError> {
        let mut failures = Vec::new();
        if changes.is_empty() {
            return failures;
        }

        for sink in &self.sinks {
            if let Err(e) = sink.report_status(changes).await {
                log::error!("Report sink '{}' failed on status changes: {}", sink.name(), e);
                failures.push(e);
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::Utc;

    use super::*;

    struct Recording {
        batches: Arc<Mutex<Vec<usize>>>,
    }

    impl Recording {
        fn new(batches: &Arc<Mutex<Vec<usize>>>) -> Self {
            Self {
                batches: Arc::clone(batches),
            }
        }
    }

    #[async_trait]
    impl ReportSink for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        async fn report(&self, records: &[ResultRecord]) -> Result<(), DeliveryError> {
            self.batches.lock().unwrap().push(records.len());
            Ok(())
        }

        async fn report_status(&self, changes: &[StatusChange]) -> Result<(), DeliveryError> {
            self.batches.lock().unwrap().push(changes.len());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl ReportSink for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn report(&self, _records: &[ResultRecord]) -> Result<(), DeliveryError> {
            Err(DeliveryError::new("failing", "webhook down"))
        }
    }

    fn record(id: &str) -> ResultRecord {
        ResultRecord {
            id: id.to_string(),
            url: format!("https://github.com/{id}"),
            label: id.to_string(),
            query: "q".to_string(),
            discovered_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_other_sinks() {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let mut fanout = ReportFanout::new();
        fanout.push(Failing);
        fanout.push(Recording {
            batches: Arc::clone(&batches),
        });

        let failures = fanout.deliver(&[record("a"), record("b")]).await;

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].sink, "failing");
        assert_eq!(*batches.lock().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn test_empty_batch_is_not_delivered() {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let mut fanout = ReportFanout::new();
        fanout.push(Recording {
            batches: Arc::clone(&batches),
        });

        assert!(fanout.deliver(&[]).await.is_empty());
        assert!(batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_changes_reach_sinks() {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let mut fanout = ReportFanout::new();
        fanout.push(LogSink::new("{url}"));
        fanout.push(Recording::new(&batches));

        let change = StatusChange::detect(
            "octo/files",
            "https://github.com/octo/files",
            Some(RepoStatus::Active),
            RepoStatus::Removed,
            Utc::now(),
        )
        .unwrap();

        assert!(fanout.deliver_status(&[]).await.is_empty());
        assert!(fanout.deliver_status(&[change]).await.is_empty());
        assert_eq!(*batches.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_from_config() {
        let mut config = ReportConfig::default();
        assert_eq!(ReportFanout::from_config(&config).len(), 1);

        config.console = false;
        assert!(ReportFanout::from_config(&config).is_empty());

        config.jsonl_path = Some("out/new.jsonl".into());
        assert_eq!(ReportFanout::from_config(&config).len(), 1);
    }
}
