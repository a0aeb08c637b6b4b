use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use discovery_common::Category;

use crate::report::CrawlReport;
use crate::traits::ResultRelay;

/// Writes the report to the log.
pub struct LogRelay;

#[async_trait]
impl ResultRelay for LogRelay {
    async fn relay(&self, report: &CrawlReport) -> anyhow::Result<()> {
        info!(added = ?report.added, "{report}");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    message: String,
    total: usize,
    added: &'a std::collections::BTreeMap<Category, usize>,
}

/// POSTs the report as JSON to a webhook.
pub struct WebhookRelay {
    client: reqwest::Client,
    url: String,
}

impl WebhookRelay {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ResultRelay for WebhookRelay {
    async fn relay(&self, report: &CrawlReport) -> anyhow::Result<()> {
        let payload = WebhookPayload {
            message: report.to_string(),
            total: report.total(),
            added: &report.added,
        };
        self.client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .context("Webhook request failed")?
            .error_for_status()
            .context("Webhook rejected report")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn payload_uses_snake_case_category_keys() {
        let mut added = BTreeMap::new();
        added.insert(Category::Album, 10);
        added.insert(Category::AppearsOn, 2);
        let report = CrawlReport { added };
        let payload = WebhookPayload {
            message: report.to_string(),
            total: report.total(),
            added: &report.added,
        };

        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["total"], 12);
        assert_eq!(json["added"]["album"], 10);
        assert_eq!(json["added"]["appears_on"], 2);
        assert_eq!(json["message"], "12 new songs added! [10 Album / 2 Appears On]");
    }
}
