use crate::aggregator::Aggregator;
use crate::error::PipelineError;
use crate::notifier::Notifier;
use crate::persister::Persister;
use crate::source::{ObjectSource, SourceLocation};
use crate::store::{TransactionReader, TransactionWriter};
use crate::summary::{AccountSummary, SummaryPayload};
use crate::validator::validate;

use std::collections::BTreeSet;
use std::io::Read;
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info};

pub struct Pipeline {
    source: Arc<dyn ObjectSource>,
    persister: Persister,
    aggregator: Arc<Aggregator>,
    notifier: Arc<dyn Notifier>,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn ObjectSource>,
        writer: Arc<dyn TransactionWriter>,
        reader: Arc<dyn TransactionReader>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            source,
            persister: Persister::new(writer),
            aggregator: Arc::new(Aggregator::new(reader)),
            notifier,
        }
    }

    pub async fn run(
        &self,
        location: &SourceLocation,
    ) -> Result<Vec<AccountSummary>, PipelineError> {
        info!(%location, "Processing CSV object");

        let bytes = self.source.fetch(location).await?;
        let summaries = self.process(bytes.as_slice()).await?;

        info!(%location, accounts = summaries.len(), "Finished CSV object");
        Ok(summaries)
    }

    pub async fn run_all(
        &self,
        locations: &[SourceLocation],
    ) -> Result<Vec<AccountSummary>, PipelineError> {
        let mut summaries = Vec::new();
        for location in locations {
            match self.run(location).await {
                Ok(batch) => summaries.extend(batch),
                Err(e) => {
                    error!(%location, error = %e, "Error processing CSV object");
                    return Err(e);
                }
            }
        }
        Ok(summaries)
    }

    pub async fn process<R: Read>(&self, input: R) -> Result<Vec<AccountSummary>, PipelineError> {
        let (rows, report) = validate(input)?;
        info!(
            rows = report.rows_accepted,
            skipped = report.skipped.len(),
            "CSV validated"
        );

        let emails = self.persister.persist(&rows).await?;
        Ok(self.summarize_all(emails).await)
    }

    pub async fn summarize_all(&self, emails: BTreeSet<String>) -> Vec<AccountSummary> {
        let mut tasks = JoinSet::new();
        for email in emails {
            let aggregator = Arc::clone(&self.aggregator);
            tasks.spawn(async move {
                let result = aggregator.summarize(&email).await;
                (email, result)
            });
        }

        let mut summaries = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(summary))) => summaries.push(summary),
                Ok((email, Err(e))) => {
                    error!(%email, error = %e, "Error generating summary, skipping account");
                }
                Err(e) => error!(error = %e, "Summary task did not complete"),
            }
        }

        summaries.sort_by(|a, b| a.email.cmp(&b.email));
        summaries
    }

    pub fn dispatch(&self, summaries: Vec<AccountSummary>) -> JoinHandle<()> {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            let payload = SummaryPayload::new(summaries);
            match notifier.notify(&payload).await {
                Ok(()) => info!(accounts = payload.summaries.len(), "Summaries handed off"),
                Err(e) => error!(error = %e, "Error handing off summaries"),
            }
        })
    }
}
