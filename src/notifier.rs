use crate::config::Config;
use crate::error::PipelineError;
use crate::summary::SummaryPayload;

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, payload: &SummaryPayload) -> Result<(), PipelineError>;
}

pub struct JsonNotifier {
    output: Option<PathBuf>,
}

impl JsonNotifier {
    pub fn file(path: PathBuf) -> Self {
        Self { output: Some(path) }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            output: config.summary_output.clone(),
        }
    }
}

#[async_trait]
impl Notifier for JsonNotifier {
    async fn notify(&self, payload: &SummaryPayload) -> Result<(), PipelineError> {
        let mut json = payload.to_json()?;
        json.push('\n');

        match &self.output {
            Some(path) => tokio::fs::write(path, json).await?,
            None => {
                let mut out = tokio::io::stdout();
                out.write_all(json.as_bytes()).await?;
                out.flush().await?;
            }
        }
        Ok(())
    }
}
