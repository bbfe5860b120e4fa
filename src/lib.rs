pub mod aggregator;
pub mod config;
pub mod error;
pub mod notifier;
pub mod persister;
pub mod pipeline;
pub mod source;
pub mod store;
pub mod summary;
pub mod transaction;
pub mod validator;

pub use error::PipelineError;
pub use pipeline::Pipeline;
pub use summary::{AccountSummary, MonthlySummary, SummaryPayload};
