use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub month: String,
    pub transaction_count: usize,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub average_credit: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub average_debit: Option<Decimal>,
    #[serde(skip)]
    pub year: i32,
    /// Exact signed sum of the month, kept for reconciliation against the total.
    #[serde(skip)]
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub email: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_balance: Decimal,
    pub monthly_summaries: Vec<MonthlySummary>,
}

impl AccountSummary {
    pub fn empty(email: &str) -> Self {
        Self {
            email: email.to_string(),
            total_balance: Decimal::ZERO,
            monthly_summaries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryPayload {
    pub summaries: Vec<AccountSummary>,
}

impl SummaryPayload {
    pub fn new(summaries: Vec<AccountSummary>) -> Self {
        Self { summaries }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
