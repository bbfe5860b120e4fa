use crate::error::PipelineError;
use crate::store::TransactionReader;
use crate::summary::{AccountSummary, MonthlySummary};
use crate::transaction::{Amount, TransactionRecord};

use chrono::Datelike;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error};

pub struct Aggregator {
    reader: Arc<dyn TransactionReader>,
}

impl Aggregator {
    pub fn new(reader: Arc<dyn TransactionReader>) -> Self {
        Self { reader }
    }

    pub async fn summarize(&self, email: &str) -> Result<AccountSummary, PipelineError> {
        let records = self.reader.records_for_email(email).await?;
        debug!(email, records = records.len(), "Summarizing account");
        summarize_records(email, &records)
    }
}

#[derive(Default)]
struct MonthTotals {
    label: String,
    count: usize,
    credit_sum: Decimal,
    credit_count: u32,
    debit_sum: Decimal,
    debit_count: u32,
    balance: Decimal,
}

impl MonthTotals {
    fn add(&mut self, amount: Amount) -> Option<()> {
        let value = amount.value();
        self.count += 1;
        self.balance = self.balance.checked_add(value)?;
        if amount.is_debit() {
            self.debit_sum = self.debit_sum.checked_add(value)?;
            self.debit_count += 1;
        } else {
            self.credit_sum = self.credit_sum.checked_add(value)?;
            self.credit_count += 1;
        }
        Some(())
    }

    fn finish(self, year: i32) -> MonthlySummary {
        MonthlySummary {
            month: self.label,
            transaction_count: self.count,
            average_credit: average(self.credit_sum, self.credit_count),
            average_debit: average(self.debit_sum, self.debit_count),
            year,
            balance: self.balance,
        }
    }
}

// Exact mean; rounding to cents would turn sub-cent debits into a zero average.
fn average(sum: Decimal, count: u32) -> Option<Decimal> {
    if count == 0 {
        return None;
    }
    sum.checked_div(Decimal::from(count))
}

fn overflow(email: &str, what: &str) -> PipelineError {
    PipelineError::Query {
        email: email.to_string(),
        message: format!("{} overflows the decimal range", what),
    }
}

/// Groups records by (year, month) in chronological order.
///
/// The same month name in two different years gives two entries. Averages are
/// `None` when a month has no credits or no debits; debit averages stay negative.
/// Sums that leave the `Decimal` range are reported as a `Query` error.
pub fn summarize_records(
    email: &str,
    records: &[TransactionRecord],
) -> Result<AccountSummary, PipelineError> {
    let mut months: BTreeMap<(i32, u32), MonthTotals> = BTreeMap::new();
    let mut total_balance = Decimal::ZERO;

    for record in records {
        total_balance = total_balance
            .checked_add(record.amount.value())
            .ok_or_else(|| overflow(email, "total balance"))?;

        let month = months
            .entry((record.date.year(), record.date.month()))
            .or_insert_with(|| MonthTotals {
                label: record.date.format("%B").to_string(),
                ..MonthTotals::default()
            });
        month
            .add(record.amount)
            .ok_or_else(|| overflow(email, "monthly total"))?;
    }

    let monthly_summaries: Vec<MonthlySummary> = months
        .into_iter()
        .map(|((year, _), totals)| totals.finish(year))
        .collect();

    let monthly_total = monthly_summaries
        .iter()
        .try_fold(Decimal::ZERO, |acc, m| acc.checked_add(m.balance));
    if monthly_total != Some(total_balance) {
        error!(
            email,
            %total_balance,
            monthly_total = ?monthly_total,
            "Monthly balances do not reconcile with total balance"
        );
    }

    Ok(AccountSummary {
        email: email.to_string(),
        total_balance,
        monthly_summaries,
    })
}
