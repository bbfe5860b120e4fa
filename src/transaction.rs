use crate::error::PipelineError;

use chrono::NaiveDate;
use csv::StringRecord;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow {
    pub id: String,
    pub date: String,
    pub transaction: String,
    pub email: String,
}

impl CsvRow {
    pub fn new(id: &str, date: &str, transaction: &str, email: &str) -> Self {
        Self {
            id: id.to_string(),
            date: date.to_string(),
            transaction: transaction.to_string(),
            email: email.to_string(),
        }
    }

    pub fn from_record(record: &StringRecord) -> Option<Self> {
        if record.len() != 4 {
            return None;
        }
        Some(Self::new(&record[0], &record[1], &record[2], &record[3]))
    }

    pub fn parse(&self, row: usize) -> Result<TransactionRecord, PipelineError> {
        let external_id = self
            .id
            .trim()
            .parse::<i64>()
            .map_err(|e| PipelineError::InvalidField {
                row,
                field: "id",
                message: format!("'{}': {}", self.id, e),
            })?;

        let date = NaiveDate::parse_from_str(self.date.trim(), DATE_FORMAT).map_err(|e| {
            PipelineError::InvalidField {
                row,
                field: "date",
                message: format!("'{}': {}", self.date, e),
            }
        })?;

        let amount = self
            .transaction
            .parse::<Amount>()
            .map_err(|message| PipelineError::InvalidField {
                row,
                field: "transaction",
                message,
            })?;

        let email = self.email.trim();
        if email.is_empty() {
            return Err(PipelineError::InvalidField {
                row,
                field: "email",
                message: "email must not be empty".to_string(),
            });
        }

        Ok(TransactionRecord {
            external_id,
            date,
            amount,
            email: email.to_string(),
        })
    }
}

/// Signed amount. The sign is always explicit on the wire (`+30.00`, `-15.50`)
/// and is kept even for zero, so `-0.00` still counts as a debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Amount(Decimal);

impl Amount {
    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_credit(&self) -> bool {
        !self.0.is_sign_negative()
    }

    pub fn is_debit(&self) -> bool {
        self.0.is_sign_negative()
    }
}

impl FromStr for Amount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        let (negative, digits) = match token.chars().next() {
            Some('+') => (false, &token[1..]),
            Some('-') => (true, &token[1..]),
            _ => return Err(format!("'{}' must start with '+' or '-'", token)),
        };

        let well_formed = !digits.is_empty()
            && digits.chars().any(|c| c.is_ascii_digit())
            && digits.chars().all(|c| c.is_ascii_digit() || c == '.');
        if !well_formed {
            return Err(format!("'{}' is not a signed decimal amount", token));
        }

        let mut value = Decimal::from_str(digits).map_err(|e| format!("'{}': {}", token, e))?;
        value.set_sign_negative(negative);
        Ok(Amount(value))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.is_debit() { '-' } else { '+' };
        write!(f, "{}{}", sign, self.0.abs())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub external_id: i64,
    pub date: NaiveDate,
    pub amount: Amount,
    pub email: String,
}

impl TransactionRecord {
    pub fn new(external_id: i64, date: NaiveDate, amount: Amount, email: &str) -> Self {
        Self {
            external_id,
            date,
            amount,
            email: email.to_string(),
        }
    }
}
