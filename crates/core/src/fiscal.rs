//! Fiscal years and sequential document numbers.
//!
//! Fiscal years follow the accounting convention: a year starts on the first
//! day of a configurable month (July by default), not on January 1st. Numbers
//! render as `<PREFIX>-<fiscalYear>-<6-digit sequence>`, e.g. `JRN-2026-000042`.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Month in which a fiscal year starts unless configured otherwise (July).
pub const DEFAULT_FISCAL_YEAR_START_MONTH: u32 = 7;

/// Fiscal year, labelled by the calendar year in which it starts.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FiscalYear(i32);

impl FiscalYear {
    pub fn new(start_year: i32) -> Self {
        Self(start_year)
    }

    /// Fiscal year containing `date`: the calendar year if `date`'s month is at
    /// or after `start_month`, else the previous year.
    pub fn containing(date: NaiveDate, start_month: u32) -> Self {
        if date.month() >= start_month {
            Self(date.year())
        } else {
            Self(date.year() - 1)
        }
    }

    pub fn start_year(self) -> i32 {
        self.0
    }
}

impl core::fmt::Display for FiscalYear {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human-readable sequential document number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentNumber {
    prefix: String,
    fiscal_year: FiscalYear,
    sequence: u64,
}

impl DocumentNumber {
    /// Largest sequence that still renders in six digits.
    pub const MAX_SEQUENCE: u64 = 999_999;

    pub fn new(prefix: impl Into<String>, fiscal_year: FiscalYear, sequence: u64) -> DomainResult<Self> {
        let prefix = prefix.into();
        if prefix.is_empty() || prefix.contains('-') {
            return Err(DomainError::invalid_id(format!("invalid document prefix '{prefix}'")));
        }
        if sequence == 0 || sequence > Self::MAX_SEQUENCE {
            return Err(DomainError::invalid_id(format!(
                "document sequence {sequence} out of range for {prefix}-{fiscal_year}"
            )));
        }
        Ok(Self {
            prefix,
            fiscal_year,
            sequence,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn fiscal_year(&self) -> FiscalYear {
        self.fiscal_year
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl core::fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}-{}-{:06}", self.prefix, self.fiscal_year, self.sequence)
    }
}

impl core::str::FromStr for DocumentNumber {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '-');
        let (Some(prefix), Some(year), Some(seq)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(DomainError::invalid_id(format!("malformed document number '{s}'")));
        };
        if seq.len() != 6 {
            return Err(DomainError::invalid_id(format!("malformed document number '{s}'")));
        }
        let year: i32 = year
            .parse()
            .map_err(|e| DomainError::invalid_id(format!("DocumentNumber: {e}")))?;
        let seq: u64 = seq
            .parse()
            .map_err(|e| DomainError::invalid_id(format!("DocumentNumber: {e}")))?;
        Self::new(prefix, FiscalYear::new(year), seq)
    }
}
