//! Engine configuration loaded from the environment.
//!
//! | variable | default |
//! |----------|---------|
//! | `HEARTH_FISCAL_YEAR_START_MONTH` | `7` (July) |
//! | `HEARTH_LEDGER_PAGE_SIZE` | `50` |
//! | `HEARTH_LEDGER_MAX_PAGE_SIZE` | `500` |
//! | `HEARTH_PUBLISH_EVENTS` | `true` |
//!
//! Unparseable or out-of-range values fall back to the default and are logged.

use chrono::NaiveDate;
use tracing::warn;

use hearth_accounting::Page;
use hearth_core::FiscalYear;
use hearth_core::fiscal::DEFAULT_FISCAL_YEAR_START_MONTH;

pub const FISCAL_YEAR_START_MONTH_VAR: &str = "HEARTH_FISCAL_YEAR_START_MONTH";
pub const LEDGER_PAGE_SIZE_VAR: &str = "HEARTH_LEDGER_PAGE_SIZE";
pub const LEDGER_MAX_PAGE_SIZE_VAR: &str = "HEARTH_LEDGER_MAX_PAGE_SIZE";
pub const PUBLISH_EVENTS_VAR: &str = "HEARTH_PUBLISH_EVENTS";

const DEFAULT_PAGE_SIZE: usize = 50;
const DEFAULT_MAX_PAGE_SIZE: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// First month (1-12) of the fiscal year.
    pub fiscal_year_start_month: u32,
    pub ledger_page_size: usize,
    pub ledger_max_page_size: usize,
    pub publish_events: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fiscal_year_start_month: DEFAULT_FISCAL_YEAR_START_MONTH,
            ledger_page_size: DEFAULT_PAGE_SIZE,
            ledger_max_page_size: DEFAULT_MAX_PAGE_SIZE,
            publish_events: true,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment, file, test map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let fiscal_year_start_month = parse_or(
            &lookup,
            FISCAL_YEAR_START_MONTH_VAR,
            defaults.fiscal_year_start_month,
            |m: &u32| (1..=12).contains(m),
        );
        let ledger_max_page_size = parse_or(
            &lookup,
            LEDGER_MAX_PAGE_SIZE_VAR,
            defaults.ledger_max_page_size,
            |n: &usize| *n > 0,
        );
        let mut ledger_page_size = parse_or(
            &lookup,
            LEDGER_PAGE_SIZE_VAR,
            defaults.ledger_page_size,
            |n: &usize| *n > 0,
        );
        if ledger_page_size > ledger_max_page_size {
            warn!(
                ledger_page_size,
                ledger_max_page_size, "default page size exceeds the maximum; clamping"
            );
            ledger_page_size = ledger_max_page_size;
        }
        let publish_events = parse_or(&lookup, PUBLISH_EVENTS_VAR, defaults.publish_events, |_| true);

        Self {
            fiscal_year_start_month,
            ledger_page_size,
            ledger_max_page_size,
            publish_events,
        }
    }

    pub fn fiscal_year(&self, date: NaiveDate) -> FiscalYear {
        FiscalYear::containing(date, self.fiscal_year_start_month)
    }

    /// Resolve a requested window, applying the default size and the cap.
    pub fn page(&self, offset: Option<usize>, limit: Option<usize>) -> Page {
        let limit = limit
            .unwrap_or(self.ledger_page_size)
            .clamp(1, self.ledger_max_page_size);
        Page::new(offset.unwrap_or(0), limit)
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    valid: impl Fn(&T) -> bool,
) -> T
where
    T: std::str::FromStr + std::fmt::Debug,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => value,
        _ => {
            warn!(key, value = %raw, ?default, "invalid configuration value; using default");
            default
        }
    }
}
