//! Time-based partitioning of the target list.
//!
//! A sharded template only processes the repositories whose list index,
//! modulo the shard period, equals today's zero-based position in that
//! period. Running once per day therefore covers every repository exactly
//! once per week (or month).

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::error::Error;

/// Shard rotation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Shard {
    /// 7-day rotation keyed on ISO weekday (Monday is slot 0).
    Weekly,
    /// Rotation sized to the current month, keyed on day of month.
    Monthly,
}

impl FromStr for Shard {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weekly" => Ok(Shard::Weekly),
            "monthly" => Ok(Shard::Monthly),
            other => Err(Error::ShardConfig {
                mode: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shard::Weekly => write!(f, "weekly"),
            Shard::Monthly => write!(f, "monthly"),
        }
    }
}

impl Shard {
    /// The rotation period and today's zero-based slot within it.
    pub fn period_and_slot(self, today: NaiveDate) -> (usize, usize) {
        match self {
            Shard::Weekly => (7, today.weekday().number_from_monday() as usize - 1),
            Shard::Monthly => (days_in_month(today), today.day() as usize - 1),
        }
    }

    /// Keep only the entries that fall in today's slot, preserving order.
    pub fn select<T: Clone>(self, items: &[T], today: NaiveDate) -> Vec<T> {
        let (period, slot) = self.period_and_slot(today);
        log::debug!("shard: {}", self);
        log::debug!("mod: {}", period);
        log::debug!("today: {}", slot);
        items
            .iter()
            .enumerate()
            .filter(|(i, _)| i % period == slot)
            .map(|(_, item)| item.clone())
            .collect()
    }
}

fn days_in_month(date: NaiveDate) -> usize {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .map(|last| last.day() as usize)
        .unwrap_or(31)
}
