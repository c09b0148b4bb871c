//! Cron schedules for irrigation events.
//!
//! Expressions use the classic five fields (minute, hour, day of month,
//! month, day of week) with `0` or `7` meaning Sunday. They are evaluated
//! against local wall-clock time.
//!
//! When both day of month and day of week are restricted, an expression
//! fires on days matching either field, as classic cron does.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const WEEKDAYS: [&str; 8] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// A validated five-field cron expression.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CronSchedule {
    expression: String,
    /// Two schedules when the day fields are ORed, one otherwise.
    inner: Vec<cron::Schedule>,
}

impl CronSchedule {
    /// Parse a five-field cron expression.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCron`] when the expression does not
    /// have exactly five fields, uses characters other than digits and
    /// `* - , /`, cannot be evaluated, or never fires.
    pub fn parse(expression: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidCron {
            expression: expression.to_string(),
            reason,
        };

        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(invalid(format!("expected 5 fields, got {}", fields.len())));
        }
        if let Some(field) = fields.iter().find(|field| {
            !field
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '*' | '-' | ',' | '/'))
        }) {
            return Err(invalid(format!("unsupported characters in field {field:?}")));
        }

        let weekdays = weekday_field(fields[4]).map_err(&invalid)?;
        let day_pairs = if fields[2] != "*" && fields[4] != "*" {
            vec![(fields[2], "*".to_string()), ("*", weekdays)]
        } else {
            vec![(fields[2], weekdays)]
        };
        let inner = day_pairs
            .into_iter()
            .map(|(days, weekdays)| {
                let translated = format!(
                    "0 {} {} {days} {} {weekdays}",
                    fields[0], fields[1], fields[3]
                );
                cron::Schedule::from_str(&translated).map_err(|err| invalid(err.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if inner
            .iter()
            .all(|schedule| schedule.upcoming(chrono::Utc).next().is_none())
        {
            return Err(invalid("expression never fires".to_string()));
        }

        Ok(Self {
            expression: fields.join(" "),
            inner,
        })
    }

    /// First occurrence strictly after `local`, in local wall-clock time.
    #[must_use]
    pub fn next_after(&self, local: NaiveDateTime) -> Option<NaiveDateTime> {
        let local = local.and_utc();
        self.inner
            .iter()
            .filter_map(|schedule| schedule.after(&local).next())
            .min()
            .map(|next| next.naive_utc())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.expression
    }
}

fn weekday_field(field: &str) -> Result<String, String> {
    field
        .split(',')
        .map(weekday_item)
        .collect::<Result<Vec<_>, _>>()
        .map(|items| items.join(","))
}

fn weekday_item(item: &str) -> Result<String, String> {
    let (range, step) = match item.split_once('/') {
        Some((range, step)) => (range, Some(step)),
        None => (item, None),
    };
    let mut out = match range.split_once('-') {
        Some((start, "7")) if step.is_none() => format!("{}-Sat,Sun", weekday_name(start)?),
        Some((start, end)) => format!("{}-{}", weekday_name(start)?, weekday_name(end)?),
        None if range == "*" => "*".to_string(),
        None => weekday_name(range)?.to_string(),
    };
    if let Some(step) = step {
        out.push('/');
        out.push_str(step);
    }
    Ok(out)
}

fn weekday_name(token: &str) -> Result<&'static str, String> {
    token
        .parse::<usize>()
        .ok()
        .and_then(|day| WEEKDAYS.get(day).copied())
        .ok_or_else(|| format!("day of week {token:?} out of range 0-7"))
}

impl fmt::Debug for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CronSchedule").field(&self.expression).finish()
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

impl PartialEq for CronSchedule {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
    }
}

impl Eq for CronSchedule {}

impl FromStr for CronSchedule {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CronSchedule {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CronSchedule> for String {
    fn from(value: CronSchedule) -> Self {
        value.expression
    }
}
