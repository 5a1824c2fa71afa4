//! Next-fire computation for job triggers
//!
//! A [`Trigger`] is compiled once per registration into a [`CompiledTrigger`],
//! which the engine asks for fire times. Interval triggers skip missed
//! periods instead of bursting; cron triggers are evaluated in the scheduler
//! timezone and always return a match strictly after the reference time.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::str::FromStr;

use super::types::{JobSchedulingError, Trigger};

/// A trigger ready for fire-time evaluation
#[derive(Debug, Clone)]
pub enum CompiledTrigger {
    Interval(chrono::Duration),
    Cron(Box<Schedule>),
}

impl CompiledTrigger {
    /// Validate and compile `trigger` for the job `job_id`
    pub fn compile(job_id: &str, trigger: &Trigger) -> Result<Self, JobSchedulingError> {
        match trigger {
            Trigger::Interval { period } => {
                if period.is_zero() {
                    return Err(JobSchedulingError::InvalidTrigger {
                        id: job_id.to_string(),
                        reason: "interval period must be greater than zero".to_string(),
                    });
                }
                let period = chrono::Duration::from_std(*period).map_err(|e| {
                    JobSchedulingError::InvalidTrigger {
                        id: job_id.to_string(),
                        reason: format!("interval period out of range: {e}"),
                    }
                })?;
                Ok(Self::Interval(period))
            }
            Trigger::Cron {
                day_of_week,
                hour,
                minute,
            } => {
                let day_of_week = day_of_week_field(day_of_week).map_err(|reason| {
                    JobSchedulingError::InvalidTrigger {
                        id: job_id.to_string(),
                        reason,
                    }
                })?;
                let expression = cron_expression(&day_of_week, hour, minute);
                let schedule = Schedule::from_str(&expression).map_err(|e| {
                    JobSchedulingError::InvalidTrigger {
                        id: job_id.to_string(),
                        reason: format!("invalid cron expression '{expression}': {e}"),
                    }
                })?;
                Ok(Self::Cron(Box::new(schedule)))
            }
        }
    }

    /// First fire time for a job that has never been scheduled
    pub fn first_fire(&self, now: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
        match self {
            Self::Interval(period) => now.checked_add_signed(*period),
            Self::Cron(schedule) => next_cron_match(schedule, now, tz),
        }
    }

    /// Fire time following `scheduled`, never at or before `now`
    ///
    /// For intervals this is `scheduled + k * period` for the smallest `k >= 1`
    /// that lands after `now`, so periods missed while the process was busy or
    /// down are skipped rather than replayed.
    pub fn next_after(
        &self,
        scheduled: DateTime<Utc>,
        now: DateTime<Utc>,
        tz: Tz,
    ) -> Option<DateTime<Utc>> {
        match self {
            Self::Interval(period) => {
                let period_ms = period.num_milliseconds().max(1);
                let elapsed_ms = (now - scheduled).num_milliseconds();
                let steps = if elapsed_ms < 0 {
                    1
                } else {
                    elapsed_ms / period_ms + 1
                };
                let offset = chrono::Duration::try_milliseconds(period_ms.checked_mul(steps)?)?;
                scheduled.checked_add_signed(offset)
            }
            Self::Cron(schedule) => next_cron_match(schedule, scheduled.max(now), tz),
        }
    }
}

/// Six-field cron expression (seconds first) for a weekly-style calendar rule
pub fn cron_expression(day_of_week: &str, hour: &str, minute: &str) -> String {
    format!(
        "0 {} {} * * {}",
        minute.trim(),
        hour.trim(),
        day_of_week.trim()
    )
}

const DAY_NAMES: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

/// Rewrite numeric weekdays (0 = Monday .. 6 = Sunday) as day names
///
/// The cron crate counts 1 = Sunday, so numbers are never passed through.
/// Names and `*` are left alone; numeric ranges, steps and `*/n` are expanded
/// into explicit name lists.
pub fn day_of_week_field(field: &str) -> Result<String, String> {
    let parts = field
        .trim()
        .split(',')
        .map(|part| day_of_week_part(part.trim()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join(","))
}

fn day_of_week_part(part: &str) -> Result<String, String> {
    let (range, step) = match part.split_once('/') {
        Some((range, step)) => (range, Some(step)),
        None => (part, None),
    };
    let is_numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    let (start, end) = match range.split_once('-') {
        Some((start, end)) if is_numeric(start) && is_numeric(end) => {
            (weekday_number(start)?, weekday_number(end)?)
        }
        Some((start, end)) if is_numeric(start) || is_numeric(end) => {
            return Err(format!(
                "day_of_week range '{range}' mixes numbers and day names"
            ));
        }
        Some(_) => return Ok(part.to_string()),
        None if is_numeric(range) => {
            let start = weekday_number(range)?;
            // `3/2` runs from the start day to the end of the week
            (start, if step.is_some() { 6 } else { start })
        }
        None if range == "*" && step.is_some() => (0, 6),
        None => return Ok(part.to_string()),
    };

    if start > end {
        return Err(format!("day_of_week range '{range}' runs backwards"));
    }
    let step = match step {
        Some(step) => step
            .parse::<usize>()
            .ok()
            .filter(|step| *step > 0)
            .ok_or_else(|| format!("day_of_week step '{step}' is not a positive number"))?,
        None => 1,
    };

    let names: Vec<&str> = (start..=end).step_by(step).map(|day| DAY_NAMES[day]).collect();
    Ok(names.join(","))
}

fn weekday_number(value: &str) -> Result<usize, String> {
    value
        .parse::<usize>()
        .ok()
        .filter(|day| *day < DAY_NAMES.len())
        .ok_or_else(|| format!("day_of_week '{value}' is out of range 0-6 (0 = Monday)"))
}

fn next_cron_match(schedule: &Schedule, after: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
    schedule
        .after(&after.with_timezone(&tz))
        .next()
        .map(|next| next.with_timezone(&Utc))
}
