//! Five-field cron expressions
//!
//! `minute hour day-of-month month day-of-week`, each field accepting `*`,
//! single values, lists (`1,15`), ranges (`1-5`) and steps (`*/2`, `0-30/10`).
//! Day-of-week runs 0-6 from Sunday; 7 is accepted as Sunday too.

use chrono::{DateTime, Datelike, TimeZone, Timelike};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayOfWeek {
    Sunday = 0,
    Monday = 1,
    Tuesday = 2,
    Wednesday = 3,
    Thursday = 4,
    Friday = 5,
    Saturday = 6,
}

/// One parsed field, as a bitmask over its allowed values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Field {
    bits: u64,
    /// The field was `*` (or `*/1`)
    any: bool,
}

impl Field {
    fn parse(text: &str, min: u32, max: u32) -> Result<Self, String> {
        let mut bits = 0u64;
        let any = text == "*" || text == "*/1";

        for part in text.split(',') {
            let (range, step) = match part.split_once('/') {
                Some((range, step)) => {
                    let step: u32 = step
                        .parse()
                        .map_err(|_| format!("invalid step '{}'", step))?;
                    if step == 0 {
                        return Err("step must be positive".to_string());
                    }
                    (range, step)
                }
                None => (part, 1),
            };

            let (start, end) = if range == "*" {
                (min, max)
            } else if let Some((a, b)) = range.split_once('-') {
                (parse_value(a, min, max)?, parse_value(b, min, max)?)
            } else {
                let value = parse_value(range, min, max)?;
                // `5/15` means "from 5 to the end, every 15"
                if step > 1 {
                    (value, max)
                } else {
                    (value, value)
                }
            };

            if start > end {
                return Err(format!("invalid range '{}'", range));
            }

            let mut value = start;
            while value <= end {
                bits |= 1 << value;
                value += step;
            }
        }

        Ok(Self { bits, any })
    }

    fn every(min: u32, max: u32) -> Self {
        let bits = (min..=max).fold(0u64, |bits, v| bits | 1 << v);
        Self { bits, any: true }
    }

    fn single(value: u32) -> Self {
        Self {
            bits: 1 << value,
            any: false,
        }
    }

    fn matches(&self, value: u32) -> bool {
        self.bits & (1 << value) != 0
    }
}

fn parse_value(raw: &str, min: u32, max: u32) -> Result<u32, String> {
    let value: u32 = raw
        .parse()
        .map_err(|_| format!("invalid value '{}'", raw))?;
    if value < min || value > max {
        return Err(format!("value {} out of range {}-{}", value, min, max));
    }
    Ok(value)
}

/// A parsed cron expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    source: String,
    minute: Field,
    hour: Field,
    day_of_month: Field,
    month: Field,
    day_of_week: Field,
}

impl CronExpression {
    pub fn parse(expression: &str) -> Result<Self, String> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(format!(
                "expected 5 fields in cron expression '{}', found {}",
                expression,
                fields.len()
            ));
        }

        let mut day_of_week = Field::parse(fields[4], 0, 7)?;
        if day_of_week.matches(7) {
            day_of_week.bits |= 1;
        }

        Ok(Self {
            source: fields.join(" "),
            minute: Field::parse(fields[0], 0, 59)?,
            hour: Field::parse(fields[1], 0, 23)?,
            day_of_month: Field::parse(fields[2], 1, 31)?,
            month: Field::parse(fields[3], 1, 12)?,
            day_of_week,
        })
    }

    fn build(source: String, minute: Field, hour: Field, day_of_week: Field) -> Self {
        Self {
            source,
            minute,
            hour,
            day_of_month: Field::every(1, 31),
            month: Field::every(1, 12),
            day_of_week,
        }
    }

    pub fn every_minute() -> Self {
        Self::build(
            "* * * * *".to_string(),
            Field::every(0, 59),
            Field::every(0, 23),
            Field::every(0, 6),
        )
    }

    pub fn hourly() -> Self {
        Self::build(
            "0 * * * *".to_string(),
            Field::single(0),
            Field::every(0, 23),
            Field::every(0, 6),
        )
    }

    pub fn every_n_hours(hours: u32) -> Self {
        let hours = hours.clamp(1, 23);
        let mut hour = Field::single(0);
        for h in (hours..24).step_by(hours as usize) {
            hour.bits |= 1 << h;
        }
        Self::build(
            format!("0 */{} * * *", hours),
            Field::single(0),
            hour,
            Field::every(0, 6),
        )
    }

    pub fn daily() -> Self {
        Self::build(
            "0 0 * * *".to_string(),
            Field::single(0),
            Field::single(0),
            Field::every(0, 6),
        )
    }

    /// Daily at `HH:MM`
    pub fn daily_at(time: &str) -> Result<Self, String> {
        let (hour, minute) = time
            .split_once(':')
            .ok_or_else(|| format!("invalid time '{}', expected HH:MM", time))?;
        let hour = parse_value(hour, 0, 23)?;
        let minute = parse_value(minute, 0, 59)?;
        Self::parse(&format!("{} {} * * *", minute, hour))
    }

    pub fn weekly_on(day: DayOfWeek) -> Self {
        Self::build(
            format!("0 0 * * {}", day as u32),
            Field::single(0),
            Field::single(0),
            Field::single(day as u32),
        )
    }

    /// The expression as written, normalized to single spaces
    pub fn expression(&self) -> &str {
        &self.source
    }

    /// Whether the minute containing `time` is due, in `time`'s offset
    pub fn is_due_at<Tz: TimeZone>(&self, time: &DateTime<Tz>) -> bool {
        let dom = self.day_of_month.matches(time.day());
        let dow = self
            .day_of_week
            .matches(time.weekday().num_days_from_sunday());

        // Classic cron: when both day fields are restricted, either may match
        let day_matches = match (self.day_of_month.any, self.day_of_week.any) {
            (false, false) => dom || dow,
            _ => dom && dow,
        };

        self.minute.matches(time.minute())
            && self.hour.matches(time.hour())
            && self.month.matches(time.month())
            && day_matches
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
