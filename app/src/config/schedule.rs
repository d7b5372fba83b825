use chrono::FixedOffset;
use kit::{env, CronExpression, FrameworkError};

/// A cron expression paired with the offset it is evaluated in
#[derive(Debug, Clone)]
pub struct CronSchedule {
    pub expression: CronExpression,
    pub timezone: FixedOffset,
}

impl CronSchedule {
    pub fn new(expression: &str, timezone: FixedOffset) -> Result<Self, FrameworkError> {
        let expression = CronExpression::parse(expression)
            .map_err(|message| FrameworkError::validation("cron", message))?;
        Ok(Self {
            expression,
            timezone,
        })
    }
}

/// Cron triggers of the pipeline
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Publish sweep, every two hours by default
    pub publish_tools: CronSchedule,
    /// Nightly repository refresh
    pub fetch_tools: CronSchedule,
}

impl ScheduleConfig {
    pub fn from_env() -> Result<Self, FrameworkError> {
        let timezone = parse_offset(&env("SCHEDULE_TIMEZONE", "+01:00".to_string()))?;
        Ok(Self {
            publish_tools: CronSchedule::new(
                &env("PUBLISH_TOOLS_CRON", "0 */2 * * *".to_string()),
                timezone,
            )?,
            fetch_tools: CronSchedule::new(
                &env("FETCH_TOOLS_CRON", "0 0 * * *".to_string()),
                timezone,
            )?,
        })
    }
}

/// Parse `+HH:MM`, `-HH:MM` or `UTC` into a fixed offset
pub fn parse_offset(raw: &str) -> Result<FixedOffset, FrameworkError> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("utc") || raw == "Z" {
        return FixedOffset::east_opt(0)
            .ok_or_else(|| FrameworkError::validation("timezone", "invalid offset"));
    }

    let invalid = || FrameworkError::validation("timezone", format!("invalid offset '{}'", raw));
    let (sign, rest) = if let Some(rest) = raw.strip_prefix('+') {
        (1, rest)
    } else if let Some(rest) = raw.strip_prefix('-') {
        (-1, rest)
    } else {
        return Err(invalid());
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 14 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_offset() {
        assert_eq!(parse_offset("+01:00").unwrap().local_minus_utc(), 3600);
        assert_eq!(parse_offset("-05:30").unwrap().local_minus_utc(), -(5 * 3600 + 1800));
        assert_eq!(parse_offset("UTC").unwrap().local_minus_utc(), 0);
        assert!(parse_offset("Europe/Warsaw").is_err());
        assert!(parse_offset("+25:00").is_err());
    }

    #[test]
    fn test_cron_schedule_rejects_bad_expression() {
        let utc = parse_offset("UTC").unwrap();
        assert!(CronSchedule::new("0 */2 * * *", utc).is_ok());
        assert!(CronSchedule::new("every two hours", utc).is_err());
    }
}
