use std::collections::HashMap;

use chrono::{DateTime, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use crate::config::{parse_clock, BusinessHoursConfig, ConfigError};
use crate::domain::appointment::Slot;
use crate::errors::DomainError;

/// Opening hours evaluated in the business's local timezone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusinessHours {
    timezone: Tz,
    open: NaiveTime,
    close: NaiveTime,
    rest_day: Weekday,
    rest_day_close: NaiveTime,
    closed_days: Vec<Weekday>,
    overrides: HashMap<Weekday, (NaiveTime, NaiveTime)>,
}

impl BusinessHours {
    pub fn from_config(config: &BusinessHoursConfig) -> Result<Self, ConfigError> {
        let timezone = config.timezone.parse::<Tz>().map_err(|_| {
            ConfigError::Validation(format!("unknown timezone `{}`", config.timezone))
        })?;
        let weekday = |value: &str| {
            value.parse::<Weekday>().map_err(|_| {
                ConfigError::Validation(format!("`{value}` is not a weekday name"))
            })
        };

        let mut hours = Self {
            timezone,
            open: parse_clock("business_hours.open", &config.open)?,
            close: parse_clock("business_hours.close", &config.close)?,
            rest_day: weekday(&config.rest_day)?,
            rest_day_close: parse_clock("business_hours.rest_day_close", &config.rest_day_close)?,
            closed_days: config
                .closed_days
                .iter()
                .map(|day| weekday(day))
                .collect::<Result<Vec<_>, _>>()?,
            overrides: HashMap::new(),
        };

        for (name, day) in &config.days {
            let day_of_week = weekday(name)?;
            let (default_open, default_close) = hours.weekly_hours(day_of_week);
            let key = |bound: &str| format!("business_hours.days.{name}.{bound}");
            let open = match &day.open {
                Some(value) => parse_clock(&key("open"), value)?,
                None => default_open,
            };
            let close = match &day.close {
                Some(value) => parse_clock(&key("close"), value)?,
                None => default_close,
            };
            if open >= close {
                return Err(ConfigError::Validation(format!(
                    "{} must be earlier than {}",
                    key("open"),
                    key("close")
                )));
            }
            hours.overrides.insert(day_of_week, (open, close));
        }

        Ok(hours)
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn local_today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.timezone).date_naive()
    }

    /// `(open, close)` for the given weekday, or `None` when closed all day.
    pub fn hours_for(&self, weekday: Weekday) -> Option<(NaiveTime, NaiveTime)> {
        if let Some(hours) = self.overrides.get(&weekday) {
            return Some(*hours);
        }
        if self.closed_days.contains(&weekday) {
            return None;
        }
        Some(self.weekly_hours(weekday))
    }

    fn weekly_hours(&self, weekday: Weekday) -> (NaiveTime, NaiveTime) {
        let close = if weekday == self.rest_day { self.rest_day_close } else { self.close };
        (self.open, close)
    }

    /// Human-readable valid range for `date`, used in rejections.
    pub fn valid_range(&self, date: NaiveDate) -> String {
        use chrono::Datelike;

        match self.hours_for(date.weekday()) {
            Some((open, close)) => format!(
                "{} {}-{}",
                weekday_name(date.weekday()),
                open.format("%H:%M"),
                close.format("%H:%M")
            ),
            None => format!("closed on {}; {}", weekday_name(date.weekday()), self.summary()),
        }
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{}-{} daily, {} until {}",
            self.open.format("%H:%M"),
            self.close.format("%H:%M"),
            weekday_name(self.rest_day),
            self.rest_day_close.format("%H:%M")
        );
        let mut overrides: Vec<_> = self.overrides.iter().collect();
        overrides.sort_by_key(|(weekday, _)| weekday.num_days_from_monday());
        for (weekday, (open, close)) in overrides {
            summary.push_str(&format!(
                ", {} {}-{}",
                weekday_name(*weekday),
                open.format("%H:%M"),
                close.format("%H:%M")
            ));
        }
        summary
    }

    /// Rejects slots outside opening hours, in the past, or inside a DST gap.
    pub fn validate(&self, slot: Slot, now: DateTime<Utc>) -> Result<(), DomainError> {
        use chrono::Datelike;

        let within = self
            .hours_for(slot.date.weekday())
            .is_some_and(|(open, close)| slot.time >= open && slot.time < close);
        if !within {
            return Err(DomainError::OutsideBusinessHours {
                requested: slot.to_string(),
                valid_range: self.valid_range(slot.date),
            });
        }

        let local = slot.date.and_time(slot.time);
        let instant = match self.timezone.from_local_datetime(&local) {
            LocalResult::Single(instant) => instant,
            LocalResult::Ambiguous(earliest, _) => earliest,
            LocalResult::None => {
                return Err(DomainError::UnavailableSlot { requested: slot.to_string() })
            }
        };
        if instant.with_timezone(&Utc) <= now {
            return Err(DomainError::UnavailableSlot { requested: slot.to_string() });
        }

        Ok(())
    }
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::America::Mexico_City,
            open: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(19, 0, 0).unwrap_or(NaiveTime::MIN),
            rest_day: Weekday::Sat,
            rest_day_close: NaiveTime::from_hms_opt(14, 0, 0).unwrap_or(NaiveTime::MIN),
            closed_days: Vec::new(),
            overrides: HashMap::new(),
        }
    }
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

    use std::collections::BTreeMap;

    use chrono::Weekday;

    use super::BusinessHours;
    use crate::config::{BusinessHoursConfig, DayHoursConfig};
    use crate::domain::appointment::Slot;
    use crate::errors::DomainError;

    fn slot(y: i32, m: u32, d: u32, h: u32, min: u32) -> Slot {
        Slot {
            date: NaiveDate::from_ymd_opt(y, m, d).expect("date"),
            time: NaiveTime::from_hms_opt(h, min, 0).expect("time"),
        }
    }

    fn early_march() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("now")
    }

    #[test]
    fn saturday_uses_shorter_closing_hour() {
        let hours = BusinessHours::default();
        // 2026-03-07 is a Saturday.
        let error = hours.validate(slot(2026, 3, 7, 15, 0), early_march()).expect_err("reject");
        match error {
            DomainError::OutsideBusinessHours { valid_range, .. } => {
                assert_eq!(valid_range, "Saturday 09:00-14:00");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(hours.validate(slot(2026, 3, 7, 13, 30), early_march()).is_ok());
        assert!(hours.validate(slot(2026, 3, 6, 17, 0), early_march()).is_ok());
    }

    #[test]
    fn closing_time_itself_is_outside() {
        let hours = BusinessHours::default();
        assert!(hours.validate(slot(2026, 3, 6, 19, 0), early_march()).is_err());
        assert!(hours.validate(slot(2026, 3, 6, 8, 59), early_march()).is_err());
    }

    #[test]
    fn closed_days_reject_every_time() {
        let hours = BusinessHours::from_config(&BusinessHoursConfig {
            closed_days: vec!["sunday".to_string()],
            ..BusinessHoursConfig::default()
        })
        .expect("hours");
        // 2026-03-08 is a Sunday.
        let error = hours.validate(slot(2026, 3, 8, 11, 0), early_march()).expect_err("closed");
        assert!(error.to_string().contains("closed on Sunday"));
    }

    #[test]
    fn past_slots_are_unavailable() {
        let hours = BusinessHours::default();
        let now = Utc.with_ymd_and_hms(2026, 3, 6, 20, 0, 0).single().expect("now");
        // 11:00 local in Mexico City is 17:00 UTC, already past.
        let error = hours.validate(slot(2026, 3, 6, 11, 0), now).expect_err("past");
        assert!(matches!(error, DomainError::UnavailableSlot { .. }));
    }

    #[test]
    fn nonexistent_local_time_in_dst_gap_is_rejected() {
        let hours = BusinessHours::from_config(&BusinessHoursConfig {
            timezone: "America/New_York".to_string(),
            open: "01:00".to_string(),
            ..BusinessHoursConfig::default()
        })
        .expect("hours");
        // Clocks jump from 02:00 to 03:00 on 2026-03-08 in New York.
        let error = hours.validate(slot(2026, 3, 8, 2, 30), early_march()).expect_err("gap");
        assert!(matches!(error, DomainError::UnavailableSlot { .. }));
    }

    fn with_days(days: &[(&str, Option<&str>, Option<&str>)]) -> BusinessHoursConfig {
        let days: BTreeMap<String, DayHoursConfig> = days
            .iter()
            .map(|(day, open, close)| {
                (
                    day.to_string(),
                    DayHoursConfig {
                        open: open.map(str::to_string),
                        close: close.map(str::to_string),
                    },
                )
            })
            .collect();
        BusinessHoursConfig { days, ..BusinessHoursConfig::default() }
    }

    #[test]
    fn weekday_override_replaces_the_general_hours() {
        let hours =
            BusinessHours::from_config(&with_days(&[("friday", Some("10:00"), Some("17:00"))]))
                .expect("hours");
        let open = |h, m| NaiveTime::from_hms_opt(h, m, 0).expect("time");

        assert_eq!(hours.hours_for(Weekday::Fri), Some((open(10, 0), open(17, 0))));
        assert_eq!(hours.hours_for(Weekday::Thu), Some((open(9, 0), open(19, 0))));
        // 2026-03-06 is a Friday.
        let error = hours.validate(slot(2026, 3, 6, 18, 0), early_march()).expect_err("late");
        assert!(error.to_string().contains("Friday 10:00-17:00"), "{error}");
        assert!(hours.validate(slot(2026, 3, 6, 9, 30), early_march()).is_err());
        assert!(hours.validate(slot(2026, 3, 6, 16, 30), early_march()).is_ok());
        assert!(hours.summary().ends_with("Friday 10:00-17:00"));
    }

    #[test]
    fn partial_override_keeps_the_other_bound() {
        let hours = BusinessHours::from_config(&with_days(&[("saturday", Some("10:00"), None)]))
            .expect("hours");
        let at = |h| NaiveTime::from_hms_opt(h, 0, 0).expect("time");
        assert_eq!(hours.hours_for(Weekday::Sat), Some((at(10), at(14))));
    }

    #[test]
    fn inverted_override_is_rejected() {
        let error =
            BusinessHours::from_config(&with_days(&[("monday", Some("18:00"), Some("10:00"))]))
                .expect_err("inverted");
        assert!(error.to_string().contains("business_hours.days.monday.open"), "{error}");
    }
}
