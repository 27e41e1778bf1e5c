//! Quartz-style cron expressions evaluated in UTC.
//!
//! Grammar: `sec min hour day-of-month month day-of-week [year]`.
//! Each field accepts `*`, single values, ranges `a-b` (wrapping when
//! `a > b`), steps `a/n`, `a-b/n` and `*/n`, and comma-separated lists.
//! Months accept `JAN`..`DEC`, weekdays `SUN`..`SAT` with `1 = Sunday`.
//! Day-of-month accepts `L` (last day) and `?`; day-of-week accepts `?` and
//! `L` (Saturday). Restricting both day fields at once is rejected.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeDelta, Timelike, Utc};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracker_indexer_shared::{ErrorCode, ErrorEnvelope};

/// Last year searched by [`CronExpression::next_fire_after`].
pub const MAX_CRON_YEAR: i32 = 2299;
const MIN_CRON_YEAR: u32 = 1970;
const MAX_CRON_YEAR_FIELD: u32 = 2299;

const MONTH_NAMES: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const WEEKDAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Parse failures for [`CronExpression`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CronParseError {
    /// Expression does not have 6 or 7 whitespace-separated fields.
    WrongFieldCount {
        /// Number of fields found.
        found: usize,
    },
    /// A token could not be parsed as a value, name, range, or step.
    InvalidToken {
        /// Field name.
        field: &'static str,
        /// Offending token.
        token: String,
    },
    /// A value lies outside the field's range.
    ValueOutOfRange {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: u32,
        /// Inclusive minimum.
        min: u32,
        /// Inclusive maximum.
        max: u32,
    },
    /// Both day-of-month and day-of-week are restricted.
    DayFieldConflict,
}

impl CronParseError {
    fn field(&self) -> Option<&'static str> {
        match self {
            Self::InvalidToken { field, .. } | Self::ValueOutOfRange { field, .. } => Some(field),
            Self::WrongFieldCount { .. } | Self::DayFieldConflict => None,
        }
    }
}

impl fmt::Display for CronParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongFieldCount { found } => write!(
                formatter,
                "cron expression must have 6 or 7 fields, found {found}"
            ),
            Self::InvalidToken { field, token } => {
                write!(formatter, "invalid {field} token `{token}`")
            },
            Self::ValueOutOfRange {
                field,
                value,
                min,
                max,
            } => write!(formatter, "{field} value {value} is outside [{min}, {max}]"),
            Self::DayFieldConflict => formatter
                .write_str("day-of-month and day-of-week cannot both be restricted; use `?` in one"),
        }
    }
}

impl std::error::Error for CronParseError {}

impl From<CronParseError> for ErrorEnvelope {
    fn from(error: CronParseError) -> Self {
        let envelope = Self::expected(ErrorCode::new("domain", "invalid_cron"), error.to_string());
        match error.field() {
            Some(field) => envelope.with_metadata("field", field),
            None => envelope,
        }
    }
}

#[derive(Clone, Copy)]
struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
}

const SECONDS: FieldSpec = FieldSpec {
    name: "seconds",
    min: 0,
    max: 59,
    names: &[],
};
const MINUTES: FieldSpec = FieldSpec {
    name: "minutes",
    min: 0,
    max: 59,
    names: &[],
};
const HOURS: FieldSpec = FieldSpec {
    name: "hours",
    min: 0,
    max: 23,
    names: &[],
};
const DAYS_OF_MONTH: FieldSpec = FieldSpec {
    name: "day-of-month",
    min: 1,
    max: 31,
    names: &[],
};
const MONTHS: FieldSpec = FieldSpec {
    name: "month",
    min: 1,
    max: 12,
    names: &MONTH_NAMES,
};
const DAYS_OF_WEEK: FieldSpec = FieldSpec {
    name: "day-of-week",
    min: 1,
    max: 7,
    names: &WEEKDAY_NAMES,
};
const YEARS: FieldSpec = FieldSpec {
    name: "year",
    min: MIN_CRON_YEAR,
    max: MAX_CRON_YEAR_FIELD,
    names: &[],
};

/// Parsed cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    source: Box<str>,
    seconds: u64,
    minutes: u64,
    hours: u64,
    days_of_month: Option<u64>,
    last_day_of_month: bool,
    months: u64,
    days_of_week: Option<u64>,
    years: Option<BTreeSet<i32>>,
}

impl CronExpression {
    /// Parse an expression.
    pub fn parse(input: &str) -> Result<Self, CronParseError> {
        let fields: Vec<&str> = input.split_whitespace().collect();
        let [sec, min, hour, dom, month, dow, rest @ ..] = fields.as_slice() else {
            return Err(CronParseError::WrongFieldCount {
                found: fields.len(),
            });
        };
        if rest.len() > 1 {
            return Err(CronParseError::WrongFieldCount {
                found: fields.len(),
            });
        }

        let (days_of_month, last_day_of_month) = parse_day_of_month(dom)?;
        let days_of_week = parse_day_of_week(dow)?;
        if (days_of_month.is_some() || last_day_of_month) && days_of_week.is_some() {
            return Err(CronParseError::DayFieldConflict);
        }

        let years = match rest.first() {
            None => None,
            Some(&"*") => None,
            Some(token) => Some(
                expand(token, YEARS)?
                    .into_iter()
                    .filter_map(|year| i32::try_from(year).ok())
                    .collect(),
            ),
        };

        Ok(Self {
            source: fields.join(" ").into_boxed_str(),
            seconds: mask(sec, SECONDS)?,
            minutes: mask(min, MINUTES)?,
            hours: mask(hour, HOURS)?,
            days_of_month,
            last_day_of_month,
            months: mask(month, MONTHS)?,
            days_of_week,
            years,
        })
    }

    /// Normalized source text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// First fire time strictly after `after`, or `None` when no fire time
    /// exists up to [`MAX_CRON_YEAR`].
    #[must_use]
    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = after.naive_utc().with_nanosecond(0)?;
        let mut candidate = start.checked_add_signed(TimeDelta::seconds(1))?;

        loop {
            if candidate.year() > MAX_CRON_YEAR {
                return None;
            }
            if !self.year_matches(candidate.year()) {
                candidate = self.next_year_start(candidate.year())?;
                continue;
            }
            if !bit(self.months, candidate.month()) {
                candidate = next_month_start(candidate)?;
                continue;
            }
            if !self.day_matches(candidate.date()) {
                candidate = candidate.date().succ_opt()?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !bit(self.hours, candidate.hour()) {
                candidate = truncate_to_hour(candidate)?.checked_add_signed(TimeDelta::hours(1))?;
                continue;
            }
            if !bit(self.minutes, candidate.minute()) {
                candidate =
                    truncate_to_minute(candidate)?.checked_add_signed(TimeDelta::minutes(1))?;
                continue;
            }
            if !bit(self.seconds, candidate.second()) {
                candidate = candidate.checked_add_signed(TimeDelta::seconds(1))?;
                continue;
            }
            return Some(candidate.and_utc());
        }
    }

    fn year_matches(&self, year: i32) -> bool {
        self.years.as_ref().is_none_or(|years| years.contains(&year))
    }

    fn next_year_start(&self, year: i32) -> Option<NaiveDateTime> {
        let next = match &self.years {
            Some(years) => *years.range(year + 1..).next()?,
            None => year + 1,
        };
        NaiveDate::from_ymd_opt(next, 1, 1)?.and_hms_opt(0, 0, 0)
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        let dom_ok = match self.days_of_month {
            Some(days) => {
                bit(days, date.day())
                    || (self.last_day_of_month && Some(date.day()) == last_day_of_month(date))
            },
            None => true,
        };
        let dow_ok = self
            .days_of_week
            .is_none_or(|days| bit(days, date.weekday().number_from_sunday()));
        dom_ok && dow_ok
    }
}

impl FromStr for CronExpression {
    type Err = CronParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

const fn bit(mask: u64, value: u32) -> bool {
    value < 64 && mask & (1 << value) != 0
}

fn mask(token: &str, spec: FieldSpec) -> Result<u64, CronParseError> {
    Ok(expand(token, spec)?
        .into_iter()
        .fold(0_u64, |acc, value| acc | (1 << value)))
}

fn parse_day_of_month(token: &str) -> Result<(Option<u64>, bool), CronParseError> {
    match token {
        "*" | "?" => Ok((None, false)),
        "L" | "l" => Ok((Some(0), true)),
        _ => Ok((Some(mask(token, DAYS_OF_MONTH)?), false)),
    }
}

fn parse_day_of_week(token: &str) -> Result<Option<u64>, CronParseError> {
    match token {
        "*" | "?" => Ok(None),
        "L" | "l" => Ok(Some(1 << 7)),
        _ => Ok(Some(mask(token, DAYS_OF_WEEK)?)),
    }
}

fn expand(token: &str, spec: FieldSpec) -> Result<Vec<u32>, CronParseError> {
    let mut values = Vec::new();
    for item in token.split(',') {
        expand_item(item, spec, &mut values)?;
    }
    values.sort_unstable();
    values.dedup();
    Ok(values)
}

fn expand_item(item: &str, spec: FieldSpec, out: &mut Vec<u32>) -> Result<(), CronParseError> {
    let invalid = || CronParseError::InvalidToken {
        field: spec.name,
        token: item.to_owned(),
    };

    let (base, step) = match item.split_once('/') {
        Some((base, step)) => {
            let step: u32 = step.parse().map_err(|_| invalid())?;
            if step == 0 {
                return Err(invalid());
            }
            (base, Some(step))
        },
        None => (item, None),
    };

    let (start, end) = if base == "*" {
        (spec.min, spec.max)
    } else if let Some((low, high)) = base.split_once('-') {
        (value(low, spec, item)?, value(high, spec, item)?)
    } else {
        let start = value(base, spec, item)?;
        (start, if step.is_some() { spec.max } else { start })
    };

    let span = spec.max - spec.min + 1;
    let length = if start <= end {
        end - start + 1
    } else {
        (spec.max - start + 1) + (end - spec.min + 1)
    };
    let step = step.unwrap_or(1);
    let mut offset = 0;
    while offset < length {
        let wrapped = (start - spec.min + offset) % span + spec.min;
        out.push(wrapped);
        offset += step;
    }
    Ok(())
}

fn value(token: &str, spec: FieldSpec, item: &str) -> Result<u32, CronParseError> {
    let upper = token.to_ascii_uppercase();
    let parsed = match spec.names.iter().position(|name| *name == upper) {
        Some(index) => u32::try_from(index).ok().map(|index| index + spec.min),
        None => token.parse::<u32>().ok(),
    };
    let Some(parsed) = parsed else {
        return Err(CronParseError::InvalidToken {
            field: spec.name,
            token: item.to_owned(),
        });
    };
    if parsed < spec.min || parsed > spec.max {
        return Err(CronParseError::ValueOutOfRange {
            field: spec.name,
            value: parsed,
            min: spec.min,
            max: spec.max,
        });
    }
    Ok(parsed)
}

fn next_month_start(current: NaiveDateTime) -> Option<NaiveDateTime> {
    let (year, month) = if current.month() == 12 {
        (current.year() + 1, 1)
    } else {
        (current.year(), current.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)
}

fn last_day_of_month(date: NaiveDate) -> Option<u32> {
    let first_of_next = next_month_start(date.and_hms_opt(0, 0, 0)?)?;
    Some(first_of_next.date().pred_opt()?.day())
}

fn truncate_to_hour(value: NaiveDateTime) -> Option<NaiveDateTime> {
    value.date().and_hms_opt(value.hour(), 0, 0)
}

fn truncate_to_minute(value: NaiveDateTime) -> Option<NaiveDateTime> {
    value.date().and_hms_opt(value.hour(), value.minute(), 0)
}
