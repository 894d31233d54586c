//! Cron expression parsing and native-calendar compilation.
//!
//! Supports the standard 5-field form (`minute hour day month weekday`)
//! with `*`, bare integers, comma lists, and `*/step`. A parsed schedule
//! compiles into the two calendar shapes the host schedulers understand:
//! launchd `StartCalendarInterval` dictionaries and systemd `OnCalendar=`
//! strings.
//!
//! Cron treats day-of-month and day-of-week as an OR when both are
//! constrained: `0 9 1 * 1` fires on the 1st of the month *and* on every
//! Monday. Neither native format can express that in one entry, so the
//! compiler emits two — one constraining day-of-month, one constraining
//! day-of-week — and relies on the schedulers' union semantics across
//! multiple entries.

use thiserror::Error;

/// Errors that can occur when parsing a cron expression.
#[derive(Debug, Error)]
pub enum CronError {
    /// Wrong number of whitespace-separated fields.
    #[error("expected 5 cron fields (minute hour day month weekday), got {0}")]
    FieldCount(usize),

    /// A field that is not `*`, an integer, a comma list, or `*/step`.
    #[error("invalid {field} field: '{value}'")]
    InvalidField { field: &'static str, value: String },

    /// An integer outside the field's allowed range.
    #[error("{field} value {value} out of range {min}-{max}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: u32,
        max: u32,
    },

    /// A `*/step` with a zero, negative, or non-numeric step.
    #[error("step in {field} field must be a positive integer: '{value}'")]
    InvalidStep { field: &'static str, value: String },
}

/// One parsed cron field: unconstrained, or a sorted set of values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CronField {
    /// `*` — no constraint.
    Any,
    /// Concrete values, deduplicated and ascending.
    Values(Vec<u32>),
}

impl CronField {
    /// Whether this field is the `*` wildcard.
    pub fn is_any(&self) -> bool {
        matches!(self, CronField::Any)
    }
}

#[derive(Debug, Clone, Copy)]
struct FieldDef {
    name: &'static str,
    min: u32,
    max: u32,
    /// Day-of-week accepts 7 as an alias for Sunday (0).
    seven_is_zero: bool,
}

const MINUTE: FieldDef = FieldDef { name: "minute", min: 0, max: 59, seven_is_zero: false };
const HOUR: FieldDef = FieldDef { name: "hour", min: 0, max: 23, seven_is_zero: false };
const DAY: FieldDef = FieldDef { name: "day-of-month", min: 1, max: 31, seven_is_zero: false };
const MONTH: FieldDef = FieldDef { name: "month", min: 1, max: 12, seven_is_zero: false };
const WEEKDAY: FieldDef = FieldDef { name: "day-of-week", min: 0, max: 7, seven_is_zero: true };

const WEEKDAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Parse one cron field against its definition.
fn parse_field(raw: &str, def: FieldDef) -> Result<CronField, CronError> {
    if raw == "*" {
        return Ok(CronField::Any);
    }

    if let Some(step_str) = raw.strip_prefix("*/") {
        let step: u32 = step_str.parse().map_err(|_| CronError::InvalidStep {
            field: def.name,
            value: raw.to_string(),
        })?;
        if step == 0 {
            return Err(CronError::InvalidStep {
                field: def.name,
                value: raw.to_string(),
            });
        }
        let values = (def.min..=def.max).step_by(step as usize).collect();
        return Ok(CronField::Values(values));
    }

    let mut values = Vec::new();
    for part in raw.split(',') {
        let value: i64 = part.trim().parse().map_err(|_| CronError::InvalidField {
            field: def.name,
            value: raw.to_string(),
        })?;
        if value < def.min as i64 || value > def.max as i64 {
            return Err(CronError::OutOfRange {
                field: def.name,
                value,
                min: def.min,
                max: def.max,
            });
        }
        let mut value = value as u32;
        if def.seven_is_zero && value == 7 {
            value = 0;
        }
        values.push(value);
    }
    values.sort_unstable();
    values.dedup();
    Ok(CronField::Values(values))
}

/// A fully parsed 5-field cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    pub minute: CronField,
    pub hour: CronField,
    pub day: CronField,
    pub month: CronField,
    pub weekday: CronField,
}

impl CronSchedule {
    /// Parse a 5-field cron expression.
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronError::FieldCount(fields.len()));
        }
        Ok(Self {
            minute: parse_field(fields[0], MINUTE)?,
            hour: parse_field(fields[1], HOUR)?,
            day: parse_field(fields[2], DAY)?,
            month: parse_field(fields[3], MONTH)?,
            weekday: parse_field(fields[4], WEEKDAY)?,
        })
    }
}

/// Validate an expression without keeping the parse result.
///
/// Used as the fail-fast gate before any record is written or any
/// service-manager command runs.
pub fn validate_schedule(expr: &str) -> Result<(), CronError> {
    CronSchedule::parse(expr).map(|_| ())
}

/// One launchd `StartCalendarInterval` entry. `None` means the key is
/// omitted, which launchd treats as a wildcard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaemonCalendar {
    pub minute: Option<u32>,
    pub hour: Option<u32>,
    pub day: Option<u32>,
    pub month: Option<u32>,
    pub weekday: Option<u32>,
}

/// Compile an expression into launchd calendar entries.
///
/// Returns one entry per combination of constrained field values. When both
/// day-of-month and day-of-week are constrained the result is the union of
/// two families (see module docs), never a single entry constraining both.
pub fn daemon_calendars(expr: &str) -> Result<Vec<DaemonCalendar>, CronError> {
    let schedule = CronSchedule::parse(expr)?;
    Ok(expand(&schedule))
}

/// Compile an expression into systemd `OnCalendar=` strings, in the form
/// `<Dow|*> *-<MM|*>-<DD|*> <HH|*>:<MM|*>:00`. Multiple lines on one timer
/// unit fire at the union of all lines.
pub fn timer_calendars(expr: &str) -> Result<Vec<String>, CronError> {
    let schedule = CronSchedule::parse(expr)?;
    Ok(expand(&schedule).iter().map(render_on_calendar).collect())
}

/// Expand the cross product of all constrained fields, applying the
/// day-of-month / day-of-week union split. Ordering is deterministic:
/// minute outermost, weekday innermost.
fn expand(schedule: &CronSchedule) -> Vec<DaemonCalendar> {
    if !schedule.day.is_any() && !schedule.weekday.is_any() {
        let mut entries = cross(
            &schedule.minute,
            &schedule.hour,
            &schedule.day,
            &schedule.month,
            &CronField::Any,
        );
        entries.extend(cross(
            &schedule.minute,
            &schedule.hour,
            &CronField::Any,
            &schedule.month,
            &schedule.weekday,
        ));
        entries
    } else {
        cross(
            &schedule.minute,
            &schedule.hour,
            &schedule.day,
            &schedule.month,
            &schedule.weekday,
        )
    }
}

fn axis(field: &CronField) -> Vec<Option<u32>> {
    match field {
        CronField::Any => vec![None],
        CronField::Values(values) => values.iter().copied().map(Some).collect(),
    }
}

fn cross(
    minute: &CronField,
    hour: &CronField,
    day: &CronField,
    month: &CronField,
    weekday: &CronField,
) -> Vec<DaemonCalendar> {
    let mut entries = Vec::new();
    for m in axis(minute) {
        for h in axis(hour) {
            for d in axis(day) {
                for mo in axis(month) {
                    for w in axis(weekday) {
                        entries.push(DaemonCalendar {
                            minute: m,
                            hour: h,
                            day: d,
                            month: mo,
                            weekday: w,
                        });
                    }
                }
            }
        }
    }
    entries
}

fn render_on_calendar(entry: &DaemonCalendar) -> String {
    let dow = match entry.weekday {
        Some(w) => WEEKDAY_NAMES[(w % 7) as usize].to_string(),
        None => "*".to_string(),
    };
    let pad = |v: Option<u32>| match v {
        Some(n) => format!("{n:02}"),
        None => "*".to_string(),
    };
    format!(
        "{dow} *-{}-{} {}:{}:00",
        pad(entry.month),
        pad(entry.day),
        pad(entry.hour),
        pad(entry.minute),
    )
}

/// Best-effort human description of an expression.
///
/// Falls back to echoing the raw expression when no pattern matches.
/// Display-only; never consulted for scheduling.
pub fn describe(expr: &str) -> String {
    let Ok(schedule) = CronSchedule::parse(expr) else {
        return expr.to_string();
    };

    let single = |field: &CronField| match field {
        CronField::Values(v) if v.len() == 1 => Some(v[0]),
        _ => None,
    };

    // "*/N * * * *" and friends expand to evenly spaced sets; recover the
    // step to describe them as intervals.
    let minute_step = step_of(&schedule.minute, MINUTE);
    let hour_step = step_of(&schedule.hour, HOUR);

    match (
        single(&schedule.minute),
        single(&schedule.hour),
        single(&schedule.day),
        &schedule.month,
        single(&schedule.weekday),
    ) {
        // Fixed time of day.
        (Some(minute), Some(hour), day, CronField::Any, weekday)
            if schedule.day.is_any() || day.is_some() =>
        {
            let time = format_time(hour, minute);
            match (day, weekday) {
                (None, None) if schedule.weekday.is_any() => {
                    return format!("daily at {time}");
                }
                (None, Some(w)) if schedule.day.is_any() => {
                    return format!("{}s at {time}", WEEKDAY_NAMES[(w % 7) as usize].to_owned() + day_suffix(w));
                }
                (Some(d), None) if schedule.weekday.is_any() => {
                    return format!("monthly on day {d} at {time}");
                }
                _ => {}
            }
        }
        _ => {}
    }

    if schedule.hour.is_any()
        && schedule.day.is_any()
        && schedule.month.is_any()
        && schedule.weekday.is_any()
    {
        match (&schedule.minute, minute_step) {
            (CronField::Any, _) => return "every minute".to_string(),
            (_, Some(step)) if step > 1 => return format!("every {step} minutes"),
            (CronField::Values(v), _) if v.len() == 1 => {
                return if v[0] == 0 {
                    "every hour".to_string()
                } else {
                    format!("hourly at :{:02}", v[0])
                };
            }
            _ => {}
        }
    }

    if single(&schedule.minute) == Some(0)
        && schedule.day.is_any()
        && schedule.month.is_any()
        && schedule.weekday.is_any()
    {
        if let Some(step) = hour_step {
            if step > 1 {
                return format!("every {step} hours");
            }
        }
    }

    expr.to_string()
}

/// Recover the step of an evenly spaced value set starting at the field
/// minimum (the shape `*/step` expands to), or `None`.
fn step_of(field: &CronField, def: FieldDef) -> Option<u32> {
    let CronField::Values(values) = field else {
        return None;
    };
    if values.len() < 2 || values[0] != def.min {
        return None;
    }
    let step = values[1] - values[0];
    if step == 0 {
        return None;
    }
    let spaced = values.windows(2).all(|w| w[1] - w[0] == step);
    let covers = values[values.len() - 1] + step > def.max;
    (spaced && covers).then_some(step)
}

fn format_time(hour: u32, minute: u32) -> String {
    let (h12, meridiem) = match hour {
        0 => (12, "AM"),
        1..=11 => (hour, "AM"),
        12 => (12, "PM"),
        _ => (hour - 12, "PM"),
    };
    format!("{h12}:{minute:02} {meridiem}")
}

// "Mon" -> "Mondays" needs the untruncated remainder.
fn day_suffix(weekday: u32) -> &'static str {
    match weekday % 7 {
        0 => "day",      // Sundays
        1 => "day",      // Mondays
        2 => "sday",     // Tuesdays
        3 => "nesday",   // Wednesdays
        4 => "rsday",    // Thursdays
        5 => "day",      // Fridays
        _ => "urday",    // Saturdays
    }
}
