use chrono::{
    DateTime, Datelike, Local, NaiveDate, NaiveDateTime, Offset, SubsecRound, TimeDelta, TimeZone,
    Timelike, Utc,
};
use outpost_types::{Value, date_to_iso_string};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::cast::to_number;
use crate::error::{ModelError, ModelResult};
use crate::events::{ChangeEmitter, ChangeEvent, EmitPolicy, Listener, Subscription};
use crate::proxy::Property;
use crate::serialize::{Extract, SerializeOptions};

/// A named component of a date.
///
/// Months are 1-based; weekdays count from Sunday = 0. `TimezoneOffset` is
/// the number of minutes UTC is ahead of local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateField {
    Year,
    Month,
    Day,
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
    UtcYear,
    UtcMonth,
    UtcDay,
    UtcHours,
    UtcMinutes,
    UtcSeconds,
    UtcMilliseconds,
    Time,
    Weekday,
    UtcWeekday,
    TimezoneOffset,
}

impl DateField {
    pub const ALL: [DateField; 18] = [
        DateField::Year,
        DateField::Month,
        DateField::Day,
        DateField::Hours,
        DateField::Minutes,
        DateField::Seconds,
        DateField::Milliseconds,
        DateField::UtcYear,
        DateField::UtcMonth,
        DateField::UtcDay,
        DateField::UtcHours,
        DateField::UtcMinutes,
        DateField::UtcSeconds,
        DateField::UtcMilliseconds,
        DateField::Time,
        DateField::Weekday,
        DateField::UtcWeekday,
        DateField::TimezoneOffset,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            DateField::Year => "year",
            DateField::Month => "month",
            DateField::Day => "day",
            DateField::Hours => "hours",
            DateField::Minutes => "minutes",
            DateField::Seconds => "seconds",
            DateField::Milliseconds => "milliseconds",
            DateField::UtcYear => "utc_year",
            DateField::UtcMonth => "utc_month",
            DateField::UtcDay => "utc_day",
            DateField::UtcHours => "utc_hours",
            DateField::UtcMinutes => "utc_minutes",
            DateField::UtcSeconds => "utc_seconds",
            DateField::UtcMilliseconds => "utc_milliseconds",
            DateField::Time => "time",
            DateField::Weekday => "weekday",
            DateField::UtcWeekday => "utc_weekday",
            DateField::TimezoneOffset => "timezone_offset",
        }
    }

    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            DateField::Weekday | DateField::UtcWeekday | DateField::TimezoneOffset
        )
    }

    fn is_utc(self) -> bool {
        matches!(
            self,
            DateField::UtcYear
                | DateField::UtcMonth
                | DateField::UtcDay
                | DateField::UtcHours
                | DateField::UtcMinutes
                | DateField::UtcSeconds
                | DateField::UtcMilliseconds
                | DateField::UtcWeekday
        )
    }
}

impl fmt::Display for DateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Broken-down wall-clock time with a 0-based month, so every part can
/// hold an out-of-range value until it is normalized.
#[derive(Debug, Clone, Copy)]
struct Parts {
    year: i64,
    month0: i64,
    day: i64,
    hours: i64,
    minutes: i64,
    seconds: i64,
    millis: i64,
}

impl Parts {
    fn of(naive: &NaiveDateTime) -> Self {
        Self {
            year: i64::from(naive.year()),
            month0: i64::from(naive.month0()),
            day: i64::from(naive.day()),
            hours: i64::from(naive.hour()),
            minutes: i64::from(naive.minute()),
            seconds: i64::from(naive.second()),
            millis: i64::from(naive.nanosecond() / 1_000_000),
        }
    }

    /// Normalizes overflowing parts the way the native date API does
    /// (month 13 rolls into the next year, day 0 is the last of the
    /// previous month, and so on).
    fn normalize(self) -> Option<NaiveDateTime> {
        let year = self.year.checked_add(self.month0.div_euclid(12))?;
        let month = u32::try_from(self.month0.rem_euclid(12)).ok()? + 1;
        let first = NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, 1)?;
        let offset_ms = (self.day - 1)
            .checked_mul(86_400_000)?
            .checked_add(self.hours.checked_mul(3_600_000)?)?
            .checked_add(self.minutes.checked_mul(60_000)?)?
            .checked_add(self.seconds.checked_mul(1_000)?)?
            .checked_add(self.millis)?;
        first
            .and_hms_opt(0, 0, 0)?
            .checked_add_signed(TimeDelta::try_milliseconds(offset_ms)?)
    }
}

struct DateInner {
    value: Cell<DateTime<Utc>>,
    emitter: Rc<ChangeEmitter>,
}

/// Proxy over a single date.
///
/// Component setters emit `{path: component, current_path: component}` with
/// the requested and previous component values. Formatting never emits.
#[derive(Clone)]
pub struct DateProxy {
    inner: Rc<DateInner>,
}

impl DateProxy {
    /// Sub-millisecond precision is dropped.
    pub fn new(value: DateTime<Utc>) -> Self {
        Self {
            inner: Rc::new(DateInner {
                value: Cell::new(value.trunc_subsecs(3)),
                emitter: ChangeEmitter::new(),
            }),
        }
    }

    pub fn value(&self) -> DateTime<Utc> {
        self.inner.value.get()
    }

    pub fn ptr_eq(&self, other: &DateProxy) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Reads one component.
    pub fn get(&self, field: DateField) -> i64 {
        let utc = self.value();
        if field == DateField::Time {
            return utc.timestamp_millis();
        }
        if field == DateField::TimezoneOffset {
            let local = utc.with_timezone(&Local);
            return -i64::from(local.offset().fix().local_minus_utc()) / 60;
        }
        let naive = if field.is_utc() {
            utc.naive_utc()
        } else {
            utc.with_timezone(&Local).naive_local()
        };
        match field {
            DateField::Year | DateField::UtcYear => i64::from(naive.year()),
            DateField::Month | DateField::UtcMonth => i64::from(naive.month()),
            DateField::Day | DateField::UtcDay => i64::from(naive.day()),
            DateField::Hours | DateField::UtcHours => i64::from(naive.hour()),
            DateField::Minutes | DateField::UtcMinutes => i64::from(naive.minute()),
            DateField::Seconds | DateField::UtcSeconds => i64::from(naive.second()),
            DateField::Milliseconds | DateField::UtcMilliseconds => {
                i64::from(naive.nanosecond() / 1_000_000)
            }
            DateField::Weekday | DateField::UtcWeekday => {
                i64::from(naive.weekday().num_days_from_sunday())
            }
            DateField::Time | DateField::TimezoneOffset => 0,
        }
    }

    /// Writes one component and emits if it changed.
    pub fn set(&self, field: DateField, value: i64) -> ModelResult<()> {
        self.set_with(field, value, EmitPolicy::Propagate)
    }

    pub fn set_with(&self, field: DateField, value: i64, policy: EmitPolicy) -> ModelResult<()> {
        if field.is_read_only() {
            return Err(ModelError::ReadOnly(field.name().to_owned()));
        }
        let old = self.get(field);
        if old == value {
            return Ok(());
        }
        let updated = self
            .compose(field, value)
            .ok_or_else(|| ModelError::cast(field.name(), "date", value.to_string()))?;
        self.inner.value.set(updated);
        if policy.propagates() {
            self.inner.emitter.emit(&ChangeEvent::field(
                field.name(),
                Some(Property::Value(Value::from(value))),
                Some(Value::from(old)),
            ));
        }
        Ok(())
    }

    fn compose(&self, field: DateField, value: i64) -> Option<DateTime<Utc>> {
        let utc = self.value();
        if field == DateField::Time {
            return Utc.timestamp_millis_opt(value).single();
        }
        let naive = if field.is_utc() {
            utc.naive_utc()
        } else {
            utc.with_timezone(&Local).naive_local()
        };
        let mut parts = Parts::of(&naive);
        match field {
            DateField::Year | DateField::UtcYear => parts.year = value,
            DateField::Month | DateField::UtcMonth => parts.month0 = value.checked_sub(1)?,
            DateField::Day | DateField::UtcDay => parts.day = value,
            DateField::Hours | DateField::UtcHours => parts.hours = value,
            DateField::Minutes | DateField::UtcMinutes => parts.minutes = value,
            DateField::Seconds | DateField::UtcSeconds => parts.seconds = value,
            DateField::Milliseconds | DateField::UtcMilliseconds => parts.millis = value,
            DateField::Time
            | DateField::Weekday
            | DateField::UtcWeekday
            | DateField::TimezoneOffset => return None,
        }
        let normalized = parts.normalize()?;
        if field.is_utc() {
            return Some(Utc.from_utc_datetime(&normalized));
        }
        match Local.from_local_datetime(&normalized).earliest() {
            Some(local) => Some(local.with_timezone(&Utc)),
            // Wall-clock time skipped by a DST transition.
            None => {
                let offset = Local.offset_from_utc_datetime(&normalized).fix();
                let shifted = normalized.checked_sub_signed(TimeDelta::try_seconds(
                    i64::from(offset.local_minus_utc()),
                )?)?;
                Some(Utc.from_utc_datetime(&shifted))
            }
        }
    }

    /// ISO-8601 in UTC with millisecond precision.
    pub fn to_iso_string(&self) -> String {
        date_to_iso_string(&self.value())
    }

    pub fn to_rfc2822(&self) -> String {
        self.value().to_rfc2822()
    }

    pub fn on_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + 'static,
    {
        self.subscribe(Rc::new(listener))
    }

    pub fn listener_count(&self) -> usize {
        self.inner.emitter.listener_count()
    }

    pub(crate) fn subscribe(&self, listener: Listener) -> Subscription {
        self.inner.emitter.subscribe(listener)
    }

    pub(crate) fn get_path(&self, segments: &[String]) -> Option<Property> {
        match segments {
            [] => Some(Property::Date(self.clone())),
            [component] => DateField::from_name(component)
                .map(|field| Property::Value(Value::from(self.get(field)))),
            _ => None,
        }
    }

    /// Component write reached through a parent path. Unknown component
    /// names are skipped.
    pub(crate) fn set_path(
        &self,
        segments: &[String],
        value: Value,
        policy: EmitPolicy,
    ) -> ModelResult<()> {
        let [component] = segments else {
            return Ok(());
        };
        let Some(field) = DateField::from_name(component) else {
            return Ok(());
        };
        let number = to_number(&value);
        if !number.is_finite() {
            return Err(ModelError::cast(component, "number", value.to_string()));
        }
        self.set_with(field, number.trunc() as i64, policy)
    }
}

macro_rules! component_accessors {
    ($($getter:ident, $setter:ident => $field:ident;)*) => {
        impl DateProxy {
            $(
                pub fn $getter(&self) -> i64 {
                    self.get(DateField::$field)
                }

                pub fn $setter(&self, value: i64) -> ModelResult<()> {
                    self.set(DateField::$field, value)
                }
            )*
        }
    };
}

component_accessors! {
    year, set_year => Year;
    month, set_month => Month;
    day, set_day => Day;
    hours, set_hours => Hours;
    minutes, set_minutes => Minutes;
    seconds, set_seconds => Seconds;
    milliseconds, set_milliseconds => Milliseconds;
    utc_year, set_utc_year => UtcYear;
    utc_month, set_utc_month => UtcMonth;
    utc_day, set_utc_day => UtcDay;
    utc_hours, set_utc_hours => UtcHours;
    utc_minutes, set_utc_minutes => UtcMinutes;
    utc_seconds, set_utc_seconds => UtcSeconds;
    utc_milliseconds, set_utc_milliseconds => UtcMilliseconds;
    time, set_time => Time;
}

impl DateProxy {
    pub fn weekday(&self) -> i64 {
        self.get(DateField::Weekday)
    }

    pub fn utc_weekday(&self) -> i64 {
        self.get(DateField::UtcWeekday)
    }

    pub fn timezone_offset(&self) -> i64 {
        self.get(DateField::TimezoneOffset)
    }
}

impl fmt::Display for DateProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso_string())
    }
}

impl fmt::Debug for DateProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DateProxy").field(&self.to_iso_string()).finish()
    }
}

impl Extract for DateProxy {
    fn logical_value(&self, _options: SerializeOptions) -> Option<Value> {
        Some(Value::Date(self.value()))
    }

    fn display_value(&self, _options: SerializeOptions) -> Option<serde_json::Value> {
        Some(serde_json::Value::String(self.to_iso_string()))
    }
}
