//! Canonical timestamps for run times and valid times.
//!
//! Timestamps are stored on disk as `YYYY:JJJ:HH[:MM][L]`: a zero-padded year,
//! julian day and hour, optional minutes, and a trailing `L` when the time is
//! local rather than GMT. Because every component is zero-padded, canonical
//! strings sort lexicographically in time order within one locality.
//!
//! New format metafile names embed the same information with dashes:
//! `YYYY-JJJ-HH[-MM][L]`.

use crate::error::{FieldStoreError, Result};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Suffix marking a local (rather than GMT) timestamp.
pub const LOCAL_SUFFIX: char = 'L';

/// Number of minutes in one day.
pub const MINUTES_PER_DAY: i64 = 24 * 60;

/// A run or valid timestamp with julian-day resolution down to minutes.
///
/// Equality is structural: `1991:238:12` and `1991:238:12:00` are distinct
/// values that refer to the same instant. Use [`Timestamp::matches`] for
/// instant equivalence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    year: i32,
    jday: u32,
    hour: u32,
    minute: u32,
    local: bool,
    has_minutes: bool,
}

impl Timestamp {
    /// Creates a timestamp from in-range parts.
    ///
    /// Returns `None` if the julian day does not exist in `year`, or the hour
    /// or minute is out of range.
    ///
    /// # Examples
    /// ```rust,ignore
    /// use alopex_fieldstore::tstamp::Timestamp;
    ///
    /// let ts = Timestamp::new(1991, 238, 12, 0, false, false).unwrap();
    /// assert_eq!(ts.to_string(), "1991:238:12");
    /// ```
    pub fn new(
        year: i32,
        jday: u32,
        hour: u32,
        minute: u32,
        local: bool,
        has_minutes: bool,
    ) -> Option<Self> {
        NaiveDate::from_yo_opt(year, jday)?;
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self {
            year,
            jday,
            hour,
            minute: if has_minutes { minute } else { 0 },
            local,
            has_minutes,
        })
    }

    /// Creates a timestamp from possibly out-of-range parts, carrying
    /// overflow into the next unit (hour 24 becomes the next day, and so on).
    pub fn normalized(
        year: i32,
        jday: i64,
        hour: i64,
        minute: i64,
        second: i64,
        local: bool,
        has_minutes: bool,
    ) -> Option<Self> {
        let start = NaiveDate::from_yo_opt(year, 1)?.and_hms_opt(0, 0, 0)?;
        let offset = Duration::try_days(jday - 1)?
            .checked_add(&Duration::try_hours(hour)?)?
            .checked_add(&Duration::try_minutes(minute)?)?
            .checked_add(&Duration::try_seconds(second)?)?;
        let dt = start.checked_add_signed(offset)?;
        Some(Self::from_datetime(dt, local, has_minutes))
    }

    fn from_datetime(dt: NaiveDateTime, local: bool, has_minutes: bool) -> Self {
        Self {
            year: dt.year(),
            jday: dt.ordinal(),
            hour: dt.hour(),
            minute: if has_minutes { dt.minute() } else { 0 },
            local,
            has_minutes,
        }
    }

    fn to_datetime(self) -> NaiveDateTime {
        // Components are validated on construction.
        NaiveDate::from_yo_opt(self.year, self.jday)
            .and_then(|d| d.and_hms_opt(self.hour, self.minute, 0))
            .unwrap_or_default()
    }

    /// Parses a canonical `YYYY:JJJ:HH[:MM][L]` timestamp.
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_canonical(text).ok_or_else(|| FieldStoreError::InvalidTimestamp(text.into()))
    }

    fn parse_canonical(text: &str) -> Option<Self> {
        let text = text.trim();
        let (body, local) = match text.strip_suffix(LOCAL_SUFFIX) {
            Some(body) => (body, true),
            None => (text, false),
        };
        let parts: Vec<&str> = body.split(':').collect();
        let numbers = parse_numbers(&parts)?;
        match numbers.as_slice() {
            [y, j, h] => Self::new(
                i32::try_from(*y).ok()?,
                u32::try_from(*j).ok()?,
                u32::try_from(*h).ok()?,
                0,
                local,
                false,
            ),
            [y, j, h, m] => Self::new(
                i32::try_from(*y).ok()?,
                u32::try_from(*j).ok()?,
                u32::try_from(*h).ok()?,
                u32::try_from(*m).ok()?,
                local,
                true,
            ),
            _ => None,
        }
    }

    /// Interprets an absolute time string and returns it in canonical form.
    ///
    /// Accepted formats, each with an optional trailing `L`:
    /// `yyyy-jjj-hh[-MM[-SS]]` (metafile names), `yyyy/mm/dd/hh[:MM]`,
    /// `yyyy/jjj/hh[:MM]` and `yyyy:jjj:hh[:MM]`. Out-of-range parts are
    /// carried into the next unit.
    ///
    /// # Examples
    /// ```rust,ignore
    /// use alopex_fieldstore::tstamp::Timestamp;
    ///
    /// let ts = Timestamp::interpret("1991-238-12L").unwrap();
    /// assert_eq!(ts.to_string(), "1991:238:12L");
    /// ```
    pub fn interpret(text: &str) -> Option<Self> {
        let text = text.trim();
        let (body, local) = match text.strip_suffix(LOCAL_SUFFIX) {
            Some(body) => (body, true),
            None => (text, false),
        };
        if body.is_empty() {
            return None;
        }

        if body.contains('-') {
            let parts: Vec<&str> = body.split('-').collect();
            return match parse_numbers(&parts)?.as_slice() {
                [y, j, h] => Self::normalized(to_i32(*y)?, *j, *h, 0, 0, local, false),
                [y, j, h, m] => Self::normalized(to_i32(*y)?, *j, *h, *m, 0, local, true),
                [y, j, h, m, s] => Self::normalized(to_i32(*y)?, *j, *h, *m, *s, local, true),
                _ => None,
            };
        }

        if body.contains('/') {
            let (date, minute) = match body.split_once(':') {
                Some((date, minute)) => (date, Some(minute.parse::<i64>().ok()?)),
                None => (body, None),
            };
            let parts: Vec<&str> = date.split('/').collect();
            let numbers = parse_numbers(&parts)?;
            let (year, jday, hour) = match numbers.as_slice() {
                [y, mo, d, h] => {
                    let ymd = NaiveDate::from_ymd_opt(
                        to_i32(*y)?,
                        u32::try_from(*mo).ok()?,
                        u32::try_from(*d).ok()?,
                    )?;
                    (ymd.year(), i64::from(ymd.ordinal()), *h)
                }
                [y, j, h] => (to_i32(*y)?, *j, *h),
                _ => return None,
            };
            return Self::normalized(
                year,
                jday,
                hour,
                minute.unwrap_or(0),
                0,
                local,
                minute.is_some(),
            );
        }

        let parts: Vec<&str> = body.split(':').collect();
        match parse_numbers(&parts)?.as_slice() {
            [y, j, h] => Self::normalized(to_i32(*y)?, *j, *h, 0, 0, local, false),
            [y, j, h, m] => Self::normalized(to_i32(*y)?, *j, *h, *m, 0, local, true),
            _ => None,
        }
    }

    /// Returns the new format metafile time string `YYYY-JJJ-HH[-MM][L]`.
    pub fn metafile_string(&self) -> String {
        let mut out = if self.has_minutes {
            format!(
                "{:04}-{:03}-{:02}-{:02}",
                self.year, self.jday, self.hour, self.minute
            )
        } else {
            format!("{:04}-{:03}-{:02}", self.year, self.jday, self.hour)
        };
        if self.local {
            out.push(LOCAL_SUFFIX);
        }
        out
    }

    /// Year.
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Julian day of year (1-based).
    pub fn jday(&self) -> u32 {
        self.jday
    }

    /// Hour of day.
    pub fn hour(&self) -> u32 {
        self.hour
    }

    /// Minute of hour (zero when minutes are not encoded).
    pub fn minute(&self) -> u32 {
        self.minute
    }

    /// True for local times.
    pub fn is_local(&self) -> bool {
        self.local
    }

    /// True if minutes are encoded.
    pub fn has_minutes(&self) -> bool {
        self.has_minutes
    }

    /// Minutes from `self` to `other` (positive when `other` is later).
    ///
    /// Locality is ignored; both stamps are treated as wall-clock values.
    pub fn minutes_until(&self, other: &Timestamp) -> i64 {
        (other.to_datetime() - self.to_datetime()).num_minutes()
    }

    /// Returns this timestamp shifted by `minutes`, keeping its flags.
    pub fn add_minutes(&self, minutes: i64) -> Self {
        match Duration::try_minutes(minutes).and_then(|d| self.to_datetime().checked_add_signed(d))
        {
            Some(dt) => Self::from_datetime(dt, self.local, self.has_minutes),
            None => *self,
        }
    }

    /// Returns this timestamp shifted by whole hours, keeping its flags.
    pub fn add_hours(&self, hours: i64) -> Self {
        self.add_minutes(hours * 60)
    }

    /// Returns this timestamp with minutes encoded (`:00` added if absent).
    pub fn with_minutes(&self) -> Self {
        Self {
            has_minutes: true,
            ..*self
        }
    }

    /// Returns this timestamp without minutes, rounding to the nearest hour
    /// (30 minutes or more rounds up) or truncating.
    pub fn to_hours(&self, round: bool) -> Self {
        if !self.has_minutes {
            return *self;
        }
        let base = Self {
            minute: 0,
            has_minutes: false,
            ..*self
        };
        if round && self.minute >= 30 {
            base.add_hours(1)
        } else {
            base
        }
    }

    /// Normalizes a timestamp to a source's minutes convention.
    pub fn for_minutes_rule(&self, minutes_required: bool) -> Self {
        if minutes_required {
            self.with_minutes()
        } else {
            self.to_hours(true)
        }
    }

    /// Returns this timestamp with a different locality flag and no shift.
    pub fn with_local(&self, local: bool) -> Self {
        Self { local, ..*self }
    }

    /// Converts a GMT time to local time at longitude `lon` (degrees, +E).
    /// Local times are returned unchanged.
    pub fn to_local(&self, lon: f32) -> Self {
        if self.local {
            return *self;
        }
        self.add_hours(hours_from_gmt(lon)).with_local(true)
    }

    /// Converts a local time at longitude `lon` (degrees, +E) to GMT.
    /// GMT times are returned unchanged.
    pub fn to_gmt(&self, lon: f32) -> Self {
        if !self.local {
            return *self;
        }
        self.add_hours(-hours_from_gmt(lon)).with_local(false)
    }

    /// Compares two timestamps as instants.
    ///
    /// Local operands are shifted by `hours_from_gmt(lon)` hours, the same
    /// offset [`Timestamp::to_local`] adds to GMT times. This is not the
    /// inverse shift of [`Timestamp::to_gmt`]. GMT operands are compared as
    /// they are.
    pub fn compare(&self, other: &Timestamp, lon: f32) -> Ordering {
        let lhs = if self.local { self.add_hours(hours_from_gmt(lon)) } else { *self };
        let rhs = if other.local { other.add_hours(hours_from_gmt(lon)) } else { *other };
        lhs.minutes_until(&rhs).cmp(&0).reverse()
    }

    /// True if both timestamps have the same locality and the same instant.
    pub fn matches(&self, other: &Timestamp) -> bool {
        self.local == other.local && self.minutes_until(other) == 0
    }

    fn sort_key(&self) -> String {
        self.to_string()
    }
}

/// Equivalence of optional timestamps: two blanks match.
pub fn matching_tstamps(lhs: Option<&Timestamp>, rhs: Option<&Timestamp>) -> bool {
    match (lhs, rhs) {
        (None, None) => true,
        (Some(lhs), Some(rhs)) => lhs.matches(rhs),
        _ => false,
    }
}

/// Whole hours between local mean time at `lon` and GMT.
pub fn hours_from_gmt(lon: f32) -> i64 {
    (f64::from(lon) / 15.0).round() as i64
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}:{:03}:{:02}", self.year, self.jday, self.hour)?;
        if self.has_minutes {
            write!(f, ":{:02}", self.minute)?;
        }
        if self.local {
            write!(f, "{}", LOCAL_SUFFIX)?;
        }
        Ok(())
    }
}

impl FromStr for Timestamp {
    type Err = FieldStoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Canonical string order, the order in which stamps sort in a listing.
impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

fn parse_numbers(parts: &[&str]) -> Option<Vec<i64>> {
    parts
        .iter()
        .map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                None
            } else {
                part.parse::<i64>().ok()
            }
        })
        .collect()
}

fn to_i32(value: i64) -> Option<i32> {
    i32::try_from(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(text: &str) -> Timestamp {
        Timestamp::parse(text).unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(ts("1991:238:12").to_string(), "1991:238:12");
        assert_eq!(ts("1991:238:12:30").to_string(), "1991:238:12:30");
        assert_eq!(ts("1991:038:06L").to_string(), "1991:038:06L");
        assert!(ts("1991:238:12:30L").is_local());
        assert!(ts("1991:238:12:30L").has_minutes());
        assert!(Timestamp::parse("1991:367:12").is_err());
        assert!(Timestamp::parse("1991:238").is_err());
        assert!(Timestamp::parse("1991:238:12X").is_err());
        assert!(Timestamp::parse("").is_err());
    }

    #[test]
    fn test_interpret_formats() {
        let cases = [
            ("1991-238-12", "1991:238:12"),
            ("1991-238-12-30L", "1991:238:12:30L"),
            ("1991-238-12-30-90", "1991:238:12:31"),
            ("1991/08/26/12", "1991:238:12"),
            ("1991/08/26/12:15", "1991:238:12:15"),
            ("1991/238/12", "1991:238:12"),
            ("1991:238:24", "1991:239:00"),
            ("1991:365:23:60", "1992:001:00:00"),
        ];
        for (input, expected) in cases {
            let interpreted = Timestamp::interpret(input).unwrap();
            assert_eq!(interpreted.to_string(), expected, "input {}", input);
        }
        assert!(Timestamp::interpret("garbage").is_none());
        assert!(Timestamp::interpret("L").is_none());
    }

    #[test]
    fn test_metafile_string() {
        assert_eq!(ts("1991:238:12").metafile_string(), "1991-238-12");
        assert_eq!(ts("1991:238:12:05L").metafile_string(), "1991-238-12-05L");
    }

    #[test]
    fn test_minutes_and_hours() {
        assert_eq!(ts("1991:238:12").with_minutes().to_string(), "1991:238:12:00");
        assert_eq!(ts("1991:238:12:29").to_hours(true).to_string(), "1991:238:12");
        assert_eq!(ts("1991:238:12:30").to_hours(true).to_string(), "1991:238:13");
        assert_eq!(ts("1991:238:12:45").to_hours(false).to_string(), "1991:238:12");
        assert_eq!(ts("1991:365:23:40").to_hours(true).to_string(), "1992:001:00");
        assert_eq!(ts("1991:238:12:40").for_minutes_rule(false).to_string(), "1991:238:13");
        assert_eq!(ts("1991:238:12").for_minutes_rule(true).to_string(), "1991:238:12:00");
    }

    #[test]
    fn test_local_gmt_conversion() {
        // 75W is five hours behind GMT.
        let gmt = ts("1991:238:03");
        let local = gmt.to_local(-75.0);
        assert_eq!(local.to_string(), "1991:237:22L");
        assert_eq!(local.to_gmt(-75.0), gmt);
        assert_eq!(local.to_local(-75.0), local);
        assert_eq!(hours_from_gmt(-82.0), -5);
        assert_eq!(hours_from_gmt(7.4), 0);
        assert_eq!(hours_from_gmt(7.5), 1);
    }

    #[test]
    fn test_compare_and_match() {
        assert_eq!(ts("1991:238:12").compare(&ts("1991:238:13"), 0.0), Ordering::Less);
        assert_eq!(ts("1991:238:12:00").compare(&ts("1991:238:12"), 0.0), Ordering::Equal);
        assert!(ts("1991:238:12").matches(&ts("1991:238:12:00")));
        assert!(!ts("1991:238:12").matches(&ts("1991:238:12L")));
        assert!(matching_tstamps(None, None));
        assert!(!matching_tstamps(Some(&ts("1991:238:12")), None));
    }

    #[test]
    fn test_compare_shifts_local_operands() {
        // At 75W the local operand moves back five hours before comparing.
        let local = ts("1991:238:12L");
        assert_eq!(local.compare(&ts("1991:238:07"), -75.0), Ordering::Equal);
        assert_eq!(local.compare(&ts("1991:238:12"), -75.0), Ordering::Less);
        assert_eq!(ts("1991:238:07").compare(&local, -75.0), Ordering::Equal);
        assert_eq!(local.compare(&ts("1991:238:13L"), -75.0), Ordering::Less);
    }

    #[test]
    fn test_canonical_ordering() {
        let mut stamps = vec![
            ts("1991:238:12L"),
            ts("1991:238:12:30"),
            ts("1991:238:12"),
            ts("1990:365:23"),
        ];
        stamps.sort();
        let rendered: Vec<String> = stamps.iter().map(|s| s.to_string()).collect();
        assert_eq!(
            rendered,
            vec!["1990:365:23", "1991:238:12", "1991:238:12:30", "1991:238:12L"]
        );
    }
}
