//! Loose date parsing and the inclusive date interval

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Build a calendar date; out-of-range day/month values roll over into
/// neighbouring months (31.02 lands in March, day 0 is the previous month's last day).
fn calendar_date(year: i64, month: i64, day: i64) -> Option<NaiveDate> {
    let months = year * 12 + (month - 1);
    let year = i32::try_from(months.div_euclid(12)).ok()?;
    let month = u32::try_from(months.rem_euclid(12) + 1).ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)?.checked_add_signed(Duration::days(day - 1))
}

/// `D.M.YYYY`, separators `.`, `-` or `/`, one or two digit day and month
fn parse_day_first(s: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = s.split(|c: char| matches!(c, '.' | '-' | '/')).collect();
    let (day, month, year) = match parts.as_slice() {
        [day, month, year] => (*day, *month, *year),
        _ => return None,
    };

    let short = |p: &str| all_digits(p) && p.len() <= 2;
    if !short(day) || !short(month) || !(all_digits(year) && year.len() == 4) {
        return None;
    }

    calendar_date(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

/// `YYYY-MM-DD`
fn parse_iso(s: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = s.split('-').collect();
    let (year, month, day) = match parts.as_slice() {
        [year, month, day] => (*year, *month, *day),
        _ => return None,
    };

    if !(all_digits(year) && year.len() == 4)
        || !(all_digits(month) && month.len() == 2)
        || !(all_digits(day) && day.len() == 2)
    {
        return None;
    }

    calendar_date(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

/// Parse a loosely formatted date. Anything after the first space (a
/// time-of-day suffix, usually) is dropped. Returns `None` when no format fits.
pub fn parse_date_loose(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    let s = match s.find(' ') {
        Some(idx) => &s[..idx],
        None => s,
    };
    if s.is_empty() {
        return None;
    }

    parse_day_first(s).or_else(|| parse_iso(s))
}

/// Progressive `DD.MM.YYYY` formatting of typed input: keeps at most eight digits
pub fn autoformat_date_input(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).take(8).collect();

    match digits.len() {
        0..=2 => digits,
        3..=4 => format!("{}.{}", &digits[..2], &digits[2..]),
        _ => format!("{}.{}.{}", &digits[..2], &digits[2..4], &digits[4..]),
    }
}

/// Inclusive date interval; either bound may be open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    from: Option<NaiveDateTime>,
    to: Option<NaiveDateTime>,
}

impl DateRange {
    /// `from` snaps to start of day, `to` to the last millisecond of its day
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
        Self {
            from: from.map(|d| d.and_time(NaiveTime::MIN)),
            to: to.map(|d| d.and_time(end_of_day)),
        }
    }

    /// Build from raw widget text; a bound that does not parse stays open
    pub fn from_inputs(from: Option<&str>, to: Option<&str>) -> Self {
        Self::new(
            from.and_then(parse_date_loose),
            to.and_then(parse_date_loose),
        )
    }

    pub fn from(&self) -> Option<NaiveDateTime> {
        self.from
    }

    pub fn to(&self) -> Option<NaiveDateTime> {
        self.to
    }

    pub fn is_active(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        let at = date.and_time(NaiveTime::MIN);
        if let Some(from) = self.from {
            if at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if at > to {
                return false;
            }
        }
        true
    }

    /// Fail-open: absent or unparseable dates always match
    pub fn matches(&self, found_at: Option<&str>) -> bool {
        if !self.is_active() {
            return true;
        }
        match found_at.and_then(parse_date_loose) {
            Some(date) => self.contains(date),
            None => true,
        }
    }
}
