// options.rs — Strongly typed proc options
//
// Moments (`:end:`, `:now:`, `:2014-01-01:`, `:5 minutes ago:`), durations
// (`:1s:`, `:10 minutes:`) and the option set the runaway analyzer reads
// from each operator: time bounds, trailing range, periodic window, limit.
//
// Preconditions: moment text has already had its `:` delimiters stripped.
// Postconditions: parse functions return `None` for text they do not accept.
// Failure modes: none (callers turn `None` into diagnostics).
// Side effects: none.

use std::fmt;
use std::time::Duration;

// ── Moments ─────────────────────────────────────────────────────────────────

/// A point in time as written in a time-bound option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Moment {
    /// `:end:` — the end of time; a source bounded by it never finishes.
    End,
    /// `:now:`
    Now,
    /// `:beginning:`
    Beginning,
    /// Absolute time in seconds since the Unix epoch (`:0:`, `:2014-01-01:`).
    Absolute(i64),
    /// `:<duration> ago:`
    Ago(Duration),
    /// A bare duration (`:1h:`) in moment position, relative to now.
    Offset(Duration),
}

impl Moment {
    pub fn parse(text: &str) -> Option<Moment> {
        let text = text.trim();
        match text {
            "end" => return Some(Moment::End),
            "now" => return Some(Moment::Now),
            "beginning" => return Some(Moment::Beginning),
            _ => {}
        }
        if let Some(rest) = text.strip_suffix("ago") {
            return parse_duration(rest).map(Moment::Ago);
        }
        if let Ok(secs) = text.parse::<i64>() {
            return Some(Moment::Absolute(secs));
        }
        if let Some(secs) = parse_iso_date(text) {
            return Some(Moment::Absolute(secs));
        }
        parse_duration(text).map(Moment::Offset)
    }
}

impl fmt::Display for Moment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Moment::End => write!(f, ":end:"),
            Moment::Now => write!(f, ":now:"),
            Moment::Beginning => write!(f, ":beginning:"),
            Moment::Absolute(secs) => write!(f, ":{secs}:"),
            Moment::Ago(d) => write!(f, ":{} ago:", format_duration(*d)),
            Moment::Offset(d) => write!(f, ":{}:", format_duration(*d)),
        }
    }
}

// ── Durations ───────────────────────────────────────────────────────────────

/// Parse a duration such as `1s`, `500ms`, `1.5h`, `10 minutes`.
pub fn parse_duration(text: &str) -> Option<Duration> {
    let text = text.trim();
    let unit_start = text.find(|c: char| c.is_alphabetic())?;
    let (num_str, unit) = text.split_at(unit_start);
    let num: f64 = num_str.trim().parse().ok()?;
    if !num.is_finite() || num < 0.0 {
        return None;
    }
    let millis_per_unit: f64 = match unit.trim() {
        "ms" | "millisecond" | "milliseconds" => 1.0,
        "s" | "second" | "seconds" => 1_000.0,
        "m" | "minute" | "minutes" => 60_000.0,
        "h" | "hour" | "hours" => 3_600_000.0,
        "d" | "day" | "days" => 86_400_000.0,
        "w" | "week" | "weeks" => 7.0 * 86_400_000.0,
        "M" | "month" | "months" => 30.0 * 86_400_000.0,
        "y" | "year" | "years" => 365.0 * 86_400_000.0,
        _ => return None,
    };
    Some(Duration::from_millis((num * millis_per_unit).round() as u64))
}

/// Render a duration in the largest whole unit (`1s`, `90s`, `2h`, `250ms`).
pub fn format_duration(d: Duration) -> String {
    let millis = d.as_millis();
    if millis % 1_000 != 0 {
        return format!("{millis}ms");
    }
    let secs = millis / 1_000;
    if secs != 0 && secs % 86_400 == 0 {
        format!("{}d", secs / 86_400)
    } else if secs != 0 && secs % 3_600 == 0 {
        format!("{}h", secs / 3_600)
    } else if secs != 0 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}

/// `YYYY-MM-DD`, optionally followed by `THH:MM[:SS]` and a trailing `Z`.
fn parse_iso_date(text: &str) -> Option<i64> {
    let text = text.strip_suffix('Z').unwrap_or(text);
    let (date, time) = match text.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (text, None),
    };

    let mut parts = date.split('-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next()?.parse().ok()?;
    let day: u32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }

    let mut secs_of_day = 0i64;
    if let Some(time) = time {
        let fields: Vec<&str> = time.split(':').collect();
        if !(2..=3).contains(&fields.len()) {
            return None;
        }
        let hh: i64 = fields[0].parse().ok()?;
        let mm: i64 = fields[1].parse().ok()?;
        let ss: i64 = match fields.get(2) {
            Some(s) => s.parse().ok()?,
            None => 0,
        };
        if !(0..24).contains(&hh) || !(0..60).contains(&mm) || !(0..60).contains(&ss) {
            return None;
        }
        secs_of_day = hh * 3_600 + mm * 60 + ss;
    }

    days_from_civil(i64::from(year), month, day)
        .checked_mul(86_400)?
        .checked_add(secs_of_day)
}

/// Days since 1970-01-01 for a proleptic Gregorian date.
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = (if y >= 0 { y } else { y - 399 }) / 400;
    let yoe = y - era * 400;
    let m = month as i64;
    let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

// ── Operator options ────────────────────────────────────────────────────────

/// Whether a source's upper time limit can be resolved to a fixed point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpperBound {
    /// Resolvable (explicit end, `:now:`, a trailing `-last`, or a `-limit`).
    Fixed,
    /// Open-ended (`-to :end:`).
    Open,
}

/// Options the analyzer consumes, already parsed by lowering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpOptions {
    pub from: Option<Moment>,
    pub to: Option<Moment>,
    pub last: Option<Duration>,
    pub every: Option<Duration>,
    pub limit: Option<u64>,
}

impl OpOptions {
    /// Upper time limit of a source. `-to` defaults to `:now:`.
    pub fn upper_bound(&self) -> UpperBound {
        if self.limit.is_some() || self.last.is_some() {
            return UpperBound::Fixed;
        }
        match self.to {
            Some(Moment::End) => UpperBound::Open,
            _ => UpperBound::Fixed,
        }
    }

    pub fn is_windowed(&self) -> bool {
        self.every.is_some()
    }

    pub fn is_empty(&self) -> bool {
        *self == OpOptions::default()
    }
}

impl fmt::Display for OpOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(m) = &self.from {
            parts.push(format!("-from {m}"));
        }
        if let Some(m) = &self.to {
            parts.push(format!("-to {m}"));
        }
        if let Some(d) = self.last {
            parts.push(format!("-last :{}:", format_duration(d)));
        }
        if let Some(d) = self.every {
            parts.push(format!("-every :{}:", format_duration(d)));
        }
        if let Some(n) = self.limit {
            parts.push(format!("-limit {n}"));
        }
        write!(f, "{}", parts.join(" "))
    }
}
