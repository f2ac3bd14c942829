//! # Time Resolver
//!
//! Turns a natural-language time expression plus a reference instant into an
//! exact timestamp. Pure: no clock reads, no I/O, no randomness.
//!
//! Expressions are scanned by an ordered rule table. Each rule claims the text
//! it matched so later rules cannot reinterpret it. When several date rules
//! match, the most specific one wins:
//!
//! ```text
//! absolute date > weekday + day-of-month > weekday > relative day word > bare day-of-month
//! ```
//!
//! A time-of-day applies on top of whichever date wins. Durations ("in 20
//! minutes") stand alone: combining one with a date or a time is ambiguous.
//!
//! ## Bare hours
//! An hour from 1 to 11 without a.m./p.m. is a guess, not a guarantee. With no
//! date in the expression it becomes the nearest future occurrence, preferring
//! the morning while the reference time is before `evening_split_hour` and the
//! evening after it. With a date, the same split picks a.m. or p.m. for that
//! day. Hours 0 and 12-23 are read on a 24-hour clock.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.2.0: Spanish aliases, month names, weekday + day-of-month search
//! - 1.1.0: Ordered rule table with precedence and ambiguity detection
//! - 1.0.0: Duration strings (30m, 2h, 1h30m)

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Weekday};
use log::{debug, error};
use regex::{Captures, Regex};
use std::ops::Range;
use std::sync::OnceLock;

use crate::core::error::{ReminderError, ReminderResult};

/// Calendar months searched forward for a weekday + day-of-month pair,
/// counting the reference month as zero
const WEEKDAY_DAY_SEARCH_MONTHS: u32 = 2;

/// Calendar months searched forward for a bare day-of-month
const DAY_OF_MONTH_SEARCH_MONTHS: u32 = 12;

/// Years searched forward for a date given without a year (29/02)
const YEARLESS_SEARCH_YEARS: i32 = 8;

/// Text used when nothing remains after removing the time expression
pub const DEFAULT_REMINDER_TEXT: &str = "reminder";

const WEEKDAYS: &str = "monday|tuesday|wednesday|thursday|friday|saturday|sunday|\
                        lunes|martes|miercoles|jueves|viernes|sabado|domingo";

const MONTHS: &str = "january|february|march|april|may|june|july|august|september|october|\
                      november|december|enero|febrero|marzo|abril|mayo|junio|julio|agosto|\
                      septiembre|setiembre|octubre|noviembre|diciembre";

/// Tunables of the resolver's heuristics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverPolicy {
    /// Time used when an expression names a day but no time
    pub default_time: NaiveTime,
    /// Reference hour from which a bare 1-11 hour is read as p.m.
    pub evening_split_hour: u32,
}

impl Default for ResolverPolicy {
    fn default() -> Self {
        ResolverPolicy {
            default_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            evening_split_hour: 12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
    /// Written with an `h`/`hs` suffix
    TwentyFour,
    Unspecified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TimeOfDay {
    hour: u32,
    minute: u32,
    meridiem: Meridiem,
}

impl TimeOfDay {
    /// Bare 1-11 hour that needs the a.m./p.m. heuristic
    fn is_bare(&self) -> bool {
        self.meridiem == Meridiem::Unspecified && (1..=11).contains(&self.hour)
    }

    fn hour24(&self) -> u32 {
        match self.meridiem {
            Meridiem::Am => self.hour % 12,
            Meridiem::Pm => self.hour % 12 + 12,
            Meridiem::TwentyFour | Meridiem::Unspecified => self.hour,
        }
    }
}

/// Date rules, declared from most to least specific
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateRule {
    Absolute {
        year: Option<i32>,
        month: u32,
        day: u32,
    },
    WeekdayDay {
        weekday: Weekday,
        day: u32,
    },
    Weekday(Weekday),
    RelativeDay(i64),
    DayOfMonth(u32),
}

impl DateRule {
    /// Lower is more specific
    fn rank(&self) -> u8 {
        match self {
            DateRule::Absolute { .. } => 0,
            DateRule::WeekdayDay { .. } => 1,
            DateRule::Weekday(_) => 2,
            DateRule::RelativeDay(_) => 3,
            DateRule::DayOfMonth(_) => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Component {
    In(Duration),
    Date(DateRule),
    Time(TimeOfDay),
}

/// One entry of the rule table
struct Rule {
    name: &'static str,
    pattern: fn() -> String,
    extract: fn(&Captures<'_>, &str) -> Option<Component>,
}

#[derive(Debug)]
struct Claim {
    rule: &'static str,
    component: Component,
    span: Range<usize>,
}

/// Rule table, in claim order. Durations and absolute dates go first so their
/// digits are not read as hours or days; times go before day words so
/// "de la mañana" is not read as "tomorrow".
static RULES: &[Rule] = &[
    Rule {
        name: "duration",
        pattern: || r"\b(?:in|en|dentro\s+de)\s+((?:\d+\s*[a-z]+\s*)+)".to_string(),
        extract: extract_duration,
    },
    Rule {
        name: "iso_date",
        pattern: || r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b".to_string(),
        extract: extract_iso_date,
    },
    Rule {
        name: "numeric_date",
        pattern: || r"\b(?:(?:on|el)\s+)?(\d{1,2})[/-](\d{1,2})(?:[/-](\d{4}|\d{2}))?\b".to_string(),
        extract: extract_numeric_date,
    },
    Rule {
        name: "day_month_name",
        pattern: || {
            format!(
                r"\b(?:(?:on\s+the|on|the|el)\s+)?(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+|de\s+)?({MONTHS})\b(?:,?\s+(?:de\s+)?(\d{{4}})\b)?"
            )
        },
        extract: extract_day_month_name,
    },
    Rule {
        name: "month_name_day",
        pattern: || {
            format!(r"\b(?:on\s+)?({MONTHS})\s+(\d{{1,2}})(?:st|nd|rd|th)?\b(?:,?\s+(\d{{4}})\b)?")
        },
        extract: extract_month_name_day,
    },
    Rule {
        name: "weekday_day",
        pattern: || {
            format!(
                r"\b(?:(?:on|next|this|el|este|proximo)\s+)?({WEEKDAYS})\s+(?:the\s+)?(\d{{1,2}})(?:st|nd|rd|th)?\b(\s*(?::|a\.m\.|p\.m\.|am\b|pm\b|hs?\b|de\s+la\b))?"
            )
        },
        extract: extract_weekday_day,
    },
    Rule {
        name: "time_of_day",
        pattern: || {
            r"\b(?:(at|a\s+las?)\s+)?(\d{1,2})(?::(\d{2}))?(?:\s*(a\.m\.|p\.m\.|(?:am|pm|hs|h|de\s+la\s+(?:manana|tarde|noche))\b)|\b)".to_string()
        },
        extract: extract_time,
    },
    Rule {
        name: "weekday",
        pattern: || {
            format!(r"\b(?:(?:on|next|this|el|este|proximo)\s+)?({WEEKDAYS})(?:\s+que\s+viene)?\b")
        },
        extract: extract_weekday,
    },
    Rule {
        name: "relative_day",
        pattern: || r"\b(day\s+after\s+tomorrow|pasado\s+manana|tomorrow|manana|today|hoy)\b".to_string(),
        extract: extract_relative_day,
    },
    Rule {
        name: "day_of_month",
        pattern: || r"\b(?:(on\s+the|on|the|el)\s+)?(\d{1,2})(st|nd|rd|th)?\b".to_string(),
        extract: extract_day_of_month,
    },
];

fn compiled_rules() -> &'static [(&'static Rule, Regex)] {
    static COMPILED: OnceLock<Vec<(&'static Rule, Regex)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .filter_map(|rule| match Regex::new(&(rule.pattern)()) {
                Ok(re) => Some((rule, re)),
                Err(e) => {
                    error!("Time rule {} failed to compile: {e}", rule.name);
                    None
                }
            })
            .collect()
    })
}

fn number(caps: &Captures<'_>, group: usize) -> Option<u32> {
    caps.get(group)?.as_str().parse().ok()
}

/// `Some(None)` when the group is absent, `None` when it is malformed
fn optional_year(caps: &Captures<'_>, group: usize) -> Option<Option<i32>> {
    match caps.get(group) {
        Some(y) => y.as_str().parse().ok().map(Some),
        None => Some(None),
    }
}

fn weekday_from(word: &str) -> Option<Weekday> {
    Some(match word {
        "monday" | "lunes" => Weekday::Mon,
        "tuesday" | "martes" => Weekday::Tue,
        "wednesday" | "miercoles" => Weekday::Wed,
        "thursday" | "jueves" => Weekday::Thu,
        "friday" | "viernes" => Weekday::Fri,
        "saturday" | "sabado" => Weekday::Sat,
        "sunday" | "domingo" => Weekday::Sun,
        _ => return None,
    })
}

fn month_number(word: &str) -> Option<u32> {
    Some(match word {
        "january" | "enero" => 1,
        "february" | "febrero" => 2,
        "march" | "marzo" => 3,
        "april" | "abril" => 4,
        "may" | "mayo" => 5,
        "june" | "junio" => 6,
        "july" | "julio" => 7,
        "august" | "agosto" => 8,
        "september" | "septiembre" | "setiembre" => 9,
        "october" | "octubre" => 10,
        "november" | "noviembre" => 11,
        "december" | "diciembre" => 12,
        _ => return None,
    })
}

fn unit_seconds(unit: &str) -> Option<i64> {
    Some(match unit {
        "s" | "sec" | "secs" | "second" | "seconds" | "segundo" | "segundos" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" | "minuto" | "minutos" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" | "hora" | "horas" => 60 * 60,
        "d" | "day" | "days" | "dia" | "dias" => 60 * 60 * 24,
        "w" | "week" | "weeks" | "semana" | "semanas" => 60 * 60 * 24 * 7,
        _ => return None,
    })
}

fn extract_iso_date(caps: &Captures<'_>, _whole: &str) -> Option<Component> {
    Some(Component::Date(DateRule::Absolute {
        year: Some(caps.get(1)?.as_str().parse().ok()?),
        month: number(caps, 2)?,
        day: number(caps, 3)?,
    }))
}

/// Day first: 20/12, 20-12-2026, 5/1/27
fn extract_numeric_date(caps: &Captures<'_>, _whole: &str) -> Option<Component> {
    let year = match caps.get(3) {
        Some(y) if y.as_str().len() == 2 => Some(2000 + y.as_str().parse::<i32>().ok()?),
        Some(y) => Some(y.as_str().parse::<i32>().ok()?),
        None => None,
    };
    Some(Component::Date(DateRule::Absolute {
        year,
        month: number(caps, 2)?,
        day: number(caps, 1)?,
    }))
}

fn extract_day_month_name(caps: &Captures<'_>, _whole: &str) -> Option<Component> {
    Some(Component::Date(DateRule::Absolute {
        year: optional_year(caps, 3)?,
        month: month_number(caps.get(2)?.as_str())?,
        day: number(caps, 1)?,
    }))
}

fn extract_month_name_day(caps: &Captures<'_>, _whole: &str) -> Option<Component> {
    Some(Component::Date(DateRule::Absolute {
        year: optional_year(caps, 3)?,
        month: month_number(caps.get(1)?.as_str())?,
        day: number(caps, 2)?,
    }))
}

fn extract_weekday_day(caps: &Captures<'_>, _whole: &str) -> Option<Component> {
    // "monday 9am" is a weekday and a time, not a day of the month
    if caps.get(3).is_some() {
        return None;
    }
    Some(Component::Date(DateRule::WeekdayDay {
        weekday: weekday_from(caps.get(1)?.as_str())?,
        day: number(caps, 2)?,
    }))
}

fn extract_weekday(caps: &Captures<'_>, _whole: &str) -> Option<Component> {
    Some(Component::Date(DateRule::Weekday(weekday_from(
        caps.get(1)?.as_str(),
    )?)))
}

fn extract_relative_day(caps: &Captures<'_>, _whole: &str) -> Option<Component> {
    let word = caps.get(1)?.as_str();
    let offset = if word.starts_with("day") || word.starts_with("pasado") {
        2
    } else if word == "tomorrow" || word == "manana" {
        1
    } else {
        0
    };
    Some(Component::Date(DateRule::RelativeDay(offset)))
}

fn extract_day_of_month(caps: &Captures<'_>, whole: &str) -> Option<Component> {
    let day = number(caps, 2)?;
    // A lone number is only a day when marked as one, or when it is the whole
    // expression
    let marked = caps.get(1).is_some() || caps.get(3).is_some();
    if !marked && whole.trim() != caps.get(2)?.as_str() {
        return None;
    }
    Some(Component::Date(DateRule::DayOfMonth(day)))
}

/// Parse "30 minutes", "2h", "1h30m" into a duration; every unit must be known
fn extract_duration(caps: &Captures<'_>, _whole: &str) -> Option<Component> {
    static PIECE: OnceLock<Option<Regex>> = OnceLock::new();
    let piece = PIECE
        .get_or_init(|| Regex::new(r"(\d+)\s*([a-z]+)").ok())
        .as_ref()?;

    let mut total_seconds: i64 = 0;
    for part in piece.captures_iter(caps.get(1)?.as_str()) {
        let value: i64 = part.get(1)?.as_str().parse().ok()?;
        let unit = unit_seconds(part.get(2)?.as_str())?;
        total_seconds = total_seconds.checked_add(value.checked_mul(unit)?)?;
    }

    if total_seconds > 0 {
        Duration::try_seconds(total_seconds).map(Component::In)
    } else {
        None
    }
}

fn extract_time(caps: &Captures<'_>, _whole: &str) -> Option<Component> {
    let prefixed = caps.get(1).is_some();
    let hour = number(caps, 2)?;
    let minute = match caps.get(3) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    let suffix = caps.get(4).map(|m| m.as_str());

    // A lone number is not a time
    if !prefixed && caps.get(3).is_none() && suffix.is_none() {
        return None;
    }

    let meridiem = match suffix {
        Some("am") | Some("a.m.") => Meridiem::Am,
        Some("pm") | Some("p.m.") => Meridiem::Pm,
        Some("h") | Some("hs") => Meridiem::TwentyFour,
        Some(s) if s.ends_with("manana") => Meridiem::Am,
        Some(_) => Meridiem::Pm,
        None => Meridiem::Unspecified,
    };

    let valid_hour = match meridiem {
        Meridiem::Am | Meridiem::Pm => (1..=12).contains(&hour),
        _ => hour <= 23,
    };
    if !valid_hour || minute > 59 {
        return None;
    }

    Some(Component::Time(TimeOfDay {
        hour,
        minute,
        meridiem,
    }))
}

fn fold_char(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'Á' | 'À' | 'Ä' | 'Â' => 'a',
        'é' | 'è' | 'ë' | 'ê' | 'É' | 'È' | 'Ë' | 'Ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' | 'Í' | 'Ì' | 'Ï' | 'Î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'Ó' | 'Ò' | 'Ö' | 'Ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' | 'Ú' | 'Ù' | 'Ü' | 'Û' => 'u',
        'ñ' | 'Ñ' => 'n',
        _ => {
            let mut lower = c.to_lowercase();
            match (lower.next(), lower.next()) {
                (Some(l), None) => l,
                _ => c,
            }
        }
    }
}

/// Lowercased, accent-free copy of an expression that remembers where each
/// byte came from in the original
struct Normalized {
    text: String,
    origin: Vec<usize>,
}

impl Normalized {
    fn new(original: &str) -> Self {
        let mut text = String::with_capacity(original.len());
        let mut origin = Vec::with_capacity(original.len() + 1);
        for (offset, c) in original.char_indices() {
            let folded = fold_char(c);
            for _ in 0..folded.len_utf8() {
                origin.push(offset);
            }
            text.push(folded);
        }
        origin.push(original.len());
        Normalized { text, origin }
    }

    fn original_range(&self, span: &Range<usize>) -> Range<usize> {
        self.origin[span.start]..self.origin[span.end]
    }
}

fn add_months(year: i32, month: u32, months: u32) -> (i32, u32) {
    let zero_based = month - 1 + months;
    (year + (zero_based / 12) as i32, zero_based % 12 + 1)
}

/// Resolves time expressions against a reference instant
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeResolver {
    policy: ResolverPolicy,
}

impl TimeResolver {
    pub fn new(policy: ResolverPolicy) -> Self {
        TimeResolver { policy }
    }

    pub fn policy(&self) -> &ResolverPolicy {
        &self.policy
    }

    /// Resolve `expression` relative to `now`, in `now`'s timezone
    pub fn resolve<Tz: TimeZone>(
        &self,
        expression: &str,
        now: &DateTime<Tz>,
    ) -> ReminderResult<DateTime<Tz>> {
        let normalized = Normalized::new(expression);
        let claims = Self::scan(&normalized.text);
        self.evaluate(expression, &claims, now)
    }

    /// Resolve the time expression inside `text` and return it with the rest of
    /// the text, e.g. "tomorrow at 18:00 buy milk" -> (…, "buy milk")
    pub fn split_expression<Tz: TimeZone>(
        &self,
        text: &str,
        now: &DateTime<Tz>,
    ) -> ReminderResult<(DateTime<Tz>, String)> {
        let normalized = Normalized::new(text);
        let claims = Self::scan(&normalized.text);
        let due_at = self.evaluate(text, &claims, now)?;

        let mut spans: Vec<Range<usize>> = claims
            .iter()
            .map(|claim| normalized.original_range(&claim.span))
            .collect();
        spans.sort_by_key(|span| span.start);

        let mut rest = String::with_capacity(text.len());
        let mut cursor = 0;
        for span in spans {
            rest.push_str(&text[cursor..span.start]);
            rest.push(' ');
            cursor = span.end;
        }
        rest.push_str(&text[cursor..]);

        Ok((due_at, clean_remainder(&rest)))
    }

    fn scan(text: &str) -> Vec<Claim> {
        let mut claims: Vec<Claim> = Vec::new();
        for (rule, re) in compiled_rules() {
            for caps in re.captures_iter(text) {
                let Some(whole) = caps.get(0) else { continue };
                let span = whole.start()..whole.end();
                if claims
                    .iter()
                    .any(|c| c.span.start < span.end && span.start < c.span.end)
                {
                    continue;
                }
                if let Some(component) = (rule.extract)(&caps, text) {
                    debug!("Time rule {} matched {:?}", rule.name, whole.as_str());
                    claims.push(Claim {
                        rule: rule.name,
                        component,
                        span,
                    });
                }
            }
        }
        claims
    }

    fn evaluate<Tz: TimeZone>(
        &self,
        expression: &str,
        claims: &[Claim],
        now: &DateTime<Tz>,
    ) -> ReminderResult<DateTime<Tz>> {
        if claims.is_empty() {
            return Err(ReminderError::unparseable(
                expression,
                "no date, time or duration recognised",
            ));
        }

        let durations: Vec<Duration> = claims
            .iter()
            .filter_map(|c| match c.component {
                Component::In(d) => Some(d),
                _ => None,
            })
            .collect();
        if let Some(first) = durations.first() {
            if claims.len() > 1 {
                let others: Vec<&str> = claims.iter().map(|c| c.rule).collect();
                return Err(ReminderError::ambiguous(
                    expression,
                    format!("a duration cannot be combined with other parts ({})", others.join(", ")),
                ));
            }
            // Exact offset; no rounding
            return now
                .clone()
                .checked_add_signed(*first)
                .ok_or_else(|| ReminderError::unparseable(expression, "too far in the future"));
        }

        let times = distinct(claims.iter().filter_map(|c| match c.component {
            Component::Time(t) => Some(t),
            _ => None,
        }));
        if times.len() > 1 {
            return Err(ReminderError::ambiguous(expression, "more than one time of day"));
        }
        let time = times.first().copied();

        let dates = claims.iter().filter_map(|c| match c.component {
            Component::Date(d) => Some(d),
            _ => None,
        });
        let winning_rank = dates.clone().map(|d| d.rank()).min();
        let winners = distinct(dates.filter(|d| Some(d.rank()) == winning_rank));
        if winners.len() > 1 {
            return Err(ReminderError::ambiguous(
                expression,
                "names more than one date of the same kind",
            ));
        }

        let resolved = match (winners.first(), time) {
            (Some(date), time) => self.resolve_date(expression, *date, time, now)?,
            (None, Some(time)) => self.resolve_time_only(time, now),
            (None, None) => None,
        };
        resolved.ok_or_else(|| {
            ReminderError::unparseable(expression, "the date does not exist in this calendar or timezone")
        })
    }

    /// Wall-clock time for a named day
    fn time_on_day<Tz: TimeZone>(&self, time: Option<TimeOfDay>, now: &DateTime<Tz>) -> Option<NaiveTime> {
        let Some(time) = time else {
            return Some(self.policy.default_time);
        };
        let hour = if time.is_bare() {
            if now.hour() < self.policy.evening_split_hour {
                time.hour
            } else {
                time.hour + 12
            }
        } else {
            time.hour24()
        };
        NaiveTime::from_hms_opt(hour, time.minute, 0)
    }

    fn resolve_time_only<Tz: TimeZone>(&self, time: TimeOfDay, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let today = now.date_naive();
        let tomorrow = today.succ_opt()?;

        let candidates: Vec<(NaiveDate, u32)> = if time.is_bare() {
            if now.hour() < self.policy.evening_split_hour {
                vec![(today, time.hour), (today, time.hour + 12), (tomorrow, time.hour)]
            } else {
                vec![(today, time.hour + 12), (tomorrow, time.hour)]
            }
        } else {
            vec![(today, time.hour24()), (tomorrow, time.hour24())]
        };

        candidates.into_iter().find_map(|(date, hour)| {
            let at = localize(&now.timezone(), date, NaiveTime::from_hms_opt(hour, time.minute, 0)?)?;
            (at > *now).then_some(at)
        })
    }

    fn resolve_date<Tz: TimeZone>(
        &self,
        expression: &str,
        date: DateRule,
        time: Option<TimeOfDay>,
        now: &DateTime<Tz>,
    ) -> ReminderResult<Option<DateTime<Tz>>> {
        let tz = now.timezone();
        let Some(at) = self.time_on_day(time, now) else {
            return Ok(None);
        };
        let today = now.date_naive();
        let future = |d: NaiveDate| localize(&tz, d, at).filter(|instant| *instant > *now);

        let resolved = match date {
            DateRule::Absolute {
                year: Some(year),
                month,
                day,
            } => NaiveDate::from_ymd_opt(year, month, day).and_then(|d| localize(&tz, d, at)),

            DateRule::Absolute {
                year: None,
                month,
                day,
            } => (0..YEARLESS_SEARCH_YEARS).find_map(|offset| {
                NaiveDate::from_ymd_opt(today.year() + offset, month, day).and_then(&future)
            }),

            DateRule::WeekdayDay { weekday, day } => {
                let found = (0..=WEEKDAY_DAY_SEARCH_MONTHS).find_map(|offset| {
                    let (year, month) = add_months(today.year(), today.month(), offset);
                    NaiveDate::from_ymd_opt(year, month, day)
                        .filter(|d| d.weekday() == weekday)
                        .and_then(&future)
                });
                if found.is_none() {
                    return Err(ReminderError::unparseable(
                        expression,
                        format!("no {weekday} the {day} within the next two months"),
                    ));
                }
                found
            }

            DateRule::Weekday(weekday) => {
                let ahead = (7 + weekday.num_days_from_monday() as i64
                    - today.weekday().num_days_from_monday() as i64)
                    % 7;
                let candidate = today + Duration::days(ahead);
                future(candidate).or_else(|| localize(&tz, candidate + Duration::days(7), at))
            }

            DateRule::RelativeDay(offset) => localize(&tz, today + Duration::days(offset), at),

            DateRule::DayOfMonth(day) => (0..DAY_OF_MONTH_SEARCH_MONTHS).find_map(|offset| {
                let (year, month) = add_months(today.year(), today.month(), offset);
                NaiveDate::from_ymd_opt(year, month, day).and_then(&future)
            }),
        };
        Ok(resolved)
    }
}

fn localize<Tz: TimeZone>(tz: &Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&date.and_time(time)).earliest()
}

fn distinct<T: PartialEq>(items: impl Iterator<Item = T>) -> Vec<T> {
    let mut unique: Vec<T> = Vec::new();
    for item in items {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    unique
}

/// Strip connector words left behind after removing the time expression
fn clean_remainder(rest: &str) -> String {
    const LEADING: &[&str] = &["to", "that", "about", "que", "de", "para", "-", ",", ":"];

    let mut words: Vec<&str> = rest.split_whitespace().collect();
    while let Some(first) = words.first() {
        if LEADING.contains(&first.to_lowercase().as_str()) {
            words.remove(0);
        } else {
            break;
        }
    }
    let joined = words.join(" ");
    let trimmed = joined.trim_matches(|c: char| c == ',' || c == '-' || c.is_whitespace());
    if trimmed.is_empty() {
        DEFAULT_REMINDER_TEXT.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Resolve with the default policy
pub fn resolve<Tz: TimeZone>(expression: &str, now: &DateTime<Tz>) -> ReminderResult<DateTime<Tz>> {
    TimeResolver::default().resolve(expression, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn tz() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).unwrap()
    }

    /// Local wall-clock instant at -03:00
    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<FixedOffset> {
        tz().with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    /// Friday 2026-10-16 at the given local time
    fn friday(h: u32, mi: u32) -> DateTime<FixedOffset> {
        local(2026, 10, 16, h, mi)
    }

    fn ok(expr: &str, now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        resolve(expr, &now).unwrap_or_else(|e| panic!("{expr}: {e}"))
    }

    #[test]
    fn test_all_rules_compile() {
        assert_eq!(compiled_rules().len(), RULES.len());
    }

    #[test]
    fn test_relative_day_words() {
        assert_eq!(ok("tomorrow", friday(10, 0)), local(2026, 10, 17, 9, 0));
        assert_eq!(
            ok("day after tomorrow at 18:00", friday(10, 0)),
            local(2026, 10, 18, 18, 0)
        );
        assert_eq!(ok("today at 11:30", friday(10, 0)), local(2026, 10, 16, 11, 30));
        assert_eq!(ok("mañana a las 18", friday(10, 0)), local(2026, 10, 17, 18, 0));
        assert_eq!(ok("pasado mañana", friday(10, 0)), local(2026, 10, 18, 9, 0));
    }

    #[test]
    fn test_relative_day_crosses_month_in_caller_timezone() {
        // 01:30 UTC on Nov 1 is still Oct 31 at -03:00
        let now = local(2026, 10, 31, 22, 30);
        assert_eq!(ok("tomorrow", now), local(2026, 11, 1, 9, 0));
    }

    #[test]
    fn test_bare_weekday_is_next_occurrence() {
        assert_eq!(ok("monday", friday(10, 0)), local(2026, 10, 19, 9, 0));
        assert_eq!(ok("el lunes", friday(10, 0)), local(2026, 10, 19, 9, 0));
        // Same weekday: only today if the implied time is still ahead
        assert_eq!(ok("friday", friday(10, 0)), local(2026, 10, 23, 9, 0));
        assert_eq!(ok("friday", friday(8, 0)), local(2026, 10, 16, 9, 0));
        assert_eq!(ok("friday at 18:00", friday(10, 0)), local(2026, 10, 16, 18, 0));
    }

    #[test]
    fn test_bare_day_of_month() {
        assert_eq!(ok("15", friday(10, 0)), local(2026, 11, 15, 9, 0));
        assert_eq!(ok("the 20th", friday(10, 0)), local(2026, 10, 20, 9, 0));
        assert_eq!(ok("el 16", friday(8, 0)), local(2026, 10, 16, 9, 0));
        // November has no 31st, skip to December
        assert_eq!(ok("on the 31st", local(2026, 10, 31, 12, 0)), local(2026, 12, 31, 9, 0));
    }

    #[test]
    fn test_weekday_with_day_of_month() {
        // Same month
        assert_eq!(ok("thursday 29", friday(10, 0)), local(2026, 10, 29, 9, 0));
        // Across the month boundary
        assert_eq!(ok("monday 30", friday(10, 0)), local(2026, 11, 30, 9, 0));
        assert_eq!(ok("martes 29", friday(10, 0)), local(2026, 12, 29, 9, 0));
        // Next monday 29 is March 2027, outside the window
        assert!(matches!(
            resolve("monday 29", &friday(10, 0)),
            Err(ReminderError::Unparseable { .. })
        ));
    }

    #[test]
    fn test_weekday_followed_by_time_is_not_day_of_month() {
        assert_eq!(ok("monday 9am", friday(10, 0)), local(2026, 10, 19, 9, 0));
        assert_eq!(ok("monday 7:15", friday(8, 0)), local(2026, 10, 19, 7, 15));
    }

    #[test]
    fn test_bare_hour_heuristic_without_date() {
        assert_eq!(ok("at 9", friday(7, 0)), local(2026, 10, 16, 9, 0));
        // Morning reference, 9 a.m. passed: the evening is nearest
        assert_eq!(ok("at 9", friday(10, 0)), local(2026, 10, 16, 21, 0));
        assert_eq!(ok("at 9", friday(15, 0)), local(2026, 10, 16, 21, 0));
        assert_eq!(ok("at 9", friday(22, 0)), local(2026, 10, 17, 9, 0));
        assert_eq!(ok("a las 3", friday(13, 0)), local(2026, 10, 16, 15, 0));
    }

    #[test]
    fn test_bare_hour_heuristic_with_date() {
        assert_eq!(ok("tomorrow at 9", friday(8, 0)), local(2026, 10, 17, 9, 0));
        assert_eq!(ok("tomorrow at 9", friday(15, 0)), local(2026, 10, 17, 21, 0));
    }

    #[test]
    fn test_explicit_meridiem_and_24h_are_literal() {
        assert_eq!(ok("at 9pm", friday(7, 0)), local(2026, 10, 16, 21, 0));
        assert_eq!(ok("at 9 am", friday(15, 0)), local(2026, 10, 17, 9, 0));
        assert_eq!(ok("tomorrow 12am", friday(15, 0)), local(2026, 10, 17, 0, 0));
        assert_eq!(ok("18hs", friday(10, 0)), local(2026, 10, 16, 18, 0));
        assert_eq!(ok("at 0", friday(10, 0)), local(2026, 10, 17, 0, 0));
        assert_eq!(
            ok("tomorrow 8 de la noche", friday(10, 0)),
            local(2026, 10, 17, 20, 0)
        );
    }

    #[test]
    fn test_durations_are_exact() {
        let now = tz().with_ymd_and_hms(2026, 10, 16, 10, 0, 17).unwrap();
        assert_eq!(ok("in 30 minutes", now), now + Duration::minutes(30));
        assert_eq!(ok("in 2 hours", now), now + Duration::hours(2));
        assert_eq!(ok("in 1h30m", now), now + Duration::minutes(90));
        assert_eq!(ok("en 3 dias", now), now + Duration::days(3));
    }

    #[test]
    fn test_oversized_durations_fail_cleanly() {
        for expr in [
            "in 99999999 weeks",
            "in 99999999999 weeks",
            "in 9999999999999999 seconds",
            "in 99999999999999999999 days",
        ] {
            let err = resolve(expr, &friday(10, 0)).unwrap_err();
            assert!(err.needs_clarification(), "{expr}: {err}");
        }

        assert!(TimeResolver::default()
            .split_expression("call mom in 99999999 weeks", &friday(10, 0))
            .is_err());
    }

    #[test]
    fn test_absolute_dates() {
        assert_eq!(ok("20/12", friday(10, 0)), local(2026, 12, 20, 9, 0));
        // Already passed this year
        assert_eq!(ok("10/10", friday(10, 0)), local(2027, 10, 10, 9, 0));
        assert_eq!(ok("29/02", friday(10, 0)), local(2028, 2, 29, 9, 0));
        assert_eq!(
            ok("2027-01-05 14:30", friday(10, 0)),
            local(2027, 1, 5, 14, 30)
        );
        assert_eq!(ok("5/1/27 at 14:30", friday(10, 0)), local(2027, 1, 5, 14, 30));
        assert_eq!(ok("december 24", friday(10, 0)), local(2026, 12, 24, 9, 0));
        assert_eq!(ok("3 de marzo", friday(10, 0)), local(2027, 3, 3, 9, 0));
    }

    #[test]
    fn test_invalid_dates_fail() {
        assert!(resolve("31/02/2027", &friday(10, 0)).is_err());
        assert!(resolve("at 25:00", &friday(10, 0)).is_err());
    }

    #[test]
    fn test_precedence_most_specific_wins() {
        // absolute date > relative day word
        assert_eq!(ok("tomorrow 20/12", friday(10, 0)), local(2026, 12, 20, 9, 0));
        // weekday > relative day word
        assert_eq!(ok("tomorrow monday", friday(10, 0)), local(2026, 10, 19, 9, 0));
        // weekday + day-of-month > weekday
        assert_eq!(ok("monday 30 or monday", friday(10, 0)), local(2026, 11, 30, 9, 0));
        // relative day word > bare day-of-month
        assert_eq!(ok("tomorrow the 25th", friday(10, 0)), local(2026, 10, 17, 9, 0));
    }

    #[test]
    fn test_ambiguous_expressions() {
        for expr in [
            "monday or friday",
            "in 5 minutes tomorrow",
            "at 9 or at 10",
            "20/12 or 21/12",
        ] {
            assert!(
                matches!(resolve(expr, &friday(10, 0)), Err(ReminderError::Ambiguous { .. })),
                "{expr}"
            );
        }
    }

    #[test]
    fn test_unparseable_expressions() {
        for expr in ["", "whenever", "soon-ish", "buy 2 apples"] {
            let err = resolve(expr, &friday(10, 0)).unwrap_err();
            assert!(matches!(err, ReminderError::Unparseable { .. }), "{expr}");
            assert!(err.needs_clarification());
        }
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let now = friday(10, 0);
        for expr in ["monday 30", "at 9", "in 45 minutes", "15", "tomorrow at 7pm"] {
            assert_eq!(resolve(expr, &now).unwrap(), resolve(expr, &now).unwrap());
        }
    }

    #[test]
    fn test_split_keeps_original_text() {
        let resolver = TimeResolver::default();
        let (due, text) = resolver
            .split_expression("tomorrow at 18:00 buy milk", &friday(10, 0))
            .unwrap();
        assert_eq!(due, local(2026, 10, 17, 18, 0));
        assert_eq!(text, "buy milk");

        let (due, text) = resolver
            .split_expression("Llamar a Mamá mañana a las 18", &friday(10, 0))
            .unwrap();
        assert_eq!(due, local(2026, 10, 17, 18, 0));
        assert_eq!(text, "Llamar a Mamá");

        let (_, text) = resolver.split_expression("in 10 minutes", &friday(10, 0)).unwrap();
        assert_eq!(text, DEFAULT_REMINDER_TEXT);
    }

    #[test]
    fn test_custom_policy() {
        let resolver = TimeResolver::new(ResolverPolicy {
            default_time: NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
            evening_split_hour: 18,
        });
        assert_eq!(
            resolver.resolve("tomorrow", &friday(10, 0)).unwrap(),
            local(2026, 10, 17, 8, 30)
        );
        // Before 18:00 the morning is preferred for a named day
        assert_eq!(
            resolver.resolve("tomorrow at 9", &friday(15, 0)).unwrap(),
            local(2026, 10, 17, 9, 0)
        );
    }
}
