//! Human date expressions for due dates.
//!
//! Understands relative words (`today`, `tomorrow`, `friday`, `next week`),
//! offsets (`in 3 days`, `+2w`) and absolute dates (`2024-05-01`,
//! `01.05.2024`), each optionally followed by a time (`14:30`, `at 9:00`).

use chrono::{DateTime, Datelike, Days, Local, Months, NaiveDate, NaiveTime, TimeZone, Weekday};
use regex::Regex;
use std::sync::OnceLock;

/// A parsed expression; `time` is `None` when only a day was given
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanDate {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("hard-coded date pattern compiles"))
}

fn time_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^(?:(.*?)\s+)?(?:at\s+)?(\d{1,2}):(\d{2})$")
}

fn offset() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^(?:in\s+(\d+)\s*(day|days|week|weeks|month|months)|\+(\d+)([dwm]))$")
}

fn iso_date() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^(\d{4})-(\d{1,2})-(\d{1,2})$")
}

fn dotted_date() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^(\d{1,2})\.(\d{1,2})\.(\d{4})$")
}

fn weekday(name: &str) -> Option<Weekday> {
    let weekday = match name {
        "mon" | "monday" => Weekday::Mon,
        "tue" | "tues" | "tuesday" => Weekday::Tue,
        "wed" | "wednesday" => Weekday::Wed,
        "thu" | "thur" | "thurs" | "thursday" => Weekday::Thu,
        "fri" | "friday" => Weekday::Fri,
        "sat" | "saturday" => Weekday::Sat,
        "sun" | "sunday" => Weekday::Sun,
        _ => return None,
    };
    Some(weekday)
}

/// Next date after `today` falling on `target`; today itself never matches
fn next_weekday(today: NaiveDate, target: Weekday) -> Option<NaiveDate> {
    let current = today.weekday().num_days_from_monday();
    let wanted = target.num_days_from_monday();
    let ahead = (wanted + 7 - current) % 7;
    let ahead = if ahead == 0 { 7 } else { ahead };
    today.checked_add_days(Days::new(u64::from(ahead)))
}

fn shift(today: NaiveDate, amount: u64, unit: &str) -> Option<NaiveDate> {
    match unit.chars().next()? {
        'd' => today.checked_add_days(Days::new(amount)),
        'w' => today.checked_add_days(Days::new(amount.checked_mul(7)?)),
        'm' => today.checked_add_months(Months::new(u32::try_from(amount).ok()?)),
        _ => None,
    }
}

fn parse_day(expr: &str, today: NaiveDate) -> Option<NaiveDate> {
    match expr {
        "" | "today" | "now" => return Some(today),
        "tomorrow" => return today.succ_opt(),
        "yesterday" => return today.pred_opt(),
        "next week" => return today.checked_add_days(Days::new(7)),
        "next month" => return today.checked_add_months(Months::new(1)),
        _ => {}
    }

    let day_name = expr.strip_prefix("next ").unwrap_or(expr);
    if let Some(target) = weekday(day_name) {
        return next_weekday(today, target);
    }

    if let Some(caps) = offset().captures(expr) {
        let (amount, unit) = match (caps.get(1), caps.get(2)) {
            (Some(amount), Some(unit)) => (amount.as_str(), unit.as_str()),
            _ => (caps.get(3)?.as_str(), caps.get(4)?.as_str()),
        };
        return shift(today, amount.parse().ok()?, unit);
    }

    if let Some(caps) = iso_date().captures(expr) {
        return NaiveDate::from_ymd_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?);
    }

    if let Some(caps) = dotted_date().captures(expr) {
        return NaiveDate::from_ymd_opt(caps[3].parse().ok()?, caps[2].parse().ok()?, caps[1].parse().ok()?);
    }

    None
}

/// Parse `input` relative to `today`
pub fn parse_human_date(input: &str, today: NaiveDate) -> Option<HumanDate> {
    let expr = input.trim().to_lowercase();
    let expr = expr.split_whitespace().collect::<Vec<_>>().join(" ");
    if expr.is_empty() {
        return None;
    }

    let (day_part, time) = match time_suffix().captures(&expr) {
        Some(caps) => {
            let hour: u32 = caps[2].parse().ok()?;
            let minute: u32 = caps[3].parse().ok()?;
            let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
            (caps.get(1).map_or("", |m| m.as_str()).to_string(), Some(time))
        }
        None => (expr, None),
    };

    let date = parse_day(day_part.trim(), today)?;
    Some(HumanDate { date, time })
}

/// Resolve a due date expression to a local instant.
///
/// Without an explicit time the due date is the end of that day, 23:59:59.
pub fn resolve_due_date(input: &str, now: DateTime<Local>) -> Option<DateTime<Local>> {
    let parsed = parse_human_date(input, now.date_naive())?;
    let time = match parsed.time {
        Some(time) => time,
        None => NaiveTime::from_hms_opt(23, 59, 59)?,
    };
    Local.from_local_datetime(&parsed.date.and_time(time)).earliest()
}

#[cfg(test)]
mod tests {
    use super::*;

    // A Wednesday
    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 15).unwrap()
    }

    fn day(input: &str) -> NaiveDate {
        parse_human_date(input, today())
            .unwrap_or_else(|| panic!("failed to parse {:?}", input))
            .date
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_relative_words() {
        assert_eq!(day("today"), ymd(2024, 5, 15));
        assert_eq!(day("Tomorrow"), ymd(2024, 5, 16));
        assert_eq!(day("yesterday"), ymd(2024, 5, 14));
        assert_eq!(day("next week"), ymd(2024, 5, 22));
        assert_eq!(day("next month"), ymd(2024, 6, 15));
    }

    #[test]
    fn test_weekdays_skip_today() {
        assert_eq!(day("friday"), ymd(2024, 5, 17));
        assert_eq!(day("mon"), ymd(2024, 5, 20));
        assert_eq!(day("wednesday"), ymd(2024, 5, 22));
        assert_eq!(day("next thu"), ymd(2024, 5, 16));
    }

    #[test]
    fn test_offsets() {
        assert_eq!(day("in 3 days"), ymd(2024, 5, 18));
        assert_eq!(day("in 1 week"), ymd(2024, 5, 22));
        assert_eq!(day("in 2 months"), ymd(2024, 7, 15));
        assert_eq!(day("+10d"), ymd(2024, 5, 25));
        assert_eq!(day("+1w"), ymd(2024, 5, 22));
        assert_eq!(day("+1m"), ymd(2024, 6, 15));
    }

    #[test]
    fn test_absolute_dates() {
        assert_eq!(day("2024-12-24"), ymd(2024, 12, 24));
        assert_eq!(day("24.12.2024"), ymd(2024, 12, 24));
        assert!(parse_human_date("2024-02-30", today()).is_none());
    }

    #[test]
    fn test_times() {
        let parsed = parse_human_date("tomorrow at 9:05", today()).unwrap();
        assert_eq!(parsed.date, ymd(2024, 5, 16));
        assert_eq!(parsed.time, NaiveTime::from_hms_opt(9, 5, 0));

        let parsed = parse_human_date("2024-06-01 18:30", today()).unwrap();
        assert_eq!(parsed.time, NaiveTime::from_hms_opt(18, 30, 0));

        let parsed = parse_human_date("14:00", today()).unwrap();
        assert_eq!(parsed.date, today());

        assert!(parse_human_date("today 25:00", today()).is_none());
        assert_eq!(parse_human_date("today", today()).unwrap().time, None);
    }

    #[test]
    fn test_garbage_is_rejected() {
        for input in ["", "soon", "in a while", "2024/05/01", "+3y", "next year"] {
            assert!(parse_human_date(input, today()).is_none(), "{:?} parsed", input);
        }
    }

    #[test]
    fn test_resolve_uses_end_of_day() {
        let now = Local.from_local_datetime(&today().and_hms_opt(10, 0, 0).unwrap()).unwrap();
        let due = resolve_due_date("tomorrow", now).unwrap();
        assert_eq!(due.date_naive(), ymd(2024, 5, 16));
        assert_eq!(due.time(), NaiveTime::from_hms_opt(23, 59, 59).unwrap());

        let due = resolve_due_date("tomorrow 08:15", now).unwrap();
        assert_eq!(due.time(), NaiveTime::from_hms_opt(8, 15, 0).unwrap());
    }
}
