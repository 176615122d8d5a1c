//! Date Resolution
//!
//! Turns Spanish temporal phrases ("mañana", "próxima semana", "27 de mayo")
//! into concrete local date-times. Unrecognized phrases resolve to `now`.

use std::sync::LazyLock;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use regex::Regex;
use tracing::debug;

use crate::text::Utterance;

pub const MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

// Matched against folded text
static DAY_OF_MONTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(\d{1,2})\s+de\s+(enero|febrero|marzo|abril|mayo|junio|julio|agosto|septiembre|setiembre|octubre|noviembre|diciembre)\b(?:\s+(?:de|del)\s+(\d{4})\b)?",
    )
    .expect("Invalid regex")
});

static WEEKDAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(lunes|martes|miercoles|jueves|viernes|sabado|domingo)\b")
        .expect("Invalid regex")
});

/// Resolve the first temporal phrase in `text` relative to `now`.
///
/// Precedence: hoy, pasado mañana, mañana, próxima/siguiente semana,
/// `<día> de <mes>`, weekday name, then `now` unchanged.
pub fn resolve(text: &str, now: NaiveDateTime) -> NaiveDateTime {
    let u = Utterance::new(text);

    let resolved = if u.has("hoy") {
        now
    } else if u.has_any(&["pasado mañana", "pasado manana"]) {
        now + Days::new(2)
    } else if u.has("mañana") || u.has("manana") {
        now + Days::new(1)
    } else if u.has_any(&["proxima semana", "siguiente semana"]) {
        now + Days::new(7)
    } else if let Some(date) = day_of_month(&u.folded, now) {
        date
    } else if let Some(weekday) = WEEKDAY.captures(&u.folded).and_then(|c| parse_weekday(&c[1])) {
        next_weekday(now.date(), weekday).and_time(now.time())
    } else {
        now
    };

    debug!(text, %resolved, "resolved due date");
    resolved
}

/// `<day> de <month> [de <year>]`; without a year, past dates roll to next year.
fn day_of_month(folded: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let caps = DAY_OF_MONTH.captures(folded)?;
    let day: u32 = caps[1].parse().ok()?;
    let month = parse_month(&caps[2])?;

    if let Some(year) = caps.get(3) {
        let year: i32 = year.as_str().parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day).map(|d| d.and_time(now.time()));
    }

    let candidate = NaiveDate::from_ymd_opt(now.year(), month, day)?.and_time(now.time());
    if candidate < now {
        NaiveDate::from_ymd_opt(now.year() + 1, month, day).map(|d| d.and_time(now.time()))
    } else {
        Some(candidate)
    }
}

/// Month number (1-12) from a Spanish month name
pub fn parse_month(s: &str) -> Option<u32> {
    let s = s.trim().to_lowercase();
    if s == "setiembre" {
        return Some(9);
    }
    MONTHS.iter().position(|m| *m == s).map(|i| i as u32 + 1)
}

/// Parse a Spanish weekday name (accents optional)
pub fn parse_weekday(s: &str) -> Option<Weekday> {
    match crate::text::fold(s.trim()).as_str() {
        "lunes" => Some(Weekday::Mon),
        "martes" => Some(Weekday::Tue),
        "miercoles" => Some(Weekday::Wed),
        "jueves" => Some(Weekday::Thu),
        "viernes" => Some(Weekday::Fri),
        "sabado" => Some(Weekday::Sat),
        "domingo" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Find the next occurrence of a weekday (1-7 days from `from`)
pub fn next_weekday(from: NaiveDate, target: Weekday) -> NaiveDate {
    let current = from.weekday();
    let days_ahead = (target.num_days_from_monday() as i64
        - current.num_days_from_monday() as i64
        + 7) % 7;
    // Same day means next week
    let days_ahead = if days_ahead == 0 { 7 } else { days_ahead as u64 };
    from + Days::new(days_ahead)
}

/// Midnight of the same day
pub fn start_of_day(dt: NaiveDateTime) -> NaiveDateTime {
    dt.date().and_time(NaiveTime::MIN)
}

/// Long Spanish date, e.g. "15 de junio de 2026"
pub fn format_date(dt: NaiveDateTime) -> String {
    format!(
        "{} de {} de {}",
        dt.day(),
        MONTHS[dt.month0() as usize],
        dt.year()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_resolve_today() {
        let now = at(2026, 5, 10);
        assert_eq!(resolve("tarea para hoy", now), now);
    }

    #[test]
    fn test_resolve_tomorrow() {
        let now = at(2026, 5, 10);
        assert_eq!(resolve("tarea para mañana", now).date(), at(2026, 5, 11).date());
        assert_eq!(resolve("para MAÑANA", now), at(2026, 5, 11));
    }

    #[test]
    fn test_today_wins_over_tomorrow() {
        let now = at(2026, 5, 10);
        assert_eq!(resolve("hoy en la mañana", now), now);
    }

    #[test]
    fn test_resolve_day_after_tomorrow() {
        let now = at(2026, 5, 10);
        assert_eq!(resolve("pasado mañana", now), at(2026, 5, 12));
        assert_eq!(resolve("para pasado manana", now), at(2026, 5, 12));
    }

    #[test]
    fn test_resolve_next_week() {
        let now = at(2026, 5, 10);
        assert_eq!(resolve("para la próxima semana", now), at(2026, 5, 17));
        assert_eq!(resolve("la proxima semana", now), at(2026, 5, 17));
        assert_eq!(resolve("la siguiente semana", now), at(2026, 5, 17));
    }

    #[test]
    fn test_resolve_day_of_month_future() {
        let now = at(2026, 5, 10);
        assert_eq!(resolve("entregar el 27 de Mayo", now), at(2026, 5, 27));
    }

    #[test]
    fn test_resolve_day_of_month_rolls_to_next_year() {
        let now = at(2026, 5, 10);
        assert_eq!(resolve("el 3 de marzo", now), at(2027, 3, 3));
        // Same day is not strictly before now
        assert_eq!(resolve("el 10 de mayo", now), now);
    }

    #[test]
    fn test_resolve_day_of_month_explicit_year() {
        let now = at(2026, 5, 10);
        assert_eq!(resolve("el 3 de marzo de 2026", now), at(2026, 3, 3));
    }

    #[test]
    fn test_invalid_day_of_month_falls_through() {
        let now = at(2026, 5, 10);
        assert_eq!(resolve("el 31 de febrero", now), now);
    }

    #[test]
    fn test_resolve_weekday() {
        // 2026-05-10 is a Sunday
        let now = at(2026, 5, 10);
        assert_eq!(resolve("para el viernes", now), at(2026, 5, 15));
        assert_eq!(resolve("el domingo", now), at(2026, 5, 17));
        assert_eq!(resolve("el miércoles", now), at(2026, 5, 13));
    }

    #[test]
    fn test_unrecognized_defaults_to_now() {
        let now = at(2026, 5, 10);
        assert_eq!(resolve("cuando pueda", now), now);
        assert_eq!(resolve("", now), now);
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("Enero"), Some(1));
        assert_eq!(parse_month("setiembre"), Some(9));
        assert_eq!(parse_month("diciembre"), Some(12));
        assert_eq!(parse_month("smarch"), None);
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(at(2026, 6, 15)), "15 de junio de 2026");
        assert_eq!(format_date(at(2027, 1, 1)), "1 de enero de 2027");
    }

    #[test]
    fn test_start_of_day() {
        let sod = start_of_day(at(2026, 5, 10));
        assert_eq!(sod.time(), NaiveTime::MIN);
        assert_eq!(sod.date(), at(2026, 5, 10).date());
    }
}
