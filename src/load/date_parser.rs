use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::Month;

/// `YYYY-MM`, `YYYY/MM`, optionally followed by a day and a time part.
static YEAR_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})[-/](\d{1,2})(?:[-/](\d{1,2}))?(?:[ T].*)?$")
        .expect("year-month pattern should compile")
});

/// Month-name layouts, tried after the numeric forms.
const NAMED_FORMATS: &[&str] = &["%d %b %Y", "%d %B %Y", "%d-%b-%Y"];

/// Parse a raw date cell to its calendar month. Anything that doesn't name a
/// real date comes back as `None`.
pub fn parse_month(raw: &str) -> Option<Month> {
    let s = raw.trim().trim_matches('"').trim();
    if s.is_empty() {
        return None;
    }

    if let Some(caps) = YEAR_MONTH.captures(s) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = match caps.get(3) {
            Some(d) => d.as_str().parse().ok()?,
            None => 1,
        };
        return NaiveDate::from_ymd_opt(year, month, day).map(Month::from_date);
    }

    // compact YYYYMM
    if s.len() == 6 && s.chars().all(|c| c.is_ascii_digit()) {
        return Month::new(s[0..4].parse().ok()?, s[4..6].parse().ok()?);
    }

    // "Jan 2024" / "January 2024"
    let with_day = format!("1 {}", s);
    NAMED_FORMATS
        .iter()
        .find_map(|fmt| {
            NaiveDate::parse_from_str(s, fmt)
                .or_else(|_| NaiveDate::parse_from_str(&with_day, fmt))
                .ok()
        })
        .map(Month::from_date)
}
