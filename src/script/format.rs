//! Number, area and date formatting for narration text

use chrono::NaiveDate;

/// Square meters per pyeong
pub const SQM_PER_PYEONG: f64 = 3.3058;

/// `850000000` -> `"850,000,000 won"`
pub fn format_price(amount: u64) -> String {
    format!("{} won", group_thousands(amount))
}

pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn sqm_to_pyeong(sqm: f64) -> f64 {
    sqm / SQM_PER_PYEONG
}

pub fn pyeong_to_sqm(pyeong: f64) -> f64 {
    pyeong * SQM_PER_PYEONG
}

/// Area in pyeong, with square meters when known
///
/// Pyeong is taken as given when present, otherwise converted from m².
/// Returns an empty string when neither is known.
pub fn format_area(sqm: Option<f64>, pyeong: Option<f64>) -> String {
    let pyeong = match (pyeong, sqm) {
        (Some(p), _) => p,
        (None, Some(s)) => sqm_to_pyeong(s),
        (None, None) => return String::new(),
    };

    match sqm {
        Some(s) => format!("{:.1} pyeong ({:.1} m²)", pyeong, s),
        None => format!("{:.1} pyeong", pyeong),
    }
}

/// `0.64` -> `"64%"`
pub fn format_percent(fraction: f64) -> String {
    format!("{}%", (fraction * 100.0).round() as i64)
}

/// `2024-03-15` -> `"March 15, 2024"`; unparseable input is returned unchanged
pub fn format_date(date: &str) -> String {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map(|d| d.format("%B %-d, %Y").to_string())
        .unwrap_or_else(|_| date.to_string())
}
