use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// How a field value is rendered for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplayFormat {
    /// `$1,234.56`
    Currency,
    /// Fraction shown as a percentage, `0.0525` → `5.25%`
    Percent,
    /// `M/D/YYYY`
    ShortDate,
}

impl DisplayFormat {
    /// Render a numeric value. None for `ShortDate`, which only applies to
    /// dates (see [`format_short_date`]).
    pub fn format_number(&self, value: f64) -> Option<String> {
        match self {
            DisplayFormat::Currency => Some(format_currency(value)),
            DisplayFormat::Percent => Some(format_percent(value)),
            DisplayFormat::ShortDate => None,
        }
    }
}

/// Non-finite amounts print as `NaN`, `inf` or `-inf`.
pub fn format_currency(amount: f64) -> String {
    if !amount.is_finite() {
        return amount.to_string();
    }
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = group_thousands(cents / 100);
    let sign = if amount < 0.0 && cents != 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, whole, cents % 100)
}

pub fn format_percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

pub fn format_short_date(date: NaiveDate) -> String {
    date.format("%-m/%-d/%Y").to_string()
}

fn group_thousands(value: u64) -> String {
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
