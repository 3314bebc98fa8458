//! pt-BR formatting for values, dates and progress

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::store::MetricType;

/// Format a number with pt-BR grouping (`.` thousands, `,` decimals)
///
/// Up to three fraction digits are kept, trailing zeros dropped.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }

    let scaled = (value.abs() * 1000.0).round() as u128;
    let integer = scaled / 1000;
    let fraction = scaled % 1000;

    let digits = integer.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 5);
    if value < 0.0 && scaled != 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }

    if fraction != 0 {
        let fraction = format!("{:03}", fraction);
        out.push(',');
        out.push_str(fraction.trim_end_matches('0'));
    }

    out
}

/// Value label according to the campaign metric
pub fn format_value(value: f64, metric: MetricType) -> String {
    match metric {
        MetricType::Monetary => format!("R$ {}", format_number(value)),
        MetricType::Points => format!("{} pts", format_number(value)),
    }
}

/// `dd/mm/yyyy`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Campaign period line for the header
pub fn format_period(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Option<String> {
    match (start, end) {
        (Some(start), Some(end)) => Some(format!("{} - {}", format_date(start), format_date(end))),
        (Some(start), None) => Some(format!("a partir de {}", format_date(start))),
        (None, Some(end)) => Some(format!("até {}", format_date(end))),
        (None, None) => None,
    }
}

/// Goal progress for a label and a bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Rounded, unclamped percentage
    pub percent: i64,
    /// Bar fill in [0, 100]
    pub bar: f64,
}

impl Progress {
    /// Progress of `value` towards `goal`; `None` without a positive goal
    pub fn of(value: f64, goal: Option<f64>) -> Option<Self> {
        let goal = goal.filter(|g| *g > 0.0 && g.is_finite())?;
        let ratio = value / goal * 100.0;
        Some(Self {
            percent: ratio.round() as i64,
            bar: ratio.clamp(0.0, 100.0),
        })
    }

    /// `123%`
    pub fn label(&self) -> String {
        format!("{}%", self.percent)
    }
}
