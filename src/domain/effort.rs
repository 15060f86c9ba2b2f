//! Effort classification and its mapping to minutes.
//!
//! Parsing is total: every authored string maps to some `Effort`, and every
//! `Effort` maps to a duration. Nothing here can fail.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const SMALL_MINUTES: u32 = 30;
pub const MEDIUM_MINUTES: u32 = 150;
pub const LARGE_MINUTES: u32 = 480;
pub const XLARGE_MINUTES: u32 = 720;
/// Duration used when the authored effort cannot be read.
pub const DEFAULT_EFFORT_MINUTES: u32 = 120;

/// Authored size of a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Effort {
    Small,
    Medium,
    Large,
    ExtraLarge,
    /// Explicit quantity such as `3h` or `45min`
    Minutes(u32),
    /// Missing or unreadable; keeps the original text
    Unspecified(String),
}

/// Size bucket used by scoring, mode selection and token estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SizeClass {
    S,
    M,
    L,
    XL,
}

impl Default for Effort {
    fn default() -> Self {
        Effort::Unspecified(String::new())
    }
}

impl Effort {
    /// Parse an authored effort string. Never fails.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Effort::Unspecified(String::new());
        }

        // "S (<1h)" and "M - half a day" carry the class in the first token
        let first = trimmed
            .split(|c: char| c.is_whitespace() || c == '(' || c == '-')
            .next()
            .unwrap_or("")
            .to_uppercase();
        match first.as_str() {
            "S" | "SMALL" => return Effort::Small,
            "M" | "MEDIUM" => return Effort::Medium,
            "L" | "LARGE" => return Effort::Large,
            "XL" | "XLARGE" => return Effort::ExtraLarge,
            _ => {}
        }

        parse_quantity(trimmed).unwrap_or_else(|| Effort::Unspecified(trimmed.to_string()))
    }

    /// Duration in minutes.
    pub fn minutes(&self) -> u32 {
        match self {
            Effort::Small => SMALL_MINUTES,
            Effort::Medium => MEDIUM_MINUTES,
            Effort::Large => LARGE_MINUTES,
            Effort::ExtraLarge => XLARGE_MINUTES,
            Effort::Minutes(m) => *m,
            Effort::Unspecified(_) => DEFAULT_EFFORT_MINUTES,
        }
    }

    /// Size bucket. Explicit quantities bucket as <=1h S, <=4h M, <=12h L, else XL.
    pub fn size_class(&self) -> SizeClass {
        match self {
            Effort::Small => SizeClass::S,
            Effort::Medium => SizeClass::M,
            Effort::Large => SizeClass::L,
            Effort::ExtraLarge => SizeClass::XL,
            other => match other.minutes() {
                0..=60 => SizeClass::S,
                61..=240 => SizeClass::M,
                241..=720 => SizeClass::L,
                _ => SizeClass::XL,
            },
        }
    }

    pub fn is_specified(&self) -> bool {
        !matches!(self, Effort::Unspecified(_))
    }
}

fn parse_quantity(raw: &str) -> Option<Effort> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_uppercase();
    let split = compact.find(|c: char| !(c.is_ascii_digit() || c == '.'))?;
    let (number, unit) = compact.split_at(split);
    let value: f64 = number.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    let minutes = match unit {
        "H" | "HR" | "HRS" | "HOUR" | "HOURS" => value * 60.0,
        "M" | "MIN" | "MINS" | "MINUTE" | "MINUTES" => value,
        _ => return None,
    };
    Some(Effort::Minutes(minutes.round().min(u32::MAX as f64) as u32))
}

impl From<String> for Effort {
    fn from(raw: String) -> Self {
        Effort::parse(&raw)
    }
}

impl From<&str> for Effort {
    fn from(raw: &str) -> Self {
        Effort::parse(raw)
    }
}

impl From<Effort> for String {
    fn from(effort: Effort) -> Self {
        effort.to_string()
    }
}

impl fmt::Display for Effort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effort::Small => write!(f, "S"),
            Effort::Medium => write!(f, "M"),
            Effort::Large => write!(f, "L"),
            Effort::ExtraLarge => write!(f, "XL"),
            Effort::Minutes(m) if *m > 0 && m % 60 == 0 => write!(f, "{}h", m / 60),
            Effort::Minutes(m) => write!(f, "{}min", m),
            Effort::Unspecified(raw) => write!(f, "{}", raw),
        }
    }
}
