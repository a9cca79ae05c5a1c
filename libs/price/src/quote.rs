use std::fmt;

use chrono::{DateTime, Utc};

/// User-facing asset symbol, always stored trimmed and upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticker(String);

impl Ticker {
    /// Returns `None` for blank input.
    pub fn new(raw: &str) -> Option<Self> {
        let symbol = raw.trim().to_uppercase();
        if symbol.is_empty() {
            None
        } else {
            Some(Self(symbol))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key used by the identifier directory.
    pub fn lower(&self) -> String {
        self.0.to_lowercase()
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which feed produced a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Primary,
    Secondary,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Primary => "Primary",
            Source::Secondary => "Secondary",
        }
    }

    /// Quote currency each feed prices in.
    pub fn currency(&self) -> &'static str {
        match self {
            Source::Primary => "USDT",
            Source::Secondary => "USD",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub symbol: Ticker,
    pub price: f64,
    pub change_percent_24h: Option<f64>,
    pub source: Source,
    pub as_of: DateTime<Utc>,
}

impl fmt::Display for PriceQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {}",
            self.symbol,
            group_thousands(&format!("{:.5}", self.price)),
            self.source.currency()
        )?;

        if let Some(change) = self.change_percent_24h {
            write!(f, " ({})", signed_percent(change))?;
        }

        if self.source == Source::Secondary {
            write!(f, " [{}]", self.source.as_str())?;
        }

        Ok(())
    }
}

/// `+1.23%` / `-3.21%`, sign always present.
pub fn signed_percent(change: f64) -> String {
    let change = if change == 0.0 { 0.0 } else { change };
    format!("{change:+.2}%")
}

/// Insert `,` separators into the integer part of a formatted number.
pub fn group_thousands(formatted: &str) -> String {
    let (sign, rest) = match formatted.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", formatted),
    };
    let (int_part, frac_part) = match rest.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (rest, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}
