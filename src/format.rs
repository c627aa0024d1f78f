//! Presentation formatters
//!
//! Pure, total functions from raw API fields to display strings. Missing
//! inputs render as a fixed placeholder. Where the dashboard has always drawn
//! an absent counter and a zero counter the same way (`"0"`, `"0 H/s"`), that
//! is kept: the backend does not distinguish the two either.

use chrono::{DateTime, Utc};

pub const MICRO_PER_UNIT: u64 = 1_000_000;
pub const NOT_AVAILABLE: &str = "N/A";
const SHORT_HASH_LEN: usize = 16;

/// `<1000 -> "{h} H/s"`, `<1e6 -> "{:.2} KH/s"`, otherwise `"{:.2} MH/s"`.
pub fn format_hash_rate(hash_rate: Option<f64>) -> String {
    match hash_rate {
        Some(h) if h.is_finite() && h > 0.0 => {
            if h < 1_000.0 {
                format!("{} H/s", h)
            } else if h < 1_000_000.0 {
                format!("{:.2} KH/s", h / 1_000.0)
            } else {
                format!("{:.2} MH/s", h / 1_000_000.0)
            }
        }
        _ => "0 H/s".to_string(),
    }
}

/// Relative age of `timestamp` at `now`. Timestamps in the future (clock
/// skew between node and viewer) clamp to `"0s"`.
pub fn format_age(timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(timestamp) = timestamp else {
        return NOT_AVAILABLE.to_string();
    };
    let secs = (now - timestamp).num_seconds().max(0);
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3_600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3_600, (secs % 3_600) / 60)
    }
}

/// Micro-units as display currency with two decimals.
pub fn format_balance(micro_units: Option<u64>, symbol: &str) -> String {
    match micro_units {
        Some(amount) if amount > 0 => {
            format!("{:.2} {}", amount as f64 / MICRO_PER_UNIT as f64, symbol)
        }
        _ => format!("0 {}", symbol),
    }
}

/// Micro-units as display currency with all six decimals, exact.
pub fn format_denom(micro_units: u64) -> String {
    format!(
        "{}.{:06}",
        micro_units / MICRO_PER_UNIT,
        micro_units % MICRO_PER_UNIT
    )
}

/// Raw micro-units with thousands separators.
pub fn format_micro(micro_units: u64) -> String {
    group_thousands(micro_units)
}

pub fn format_number(n: Option<u64>) -> String {
    match n {
        Some(n) if n > 0 => group_thousands(n),
        _ => "0".to_string(),
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `0x`-prefixed hash, or `"N/A"`.
pub fn format_hash(hash: Option<&str>) -> String {
    match hash.map(str::trim) {
        None | Some("") => NOT_AVAILABLE.to_string(),
        Some(h) if h.starts_with("0x") => h.to_string(),
        Some(h) => format!("0x{}", h),
    }
}

/// First sixteen characters followed by an ellipsis.
pub fn short_hash(hash: &str) -> String {
    match hash.char_indices().nth(SHORT_HASH_LEN) {
        Some((cut, _)) => format!("{}...", &hash[..cut]),
        None => hash.to_string(),
    }
}

pub fn format_size(bytes: u64) -> String {
    format!("{:.2} KB", bytes as f64 / 1024.0)
}

pub fn format_block_time(secs: Option<f64>) -> String {
    match secs {
        Some(s) if s.is_finite() && s > 0.0 => format!("{}s", s),
        _ => "0s".to_string(),
    }
}

/// Share of `part` in `total` with one decimal. A missing or zero total
/// counts as 1 so the result stays finite.
pub fn format_share(part: Option<u64>, total: Option<u64>) -> String {
    let part = part.unwrap_or(0) as f64;
    let total = total.filter(|t| *t > 0).unwrap_or(1) as f64;
    format!("{:.1}%", part / total * 100.0)
}

pub fn format_timestamp(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}
