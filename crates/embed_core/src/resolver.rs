//! Turns the raw `memoId` route segment into a memo identifier.
//!
//! The segment is coerced the way a browser coerces a string to a number:
//! surrounding whitespace (byte order marks included) is ignored, an empty string means zero, and
//! `0x`/`0o`/`0b` prefixes and exponent forms are accepted. Anything that is
//! not a positive integer that fits a store id is treated as absent.

use shared::domain::MemoId;

/// Largest integer an IEEE-754 double represents exactly.
const MAX_SAFE_ID: f64 = 9_007_199_254_740_991.0;

pub fn resolve_memo_id(raw: Option<&str>) -> Option<MemoId> {
    let value = coerce_number(raw?)?;
    if !value.is_finite() || value <= 0.0 || value.fract() != 0.0 || value > MAX_SAFE_ID {
        return None;
    }
    Some(MemoId(value as i64))
}

/// Returns `None` where numeric coercion would produce NaN.
fn coerce_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim_matches(|c: char| c.is_whitespace() || c == '\u{FEFF}');
    if trimmed.is_empty() {
        return Some(0.0);
    }

    let radix_digits = [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)]
        .into_iter()
        .find_map(|(prefix, radix)| trimmed.strip_prefix(prefix).map(|digits| (digits, radix)));
    if let Some((digits, radix)) = radix_digits {
        if digits.is_empty() || digits.starts_with(['+', '-']) {
            return None;
        }
        return u64::from_str_radix(digits, radix).ok().map(|v| v as f64);
    }

    // Rust also accepts "inf"/"nan" spellings; only "Infinity" coerces.
    let lower = trimmed.trim_start_matches(['+', '-']).to_ascii_lowercase();
    if lower.starts_with("inf") || lower.starts_with("nan") {
        return match trimmed.trim_start_matches('+') {
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            _ => None,
        };
    }

    trimmed.parse::<f64>().ok()
}
