//! Quantity number normalization
//!
//! Source documents write quantities with a decimal comma (`12,50`). The
//! extractor turns the comma into a period and then collapses whole numbers
//! (`12.00` -> `12`), leaving non-integral values exactly as written.

/// Replace the first decimal comma with a period.
pub fn to_period_decimal(raw: &str) -> String {
    raw.replacen(',', ".", 1)
}

/// Canonicalize a period-separated decimal string.
///
/// Text that does not parse is returned unchanged. Whole numbers keep the
/// integer digits of the source text, so long values are not rounded.
pub fn normalize_quantity(raw: &str) -> String {
    let value: f64 = match raw.parse() {
        Ok(v) => v,
        Err(_) => {
            log::debug!("Quantity {:?} is not a number, keeping as-is", raw);
            return raw.to_string();
        }
    };

    if let Some((negative, int_digits, frac_digits)) = split_decimal(raw) {
        if frac_digits.bytes().any(|b| b != b'0') {
            return raw.to_string();
        }
        let int_digits = int_digits.trim_start_matches('0');
        return match (negative, int_digits.is_empty()) {
            // avoid "-0"
            (_, true) => "0".to_string(),
            (true, false) => format!("-{}", int_digits),
            (false, false) => int_digits.to_string(),
        };
    }

    // exponent forms such as `1e3`
    if !value.is_finite() || value.fract() != 0.0 {
        return raw.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    format!("{:.0}", value)
}

/// Split `[+-]digits[.digits]` into sign, integer and fraction digits.
fn split_decimal(raw: &str) -> Option<(bool, &str, &str)> {
    let (negative, unsigned) = match raw.as_bytes().first() {
        Some(b'-') => (true, &raw[1..]),
        Some(b'+') => (false, &raw[1..]),
        _ => (false, raw),
    };
    let (int_digits, frac_digits) = unsigned.split_once('.').unwrap_or((unsigned, ""));

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if all_digits(int_digits) && all_digits(frac_digits) && !unsigned.is_empty() {
        Some((negative, int_digits, frac_digits))
    } else {
        None
    }
}
