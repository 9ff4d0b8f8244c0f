//! One-decimal values stored as integers scaled by 10: `-3.2` is `-32`.

use lexical_core::FormattedSize;
use thiserror::Error;

/// The value field did not match `-?[0-9]+\.[0-9]`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed number {text:?}")]
pub struct MalformedNumber {
    pub text: String,
}

impl MalformedNumber {
    fn new(bytes: &[u8]) -> Self {
        Self {
            text: String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

pub fn parse(bytes: &[u8]) -> Result<i64, MalformedNumber> {
    let (negative, digits) = match bytes.split_first() {
        Some((b'-', rest)) => (true, rest),
        Some(_) => (false, bytes),
        None => return Err(MalformedNumber::new(bytes)),
    };

    let dot = memchr::memchr(b'.', digits).ok_or_else(|| MalformedNumber::new(bytes))?;
    let (int_part, frac_part) = (&digits[..dot], &digits[dot + 1..]);
    if int_part.is_empty() || frac_part.len() != 1 {
        return Err(MalformedNumber::new(bytes));
    }

    // Accumulate toward the negative side so i64::MIN is representable.
    let mut acc: i64 = 0;
    for &b in int_part.iter().chain(frac_part) {
        let digit = b.wrapping_sub(b'0');
        if digit > 9 {
            return Err(MalformedNumber::new(bytes));
        }
        acc = acc
            .checked_mul(10)
            .and_then(|acc| acc.checked_sub(digit as i64))
            .ok_or_else(|| MalformedNumber::new(bytes))?;
    }

    if negative {
        Ok(acc)
    } else {
        acc.checked_neg().ok_or_else(|| MalformedNumber::new(bytes))
    }
}

pub fn format_into(value: i64, out: &mut Vec<u8>) {
    if value < 0 {
        out.push(b'-');
    }
    let magnitude = value.unsigned_abs();
    let mut buf = [0u8; u64::FORMATTED_SIZE_DECIMAL];
    out.extend_from_slice(lexical_core::write(magnitude / 10, &mut buf));
    out.push(b'.');
    out.push(b'0' + (magnitude % 10) as u8);
}

pub fn format(value: i64) -> Vec<u8> {
    let mut out = Vec::with_capacity(8);
    format_into(value, &mut out);
    out
}
