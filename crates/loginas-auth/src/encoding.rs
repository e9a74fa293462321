//! Integer text encodings used in tokens.

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const BASE62_DIGITS: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Longest base-36 rendering of a `u64` ("3w5e11264sgsf").
const MAX_BASE36_LEN: usize = 13;

fn encode_radix(mut n: u64, digits: &[u8]) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let radix = digits.len() as u64;
    let mut out = Vec::new();
    while n > 0 {
        out.push(digits[(n % radix) as usize]);
        n /= radix;
    }
    out.reverse();
    // Digits are ASCII.
    out.into_iter().map(char::from).collect()
}

/// Encode as lowercase base-36 in minimal-digit form.
pub fn to_base36(n: u64) -> String {
    encode_radix(n, BASE36_DIGITS)
}

/// Parse canonical base-36 text.
///
/// Rejects empty input, uppercase, signs, leading zeros and anything that
/// would not fit a `u64`.
pub fn from_base36(s: &str) -> Option<u64> {
    if s.is_empty() || s.len() > MAX_BASE36_LEN {
        return None;
    }
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    let mut n: u64 = 0;
    for b in s.bytes() {
        let d = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'z' => b - b'a' + 10,
            _ => return None,
        };
        n = n.checked_mul(36)?.checked_add(u64::from(d))?;
    }
    Some(n)
}

/// Encode with the `0-9A-Za-z` alphabet.
pub fn to_base62(n: u64) -> String {
    encode_radix(n, BASE62_DIGITS)
}

pub fn from_base62(s: &str) -> Option<u64> {
    if s.is_empty() {
        return None;
    }
    let mut n: u64 = 0;
    for b in s.bytes() {
        let d = match b {
            b'0'..=b'9' => b - b'0',
            b'A'..=b'Z' => b - b'A' + 10,
            b'a'..=b'z' => b - b'a' + 36,
            _ => return None,
        };
        n = n.checked_mul(62)?.checked_add(u64::from(d))?;
    }
    Some(n)
}
