//! Base62 encoding with the `0-9A-Za-z` alphabet.

/// The code alphabet: digits, then uppercase, then lowercase. Index 0 is `'0'`.
pub const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Returns `true` if `c` belongs to [`ALPHABET`].
pub fn is_alphabet_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
}

/// Encodes `n` most-significant digit first. Zero encodes to `"0"`.
pub fn encode_u64(mut n: u64) -> String {
    if n == 0 {
        return (ALPHABET[0] as char).to_string();
    }
    // 62^11 > 2^64
    let mut buf = [0u8; 11];
    let mut i = buf.len();
    while n > 0 {
        i -= 1;
        buf[i] = ALPHABET[(n % 62) as usize];
        n /= 62;
    }
    buf[i..].iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn alphabet_order() {
        assert_eq!(ALPHABET.len(), 62);
        assert_eq!(ALPHABET[0], b'0');
        assert_eq!(ALPHABET[10], b'A');
        assert_eq!(ALPHABET[36], b'a');
        let unique: HashSet<_> = ALPHABET.iter().collect();
        assert_eq!(unique.len(), 62);
    }

    #[test]
    fn known_vectors() {
        assert_eq!(encode_u64(0), "0");
        assert_eq!(encode_u64(9), "9");
        assert_eq!(encode_u64(10), "A");
        assert_eq!(encode_u64(61), "z");
        assert_eq!(encode_u64(62), "10");
        assert_eq!(encode_u64(3843), "zz");
        assert_eq!(encode_u64(u64::MAX), "LygHa16AHYF");
    }

    #[test]
    fn alphabet_membership() {
        assert!(ALPHABET.iter().all(|&b| is_alphabet_char(b as char)));
        assert!(!is_alphabet_char('-'));
        assert!(!is_alphabet_char('_'));
        assert!(!is_alphabet_char('é'));
    }
}
