//! Numeric identifier codec.
//!
//! Mantis sometimes renders entity references as `#1234` (or even `##1234`).
//! Decoding strips every leading `#` marker; encoding always writes plain
//! digits.

use crate::error::MantisError;

/// Prefix the server sometimes puts in front of identifiers.
pub const MARKER: char = '#';

/// Decodes an identifier, tolerating leading `#` markers.
///
/// # Errors
///
/// Returns `MantisError::InvalidIdentifier` if nothing but markers remains,
/// or the remainder is not an unsigned decimal number.
///
/// # Example
///
/// ```
/// use mantis_connect::codec::identifier::decode;
///
/// assert_eq!(decode("###42").unwrap(), 42);
/// assert_eq!(decode("7").unwrap(), 7);
/// assert!(decode("#").is_err());
/// ```
pub fn decode(text: &str) -> Result<u64, MantisError> {
    let digits = text.trim().trim_start_matches(MARKER);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MantisError::invalid_identifier(text));
    }
    digits
        .parse::<u64>()
        .map_err(|_| MantisError::invalid_identifier(text))
}

/// Encodes an identifier as plain decimal digits.
pub fn encode(id: u64) -> String {
    id.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_plain() {
        assert_eq!(decode("1000").unwrap(), 1000);
        assert_eq!(decode("0").unwrap(), 0);
    }

    #[test]
    fn test_decode_strips_markers() {
        assert_eq!(decode("#42").unwrap(), 42);
        assert_eq!(decode("###42").unwrap(), 42);
    }

    #[test]
    fn test_decode_trims_whitespace() {
        assert_eq!(decode("\n  #15 ").unwrap(), 15);
    }

    #[test]
    fn test_decode_rejects_empty() {
        for text in ["", "   ", "#", "####"] {
            assert!(
                matches!(decode(text), Err(MantisError::InvalidIdentifier { .. })),
                "{text:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_decode_rejects_non_digits() {
        for text in ["abc", "#12a", "-1", "+1", "1 2", "4#2", "1.5"] {
            assert!(decode(text).is_err(), "{text:?} should be rejected");
        }
    }

    #[test]
    fn test_decode_rejects_overflow() {
        let err = decode("99999999999999999999999").unwrap_err();
        assert!(err.to_string().contains("99999999999999999999999"));
    }

    #[test]
    fn test_encode_never_emits_marker() {
        assert_eq!(encode(42), "42");
        assert!(!encode(u64::MAX).contains(MARKER));
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(n in any::<u64>()) {
            prop_assert_eq!(decode(&encode(n)).unwrap(), n);
        }

        #[test]
        fn prop_decode_ignores_any_number_of_markers(n in any::<u64>(), k in 0usize..8) {
            let text = format!("{}{}", "#".repeat(k), n);
            prop_assert_eq!(decode(&text).unwrap(), n);
        }
    }
}
