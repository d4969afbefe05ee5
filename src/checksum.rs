//! Identifier check character calculators
//!
//! Two GS1 algorithms are implemented here:
//!
//! - the GMN (Global Model Number) alphanumeric check character pair, used for
//!   Basic UDI-DI identifiers (weighted sum over prime multipliers, modulo 1021)
//! - the GTIN-14 mod-10 check digit, used for UDI-DI identifiers
//!
//! Both functions are pure. Invalid input is always reported as an error, never
//! replaced with a placeholder.

use crate::error::{Error, Result};

/// Descending primes used as multipliers of each GMN data character.
pub const GMN_WEIGHTS: [u32; 23] = [
    83, 79, 73, 71, 67, 61, 59, 53, 47, 43, 41, 37, 31, 29, 23, 19, 17, 13, 11, 7, 5, 3, 2,
];

/// GS1 AI encodable character set 82, in value order.
pub const CSET82: &str =
    "!\"%&'()*+,-./0123456789:;<=>?ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

/// Subset of the encodable character set used for the check character pair.
pub const CSET32: &str = "23456789ABCDEFGHJKLMNPQRSTUVWXYZ";

/// Minimum GMN data length accepted by the check character algorithm.
pub const GMN_MIN_LENGTH: usize = 6;

/// Maximum GMN data length (one weight per character).
pub const GMN_MAX_LENGTH: usize = GMN_WEIGHTS.len();

/// Number of digits in a GTIN-14 without its check digit.
pub const GTIN14_BASE_LENGTH: usize = 13;

const GMN_MODULUS: u32 = 1021;

/// Value of a character in [`CSET82`], if encodable.
fn cset82_value(c: char) -> Option<u32> {
    if !c.is_ascii() {
        return None;
    }
    CSET82.bytes().position(|b| b == c as u8).map(|p| p as u32)
}

/// Compute the two GMN check characters for `part`.
///
/// `part` must be 6 to 23 characters drawn from [`CSET82`]. The result is
/// always two characters from [`CSET32`].
///
/// ```
/// use eudamed_xml::checksum::gmn_check_characters;
///
/// assert_eq!(gmn_check_characters("1987654Ad4X4bL5ttr2310c").unwrap(), "2K");
/// ```
pub fn gmn_check_characters(part: &str) -> Result<String> {
    let length = part.chars().count();
    if !(GMN_MIN_LENGTH..=GMN_MAX_LENGTH).contains(&length) {
        return Err(Error::InvalidLength {
            length,
            min: GMN_MIN_LENGTH,
            max: GMN_MAX_LENGTH,
        });
    }

    let offset = GMN_WEIGHTS.len() - length;
    let mut sum: u32 = 0;
    for (position, character) in part.chars().enumerate() {
        let value = cset82_value(character).ok_or(Error::InvalidCharacter {
            character,
            position,
        })?;
        sum += value * GMN_WEIGHTS[offset + position];
    }

    let sum = (sum % GMN_MODULUS) as usize;
    let cset32 = CSET32.as_bytes();
    let mut check = String::with_capacity(2);
    check.push(cset32[sum >> 5] as char);
    check.push(cset32[sum & 31] as char);
    Ok(check)
}

/// Compute the GTIN-14 check digit for a 13 digit base.
///
/// Digits are weighted 3, 1, 3, 1, ... from the left; the check digit brings
/// the weighted sum up to the next multiple of ten.
///
/// ```
/// use eudamed_xml::checksum::gtin_check_digit;
///
/// assert_eq!(gtin_check_digit("0001234560001").unwrap(), "2");
/// ```
pub fn gtin_check_digit(base13: &str) -> Result<String> {
    let length = base13.chars().count();
    if length != GTIN14_BASE_LENGTH {
        return Err(Error::InvalidLength {
            length,
            min: GTIN14_BASE_LENGTH,
            max: GTIN14_BASE_LENGTH,
        });
    }

    let mut total = 0;
    for (position, character) in base13.chars().enumerate() {
        let digit = character.to_digit(10).ok_or(Error::InvalidCharacter {
            character,
            position,
        })?;
        total += if position % 2 == 0 { digit * 3 } else { digit };
    }

    let remainder = total % 10;
    let check = if remainder == 0 { 0 } else { 10 - remainder };
    Ok(check.to_string())
}

/// Check whether a complete GMN (data followed by two check characters) is consistent.
pub fn is_valid_gmn(gmn: &str) -> bool {
    let length = gmn.chars().count();
    if length < GMN_MIN_LENGTH + 2 {
        return false;
    }
    let split = gmn
        .char_indices()
        .nth(length - 2)
        .map(|(i, _)| i)
        .unwrap_or(gmn.len());
    let (part, check) = gmn.split_at(split);
    matches!(gmn_check_characters(part), Ok(expected) if expected == check)
}

/// Check whether a complete 14 digit GTIN carries the correct check digit.
pub fn is_valid_gtin14(gtin: &str) -> bool {
    if gtin.len() != GTIN14_BASE_LENGTH + 1 || !gtin.is_ascii() {
        return false;
    }
    let (base, check) = gtin.split_at(GTIN14_BASE_LENGTH);
    matches!(gtin_check_digit(base), Ok(expected) if expected == check)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_character_sets() {
        assert_eq!(CSET82.chars().count(), 82);
        assert_eq!(CSET32.chars().count(), 32);
        assert!(CSET32.chars().all(|c| CSET82.contains(c)));
    }

    #[test]
    fn test_gmn_published_vector() {
        // GS1 General Specifications worked example
        assert_eq!(gmn_check_characters("1987654Ad4X4bL5ttr2310c").unwrap(), "2K");
        assert!(is_valid_gmn("1987654Ad4X4bL5ttr2310c2K"));
        assert!(!is_valid_gmn("1987654Ad4X4bL5ttr2310c2L"));
    }

    #[test]
    fn test_gmn_basic_udi_vectors() {
        assert_eq!(gmn_check_characters("599302877PAY").unwrap(), "U9");
        assert_eq!(gmn_check_characters("599302677TAY").unwrap(), "U3");
        assert_eq!(gmn_check_characters("ABCDEF").unwrap(), "98");
        assert_eq!(gmn_check_characters("123456").unwrap(), "MW");
        assert_eq!(
            gmn_check_characters("12345678901234567890123").unwrap(),
            "NT"
        );
    }

    #[test]
    fn test_gmn_length_bounds() {
        assert!(matches!(
            gmn_check_characters("ABCDE"),
            Err(Error::InvalidLength { length: 5, .. })
        ));
        assert!(matches!(
            gmn_check_characters("123456789012345678901234"),
            Err(Error::InvalidLength { length: 24, .. })
        ));
    }

    #[test]
    fn test_gmn_invalid_character() {
        assert!(matches!(
            gmn_check_characters("ABC DE"),
            Err(Error::InvalidCharacter {
                character: ' ',
                position: 3
            })
        ));
        assert!(matches!(
            gmn_check_characters("ABCDEé"),
            Err(Error::InvalidCharacter { character: 'é', .. })
        ));
    }

    #[test]
    fn test_gtin_published_vectors() {
        // GTIN-13 4006381333931 and 5901234123457, zero padded to GTIN-14
        assert_eq!(gtin_check_digit("0400638133393").unwrap(), "1");
        assert_eq!(gtin_check_digit("0590123412345").unwrap(), "7");
        assert_eq!(gtin_check_digit("0001234560001").unwrap(), "2");
        assert!(is_valid_gtin14("00012345600012"));
        assert!(!is_valid_gtin14("00012345600013"));
    }

    #[test]
    fn test_gtin_weighting() {
        // 0*3 + 5 + 9*3 + 9 + 3*3 + 0 + 2*3 = 56
        assert_eq!(gtin_check_digit("0599302000000").unwrap(), "4");
        assert_eq!(gtin_check_digit("0000000000000").unwrap(), "0");
    }

    #[test]
    fn test_gtin_length_bounds() {
        assert!(matches!(
            gtin_check_digit("059930200000"),
            Err(Error::InvalidLength { length: 12, .. })
        ));
        assert!(matches!(
            gtin_check_digit("05993020000000"),
            Err(Error::InvalidLength { length: 14, .. })
        ));
    }

    #[test]
    fn test_gtin_non_digit() {
        assert!(matches!(
            gtin_check_digit("05993020000A0"),
            Err(Error::InvalidCharacter {
                character: 'A',
                position: 11
            })
        ));
    }

    proptest! {
        #[test]
        fn prop_gmn_output_alphabet(part in "[0-9A-Za-z_:;<=>?!%&'()*+,./-]{6,23}") {
            let first = gmn_check_characters(&part).unwrap();
            let second = gmn_check_characters(&part).unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.len(), 2);
            prop_assert!(first.chars().all(|c| CSET32.contains(c)));
        }

        #[test]
        fn prop_gtin_single_digit(base in "[0-9]{13}") {
            let check = gtin_check_digit(&base).unwrap();
            prop_assert_eq!(check.len(), 1);
            let full = format!("{}{}", base, check);
            prop_assert!(is_valid_gtin14(&full));
        }
    }
}
