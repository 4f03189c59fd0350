// crates/closedloop-masking/src/hash.rs
// ============================================================================
// Module: Deterministic Fingerprint
// Description: DJB2-style string fingerprint for pseudonym selection.
// Purpose: Map identifiers to stable catalog indices across processes.
// Dependencies: std
// ============================================================================

//! ## Overview
//! The fingerprint folds the lower-cased, trimmed input into a signed 32-bit
//! accumulator (`h = h * 33 + unit`, wrapping) seeded with 5381, then takes
//! the absolute value. Input is folded as UTF-16 code units so pseudonyms stay
//! identical to those produced by the existing web dashboard.
//!
//! The fingerprint has no cryptographic strength. It only needs to be stable
//! and spread values roughly uniformly over the catalog pools.

/// Initial accumulator value.
pub const FINGERPRINT_SEED: i32 = 5381;

/// Computes the deterministic fingerprint of `value`.
///
/// `i32::MIN` maps to `2_147_483_648`, so the result is always non-negative.
#[must_use]
pub fn fingerprint(value: &str) -> u32 {
    let lowered = value.to_lowercase();
    lowered
        .trim_matches(is_trimmed)
        .encode_utf16()
        .fold(FINGERPRINT_SEED, |acc, unit| {
            acc.wrapping_shl(5).wrapping_add(acc).wrapping_add(i32::from(unit))
        })
        .unsigned_abs()
}

/// Returns true for characters stripped from both ends before folding.
///
/// This is the ECMAScript `String.prototype.trim` set: Unicode space
/// separators, tab, line terminators, and the byte order mark. Unlike
/// `char::is_whitespace`, U+0085 is kept.
const fn is_trimmed(c: char) -> bool {
    matches!(
        c,
        '\u{0009}'..='\u{000D}'
            | ' '
            | '\u{00A0}'
            | '\u{1680}'
            | '\u{2000}'..='\u{200A}'
            | '\u{2028}'
            | '\u{2029}'
            | '\u{202F}'
            | '\u{205F}'
            | '\u{3000}'
            | '\u{FEFF}'
    )
}

#[cfg(test)]
mod tests {
    use super::FINGERPRINT_SEED;
    use super::fingerprint;

    #[test]
    fn empty_input_is_the_seed() {
        assert_eq!(fingerprint(""), 5381);
        assert_eq!(fingerprint("   "), u32::try_from(FINGERPRINT_SEED).unwrap_or_default());
    }

    #[test]
    fn known_values() {
        assert_eq!(fingerprint("a"), 177_670);
        assert_eq!(fingerprint("Jane Doe"), 2_120_951_653);
        assert_eq!(fingerprint("a@x.com"), 864_996_213);
        assert_eq!(fingerprint("Acme Inc"), 891_043_147);
        assert_eq!(fingerprint("\u{FEFF}Jane Doe"), 2_120_951_653);
    }

    #[test]
    fn byte_order_mark_and_unicode_spaces_are_trimmed() {
        assert_eq!(fingerprint("\u{FEFF}jane doe\u{3000}"), fingerprint("jane doe"));
        assert_eq!(fingerprint("\u{00A0}\u{2028}jane doe\u{202F}"), fingerprint("jane doe"));
        assert_ne!(fingerprint("\u{0085}jane doe"), fingerprint("jane doe"));
    }

    #[test]
    fn case_and_surrounding_whitespace_are_ignored() {
        assert_eq!(fingerprint("  JANE doe\t"), fingerprint("jane doe"));
    }

    #[test]
    fn inner_whitespace_is_significant() {
        assert_ne!(fingerprint("jane doe"), fingerprint("janedoe"));
    }
}
