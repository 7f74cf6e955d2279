//! Trimmed Unicode data tables.
//!
//! Static range tables covering the Basic Latin, Latin-1 Supplement, Greek
//! and Cyrillic blocks, plus the case-fold conversions the analyzer applies
//! under the `i` flag. Lookups are pure functions over the tables; a name
//! outside the tables returns `None` and surfaces as an invalid-pattern
//! error at parse time.

use crate::chars::CharSet;

/// ECMA-262 line terminators.
pub fn line_terminators() -> CharSet {
    CharSet::from_pairs(&[
        ('\n', '\n'),
        ('\r', '\r'),
        ('\u{2028}', '\u{2029}'),
    ])
}

/// ECMA-262 word characters (`\w`).
pub fn word_chars() -> CharSet {
    CharSet::from_pairs(&[('0', '9'), ('A', 'Z'), ('_', '_'), ('a', 'z')])
}

/// `\s`: whitespace and line terminators.
pub fn space_chars() -> CharSet {
    CharSet::from_pairs(&[
        ('\t', '\r'),
        (' ', ' '),
        ('\u{A0}', '\u{A0}'),
        ('\u{1680}', '\u{1680}'),
        ('\u{2000}', '\u{200A}'),
        ('\u{2028}', '\u{2029}'),
        ('\u{202F}', '\u{202F}'),
        ('\u{205F}', '\u{205F}'),
        ('\u{3000}', '\u{3000}'),
        ('\u{FEFF}', '\u{FEFF}'),
    ])
}

/// `\d`.
pub fn digit_chars() -> CharSet {
    CharSet::range('0', '9')
}

/// Case-fold conversions as (domain lo, domain hi, offset) triples; each
/// conversion maps its domain to the canonical (upper-case) form. The
/// domains never straddle the surrogate gap.
const FOLD_BASE: &[(char, char, i32)] = &[
    ('a', 'z', -32),
    ('\u{E0}', '\u{F6}', -32),    // à-ö
    ('\u{F8}', '\u{FE}', -32),    // ø-þ
    ('\u{3B1}', '\u{3C1}', -32),  // α-ρ
    ('\u{3C2}', '\u{3C2}', -31),  // ς → Σ
    ('\u{3C3}', '\u{3C9}', -32),  // σ-ω
    ('\u{430}', '\u{44F}', -32),  // а-я
    ('\u{450}', '\u{45F}', -80),  // ѐ-џ
];

/// Extra conversions applied only in `u` mode, where ECMA-262 uses simple
/// case folding instead of per-character upper-casing.
const FOLD_UNICODE_EXTRA: &[(char, char, i32)] = &[
    ('\u{17F}', '\u{17F}', -300),   // ſ → S
    ('\u{212A}', '\u{212A}', -8415), // K (Kelvin) → K
];

pub fn fold_ranges(unicode_mode: bool) -> &'static [(char, char, i32)] {
    if unicode_mode {
        FOLD_ALL
    } else {
        FOLD_BASE
    }
}

const FOLD_ALL: &[(char, char, i32)] = &[
    ('a', 'z', -32),
    ('\u{E0}', '\u{F6}', -32),
    ('\u{F8}', '\u{FE}', -32),
    ('\u{17F}', '\u{17F}', -300),
    ('\u{3B1}', '\u{3C1}', -32),
    ('\u{3C2}', '\u{3C2}', -31),
    ('\u{3C3}', '\u{3C9}', -32),
    ('\u{430}', '\u{44F}', -32),
    ('\u{450}', '\u{45F}', -80),
    ('\u{212A}', '\u{212A}', -8415),
];

const UPPERCASE_LETTER: &[(char, char)] = &[
    ('A', 'Z'),
    ('\u{C0}', '\u{D6}'),
    ('\u{D8}', '\u{DE}'),
    ('\u{386}', '\u{386}'),
    ('\u{388}', '\u{38A}'),
    ('\u{38C}', '\u{38C}'),
    ('\u{38E}', '\u{38F}'),
    ('\u{391}', '\u{3A1}'),
    ('\u{3A3}', '\u{3AB}'),
    ('\u{400}', '\u{42F}'),
];

const LOWERCASE_LETTER: &[(char, char)] = &[
    ('a', 'z'),
    ('\u{B5}', '\u{B5}'),
    ('\u{DF}', '\u{F6}'),
    ('\u{F8}', '\u{FF}'),
    ('\u{3AC}', '\u{3CE}'),
    ('\u{430}', '\u{45F}'),
];

const DECIMAL_NUMBER: &[(char, char)] = &[('0', '9')];

const SCRIPT_LATIN: &[(char, char)] = &[
    ('A', 'Z'),
    ('a', 'z'),
    ('\u{C0}', '\u{D6}'),
    ('\u{D8}', '\u{F6}'),
    ('\u{F8}', '\u{FF}'),
];

const SCRIPT_GREEK: &[(char, char)] = &[
    ('\u{370}', '\u{373}'),
    ('\u{375}', '\u{377}'),
    ('\u{37A}', '\u{37D}'),
    ('\u{384}', '\u{38A}'),
    ('\u{38C}', '\u{38C}'),
    ('\u{38E}', '\u{3A1}'),
    ('\u{3A3}', '\u{3FF}'),
];

const SCRIPT_CYRILLIC: &[(char, char)] = &[('\u{400}', '\u{484}'), ('\u{487}', '\u{4FF}')];

/// General-category lookup by short or long name.
pub fn general_category(name: &str) -> Option<CharSet> {
    match name {
        "Lu" | "Uppercase_Letter" => Some(CharSet::from_pairs(UPPERCASE_LETTER)),
        "Ll" | "Lowercase_Letter" => Some(CharSet::from_pairs(LOWERCASE_LETTER)),
        "L" | "Letter" => Some(
            CharSet::from_pairs(UPPERCASE_LETTER).union(&CharSet::from_pairs(LOWERCASE_LETTER)),
        ),
        "Nd" | "Decimal_Number" => Some(CharSet::from_pairs(DECIMAL_NUMBER)),
        "N" | "Number" => Some(CharSet::from_pairs(DECIMAL_NUMBER)),
        _ => None,
    }
}

/// Script lookup by name.
pub fn script(name: &str) -> Option<CharSet> {
    match name {
        "Latin" | "Latn" => Some(CharSet::from_pairs(SCRIPT_LATIN)),
        "Greek" | "Grek" => Some(CharSet::from_pairs(SCRIPT_GREEK)),
        "Cyrillic" | "Cyrl" => Some(CharSet::from_pairs(SCRIPT_CYRILLIC)),
        _ => None,
    }
}

/// Script-extensions lookup; the trimmed tables carry no extension data
/// beyond the base scripts.
pub fn script_extensions(name: &str) -> Option<CharSet> {
    script(name)
}

/// Binary-property lookup by name.
pub fn binary(name: &str) -> Option<CharSet> {
    match name {
        "Alphabetic" | "Alpha" => general_category("L"),
        "White_Space" => Some(space_chars()),
        "ASCII" => Some(CharSet::range('\0', '\u{7F}')),
        "ASCII_Hex_Digit" | "AHex" => Some(CharSet::from_pairs(&[
            ('0', '9'),
            ('A', 'F'),
            ('a', 'f'),
        ])),
        "Any" => Some(CharSet::empty().complement(crate::chars::RUNE_MAX)),
        _ => None,
    }
}

/// Canonical form of a single character under the `i` flag, matching the
/// conversion table the class canonicalization uses.
pub fn canonicalize_char(c: char, unicode_mode: bool) -> char {
    for &(lo, hi, offset) in fold_ranges(unicode_mode) {
        if c >= lo && c <= hi {
            if let Some(mapped) = char::from_u32((c as i64 + offset as i64) as u32) {
                return mapped;
            }
        }
    }
    c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_char() {
        assert_eq!(canonicalize_char('a', false), 'A');
        assert_eq!(canonicalize_char('A', false), 'A');
        assert_eq!(canonicalize_char('0', false), '0');
        assert_eq!(canonicalize_char('ц', false), 'Ц');
        assert_eq!(canonicalize_char('ς', false), 'Σ');
        assert_eq!(canonicalize_char('σ', false), 'Σ');
    }

    #[test]
    fn test_unicode_only_folds() {
        assert_eq!(canonicalize_char('\u{17F}', false), '\u{17F}');
        assert_eq!(canonicalize_char('\u{17F}', true), 'S');
        assert_eq!(canonicalize_char('\u{212A}', true), 'K');
    }

    #[test]
    fn test_category_lookup() {
        let lu = general_category("Lu").unwrap();
        assert!(lu.contains('A'));
        assert!(lu.contains('Ц'));
        assert!(!lu.contains('a'));
        assert!(general_category("Lu") == general_category("Uppercase_Letter"));
        assert!(general_category("Zz").is_none());
    }

    #[test]
    fn test_script_lookup() {
        assert!(script("Greek").unwrap().contains('α'));
        assert!(script("Klingon").is_none());
    }

    #[test]
    fn test_word_and_terminators_disjoint() {
        assert!(word_chars().intersect(&line_terminators()).is_empty());
    }
}
