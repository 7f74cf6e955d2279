//! Resolution of atom nodes to character sets.
//!
//! Shared by the ε-NFA compiler and the IR compiler so both paths agree on
//! what a class matches. Inversion is returned as a flag rather than
//! applied, because the two consumers complement over different domains
//! (alphabet atoms vs. the full scalar range).

use crate::chars::{mode_max, CharSet};
use crate::regexp::{ClassItem, EscapeClassKind, FlagSet, Node};
use crate::unicode;

/// A resolved atom class: the base set plus whether it is inverted.
#[derive(Clone, Debug)]
pub struct AtomClass {
    pub set: CharSet,
    pub invert: bool,
}

pub fn escape_class_set(kind: EscapeClassKind) -> CharSet {
    match kind {
        EscapeClassKind::Digit => unicode::digit_chars(),
        EscapeClassKind::Word => unicode::word_chars(),
        EscapeClassKind::Space => unicode::space_chars(),
    }
}

fn property_set(name: &str) -> Option<CharSet> {
    unicode::general_category(name).or_else(|| unicode::binary(name))
}

fn property_value_set(name: &str, value: &str) -> Option<CharSet> {
    match name {
        "General_Category" | "gc" => unicode::general_category(value),
        "Script" | "sc" => unicode::script(value),
        "Script_Extensions" | "scx" => unicode::script_extensions(value),
        _ => None,
    }
}

fn class_item_set(item: &ClassItem, flags: &FlagSet) -> CharSet {
    let max = mode_max(flags.unicode);
    match item {
        ClassItem::Char(c) => CharSet::singleton(*c),
        ClassItem::Range(lo, hi) => CharSet::range(*lo, *hi),
        ClassItem::Escape(invert, kind) => {
            let base = escape_class_set(*kind);
            if *invert {
                base.complement(max)
            } else {
                base
            }
        }
        ClassItem::Property(invert, name) => {
            let base = property_set(name).unwrap_or_default();
            if *invert {
                base.complement(max)
            } else {
                base
            }
        }
        ClassItem::PropertyValue(invert, name, value) => {
            let base = property_value_set(name, value).unwrap_or_default();
            if *invert {
                base.complement(max)
            } else {
                base
            }
        }
    }
}

/// Resolves an atom node to its class; `None` when the node is not a
/// consuming atom. The parser has already validated property names, so an
/// unknown one resolves to the empty set rather than an error here.
pub fn atom_class(node: &Node, flags: &FlagSet) -> Option<AtomClass> {
    match node {
        Node::Character(c) => Some(AtomClass {
            set: CharSet::singleton(*c),
            invert: false,
        }),
        Node::Dot => Some(AtomClass {
            set: crate::chars::IChar::dot(flags.dot_all, flags.unicode).set,
            invert: false,
        }),
        Node::SimpleEscapeClass(invert, kind) => Some(AtomClass {
            set: escape_class_set(*kind),
            invert: *invert,
        }),
        Node::UnicodeProperty(invert, name) => Some(AtomClass {
            set: property_set(name).unwrap_or_default(),
            invert: *invert,
        }),
        Node::UnicodePropertyValue(invert, name, value) => Some(AtomClass {
            set: property_value_set(name, value).unwrap_or_default(),
            invert: *invert,
        }),
        Node::CharacterClass(invert, items) => {
            let mut set = CharSet::empty();
            for item in items {
                set = set.union(&class_item_set(item, flags));
            }
            Some(AtomClass {
                set,
                invert: *invert,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regexp::parse_pattern;

    fn atom_of(source: &str) -> AtomClass {
        let p = parse_pattern(source, FlagSet::default()).unwrap();
        atom_class(&p.node, &p.flags).unwrap()
    }

    #[test]
    fn test_character() {
        let c = atom_of("a");
        assert!(c.set.contains('a'));
        assert_eq!(c.set.count(), 1);
        assert!(!c.invert);
    }

    #[test]
    fn test_class_union() {
        let c = atom_of(r"[a-c\d]");
        assert!(c.set.contains('b'));
        assert!(c.set.contains('5'));
        assert!(!c.set.contains('z'));
    }

    #[test]
    fn test_negated_class_keeps_base() {
        let c = atom_of("[^ab]");
        assert!(c.invert);
        assert!(c.set.contains('a'));
        assert_eq!(c.set.count(), 2);
    }

    #[test]
    fn test_inverted_escape_inside_class() {
        let c = atom_of(r"[\D]");
        assert!(!c.invert);
        assert!(c.set.contains('x'));
        assert!(!c.set.contains('5'));
    }

    #[test]
    fn test_dot() {
        let c = atom_of(".");
        assert!(c.set.contains('a'));
        assert!(!c.set.contains('\n'));
    }
}
