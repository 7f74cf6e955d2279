//! Recursive-descent parser for ECMA-262 pattern syntax.
//!
//! Produces the [`Node`] tree consumed by both compilers. The parser is
//! deliberately permissive where Annex B is: an unmatched `{` that does not
//! open a quantifier is a literal outside `u` mode, and out-of-order bounds
//! like `{5,2}` parse successfully (the compilers reject them).

use rustc_hash::FxHashMap;

use crate::regexp::{ClassItem, EscapeClassKind, FlagSet, Node, Pattern};
use crate::unicode;

/// Error type for pattern parsing.
#[derive(Debug, Clone)]
pub struct SyntaxError {
    pub message: String,
    pub offset: usize,
}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at offset {}", self.message, self.offset)
    }
}

impl std::error::Error for SyntaxError {}

/// Parses a flags string (`g i m s u y`).
pub fn parse_flags(flags: &str) -> Result<FlagSet, SyntaxError> {
    let mut set = FlagSet::default();
    for (offset, c) in flags.chars().enumerate() {
        let slot = match c {
            'g' => &mut set.global,
            'i' => &mut set.ignore_case,
            'm' => &mut set.multiline,
            's' => &mut set.dot_all,
            'u' => &mut set.unicode,
            'y' => &mut set.sticky,
            _ => {
                return Err(SyntaxError {
                    message: format!("unknown flag '{}'", c),
                    offset,
                })
            }
        };
        if *slot {
            return Err(SyntaxError {
                message: format!("duplicated flag '{}'", c),
                offset,
            });
        }
        *slot = true;
    }
    Ok(set)
}

/// Parses a pattern source under the given flags.
pub fn parse_pattern(source: &str, flags: FlagSet) -> Result<Pattern, SyntaxError> {
    let mut parse = PatternParse::new(source, flags);
    let node = parse.parse_disjunction()?;
    if parse.index < parse.chars.len() {
        // The only way the top-level disjunction stops early is a stray ')'.
        return Err(parse.err("unmatched ')'"));
    }
    let pattern = Pattern {
        node,
        flags,
        capture_count: parse.capture_index,
        names: parse.names.clone(),
    };
    validate_references(&pattern.node, pattern.capture_count, &pattern.names)
        .map_err(|message| SyntaxError {
            message,
            offset: source.chars().count(),
        })?;
    Ok(pattern)
}

fn validate_references(
    node: &Node,
    capture_count: usize,
    names: &FxHashMap<String, usize>,
) -> Result<(), String> {
    match node {
        Node::Disjunction(children) | Node::Sequence(children) => {
            for c in children {
                validate_references(c, capture_count, names)?;
            }
            Ok(())
        }
        Node::Capture(_, child)
        | Node::NamedCapture(_, _, child)
        | Node::Group(child)
        | Node::Star(_, child)
        | Node::Plus(_, child)
        | Node::Question(_, child)
        | Node::Repeat(_, _, _, child)
        | Node::LookAhead(_, child)
        | Node::LookBehind(_, child) => validate_references(child, capture_count, names),
        Node::BackReference(n) => {
            if *n == 0 || *n > capture_count {
                Err(format!("invalid backreference \\{}", n))
            } else {
                Ok(())
            }
        }
        Node::NamedBackReference(name) => {
            if names.contains_key(name) {
                Ok(())
            } else {
                Err(format!("invalid named backreference \\k<{}>", name))
            }
        }
        _ => Ok(()),
    }
}

/// Parser state.
struct PatternParse {
    chars: Vec<char>,
    index: usize,
    flags: FlagSet,
    capture_index: usize,
    names: FxHashMap<String, usize>,
}

impl PatternParse {
    fn new(source: &str, flags: FlagSet) -> Self {
        Self {
            chars: source.chars().collect(),
            index: 0,
            flags,
            capture_index: 0,
            names: FxHashMap::default(),
        }
    }

    fn err(&self, message: &str) -> SyntaxError {
        SyntaxError {
            message: message.to_string(),
            offset: self.index,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.index + ahead).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.index += 1;
        }
        c
    }

    fn eat(&mut self, wanted: char) -> bool {
        if self.peek() == Some(wanted) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, wanted: char) -> Result<(), SyntaxError> {
        if self.eat(wanted) {
            Ok(())
        } else {
            Err(self.err(&format!("expected '{}'", wanted)))
        }
    }

    fn parse_disjunction(&mut self) -> Result<Node, SyntaxError> {
        let mut branches = vec![self.parse_sequence()?];
        while self.eat('|') {
            branches.push(self.parse_sequence()?);
        }
        if branches.len() == 1 {
            Ok(branches.pop().unwrap_or(Node::Sequence(Vec::new())))
        } else {
            Ok(Node::Disjunction(branches))
        }
    }

    fn parse_sequence(&mut self) -> Result<Node, SyntaxError> {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                None | Some('|') | Some(')') => break,
                _ => items.push(self.parse_term()?),
            }
        }
        if items.len() == 1 {
            Ok(items.pop().unwrap_or(Node::Sequence(Vec::new())))
        } else {
            Ok(Node::Sequence(items))
        }
    }

    fn parse_term(&mut self) -> Result<Node, SyntaxError> {
        let atom = self.parse_atom()?;
        self.parse_quantifier(atom)
    }

    fn is_assertion(node: &Node) -> bool {
        matches!(
            node,
            Node::LineBegin
                | Node::LineEnd
                | Node::WordBoundary(_)
                | Node::LookAhead(..)
                | Node::LookBehind(..)
        )
    }

    fn parse_quantifier(&mut self, atom: Node) -> Result<Node, SyntaxError> {
        enum Quant {
            Star,
            Plus,
            Question,
            Repeat(usize, Option<Option<usize>>),
        }
        let quant = match self.peek() {
            Some('*') => {
                self.index += 1;
                Some(Quant::Star)
            }
            Some('+') => {
                self.index += 1;
                Some(Quant::Plus)
            }
            Some('?') => {
                self.index += 1;
                Some(Quant::Question)
            }
            Some('{') => self
                .try_parse_bounds()?
                .map(|(min, max)| Quant::Repeat(min, max)),
            _ => None,
        };
        let Some(quant) = quant else {
            return Ok(atom);
        };
        if Self::is_assertion(&atom) {
            return Err(self.err("nothing to repeat"));
        }
        let non_greedy = self.eat('?');
        let atom = Box::new(atom);
        Ok(match quant {
            Quant::Star => Node::Star(non_greedy, atom),
            Quant::Plus => Node::Plus(non_greedy, atom),
            Quant::Question => Node::Question(non_greedy, atom),
            Quant::Repeat(min, max) => Node::Repeat(non_greedy, min, max, atom),
        })
    }

    /// Parses `{n}`, `{n,}` or `{n,m}` after the opening brace position.
    /// Returns `None` (with the cursor restored) when the braces do not
    /// form a quantifier and the pattern is not in `u` mode.
    fn try_parse_bounds(
        &mut self,
    ) -> Result<Option<(usize, Option<Option<usize>>)>, SyntaxError> {
        let start = self.index;
        self.index += 1; // '{'
        let min = match self.parse_decimal() {
            Some(n) => n,
            None => return self.bounds_fallback(start, "incomplete quantifier"),
        };
        if self.eat('}') {
            return Ok(Some((min, None)));
        }
        if !self.eat(',') {
            return self.bounds_fallback(start, "incomplete quantifier");
        }
        if self.eat('}') {
            return Ok(Some((min, Some(None))));
        }
        let max = match self.parse_decimal() {
            Some(n) => n,
            None => return self.bounds_fallback(start, "incomplete quantifier"),
        };
        if self.eat('}') {
            Ok(Some((min, Some(Some(max)))))
        } else {
            self.bounds_fallback(start, "incomplete quantifier")
        }
    }

    fn bounds_fallback(
        &mut self,
        start: usize,
        message: &str,
    ) -> Result<Option<(usize, Option<Option<usize>>)>, SyntaxError> {
        if self.flags.unicode {
            Err(self.err(message))
        } else {
            self.index = start;
            Ok(None)
        }
    }

    fn parse_decimal(&mut self) -> Option<usize> {
        let mut value: usize = 0;
        let mut any = false;
        while let Some(c) = self.peek() {
            match c.to_digit(10) {
                Some(d) => {
                    any = true;
                    value = value.saturating_mul(10).saturating_add(d as usize);
                    self.index += 1;
                }
                None => break,
            }
        }
        if any {
            Some(value)
        } else {
            None
        }
    }

    fn parse_atom(&mut self) -> Result<Node, SyntaxError> {
        match self.peek() {
            None => Err(self.err("unexpected end of pattern")),
            Some('^') => {
                self.index += 1;
                Ok(Node::LineBegin)
            }
            Some('$') => {
                self.index += 1;
                Ok(Node::LineEnd)
            }
            Some('.') => {
                self.index += 1;
                Ok(Node::Dot)
            }
            Some('(') => self.parse_group(),
            Some('[') => self.parse_class(),
            Some('\\') => self.parse_escape(),
            Some('*') | Some('+') | Some('?') => Err(self.err("nothing to repeat")),
            Some(c) => {
                self.index += 1;
                Ok(Node::Character(c))
            }
        }
    }

    fn parse_group(&mut self) -> Result<Node, SyntaxError> {
        self.index += 1; // '('
        let node = if self.eat('?') {
            if self.eat(':') {
                let inner = self.parse_disjunction()?;
                Node::Group(Box::new(inner))
            } else if self.eat('=') {
                let inner = self.parse_disjunction()?;
                Node::LookAhead(false, Box::new(inner))
            } else if self.eat('!') {
                let inner = self.parse_disjunction()?;
                Node::LookAhead(true, Box::new(inner))
            } else if self.eat('<') {
                if self.eat('=') {
                    let inner = self.parse_disjunction()?;
                    Node::LookBehind(false, Box::new(inner))
                } else if self.eat('!') {
                    let inner = self.parse_disjunction()?;
                    Node::LookBehind(true, Box::new(inner))
                } else {
                    let name = self.parse_group_name()?;
                    self.capture_index += 1;
                    let index = self.capture_index;
                    if self.names.insert(name.clone(), index).is_some() {
                        return Err(self.err(&format!("duplicated group name '{}'", name)));
                    }
                    let inner = self.parse_disjunction()?;
                    Node::NamedCapture(index, name, Box::new(inner))
                }
            } else {
                return Err(self.err("invalid group"));
            }
        } else {
            self.capture_index += 1;
            let index = self.capture_index;
            let inner = self.parse_disjunction()?;
            Node::Capture(index, Box::new(inner))
        };
        self.expect(')')?;
        Ok(node)
    }

    fn parse_group_name(&mut self) -> Result<String, SyntaxError> {
        let mut name = String::new();
        loop {
            match self.bump() {
                None => return Err(self.err("unterminated group name")),
                Some('>') => break,
                Some(c) if c.is_alphanumeric() || c == '_' || c == '$' => name.push(c),
                Some(_) => return Err(self.err("invalid character in group name")),
            }
        }
        if name.is_empty() {
            return Err(self.err("empty group name"));
        }
        Ok(name)
    }

    fn parse_class(&mut self) -> Result<Node, SyntaxError> {
        self.index += 1; // '['
        let invert = self.eat('^');
        let mut items = Vec::new();
        loop {
            match self.peek() {
                None => return Err(self.err("unterminated character class")),
                Some(']') => {
                    self.index += 1;
                    break;
                }
                _ => {}
            }
            let first = self.parse_class_atom()?;
            let range_candidate = self.peek() == Some('-')
                && self.peek_at(1).is_some()
                && self.peek_at(1) != Some(']');
            if !range_candidate {
                items.push(first);
                continue;
            }
            self.index += 1; // '-'
            let second = self.parse_class_atom()?;
            match (&first, &second) {
                (ClassItem::Char(lo), ClassItem::Char(hi)) => {
                    if lo > hi {
                        return Err(self.err("character class range out of order"));
                    }
                    items.push(ClassItem::Range(*lo, *hi));
                }
                _ => {
                    // A class escape beside '-' makes the dash literal.
                    items.push(first);
                    items.push(ClassItem::Char('-'));
                    items.push(second);
                }
            }
        }
        Ok(Node::CharacterClass(invert, items))
    }

    fn parse_class_atom(&mut self) -> Result<ClassItem, SyntaxError> {
        match self.peek() {
            None => Err(self.err("unterminated character class")),
            Some('\\') => {
                self.index += 1;
                match self.bump() {
                    None => Err(self.err("incomplete escape")),
                    Some('d') => Ok(ClassItem::Escape(false, EscapeClassKind::Digit)),
                    Some('D') => Ok(ClassItem::Escape(true, EscapeClassKind::Digit)),
                    Some('w') => Ok(ClassItem::Escape(false, EscapeClassKind::Word)),
                    Some('W') => Ok(ClassItem::Escape(true, EscapeClassKind::Word)),
                    Some('s') => Ok(ClassItem::Escape(false, EscapeClassKind::Space)),
                    Some('S') => Ok(ClassItem::Escape(true, EscapeClassKind::Space)),
                    Some('p') => self.parse_property(false).map(|p| p.into_class_item()),
                    Some('P') => self.parse_property(true).map(|p| p.into_class_item()),
                    Some('b') => Ok(ClassItem::Char('\u{8}')),
                    Some(c) => self.parse_char_escape(c).map(ClassItem::Char),
                }
            }
            Some(c) => {
                self.index += 1;
                Ok(ClassItem::Char(c))
            }
        }
    }

    fn parse_escape(&mut self) -> Result<Node, SyntaxError> {
        self.index += 1; // '\\'
        match self.bump() {
            None => Err(self.err("incomplete escape")),
            Some('b') => Ok(Node::WordBoundary(false)),
            Some('B') => Ok(Node::WordBoundary(true)),
            Some('d') => Ok(Node::SimpleEscapeClass(false, EscapeClassKind::Digit)),
            Some('D') => Ok(Node::SimpleEscapeClass(true, EscapeClassKind::Digit)),
            Some('w') => Ok(Node::SimpleEscapeClass(false, EscapeClassKind::Word)),
            Some('W') => Ok(Node::SimpleEscapeClass(true, EscapeClassKind::Word)),
            Some('s') => Ok(Node::SimpleEscapeClass(false, EscapeClassKind::Space)),
            Some('S') => Ok(Node::SimpleEscapeClass(true, EscapeClassKind::Space)),
            Some('p') => Ok(self.parse_property(false)?.into_node()),
            Some('P') => Ok(self.parse_property(true)?.into_node()),
            Some('k') => {
                self.expect('<')?;
                let name = self.parse_group_name()?;
                Ok(Node::NamedBackReference(name))
            }
            Some(c) if c.is_ascii_digit() && c != '0' => {
                self.index -= 1;
                let n = self
                    .parse_decimal()
                    .ok_or_else(|| self.err("invalid backreference"))?;
                Ok(Node::BackReference(n))
            }
            Some(c) => self.parse_char_escape(c).map(Node::Character),
        }
    }

    /// Single-character escapes shared by atoms and class atoms. `c` is the
    /// character after the backslash, already consumed.
    fn parse_char_escape(&mut self, c: char) -> Result<char, SyntaxError> {
        match c {
            'n' => Ok('\n'),
            'r' => Ok('\r'),
            't' => Ok('\t'),
            'f' => Ok('\u{C}'),
            'v' => Ok('\u{B}'),
            '0' => Ok('\0'),
            'x' => {
                let hi = self.parse_hex_digits(2)?;
                char::from_u32(hi).ok_or_else(|| self.err("invalid \\x escape"))
            }
            'u' => self.parse_unicode_escape(),
            'c' => match self.bump() {
                Some(l) if l.is_ascii_alphabetic() => {
                    char::from_u32(l as u32 % 32).ok_or_else(|| self.err("invalid \\c escape"))
                }
                _ => Err(self.err("invalid \\c escape")),
            },
            _ => Ok(c),
        }
    }

    fn parse_unicode_escape(&mut self) -> Result<char, SyntaxError> {
        if self.eat('{') {
            let mut value: u32 = 0;
            let mut digits = 0;
            while let Some(c) = self.peek() {
                match c.to_digit(16) {
                    Some(d) => {
                        value = value.saturating_mul(16).saturating_add(d);
                        digits += 1;
                        self.index += 1;
                    }
                    None => break,
                }
            }
            self.expect('}')?;
            if digits == 0 || value > 0x10FFFF {
                return Err(self.err("invalid \\u{..} escape"));
            }
            return char::from_u32(value).ok_or_else(|| self.err("lone surrogate in pattern"));
        }
        let value = self.parse_hex_digits(4)?;
        if (0xD800..=0xDBFF).contains(&value) {
            // Try to combine a trailing low surrogate into one scalar.
            if self.peek() == Some('\\') && self.peek_at(1) == Some('u') {
                let save = self.index;
                self.index += 2;
                if let Ok(low) = self.parse_hex_digits(4) {
                    if (0xDC00..=0xDFFF).contains(&low) {
                        let combined =
                            0x10000 + ((value - 0xD800) << 10) + (low - 0xDC00);
                        return char::from_u32(combined)
                            .ok_or_else(|| self.err("invalid surrogate pair"));
                    }
                }
                self.index = save;
            }
            return Err(self.err("lone surrogate in pattern"));
        }
        char::from_u32(value).ok_or_else(|| self.err("lone surrogate in pattern"))
    }

    fn parse_hex_digits(&mut self, count: usize) -> Result<u32, SyntaxError> {
        let mut value: u32 = 0;
        for _ in 0..count {
            let d = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.err("invalid hex escape"))?;
            value = value * 16 + d;
        }
        Ok(value)
    }

    fn parse_property(&mut self, invert: bool) -> Result<ParsedProperty, SyntaxError> {
        self.expect('{')?;
        let mut name = String::new();
        let mut value = None;
        loop {
            match self.bump() {
                None => return Err(self.err("unterminated \\p{..}")),
                Some('}') => break,
                Some('=') => {
                    value = Some(String::new());
                }
                Some(c) => match &mut value {
                    Some(v) => v.push(c),
                    None => name.push(c),
                },
            }
        }
        let known = match &value {
            Some(v) => match name.as_str() {
                "General_Category" | "gc" => unicode::general_category(v).is_some(),
                "Script" | "sc" => unicode::script(v).is_some(),
                "Script_Extensions" | "scx" => unicode::script_extensions(v).is_some(),
                _ => false,
            },
            None => {
                unicode::general_category(&name).is_some() || unicode::binary(&name).is_some()
            }
        };
        if !known {
            return Err(self.err(&format!("unknown Unicode property '{}'", name)));
        }
        Ok(ParsedProperty {
            invert,
            name,
            value,
        })
    }
}

struct ParsedProperty {
    invert: bool,
    name: String,
    value: Option<String>,
}

impl ParsedProperty {
    fn into_node(self) -> Node {
        match self.value {
            Some(value) => Node::UnicodePropertyValue(self.invert, self.name, value),
            None => Node::UnicodeProperty(self.invert, self.name),
        }
    }

    fn into_class_item(self) -> ClassItem {
        match self.value {
            Some(value) => ClassItem::PropertyValue(self.invert, self.name, value),
            None => ClassItem::Property(self.invert, self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<Pattern, SyntaxError> {
        parse_pattern(source, FlagSet::default())
    }

    #[test]
    fn test_parse_simple_sequence() {
        let p = parse("abc").unwrap();
        match &p.node {
            Node::Sequence(items) => {
                assert_eq!(items.len(), 3);
                assert_eq!(items[0], Node::Character('a'));
            }
            other => panic!("expected sequence, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_disjunction() {
        let p = parse("a|b|c").unwrap();
        match &p.node {
            Node::Disjunction(branches) => assert_eq!(branches.len(), 3),
            other => panic!("expected disjunction, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_quantifiers() {
        assert!(matches!(parse("a*").unwrap().node, Node::Star(false, _)));
        assert!(matches!(parse("a*?").unwrap().node, Node::Star(true, _)));
        assert!(matches!(parse("a+").unwrap().node, Node::Plus(false, _)));
        assert!(matches!(
            parse("a??").unwrap().node,
            Node::Question(true, _)
        ));
    }

    #[test]
    fn test_parse_bounds() {
        assert!(matches!(
            parse("a{3}").unwrap().node,
            Node::Repeat(false, 3, None, _)
        ));
        assert!(matches!(
            parse("a{3,}").unwrap().node,
            Node::Repeat(false, 3, Some(None), _)
        ));
        assert!(matches!(
            parse("a{3,5}").unwrap().node,
            Node::Repeat(false, 3, Some(Some(5)), _)
        ));
        // Out-of-order bounds parse; the compilers reject them.
        assert!(matches!(
            parse("a{5,2}").unwrap().node,
            Node::Repeat(false, 5, Some(Some(2)), _)
        ));
    }

    #[test]
    fn test_literal_brace_outside_unicode_mode() {
        let p = parse("a{x").unwrap();
        match &p.node {
            Node::Sequence(items) => assert_eq!(items.len(), 3),
            other => panic!("expected sequence, got {:?}", other),
        }
        let strict = parse_pattern(
            "a{2",
            FlagSet {
                unicode: true,
                ..FlagSet::default()
            },
        );
        assert!(strict.is_err());
    }

    #[test]
    fn test_parse_groups_and_numbering() {
        let p = parse("(a)(?:b)(?<x>c)").unwrap();
        assert_eq!(p.capture_count, 2);
        assert_eq!(p.names.get("x"), Some(&2));
    }

    #[test]
    fn test_parse_lookaround() {
        assert!(matches!(
            parse("(?=a)").unwrap().node,
            Node::LookAhead(false, _)
        ));
        assert!(matches!(
            parse("(?!a)").unwrap().node,
            Node::LookAhead(true, _)
        ));
        assert!(matches!(
            parse("(?<=a)").unwrap().node,
            Node::LookBehind(false, _)
        ));
        assert!(matches!(
            parse("(?<!a)").unwrap().node,
            Node::LookBehind(true, _)
        ));
    }

    #[test]
    fn test_quantified_assertion_rejected() {
        assert!(parse("^*").is_err());
        assert!(parse(r"\b+").is_err());
        assert!(parse("(?=a)*").is_err());
    }

    #[test]
    fn test_parse_class() {
        let p = parse("[a-z0\\d]").unwrap();
        match &p.node {
            Node::CharacterClass(false, items) => {
                assert_eq!(items[0], ClassItem::Range('a', 'z'));
                assert_eq!(items[1], ClassItem::Char('0'));
                assert_eq!(items[2], ClassItem::Escape(false, EscapeClassKind::Digit));
            }
            other => panic!("expected class, got {:?}", other),
        }
        assert!(matches!(
            parse("[^a]").unwrap().node,
            Node::CharacterClass(true, _)
        ));
    }

    #[test]
    fn test_class_errors() {
        assert!(parse("[a").is_err());
        assert!(parse("[z-a]").is_err());
    }

    #[test]
    fn test_backreferences() {
        let p = parse(r"(a)\1").unwrap();
        assert_eq!(p.capture_count, 1);
        assert!(parse(r"(a)\2").is_err());
        assert!(parse(r"(?<x>a)\k<x>").is_ok());
        assert!(parse(r"(?<x>a)\k<y>").is_err());
    }

    #[test]
    fn test_escapes() {
        assert_eq!(parse(r"\n").unwrap().node, Node::Character('\n'));
        assert_eq!(parse(r"\x41").unwrap().node, Node::Character('A'));
        assert_eq!(parse(r"A").unwrap().node, Node::Character('A'));
        assert_eq!(parse(r"\u{1F48B}").unwrap().node, Node::Character('💋'));
        assert_eq!(parse(r"\cJ").unwrap().node, Node::Character('\n'));
        assert_eq!(parse(r"\.").unwrap().node, Node::Character('.'));
    }

    #[test]
    fn test_surrogate_pair_combines() {
        assert_eq!(
            parse("\\uD83D\\uDC8B").unwrap().node,
            Node::Character('💋')
        );
        assert!(parse(r"\uD83D").is_err());
    }

    #[test]
    fn test_property_escapes() {
        assert!(matches!(
            parse(r"\p{Lu}").unwrap().node,
            Node::UnicodeProperty(false, _)
        ));
        assert!(matches!(
            parse(r"\P{L}").unwrap().node,
            Node::UnicodeProperty(true, _)
        ));
        assert!(matches!(
            parse(r"\p{Script=Greek}").unwrap().node,
            Node::UnicodePropertyValue(false, _, _)
        ));
        assert!(parse(r"\p{Bogus}").is_err());
    }

    #[test]
    fn test_unmatched_parens() {
        assert!(parse("(a").is_err());
        assert!(parse("a)").is_err());
    }

    #[test]
    fn test_parse_flags() {
        let f = parse_flags("gimsuy").unwrap();
        assert!(f.global && f.ignore_case && f.multiline && f.dot_all && f.unicode && f.sticky);
        assert!(parse_flags("gg").is_err());
        assert!(parse_flags("q").is_err());
        assert_eq!(parse_flags("").unwrap(), FlagSet::default());
    }
}
