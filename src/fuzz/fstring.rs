//! Compact fuzz-candidate strings with a scalable repetition parameter.

/// One element of an [`FString`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Element {
    /// A literal character.
    Wrap(char),
    /// Repeats the preceding `size` elements `n·m` additional times,
    /// where `n` is the string's outer parameter.
    Repeat(usize, usize),
}

/// A fuzz candidate: a sequence of elements plus the repetition parameter
/// `n`. Scaling `n` scales every `Repeat` without touching the shape, which
/// is what lets a promising candidate be blown up into an attack.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FString {
    pub n: usize,
    elements: Vec<Element>,
}

/// Expansion stops growing past this many characters; candidates near the
/// cap are rejected by the attack-size check anyway.
const EXPANSION_CAP: usize = 1 << 20;

impl FString {
    pub fn new(n: usize, elements: Vec<Element>) -> Self {
        Self {
            n: n.max(1),
            elements,
        }
    }

    pub fn from_chars(chars: &[char]) -> Self {
        Self::new(1, chars.iter().copied().map(Element::Wrap).collect())
    }

    pub fn size(&self) -> usize {
        self.elements.len()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// True when the string has no `Repeat`, i.e. scaling `n` is a no-op.
    pub fn is_constant(&self) -> bool {
        self.elements
            .iter()
            .all(|e| matches!(e, Element::Wrap(_)))
    }

    pub fn with_n(&self, n: usize) -> FString {
        FString::new(n, self.elements.clone())
    }

    pub fn map_n(&self, f: impl FnOnce(usize) -> usize) -> FString {
        FString::new(f(self.n), self.elements.clone())
    }

    pub fn insert_at(&self, pos: usize, element: Element) -> FString {
        let pos = pos.min(self.elements.len());
        let mut elements = self.elements.clone();
        elements.insert(pos, element);
        FString::new(self.n, elements)
    }

    pub fn insert_all_at(&self, pos: usize, new: &[Element]) -> FString {
        let pos = pos.min(self.elements.len());
        let mut elements = self.elements.clone();
        elements.splice(pos..pos, new.iter().copied());
        FString::new(self.n, elements)
    }

    pub fn replace_at(&self, pos: usize, element: Element) -> FString {
        let mut elements = self.elements.clone();
        if pos < elements.len() {
            elements[pos] = element;
        }
        FString::new(self.n, elements)
    }

    pub fn delete(&self, pos: usize, len: usize) -> FString {
        let pos = pos.min(self.elements.len());
        let end = (pos + len).min(self.elements.len());
        let mut elements = self.elements.clone();
        elements.drain(pos..end);
        FString::new(self.n, elements)
    }

    /// Swaps tails at the cut points, producing two offspring.
    pub fn cross(&self, other: &FString, pos1: usize, pos2: usize) -> (FString, FString) {
        let pos1 = pos1.min(self.elements.len());
        let pos2 = pos2.min(other.elements.len());
        let mut first = self.elements[..pos1].to_vec();
        first.extend_from_slice(&other.elements[pos2..]);
        let mut second = other.elements[..pos2].to_vec();
        second.extend_from_slice(&self.elements[pos1..]);
        (
            FString::new(self.n, first),
            FString::new(other.n, second),
        )
    }

    /// Expands to a concrete string at the current `n`.
    pub fn to_ustring(&self) -> Vec<char> {
        let mut segments: Vec<Vec<char>> = Vec::with_capacity(self.elements.len());
        let mut total = 0usize;
        for (idx, element) in self.elements.iter().enumerate() {
            let segment = match element {
                Element::Wrap(c) => vec![*c],
                Element::Repeat(m, size) => {
                    let span_from = idx - (*size).min(idx);
                    let span: Vec<char> = segments[span_from..idx].concat();
                    let times = self.n.saturating_mul(*m);
                    let mut out = Vec::new();
                    if !span.is_empty() {
                        for _ in 0..times {
                            if total + out.len() + span.len() > EXPANSION_CAP {
                                break;
                            }
                            out.extend_from_slice(&span);
                        }
                    }
                    out
                }
            };
            total = total.saturating_add(segment.len());
            segments.push(segment);
            if total > EXPANSION_CAP {
                break;
            }
        }
        segments.concat()
    }
}
