//! Segmentation of plain text into sentence-like units
//!
//! A document is a list of elements (paragraphs). Every element is cut into
//! sentences; each [`SourceUnit`] remembers the element it came from and the
//! byte range it covers inside that element, which is what a highlighter
//! needs to mark the text being spoken.

use once_cell::sync::Lazy;
use regex::Regex;

/// Sentence end followed by a space and a capital letter
static SENTENCE_BREAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[a-zA-Z0-9\])] ?[?;:!.] [A-Z]").expect("sentence break pattern is valid")
});

/// Sentence end at the very end of the text
static SENTENCE_TAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[a-zA-Z0-9\])] ?[?;:!.]\s*$").expect("sentence tail pattern is valid")
});

/// Opaque handle of a text element (paragraph) in a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub usize);

/// One unit of text to be synthesized and highlighted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    /// Raw sentence text
    pub sentence: String,
    /// Elements the sentence spans, in document order
    pub elements: Vec<ElementId>,
    /// Byte offset of the sentence start inside the first element
    pub start: usize,
    /// Byte offset of the sentence end inside the last element
    pub end: usize,
}

/// Producer of sentence-like units.
///
/// Each call to [`TextSource::units`] restarts from the beginning.
pub trait TextSource: Send + Sync {
    /// Fresh, lazy iterator over the units of the source in document order
    fn units(&self) -> Box<dyn Iterator<Item = SourceUnit> + Send>;
}

/// Return the byte index at which the first sentence of `text` ends.
///
/// - After `X?` / `X ?` (any of `?;:!.`) followed by a space and a capital
///   letter: the split lands three bytes after the match start.
/// - On trailing terminal punctuation: `text.len()`.
/// - Otherwise `text.len() + 1`, meaning "no complete sentence here".
pub fn split_sentence(text: &str) -> usize {
    if let Some(m) = SENTENCE_BREAK.find(text) {
        return m.start() + 3;
    }
    if SENTENCE_TAIL.is_match(text) {
        return text.len();
    }
    text.len() + 1
}

/// Plain-text document split into paragraph elements
#[derive(Debug, Clone, Default)]
pub struct TextDocument {
    elements: Vec<String>,
}

impl TextDocument {
    /// Build a document from text; blank lines separate elements.
    pub fn from_text(text: &str) -> Self {
        let mut elements = Vec::new();
        let mut current = String::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                if !current.is_empty() {
                    elements.push(std::mem::take(&mut current));
                }
                continue;
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(line);
        }
        if !current.is_empty() {
            elements.push(current);
        }
        Self { elements }
    }

    /// Text of an element, if it exists
    pub fn element_text(&self, id: ElementId) -> Option<&str> {
        self.elements.get(id.0).map(String::as_str)
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// True when the document has no elements
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl TextSource for TextDocument {
    fn units(&self) -> Box<dyn Iterator<Item = SourceUnit> + Send> {
        Box::new(SentenceIter {
            elements: self.elements.clone(),
            element: 0,
            offset: 0,
        })
    }
}

/// Walks elements and cuts each one into sentences
struct SentenceIter {
    elements: Vec<String>,
    element: usize,
    offset: usize,
}

impl Iterator for SentenceIter {
    type Item = SourceUnit;

    fn next(&mut self) -> Option<SourceUnit> {
        loop {
            let text = self.elements.get(self.element)?;
            if self.offset >= text.len() {
                self.element += 1;
                self.offset = 0;
                continue;
            }
            let start = self.offset;
            let end = (split_sentence(&text[start..]) + start).min(text.len());
            self.offset = end;
            return Some(SourceUnit {
                sentence: text[start..end].to_string(),
                elements: vec![ElementId(self.element)],
                start,
                end,
            });
        }
    }
}
