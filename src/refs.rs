//! Reference block extraction for streamed assistant replies
//!
//! A reply ends with `<<REFS>>id1,id2<</REFS>>`. While the reply is still
//! streaming the block must not leak into the visible text, so the scanner
//! hides everything from the opening delimiter on as soon as it appears.
//!
//! [`RefExtractor`] is fed the whole accumulated text on every update but
//! only scans the bytes it has not looked at yet.

use regex::Regex;
use std::sync::LazyLock;

/// Opening delimiter of the reference block
pub const OPEN_TAG: &str = "<<REFS>>";

/// Closing delimiter of the reference block
pub const CLOSE_TAG: &str = "<</REFS>>";

/// Reference ids are plain decimal numbers
static REF_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+$").unwrap());

/// Text to show plus the ids the reply referenced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Reply text with the reference block hidden
    pub visible_text: String,
    /// Numeric ids from a complete block, in order
    pub reference_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum ScanState {
    #[default]
    NoDelimiterSeen,
    OpenSeen {
        open_at: usize,
    },
    Closed {
        open_at: usize,
        ids: Vec<String>,
    },
}

/// Incremental scanner over a growing reply buffer
#[derive(Debug, Clone, Default)]
pub struct RefExtractor {
    state: ScanState,
    /// Bytes of the buffer already scanned for the next delimiter
    scanned: usize,
}

impl RefExtractor {
    /// Create a scanner for a new reply
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything; the next update scans from the start
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// True once a complete block has been seen
    pub fn is_closed(&self) -> bool {
        matches!(self.state, ScanState::Closed { .. })
    }

    /// Scan the accumulated `text` and report what to show.
    ///
    /// `text` must extend the text of the previous call. A shorter buffer
    /// means a new reply and restarts the scan.
    pub fn update(&mut self, text: &str) -> Extraction {
        if text.len() < self.scanned {
            self.reset();
        }

        if self.state == ScanState::NoDelimiterSeen {
            match find_from(text, OPEN_TAG, self.scanned) {
                Some(open_at) => {
                    self.state = ScanState::OpenSeen { open_at };
                    self.scanned = open_at + OPEN_TAG.len();
                }
                None => self.scanned = text.len(),
            }
        }

        if let ScanState::OpenSeen { open_at } = self.state {
            match find_from(text, CLOSE_TAG, self.scanned) {
                Some(close_at) => {
                    let ids = parse_ids(&text[open_at + OPEN_TAG.len()..close_at]);
                    self.state = ScanState::Closed { open_at, ids };
                    self.scanned = close_at + CLOSE_TAG.len();
                }
                None => self.scanned = text.len(),
            }
        }

        match &self.state {
            ScanState::NoDelimiterSeen => Extraction {
                visible_text: text.to_string(),
                reference_ids: Vec::new(),
            },
            ScanState::OpenSeen { open_at } => Extraction {
                visible_text: text[..*open_at].trim_end().to_string(),
                reference_ids: Vec::new(),
            },
            ScanState::Closed { open_at, ids } => Extraction {
                visible_text: text[..*open_at].trim_end().to_string(),
                reference_ids: ids.clone(),
            },
        }
    }
}

/// One-shot extraction over a complete (or partial) reply
pub fn extract_refs(text: &str) -> Extraction {
    RefExtractor::new().update(text)
}

/// Find `needle` in `text`, looking only at matches that end past `scanned`.
///
/// Backs up far enough to catch a delimiter split across two updates.
fn find_from(text: &str, needle: &str, scanned: usize) -> Option<usize> {
    let mut start = scanned.saturating_sub(needle.len() - 1).min(text.len());
    while !text.is_char_boundary(start) {
        start -= 1;
    }
    text[start..].find(needle).map(|pos| start + pos)
}

fn parse_ids(block: &str) -> Vec<String> {
    block
        .split(',')
        .map(str::trim)
        .filter(|token| REF_ID_REGEX.is_match(token))
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("Hello <<REFS>>123,45,abc<</REFS>>", "Hello", &["123", "45"] ; "complete block")]
    #[test_case("Hello <<REFS>>12", "Hello", &[] ; "open block")]
    #[test_case("Hello world", "Hello world", &[] ; "no block")]
    #[test_case("Hello world  ", "Hello world  ", &[] ; "no block keeps whitespace")]
    #[test_case("Done.\n<<REFS>><</REFS>>", "Done.", &[] ; "empty block")]
    #[test_case("x <<REFS>> 1 , 2 ,,3<</REFS>>", "x", &["1", "2", "3"] ; "whitespace around ids")]
    #[test_case("x <<REFS>>-1,1.5,٣,7<</REFS>>", "x", &["7"] ; "only ascii digits")]
    #[test_case("a <<REFS>>1<</REFS>> tail <<REFS>>2<</REFS>>", "a", &["1"] ; "first block wins")]
    #[test_case("Hello <<REF", "Hello <<REF", &[] ; "partial open tag stays visible")]
    fn test_extract(text: &str, visible: &str, ids: &[&str]) {
        let extraction = extract_refs(text);
        assert_eq!(extraction.visible_text, visible);
        assert_eq!(extraction.reference_ids, ids);
    }

    #[test]
    fn test_idempotent() {
        let text = "Answer <<REFS>>1,2<</REFS>>";
        let mut extractor = RefExtractor::new();
        let first = extractor.update(text);
        let second = extractor.update(text);
        assert_eq!(first, second);
        assert_eq!(first, extract_refs(text));
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        let reply = "Two posts about Rust ✨ fit.\n<<REFS>>1001, 2002,oops<</REFS>>";
        let mut extractor = RefExtractor::new();
        let mut buffer = String::new();

        for ch in reply.chars() {
            buffer.push(ch);
            let streamed = extractor.update(&buffer);
            assert_eq!(streamed, extract_refs(&buffer), "at {buffer:?}");
            assert!(!streamed.visible_text.contains("<<REFS>>"));
        }

        assert!(extractor.is_closed());
        assert_eq!(
            extractor.update(&buffer).reference_ids,
            vec!["1001".to_string(), "2002".to_string()]
        );
    }

    #[test]
    fn test_delimiter_split_across_updates() {
        let mut extractor = RefExtractor::new();
        assert_eq!(extractor.update("Hi <<RE").visible_text, "Hi <<RE");
        assert_eq!(extractor.update("Hi <<REFS>>4").visible_text, "Hi");
        let done = extractor.update("Hi <<REFS>>4<</RE");
        assert!(done.reference_ids.is_empty());
        let done = extractor.update("Hi <<REFS>>4<</REFS>>");
        assert_eq!(done.reference_ids, vec!["4".to_string()]);
    }

    #[test]
    fn test_shorter_buffer_restarts() {
        let mut extractor = RefExtractor::new();
        extractor.update("Old reply <<REFS>>1<</REFS>>");
        assert!(extractor.is_closed());

        let fresh = extractor.update("New");
        assert_eq!(fresh.visible_text, "New");
        assert!(!extractor.is_closed());
    }
}
