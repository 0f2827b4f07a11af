//! Splits note text into overlapping word windows for extraction and embedding.

/// Window of a note's text sent to extraction and embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Position of the chunk within its note
    pub index: usize,
    pub text: String,
    /// Word index of the first token
    pub start: usize,
    /// Word index after the last token
    pub end: usize,
}

/// Word splitter with overlap between consecutive chunks.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    size: usize,
    overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(400, 50)
    }
}

impl TextSplitter {
    pub fn new(size: usize, overlap: usize) -> Self {
        Self {
            size: size.max(1),
            overlap: overlap.min(size.saturating_sub(1)),
        }
    }

    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        let step = self.size.saturating_sub(self.overlap).max(1);
        let mut chunks = Vec::new();
        let mut idx = 0;

        while idx < words.len() {
            let end = (idx + self.size).min(words.len());
            chunks.push(TextChunk {
                index: chunks.len(),
                text: words[idx..end].join(" "),
                start: idx,
                end,
            });

            if end == words.len() {
                break;
            }
            idx += step;
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respects_overlap() {
        let splitter = TextSplitter::new(4, 1);
        let chunks = splitter.split("one two three four five six seven");

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "one two three four");
        assert_eq!(chunks[1].text, "four five six seven");
        assert_eq!(chunks[1].index, 1);
    }

    #[test]
    fn blank_text_has_no_chunks() {
        let splitter = TextSplitter::new(4, 1);
        assert!(splitter.split("").is_empty());
        assert!(splitter.split("   \t\n  ").is_empty());
    }

    #[test]
    fn no_overlap_partitions_words() {
        let splitter = TextSplitter::new(2, 0);
        let texts: Vec<String> = splitter
            .split("a b c d e f")
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(texts, vec!["a b", "c d", "e f"]);
    }

    #[test]
    fn oversized_overlap_is_clamped() {
        let splitter = TextSplitter::new(3, 10);
        let chunks = splitter.split("a b c d e f g");
        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks.last().unwrap().text, "e f g");
    }

    #[test]
    fn zero_size_uses_minimum() {
        let splitter = TextSplitter::new(0, 0);
        assert_eq!(splitter.split("word").len(), 1);
    }

    #[test]
    fn markdown_note_fits_default_window() {
        let note = "# Dune\n\nFrank Herbert wrote *Dune* in 1965.\n\n- [[Arrakis]]\n- [[Paul Atreides]]";
        let chunks = TextSplitter::default().split(note);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start, 0);
        assert!(chunks[0].text.contains("[[Paul Atreides]]"));
    }
}
