//! Sentence segmentation for incremental synthesis
//!
//! A boundary sits after any terminal punctuation (`.`, `!`, `?`) that is
//! followed by whitespace; the whitespace run stays with the preceding
//! sentence. The text after the last boundary is always emitted, so the
//! returned spans concatenate back to the input byte for byte.

/// Split `text` into sentence spans
///
/// Each span keeps its trailing whitespace, so `spans.concat() == text`.
/// The final remainder is always present, which means an empty input yields
/// a single empty span and input ending in a boundary yields a trailing empty
/// span. Use [`speakable_segments`] to get trimmed, non-empty sentences.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut prev: Option<char> = None;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let after_terminal = matches!(prev, Some('.' | '!' | '?'));
        if c.is_whitespace() && after_terminal {
            // Consume the whole whitespace run, split after it
            let mut end = i + c.len_utf8();
            while let Some(&(j, w)) = chars.peek() {
                if !w.is_whitespace() {
                    break;
                }
                end = j + w.len_utf8();
                chars.next();
            }
            spans.push(&text[start..end]);
            start = end;
            prev = None;
            continue;
        }
        prev = Some(c);
    }

    spans.push(&text[start..]);
    spans
}

/// Sentences ready for synthesis: trimmed, empty spans removed
#[must_use]
pub fn speakable_segments(text: &str) -> Vec<&str> {
    split_sentences(text)
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}
