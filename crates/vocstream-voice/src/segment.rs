//! Text segmentation for synthesis.
//!
//! Two layers of chunking exist, on purpose:
//! - the **outer** policy here ([`split_text`]) decides what enters the
//!   text queue, trading latency against chunk quality;
//! - the **inner** pass ([`sentence_units`]) re-splits each queued chunk
//!   into finer sentence units right before the synthesizer is called,
//!   which the model handles more naturally than long runs.
//!
//! An `!`-terminated sentence is always a hard boundary: it flushes any
//! pending merge buffer and is emitted on its own, never merged with the
//! text that follows it.

use vocstream_core::SegmenterConfig;

/// A contiguous text unit judged ready for synthesis.
///
/// Sequence indices are monotonic from 1 within one pipeline instance.
/// Segments are created by the segmentation side, consumed exactly once
/// by the synthesis stage, and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Position in the utterance, starting at 1.
    pub seq: u64,

    /// Chunk text (unsanitized; the synthesis stage sanitizes).
    pub text: String,

    /// Whether this is the first segment of its pipeline instance.
    pub is_first: bool,
}

impl Segment {
    /// Create a segment; `is_first` is derived from the sequence index.
    #[must_use]
    pub fn new(seq: u64, text: impl Into<String>) -> Self {
        Self {
            seq,
            text: text.into(),
            is_first: seq == 1,
        }
    }

    /// Short single-line preview of the text, for log lines.
    #[must_use]
    pub fn preview(&self) -> String {
        preview_of(&self.text)
    }
}

/// First 60 characters of `text` with newlines flattened to spaces.
#[must_use]
pub fn preview_of(text: &str) -> String {
    text.chars()
        .map(|c| if c == '\n' { ' ' } else { c })
        .take(60)
        .collect()
}

// ── Sanitization ───────────────────────────────────────────────────

/// Strip text down to what the synthesizer accepts.
///
/// Keeps Hangul syllables, ASCII letters and digits, whitespace, and the
/// punctuation allow-list `. , ? ! ~`; collapses whitespace runs to one
/// space. A chunk that sanitizes to nothing produces no artifact.
#[must_use]
pub fn sanitize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_space = false;

    for c in text.chars() {
        if c.is_whitespace() {
            if !prev_space && !out.is_empty() {
                out.push(' ');
                prev_space = true;
            }
        } else if is_allowed_char(c) {
            out.push(c);
            prev_space = false;
        }
        // everything else is dropped outright
    }

    out.trim_end().to_string()
}

fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || ('\u{AC00}'..='\u{D7A3}').contains(&c)
        || matches!(c, '.' | ',' | '?' | '!' | '~')
}

// ── Whole-string chunking ──────────────────────────────────────────

/// Sentence-ending separators for the outer split. Newline is handled
/// separately as a boundary that is not retained.
const SEPARATORS: [char; 8] = ['.', ',', '?', '!', '，', '。', '！', '？'];

/// Split a complete string into speakable chunks.
///
/// Raw sentences are cut at sentence-ending punctuation (retained with
/// the preceding text) and at newlines, then merged up to
/// `config.min_length` characters per chunk with the `!` hard-boundary
/// rule. With `first_chunk_fast_path` the first raw sentence is emitted
/// on its own regardless of length, so audio can start as early as
/// possible.
#[must_use]
pub fn split_text(text: &str, config: &SegmenterConfig) -> Vec<String> {
    let sentences = split_raw_sentences(text);
    let Some((first, rest)) = sentences.split_first() else {
        return Vec::new();
    };

    if config.first_chunk_fast_path {
        let mut chunks = vec![first.clone()];
        chunks.extend(merge_sentences(rest, config.min_length));
        chunks
    } else {
        merge_sentences(&sentences, config.min_length)
    }
}

/// Cut text into raw sentences at separators and newlines.
///
/// Separators stay attached to the preceding text; newlines only end the
/// current sentence. Sentences are trimmed and empties dropped.
fn split_raw_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    let mut flush = |current: &mut String| {
        let trimmed = current.trim();
        if !trimmed.is_empty() {
            sentences.push(trimmed.to_string());
        }
        current.clear();
    };

    for c in text.chars() {
        if c == '\n' {
            flush(&mut current);
        } else {
            current.push(c);
            if SEPARATORS.contains(&c) {
                flush(&mut current);
            }
        }
    }
    flush(&mut current);

    sentences
}

/// Merge raw sentences into chunks of at least `min_length` characters.
///
/// An `!`-terminated sentence flushes the pending buffer and is emitted
/// alone. A leftover buffer at end-of-input is appended to the last
/// emitted chunk, or becomes the sole chunk if nothing was emitted yet.
#[must_use]
pub fn merge_sentences<S: AsRef<str>>(sentences: &[S], min_length: usize) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    let mut buffer = String::new();

    for sentence in sentences {
        let sentence = sentence.as_ref().trim();
        if sentence.is_empty() {
            continue;
        }

        if sentence.ends_with(['!', '！']) {
            if !buffer.is_empty() {
                merged.push(std::mem::take(&mut buffer));
            }
            merged.push(sentence.to_string());
            continue;
        }

        if !buffer.is_empty() {
            buffer.push(' ');
        }
        buffer.push_str(sentence);

        if buffer.chars().count() >= min_length {
            merged.push(std::mem::take(&mut buffer));
        }
    }

    if !buffer.is_empty() {
        match merged.last_mut() {
            Some(last) => {
                last.push(' ');
                last.push_str(&buffer);
            }
            None => merged.push(buffer),
        }
    }

    merged
}

// ── Internal sentence units (synthesis-stage re-split) ─────────────

/// Re-split a sanitized chunk into the units actually sent to the
/// synthesizer.
///
/// The first sentence is kept on its own so synthesis of the chunk can
/// start immediately; the remainder is merged up to `min_unit_length`
/// with the same hard-boundary rule as the outer policy.
#[must_use]
pub fn sentence_units(text: &str, min_unit_length: usize) -> Vec<String> {
    let sentences = split_sentence_units(text);
    let Some((first, rest)) = sentences.split_first() else {
        return Vec::new();
    };

    let mut units = vec![first.clone()];
    units.extend(merge_sentences(rest, min_unit_length));
    units
}

/// Split at `.` `!` `?` (with any trailing whitespace absorbed), keeping
/// the terminator attached to the preceding text.
fn split_sentence_units(text: &str) -> Vec<String> {
    let mut units = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            while chars.peek().is_some_and(|n| n.is_whitespace()) {
                chars.next();
            }
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                units.push(trimmed.to_string());
            }
            current.clear();
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        units.push(trimmed.to_string());
    }

    units
}
