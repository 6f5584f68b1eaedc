//! Incremental segmentation of a live token stream.
//!
//! Unlike [`split_text`](crate::segment::split_text), which sees the
//! whole utterance at once, this accumulator decides per arriving
//! fragment whether the buffer is worth speaking yet. The first chunk is
//! released at the first sentence terminator regardless of length (time
//! to first audio beats chunk quality exactly once); later chunks wait
//! for both a terminator and `min_len` characters, with `soft_max_len`
//! as the escape hatch when the source refuses to punctuate.

use vocstream_core::StreamSegmenterConfig;

/// Push-style segmenter over a stream of text fragments.
///
/// Feed fragments with [`push`](Self::push) as they arrive; call
/// [`finish`](Self::finish) at end-of-stream to flush the remainder.
/// The whole input is never buffered — at most one pending chunk is.
#[derive(Debug)]
pub struct StreamSegmenter {
    config: StreamSegmenterConfig,
    buffer: String,
    first_chunk: bool,
}

impl StreamSegmenter {
    /// Create a segmenter with the given thresholds.
    #[must_use]
    pub const fn new(config: StreamSegmenterConfig) -> Self {
        Self {
            config,
            buffer: String::new(),
            first_chunk: true,
        }
    }

    /// Accumulate one fragment; returns a chunk if one became ready.
    pub fn push(&mut self, fragment: &str) -> Option<String> {
        self.buffer.push_str(fragment);

        let trimmed = self.buffer.trim();
        if trimmed.is_empty() {
            return None;
        }

        if self.first_chunk {
            if ends_with_terminator(trimmed) {
                return Some(self.take_buffer());
            }
            return None;
        }

        let len = trimmed.chars().count();
        if len >= self.config.min_len && ends_with_terminator(trimmed) {
            return Some(self.take_buffer());
        }

        // Safety valve for terminator-starved output.
        if len >= self.config.soft_max_len {
            return Some(self.take_buffer());
        }

        None
    }

    /// Flush whatever is left at end-of-stream.
    #[must_use]
    pub fn finish(mut self) -> Option<String> {
        if self.buffer.trim().is_empty() {
            None
        } else {
            Some(self.take_buffer())
        }
    }

    fn take_buffer(&mut self) -> String {
        self.first_chunk = false;
        std::mem::take(&mut self.buffer)
    }
}

/// `. ! ?` optionally followed by trailing whitespace.
fn ends_with_terminator(s: &str) -> bool {
    s.trim_end().ends_with(['.', '!', '?'])
}

/// Run a finite fragment iterator through a [`StreamSegmenter`].
///
/// Lazy: each chunk is produced as soon as its deciding fragment
/// arrives, without draining the rest of `fragments` first.
pub fn segment_fragments<I>(
    fragments: I,
    config: StreamSegmenterConfig,
) -> impl Iterator<Item = String>
where
    I: IntoIterator<Item = String>,
{
    FragmentChunks {
        fragments: fragments.into_iter(),
        segmenter: Some(StreamSegmenter::new(config)),
    }
}

struct FragmentChunks<I> {
    fragments: I,
    segmenter: Option<StreamSegmenter>,
}

impl<I: Iterator<Item = String>> Iterator for FragmentChunks<I> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let segmenter = self.segmenter.as_mut()?;
        for fragment in self.fragments.by_ref() {
            if let Some(chunk) = segmenter.push(&fragment) {
                return Some(chunk);
            }
        }
        // Source exhausted: flush the remainder exactly once.
        self.segmenter.take().and_then(StreamSegmenter::finish)
    }
}
