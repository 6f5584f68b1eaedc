//! Streaming token source — NDJSON over a long-lived HTTP response.
//!
//! The language model serves `POST {host}/api/generate` and streams one
//! JSON object per line: `{"response": "<fragment>", "done": false}`,
//! terminated by the first line with `done: true` (or stream close).
//! This module frames the byte stream into lines, decodes each one, and
//! yields the text fragments.

use bytes::BytesMut;
use futures_util::{Stream, StreamExt, stream::BoxStream};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Where the token source lives and which model to ask for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSourceConfig {
    /// Base URL of the generation server.
    pub host: String,

    /// Model identifier passed through verbatim.
    pub model: String,
}

impl Default for TokenSourceConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".to_string(),
            model: "qwen2.5:1.5b".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// One decoded NDJSON line.
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: Option<String>,

    #[serde(default)]
    done: bool,
}

/// Open a generation stream and return its text fragments.
///
/// The returned stream ends at the first `done: true` line or when the
/// connection closes. A transport error mid-stream is yielded once as an
/// `Err` and ends the stream — callers abort further segmentation but
/// let already-queued segments drain normally.
pub async fn stream_tokens(
    client: &reqwest::Client,
    config: &TokenSourceConfig,
    prompt: &str,
) -> Result<BoxStream<'static, Result<String, PipelineError>>, PipelineError> {
    let url = format!("{}/api/generate", config.host.trim_end_matches('/'));

    let response = client
        .post(&url)
        .json(&GenerateRequest {
            model: &config.model,
            prompt,
            stream: true,
        })
        .send()
        .await?
        .error_for_status()?;

    Ok(fragment_stream(response.bytes_stream()).boxed())
}

/// State threaded through the `unfold` stream.
struct FragmentState {
    stream: BoxStream<'static, Result<bytes::Bytes, reqwest::Error>>,
    buf: BytesMut,
    done: bool,
}

/// Frame an NDJSON byte stream into text fragments.
pub(crate) fn fragment_stream<S>(
    byte_stream: S,
) -> impl Stream<Item = Result<String, PipelineError>> + Send
where
    S: Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
{
    let state = FragmentState {
        stream: byte_stream.boxed(),
        buf: BytesMut::new(),
        done: false,
    };

    futures_util::stream::unfold(state, |mut st| async move {
        if st.done {
            return None;
        }

        loop {
            // Drain complete lines from the buffer first.
            while let Some(line_end) = find_newline(&st.buf) {
                let line = st.buf.split_to(line_end);
                let line = String::from_utf8_lossy(&line);
                if let Some(fragment) = decode_line(&line, &mut st.done) {
                    return Some((Ok(fragment), st));
                }
                if st.done {
                    return None;
                }
            }

            // Need more data from upstream.
            match st.stream.next().await {
                Some(Ok(chunk)) => st.buf.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(PipelineError::TokenSource(e)), st));
                }
                None => {
                    // Stream closed: a final line may lack its newline.
                    st.done = true;
                    let leftover = st.buf.split();
                    let line = String::from_utf8_lossy(&leftover);
                    let mut ignored = false;
                    return decode_line(&line, &mut ignored).map(|fragment| (Ok(fragment), st));
                }
            }
        }
    })
}

/// Decode one NDJSON line into its fragment, if any.
///
/// Blank and undecodable lines are skipped (logged at debug — a junk
/// line is not a pipeline failure). Sets `done` on the terminator line.
fn decode_line(line: &str, done: &mut bool) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<GenerateChunk>(trimmed) {
        Ok(chunk) => {
            if chunk.done {
                *done = true;
            }
            chunk.response.filter(|fragment| !fragment.is_empty())
        }
        Err(e) => {
            tracing::debug!(error = %e, "Skipping undecodable token-source line");
            None
        }
    }
}

/// Position just past the next newline in the buffer.
fn find_newline(buf: &BytesMut) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n').map(|pos| pos + 1)
}
