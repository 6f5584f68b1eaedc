//! The language-model worker: token stream → streaming segmentation →
//! speech queue.
//!
//! One worker runs per `/api/chat` request; a new request cancels the
//! previous worker and stops the speech queue before starting. Upstream
//! failure aborts further segmentation, but chunks already handed to the
//! queue drain normally to completion.

use std::sync::Arc;
use std::time::Instant;

use futures_util::{Stream, StreamExt};
use vocstream_voice::{CancelToken, PipelineError, StreamSegmenter, token_source};

use crate::state::ServerContext;

/// Cancel any previous worker, reset state, and spawn a fresh one.
pub fn start_chat(ctx: &Arc<ServerContext>, prompt: String) {
    ctx.cancel_chat();
    ctx.queue.stop();
    ctx.reset_latest_text();

    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();
    let worker_ctx = Arc::clone(ctx);
    let handle = tokio::spawn(async move {
        run_chat_worker(&worker_ctx, &prompt, &worker_cancel).await;
    });

    ctx.set_chat(cancel, handle);
}

/// Open the token stream and pump it into the speech queue.
async fn run_chat_worker(ctx: &Arc<ServerContext>, prompt: &str, cancel: &CancelToken) {
    let started = Instant::now();
    tracing::info!(prompt_chars = prompt.chars().count(), "Chat worker started");

    match token_source::stream_tokens(&ctx.client, &ctx.tokens, &prompt).await {
        Ok(stream) => pump_fragments(ctx, stream, cancel, started).await,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to open token stream");
        }
    }
}

/// Segment arriving fragments and enqueue each finished chunk.
///
/// Factored apart from the HTTP plumbing so it can be driven by any
/// fragment stream in tests.
pub async fn pump_fragments<S>(
    ctx: &Arc<ServerContext>,
    stream: S,
    cancel: &CancelToken,
    started: Instant,
) where
    S: Stream<Item = Result<String, PipelineError>>,
{
    let mut segmenter = StreamSegmenter::new(ctx.segmenter.clone());
    let mut first_token_seen = false;
    let mut first_chunk_seen = false;

    futures_util::pin_mut!(stream);
    while let Some(item) = stream.next().await {
        if cancel.is_cancelled() {
            tracing::debug!("Chat worker cancelled");
            return;
        }

        let fragment = match item {
            Ok(fragment) => fragment,
            Err(e) => {
                // Abort further segmentation; queued chunks keep draining.
                tracing::warn!(error = %e, "Token stream failed mid-response");
                return;
            }
        };

        if !first_token_seen {
            first_token_seen = true;
            tracing::info!(elapsed_ms = started.elapsed().as_millis() as u64, "First token");
        }

        if let Some(chunk) = segmenter.push(&fragment) {
            if !first_chunk_seen {
                first_chunk_seen = true;
                tracing::info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "First chunk handed to speech queue"
                );
            }
            deliver_chunk(ctx, chunk).await;
        }
    }

    if !cancel.is_cancelled() {
        if let Some(rest) = segmenter.finish() {
            deliver_chunk(ctx, rest).await;
        }
    }
    tracing::debug!("Chat worker finished");
}

/// Record the chunk as partial text and hand it to the speech queue.
///
/// `enqueue` blocks under backpressure, so it runs on the blocking pool
/// rather than on the async executor.
async fn deliver_chunk(ctx: &Arc<ServerContext>, chunk: String) {
    ctx.append_latest_text(&chunk);

    let queue = Arc::clone(&ctx.queue);
    let joined = tokio::task::spawn_blocking(move || queue.enqueue(&chunk)).await;
    match joined {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "Failed to enqueue chunk"),
        Err(e) => tracing::warn!(error = %e, "Enqueue task failed"),
    }
}
