//! Command handlers — thin wrappers over the speech services.
//!
//! Everything that blocks (the synthesizer's HTTP client, the audio
//! device, queue backpressure) runs on the blocking pool, never on the
//! async executor.

use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use futures_util::StreamExt;
use vocstream_axum::ServerContext;
use vocstream_core::{PipelineConfig, StreamSegmenterConfig};
use vocstream_voice::backend::HttpSynthesizer;
use vocstream_voice::{
    RodioSink, SpeakQueue, SpeechService, StreamSegmenter, TokenSourceConfig, stages,
    token_source,
};

/// Build the synthesizer adapter off the async executor: it owns a
/// blocking HTTP client.
async fn build_synth(url: String) -> anyhow::Result<Arc<HttpSynthesizer>> {
    let synth = tokio::task::spawn_blocking(move || HttpSynthesizer::new(&url))
        .await
        .context("synthesizer setup task failed")??;
    Ok(Arc::new(synth))
}

/// Open the audio device and build the queueing controller.
async fn build_queue(
    synth: Arc<HttpSynthesizer>,
    config: PipelineConfig,
) -> anyhow::Result<Arc<SpeakQueue>> {
    tokio::task::spawn_blocking(move || -> anyhow::Result<Arc<SpeakQueue>> {
        let sink = Arc::new(RodioSink::new()?);
        Ok(Arc::new(SpeakQueue::new(synth, sink, config)?))
    })
    .await
    .context("audio setup task failed")?
}

/// `vocstream speak` — one-shot utterance, played or rendered to a file.
pub async fn speak(
    config: PipelineConfig,
    synth_url: String,
    text: Option<String>,
    file: Option<PathBuf>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let text = resolve_text(text, file)?;
    let synth = build_synth(synth_url).await?;

    if let Some(out) = output {
        let opts = config.synthesis.clone();
        let min_unit_length = config.min_unit_length;
        let out_for_task = out.clone();
        tokio::task::spawn_blocking(move || {
            stages::render_to_wav(synth.as_ref(), &opts, min_unit_length, &text, &out_for_task)
        })
        .await
        .context("render task failed")??;
        println!("Wrote {}", out.display());
        return Ok(());
    }

    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let sink = Arc::new(RodioSink::new()?);
        let service = SpeechService::new(synth, sink, config)?;
        service.speak(&text)?;
        service.wait_until_idle();
        Ok(())
    })
    .await
    .context("speech task failed")?
}

/// `vocstream chat` — stream a model response into speech, echoing the
/// text to stdout as it arrives.
pub async fn chat(
    config: PipelineConfig,
    synth_url: String,
    tokens: TokenSourceConfig,
    prompt: String,
) -> anyhow::Result<()> {
    let segmenter_config = StreamSegmenterConfig::default();
    let synth = build_synth(synth_url).await?;
    let queue = build_queue(synth, config).await?;

    let client = reqwest::Client::new();
    let stream = token_source::stream_tokens(&client, &tokens, &prompt)
        .await
        .context("failed to open token stream")?;

    let mut segmenter = StreamSegmenter::new(segmenter_config);
    futures_util::pin_mut!(stream);
    while let Some(item) = stream.next().await {
        match item {
            Ok(fragment) => {
                print!("{fragment}");
                let _ = std::io::stdout().flush();
                if let Some(chunk) = segmenter.push(&fragment) {
                    enqueue_chunk(&queue, chunk).await;
                }
            }
            Err(e) => {
                // Queued chunks keep draining; only segmentation stops.
                tracing::warn!(error = %e, "Token stream failed mid-response");
                break;
            }
        }
    }
    println!();

    if let Some(rest) = segmenter.finish() {
        enqueue_chunk(&queue, rest).await;
    }

    let draining = Arc::clone(&queue);
    tokio::task::spawn_blocking(move || draining.wait_until_idle())
        .await
        .context("drain task failed")?;
    Ok(())
}

/// `vocstream serve` — run the HTTP control surface.
pub async fn serve(
    config: PipelineConfig,
    synth_url: String,
    tokens: TokenSourceConfig,
    addr: SocketAddr,
) -> anyhow::Result<()> {
    let synth = build_synth(synth_url).await?;
    let queue = build_queue(synth, config).await?;
    let ctx = ServerContext::new(queue, tokens, StreamSegmenterConfig::default());

    vocstream_axum::serve(addr, ctx)
        .await
        .context("HTTP server failed")
}

// ── Helpers ────────────────────────────────────────────────────────

async fn enqueue_chunk(queue: &Arc<SpeakQueue>, chunk: String) {
    let q = Arc::clone(queue);
    match tokio::task::spawn_blocking(move || q.enqueue(&chunk)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "Failed to enqueue chunk"),
        Err(e) => tracing::warn!(error = %e, "Enqueue task failed"),
    }
}

fn resolve_text(text: Option<String>, file: Option<PathBuf>) -> anyhow::Result<String> {
    match (text, file) {
        (Some(text), None) => Ok(text),
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display())),
        (Some(_), Some(_)) => anyhow::bail!("provide either TEXT or --file, not both"),
        (None, None) => anyhow::bail!("provide TEXT or --file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_text_prefers_the_literal() {
        assert_eq!(resolve_text(Some("hi".into()), None).unwrap(), "hi");
    }

    #[test]
    fn resolve_text_reads_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.txt");
        std::fs::write(&path, "파일 내용").unwrap();
        assert_eq!(resolve_text(None, Some(path)).unwrap(), "파일 내용");
    }

    #[test]
    fn resolve_text_rejects_ambiguous_input() {
        assert!(resolve_text(Some("a".into()), Some("b".into())).is_err());
        assert!(resolve_text(None, None).is_err());
    }
}
