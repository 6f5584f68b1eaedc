//! HTTP surface tests against fake-backed speech services.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use tower::ServiceExt;

use vocstream_axum::chat_worker::pump_fragments;
use vocstream_axum::{ServerContext, build_router};
use vocstream_core::{
    AudioSink, PipelineConfig, SinkError, SpeechSynthesizer, StreamSegmenterConfig, SynthError,
    SynthesisOptions, Waveform,
};
use vocstream_voice::{CancelToken, SpeakQueue, TokenSourceConfig};

// ── Fakes ──────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeSynth;

impl SpeechSynthesizer for FakeSynth {
    fn synthesize(&self, _text: &str, _opts: &SynthesisOptions) -> Result<Waveform, SynthError> {
        Ok(Waveform::new(vec![0.01; 32], 8_000))
    }
}

#[derive(Default)]
struct FakeSink {
    played: Mutex<usize>,
}

impl FakeSink {
    fn play_count(&self) -> usize {
        *self.played.lock().unwrap()
    }
}

impl AudioSink for FakeSink {
    fn play(&self, _path: &Path) -> Result<(), SinkError> {
        *self.played.lock().unwrap() += 1;
        Ok(())
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn test_context(scratch: &Path, sink: Arc<FakeSink>) -> Arc<ServerContext> {
    let config = PipelineConfig {
        poll_interval_ms: 25,
        scratch_dir: Some(scratch.to_path_buf()),
        ..PipelineConfig::default()
    };
    let queue = Arc::new(
        SpeakQueue::new(Arc::new(FakeSynth), sink as Arc<dyn AudioSink>, config).unwrap(),
    );
    ServerContext::new(
        queue,
        TokenSourceConfig::default(),
        StreamSegmenterConfig::default(),
    )
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn wait_until_idle(ctx: &Arc<ServerContext>) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if ctx.queue.is_idle() && !ctx.chat_active() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("context never went idle");
}

// ── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn status_starts_idle() {
    let scratch = tempfile::tempdir().unwrap();
    let ctx = test_context(scratch.path(), Arc::new(FakeSink::default()));

    let response = build_router(ctx)
        .oneshot(
            Request::builder()
                .uri("/api/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["state"], "idle");
    assert_eq!(json["text"], "");
}

#[tokio::test]
async fn speak_queues_text_and_plays_it() {
    let scratch = tempfile::tempdir().unwrap();
    let sink = Arc::new(FakeSink::default());
    let ctx = test_context(scratch.path(), Arc::clone(&sink));

    let response = build_router(Arc::clone(&ctx))
        .oneshot(json_request(
            "POST",
            "/api/speak",
            serde_json::json!({"text": "안녕하세요. 오늘도 좋은 하루입니다."}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    wait_until_idle(&ctx).await;
    assert!(sink.play_count() >= 1);
}

#[tokio::test]
async fn speak_rejects_blank_text() {
    let scratch = tempfile::tempdir().unwrap();
    let ctx = test_context(scratch.path(), Arc::new(FakeSink::default()));

    let response = build_router(ctx)
        .oneshot(json_request(
            "POST",
            "/api/speak",
            serde_json::json!({"text": "   "}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn stop_halts_everything() {
    let scratch = tempfile::tempdir().unwrap();
    let ctx = test_context(scratch.path(), Arc::new(FakeSink::default()));

    ctx.queue.enqueue("멈출 문장입니다.").unwrap();
    let response = build_router(Arc::clone(&ctx))
        .oneshot(json_request("POST", "/api/stop", serde_json::json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    wait_until_idle(&ctx).await;
}

#[tokio::test]
async fn pump_fragments_tracks_text_and_feeds_the_queue() {
    let scratch = tempfile::tempdir().unwrap();
    let sink = Arc::new(FakeSink::default());
    let ctx = test_context(scratch.path(), Arc::clone(&sink));

    let fragments = [
        "안녕하세요. ",
        "반갑습니다 ",
        "오늘 날씨가 아주 ",
        "좋네요!",
    ];
    let stream = futures_util::stream::iter(
        fragments
            .iter()
            .map(|f| Ok::<_, vocstream_voice::PipelineError>((*f).to_string())),
    );

    pump_fragments(&ctx, stream, &CancelToken::new(), Instant::now()).await;
    wait_until_idle(&ctx).await;

    // Partial text reassembles the full response.
    assert_eq!(ctx.latest_text(), fragments.concat());
    assert!(sink.play_count() >= 1);
}

#[tokio::test]
async fn cancelled_pump_stops_feeding() {
    let scratch = tempfile::tempdir().unwrap();
    let sink = Arc::new(FakeSink::default());
    let ctx = test_context(scratch.path(), Arc::clone(&sink));

    let cancel = CancelToken::new();
    cancel.cancel();

    let stream = futures_util::stream::iter(vec![Ok::<_, vocstream_voice::PipelineError>(
        "취소된 문장입니다.".to_string(),
    )]);
    pump_fragments(&ctx, stream, &cancel, Instant::now()).await;

    assert_eq!(ctx.latest_text(), "");
    assert_eq!(sink.play_count(), 0);
}
