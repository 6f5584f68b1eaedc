//! HTTP synthesizer adapter.
//!
//! Talks to a synthesis server whose `/tts` endpoint accepts text plus
//! voice parameters and answers with a WAV body. The neural model and
//! its voice styles are loaded once by that server; this adapter is
//! deliberately stateless beyond its connection pool.
//!
//! Uses the blocking `reqwest` client: synthesis runs on the pipeline's
//! dedicated producer thread, never on an async executor.

use std::io::Cursor;
use std::time::Duration;

use serde::Serialize;
use vocstream_core::{SpeechSynthesizer, SynthError, SynthesisOptions, Waveform};

use crate::artifact::decode_wav;

/// Default request timeout for one synthesis call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Request body for the synthesis server.
#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    language: &'a str,
    voice_style: &'a str,
    diffusion_steps: u32,
    speed: f32,
}

/// [`SpeechSynthesizer`] backed by a remote synthesis server.
pub struct HttpSynthesizer {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpSynthesizer {
    /// Create an adapter for the server at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, SynthError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SynthError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/tts", base_url.trim_end_matches('/')),
        })
    }

    /// The resolved synthesis endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl SpeechSynthesizer for HttpSynthesizer {
    fn synthesize(&self, text: &str, opts: &SynthesisOptions) -> Result<Waveform, SynthError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&TtsRequest {
                text,
                language: &opts.language,
                voice_style: &opts.voice_style,
                diffusion_steps: opts.diffusion_steps,
                speed: opts.speed,
            })
            .send()
            .map_err(|e| SynthError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SynthError::Rejected(format!(
                "{status} from {}",
                self.endpoint
            )));
        }

        let body = response
            .bytes()
            .map_err(|e| SynthError::Request(e.to_string()))?;

        decode_wav(Cursor::new(body.as_ref())).map_err(|e| SynthError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_normalizes_trailing_slash() {
        let synth = HttpSynthesizer::new("http://localhost:5005/").unwrap();
        assert_eq!(synth.endpoint(), "http://localhost:5005/tts");
    }

    #[test]
    fn request_body_carries_all_voice_parameters() {
        let req = TtsRequest {
            text: "안녕하세요.",
            language: "ko",
            voice_style: "M1",
            diffusion_steps: 5,
            speed: 1.2,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["text"], "안녕하세요.");
        assert_eq!(json["language"], "ko");
        assert_eq!(json["voice_style"], "M1");
        assert_eq!(json["diffusion_steps"], 5);
        assert!((json["speed"].as_f64().unwrap() - 1.2).abs() < 1e-6);
    }
}
