//! Synthesizer backends.
//!
//! The pipeline only sees the [`SpeechSynthesizer`] trait from
//! `vocstream-core`; concrete adapters live here so engines can be
//! swapped without touching stage logic.
//!
//! | Module       | Backend                                    |
//! |--------------|--------------------------------------------|
//! | [`http_tts`] | Remote synthesis server returning WAV data |

pub mod http_tts;

pub use http_tts::HttpSynthesizer;

#[doc(inline)]
pub use vocstream_core::SpeechSynthesizer;
