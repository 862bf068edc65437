//! Inference backend
//!
//! [`InferenceBackend`] is the seam between the fan-out and the remote model
//! server. [`OpenAiCompatClient`] streams chat completions from any
//! OpenAI-compatible endpoint (vLLM, SGLang, llama.cpp server) and measures time
//! to first token locally.

mod backend;
mod client;
pub mod sse_decoder;

pub use backend::{Completion, InferenceBackend};
pub use client::OpenAiCompatClient;

#[cfg(test)]
pub use backend::MockInferenceBackend;
