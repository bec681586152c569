//! # relief-llm
//!
//! Language model provider client for intent classification.
//!
//! The assist core treats the provider as an unreliable, rate-limited,
//! possibly-absent dependency: one non-streaming completion round trip per
//! classification attempt, no retries. Everything here returns
//! [`ProviderError`] and lets the caller decide how to degrade.
//!
//! - [`provider::CompletionProvider`] — the seam the classifier depends on
//! - [`gemini::GeminiProvider`] — `generateContent` REST implementation
//! - [`schema::classification_schema`] — the closed-enum response schema

#![deny(unsafe_code)]

pub mod gemini;
pub mod provider;
pub mod schema;

pub use gemini::GeminiProvider;
pub use provider::{CompletionProvider, CompletionRequest, ProviderError, ProviderResult};
