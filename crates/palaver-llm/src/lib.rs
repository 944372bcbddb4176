//! Completion client abstraction for the palaver chat backend.
//!
//! Defines the provider-agnostic [`CompletionClient`] trait, the
//! OpenAI-compatible streaming implementation, and the tokenizer
//! adapter used to meter streamed output.

pub mod client;
pub mod error;
pub mod openai;
pub mod token;

pub use client::{
    CompletionClient, CompletionRequest, Fragment, FragmentStream, SharedClient, UsageSignal,
};
pub use error::{ClientError, Result};
pub use openai::{OpenAiClient, OpenAiConfig};
pub use token::TokenCounter;

#[cfg(any(test, feature = "testing"))]
pub use client::MockClient;
