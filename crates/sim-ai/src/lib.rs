#![deny(warnings)]

//! Advisor client: talks to a remote text-generation service for chat
//! replies, risk analysis and investment commentary.
//!
//! Calls go through [`ResilientClient`], which retries transient failures with
//! exponential backoff and turns every failure into `None`.

pub mod client;
pub mod prompt;
pub mod retry;
pub mod transport;

pub use client::ResilientClient;
pub use prompt::{
    chat_request, commentary_request, extract_text, risk_analysis_request, GenerateRequest,
    ANALYSIS_FALLBACK, CHAT_FALLBACK,
};
pub use retry::{classify, Disposition, RetryPolicy};
pub use transport::{HttpTransport, Transport, TransportError, TransportResponse};
