//! Resilient remote call: one logical request, retried on transient failure.

use crate::prompt::{extract_text, GenerateRequest};
use crate::retry::{classify, Disposition, RetryPolicy};
use crate::transport::Transport;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Wraps a [`Transport`] with the retry policy.
///
/// Failures never escape as errors: every failure mode ends in `None` and the
/// caller substitutes a fallback message.
#[derive(Clone)]
pub struct ResilientClient {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl ResilientClient {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send `request`, retrying server errors, rate limits and transport
    /// failures. Client errors and successful responses without text end the
    /// call at once.
    pub async fn generate(&self, request: &GenerateRequest) -> Option<String> {
        let body = request.to_wire();
        let attempts = self.policy.attempts();
        for attempt in 0..attempts {
            match self.transport.post_json(&body).await {
                Ok(resp) => match classify(resp.status) {
                    Disposition::Success => {
                        let text = extract_text(&resp.body);
                        if text.is_none() {
                            warn!(attempt, "response carried no candidate text");
                        } else {
                            info!(attempt, "remote call succeeded");
                        }
                        return text;
                    }
                    Disposition::Fatal => {
                        warn!(attempt, status = resp.status, "non-retriable response");
                        return None;
                    }
                    Disposition::Retry => {
                        warn!(attempt, status = resp.status, "retriable response");
                    }
                },
                Err(e) => warn!(attempt, error = %e, "remote call failed"),
            }
            if attempt + 1 < attempts {
                let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
                let delay = self.policy.delay_for(attempt, jitter);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "backing off");
                tokio::time::sleep(delay).await;
            }
        }
        warn!(attempts, "remote call exhausted retries");
        None
    }
}
