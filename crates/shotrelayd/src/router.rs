//! Routes frames from authenticated agents to waiting callers.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::caller::Delivery;
use crate::clock::Clock;
use crate::pending::{PendingRequest, PendingRequests};
use crate::protocol::InboundFrame;
use crate::registry::AgentRegistry;

const ROUTER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::router");

/// Prefix of the message delivered when an agent reports a failure.
pub const CAPTURE_FAILED_PREFIX: &str = "capture failed: ";

/// What became of a routed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A pending request was resolved and its caller handed the result.
    Delivered,
    /// A pending request was resolved but the caller could not be reached.
    DeliveryFailed,
    /// The token was not pending.
    UnknownToken,
    /// The frame was not an `image` or `error` reply.
    Ignored,
}

/// Demultiplexes agent replies against the pending table.
pub struct ReplyRouter {
    registry: Arc<AgentRegistry>,
    pending: Arc<PendingRequests>,
    clock: Arc<dyn Clock>,
}

impl ReplyRouter {
    /// Creates a router over shared state.
    pub fn new(
        registry: Arc<AgentRegistry>,
        pending: Arc<PendingRequests>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            pending,
            clock,
        }
    }

    /// Records non-reply traffic from the agent `agent_id`.
    pub fn touch(&self, agent_id: &str) {
        self.registry.touch_seen(agent_id, self.clock.now());
    }

    /// Handles one frame from the agent `agent_id`.
    pub fn route(&self, agent_id: &str, frame: InboundFrame) -> RouteOutcome {
        let now = self.clock.now();
        self.registry.touch_seen(agent_id, now);

        match frame {
            InboundFrame::Image { token, payload } => {
                let Some(request) = self.resolve(agent_id, &token, "image") else {
                    return RouteOutcome::UnknownToken;
                };
                info!(
                    target: ROUTER_TARGET,
                    agent = %agent_id,
                    token = %token,
                    bytes = payload.len(),
                    "image received"
                );
                self.registry.record_response(agent_id, now);
                deliver(&request, Delivery::Image { payload })
            }
            InboundFrame::Error { token, message } => {
                warn!(
                    target: ROUTER_TARGET,
                    agent = %agent_id,
                    token = %token,
                    message = %message,
                    "agent reported capture error"
                );
                let Some(request) = self.resolve(agent_id, &token, "error") else {
                    return RouteOutcome::UnknownToken;
                };
                deliver(
                    &request,
                    Delivery::text(format!("{CAPTURE_FAILED_PREFIX}{message}")),
                )
            }
            InboundFrame::Auth { .. } => {
                debug!(
                    target: ROUTER_TARGET,
                    agent = %agent_id,
                    "repeated auth frame ignored"
                );
                RouteOutcome::Ignored
            }
            InboundFrame::Unrecognized(text) => {
                debug!(
                    target: ROUTER_TARGET,
                    agent = %agent_id,
                    frame = %text,
                    "unrecognized frame ignored"
                );
                RouteOutcome::Ignored
            }
        }
    }

    fn resolve(&self, agent_id: &str, token: &str, kind: &'static str) -> Option<PendingRequest> {
        let request = self.pending.resolve(token);
        if request.is_none() {
            warn!(
                target: ROUTER_TARGET,
                agent = %agent_id,
                token = %token,
                kind,
                "reply for unrecognized request token discarded"
            );
        }
        request
    }
}

fn deliver(request: &PendingRequest, delivery: Delivery) -> RouteOutcome {
    match request.caller.deliver(delivery) {
        Ok(()) => RouteOutcome::Delivered,
        Err(error) => {
            warn!(
                target: ROUTER_TARGET,
                token = %request.token,
                %error,
                "result delivery failed"
            );
            RouteOutcome::DeliveryFailed
        }
    }
}
