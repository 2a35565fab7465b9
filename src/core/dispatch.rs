use crate::core::tokens::TokenStore;
use crate::domain::model::{Command, Reply, RequestContext};
use crate::domain::ports::Actuator;
use std::sync::Arc;

/// Maps one request to exactly one reply. Holds no per-request state.
pub struct Dispatcher {
    actuator: Arc<dyn Actuator>,
    tokens: Arc<TokenStore>,
}

impl Dispatcher {
    pub fn new(actuator: Arc<dyn Actuator>, tokens: Arc<TokenStore>) -> Self {
        Self { actuator, tokens }
    }

    /// May block on the serial write; call from a blocking context.
    pub fn dispatch(&self, ctx: &RequestContext) -> Reply {
        let command = Command::from_action(&ctx.action);

        if command == Some(Command::State) {
            return Reply::State(self.actuator.current_state());
        }

        if !self.tokens.is_valid(&ctx.token) {
            tracing::info!(action = %ctx.action, "Request not allowed");
            return Reply::NotAllowed;
        }

        let sent = match command {
            Some(Command::Unlock) => self.actuator.send_unlock(),
            Some(Command::Lock) => self.actuator.send_lock(),
            _ => {
                tracing::info!(action = %ctx.action, "Unknown action");
                return Reply::NotAllowed;
            }
        };

        if sent {
            Reply::Success
        } else {
            Reply::Failed
        }
    }
}
