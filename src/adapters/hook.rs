use crate::config::HookConfig;
use crate::domain::model::LockState;
use crate::domain::ports::StateObserver;
use crate::utils::error::{Result, SphincterError};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

/// Announces lock/unlock transitions with a plain GET, e.g. to update a
/// hackerspace status API.
pub struct HttpHook {
    client: Client,
    locked_url: Option<String>,
    unlocked_url: Option<String>,
}

impl HttpHook {
    pub fn new(config: &HookConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            locked_url: config.locked_url.clone(),
            unlocked_url: config.unlocked_url.clone(),
        })
    }

    fn url_for(&self, state: LockState) -> Option<&str> {
        match state {
            LockState::Locked => self.locked_url.as_deref(),
            LockState::Unlocked => self.unlocked_url.as_deref(),
            LockState::Error => None,
        }
    }
}

#[async_trait]
impl StateObserver for HttpHook {
    async fn on_state_change(&self, state: LockState) -> Result<()> {
        let Some(url) = self.url_for(state) else {
            return Ok(());
        };

        tracing::debug!(%state, "Calling state hook");
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(SphincterError::Server {
                message: format!("state hook answered {}", response.status()),
            });
        }
        Ok(())
    }
}

/// Forward confirmed LOCKED/UNLOCKED transitions to `observer` until the
/// link goes away. ERROR is never forwarded, and a state is only reported
/// again after the door was seen in the other state.
///
/// Every transition is delivered in order, so a quick open-and-close still
/// produces both calls.
pub async fn run_state_hook(
    mut transitions: broadcast::Receiver<LockState>,
    observer: Arc<dyn StateObserver>,
) {
    let mut last_reported: Option<LockState> = None;

    loop {
        let state = match transitions.recv().await {
            Ok(state) => state,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "State hook fell behind, transitions dropped");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        if state == LockState::Error || last_reported == Some(state) {
            continue;
        }
        last_reported = Some(state);

        // Sequential so the receiving end sees the calls in transition order.
        if let Err(e) = observer.on_state_change(state).await {
            tracing::warn!(%state, "State hook failed: {}", e);
        }
    }

    tracing::debug!("State hook stopped");
}
