use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LaunchState {
    Idle,
    Launching,
    Succeeded,
    Failed,
}

impl Default for LaunchState {
    fn default() -> Self {
        LaunchState::Idle
    }
}

/// The single tracked launch attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchAttempt {
    pub state: LaunchState,
    pub attempted_entry_id: Option<String>,
    #[serde(skip)]
    pub started_at: Option<Instant>,
}

impl LaunchAttempt {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, entry_id: &str, now: Instant) {
        *self = Self {
            state: LaunchState::Launching,
            attempted_entry_id: Some(entry_id.to_string()),
            started_at: Some(now),
        };
    }

    pub fn is_launching(&self) -> bool {
        self.state == LaunchState::Launching
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.state, LaunchState::Succeeded | LaunchState::Failed)
    }

    /// True only for a successful attempt on exactly `entry_id`.
    pub fn launched(&self, entry_id: &str) -> bool {
        self.state == LaunchState::Succeeded
            && self.attempted_entry_id.as_deref() == Some(entry_id)
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }
}
