use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Foreground/background state of the host page or window.
///
/// The host pushes transitions in (webview `visibilitychange`, window focus
/// events); the launch detector subscribes to learn when the foreground is
/// regained. Cloning shares the same underlying channel.
#[derive(Clone)]
pub struct VisibilitySignal {
    tx: Arc<watch::Sender<Visibility>>,
}

impl VisibilitySignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Visibility::Visible);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Visibility {
        *self.tx.borrow()
    }

    pub fn is_visible(&self) -> bool {
        self.current() == Visibility::Visible
    }

    /// Record a transition. Repeating the current value notifies nobody.
    pub fn set(&self, visibility: Visibility) {
        self.tx.send_if_modified(|current| {
            if *current == visibility {
                false
            } else {
                *current = visibility;
                true
            }
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<Visibility> {
        self.tx.subscribe()
    }
}

impl Default for VisibilitySignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_visible() {
        assert!(VisibilitySignal::new().is_visible());
    }

    #[tokio::test]
    async fn test_repeated_value_does_not_notify() {
        let signal = VisibilitySignal::new();
        let mut rx = signal.subscribe();
        rx.borrow_and_update();

        signal.set(Visibility::Visible);
        assert!(!rx.has_changed().unwrap());

        signal.set(Visibility::Hidden);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Visibility::Hidden);
    }

    #[test]
    fn test_clones_share_state() {
        let signal = VisibilitySignal::new();
        let clone = signal.clone();
        clone.set(Visibility::Hidden);
        assert_eq!(signal.current(), Visibility::Hidden);
    }
}
