use std::sync::Mutex;

/// Side effect of a launch: hand a URI to the host so it can switch to a
/// native app, open a store listing, or load a web page.
pub trait Navigator: Send + Sync {
    fn navigate(&self, uri: &str) -> Result<(), String>;
}

/// Navigator that only remembers what it was asked to open.
///
/// Used by headless hosts and tests.
#[derive(Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<String>>,
    fail_with: Option<String>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A navigator whose every navigation fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            visited: Mutex::new(Vec::new()),
            fail_with: Some(message.to_string()),
        }
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<String> {
        self.visited().last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, uri: &str) -> Result<(), String> {
        if let Some(ref message) = self.fail_with {
            return Err(message.clone());
        }
        self.visited
            .lock()
            .map_err(|e| format!("Failed to acquire lock: {}", e))?
            .push(uri.to_string());
        Ok(())
    }
}
