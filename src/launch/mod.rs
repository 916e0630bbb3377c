// Launch module - deep-link launching with installed/not-installed detection

pub mod detector;
pub mod navigator;
pub mod state;
pub mod visibility;

pub use detector::{LaunchDetector, DEFAULT_LAUNCH_TIMEOUT};
pub use navigator::{Navigator, RecordingNavigator};
pub use state::{LaunchAttempt, LaunchState};
pub use visibility::{Visibility, VisibilitySignal};
