// LaunchDetector - heuristic "did the deep link open an app?" classifier

use log::{debug, info, warn};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::navigator::Navigator;
use super::state::{LaunchAttempt, LaunchState};
use super::visibility::{Visibility, VisibilitySignal};
use crate::applink::{resolve_launch_uri, resolve_store_uri};
use crate::catalog::CatalogEntry;
use crate::platform::Platform;

pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_millis(2000);

/// The single launch slot plus what is needed to cancel its pending race.
struct Slot {
    attempt: LaunchAttempt,
    generation: u64,
    cancel: Option<CancellationToken>,
}

struct Shared {
    slot: Mutex<Slot>,
    state_tx: watch::Sender<LaunchAttempt>,
}

impl Shared {
    /// Settle attempt `generation` unless it was superseded or already settled.
    fn finish(&self, generation: u64, outcome: LaunchState) {
        let Ok(mut slot) = self.slot.lock() else {
            warn!("Launch: slot lock poisoned, dropping {:?}", outcome);
            return;
        };
        if slot.generation != generation || !slot.attempt.is_launching() {
            debug!("Launch: ignoring stale {:?} for attempt #{}", outcome, generation);
            return;
        }
        slot.attempt.state = outcome;
        slot.cancel = None;
        info!(
            "Launch: attempt #{} for entry {:?} -> {:?} after {}ms",
            generation,
            slot.attempt.attempted_entry_id,
            outcome,
            slot.attempt.elapsed_ms()
        );
        self.state_tx.send_replace(slot.attempt.clone());
    }
}

/// Tracks one deep-link launch attempt at a time.
///
/// There is no platform API for "is this app installed", so the detector
/// watches the host's visibility instead: if the page goes to the background
/// and comes back, something intercepted the URI (`Succeeded`); if the timeout
/// passes and the page never left, nothing did (`Failed`). Both outcomes are
/// guesses. A user alt-tabbing during the window reads as success, and a slow
/// app switch can read as failure.
pub struct LaunchDetector {
    navigator: Arc<dyn Navigator>,
    visibility: VisibilitySignal,
    timeout: Duration,
    shared: Arc<Shared>,
}

impl LaunchDetector {
    pub fn new(navigator: Arc<dyn Navigator>, visibility: VisibilitySignal) -> Self {
        Self::with_timeout(navigator, visibility, DEFAULT_LAUNCH_TIMEOUT)
    }

    pub fn with_timeout(
        navigator: Arc<dyn Navigator>,
        visibility: VisibilitySignal,
        timeout: Duration,
    ) -> Self {
        let (state_tx, _rx) = watch::channel(LaunchAttempt::idle());
        Self {
            navigator,
            visibility,
            timeout,
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    attempt: LaunchAttempt::idle(),
                    generation: 0,
                    cancel: None,
                }),
                state_tx,
            }),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn visibility(&self) -> &VisibilitySignal {
        &self.visibility
    }

    /// Open `entry` on `platform` and start classifying the attempt.
    ///
    /// Returns the URI that was opened. Must be called from within a Tokio
    /// runtime; the visibility/timeout race runs on a spawned task. Any attempt
    /// still in flight is abandoned and its race cancelled.
    ///
    /// # Errors
    ///
    /// Only when the navigator itself refuses the URI. The attempt is then
    /// recorded as `Failed`.
    pub fn attempt_launch(&self, entry: &CatalogEntry, platform: Platform) -> Result<String, String> {
        let uri = resolve_launch_uri(entry, platform);

        // Observe before navigating so a fast app switch is not missed.
        let mut visibility_rx = self.visibility.subscribe();
        visibility_rx.borrow_and_update();

        let token = CancellationToken::new();
        let generation = {
            let mut slot = self.shared.slot.lock()
                .map_err(|e| format!("Failed to acquire launch lock: {}", e))?;
            if let Some(previous) = slot.cancel.take() {
                debug!("Launch: superseding attempt #{}", slot.generation);
                previous.cancel();
            }
            slot.generation += 1;
            slot.attempt.begin(&entry.id, Instant::now());
            slot.cancel = Some(token.clone());
            self.shared.state_tx.send_replace(slot.attempt.clone());
            slot.generation
        };

        info!("Launch: attempt #{} opening {} for '{}' ({:?})", generation, uri, entry.name, platform);

        if let Err(e) = self.navigator.navigate(&uri) {
            warn!("Launch: navigation to {} failed: {}", uri, e);
            token.cancel();
            self.shared.finish(generation, LaunchState::Failed);
            return Err(format!("Failed to open {}: {}", uri, e));
        }

        tokio::spawn(race(
            self.shared.clone(),
            self.visibility.clone(),
            visibility_rx,
            generation,
            token,
            self.timeout,
        ));

        Ok(uri)
    }

    /// True iff the latest attempt succeeded and was for `entry_id`.
    pub fn did_launch(&self, entry_id: &str) -> bool {
        self.shared.slot.lock()
            .map(|slot| slot.attempt.launched(entry_id))
            .unwrap_or(false)
    }

    pub fn state(&self) -> LaunchAttempt {
        self.shared.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LaunchAttempt> {
        self.shared.state_tx.subscribe()
    }

    /// Wait until the current attempt leaves `Launching`, and return it.
    pub async fn settled(&self) -> LaunchAttempt {
        let mut rx = self.subscribe();
        let attempt = match rx.wait_for(|attempt| !attempt.is_launching()).await {
            Ok(attempt) => attempt.clone(),
            Err(_) => self.state(),
        };
        attempt
    }

    /// Cancel whatever is in flight and go back to `Idle`.
    pub fn reset(&self) {
        if let Ok(mut slot) = self.shared.slot.lock() {
            if let Some(token) = slot.cancel.take() {
                token.cancel();
            }
            slot.generation += 1;
            slot.attempt = LaunchAttempt::idle();
            self.shared.state_tx.send_replace(slot.attempt.clone());
        }
    }

    /// Navigate to the store listing for `entry`, if the platform has one.
    pub fn open_store(&self, entry: &CatalogEntry, platform: Platform) -> Result<bool, String> {
        match resolve_store_uri(entry, platform) {
            Some(store_uri) => {
                info!("Launch: opening store listing {} for '{}'", store_uri, entry.name);
                self.navigator.navigate(&store_uri)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Offer the store install only when the app was not detected as launched.
    pub fn open_store_if_needed(&self, entry: &CatalogEntry, platform: Platform) -> Result<bool, String> {
        if self.did_launch(&entry.id) {
            return Ok(false);
        }
        self.open_store(entry, platform)
    }
}

impl Drop for LaunchDetector {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.shared.slot.lock() {
            if let Some(token) = slot.cancel.take() {
                token.cancel();
            }
        }
    }
}

/// Visibility-vs-timeout race for one attempt.
///
/// The first return to the foreground settles the attempt as `Succeeded`. When
/// the timeout fires and the page is still visible it settles as `Failed`; if
/// the page is hidden at that point the user is presumably inside the app, so
/// the race keeps waiting for the return instead.
async fn race(
    shared: Arc<Shared>,
    // Keeps the sender alive so `changed()` cannot error while we wait.
    signal: VisibilitySignal,
    mut visibility_rx: watch::Receiver<Visibility>,
    generation: u64,
    token: CancellationToken,
    timeout: Duration,
) {
    let sleep = tokio::time::sleep(timeout);
    tokio::pin!(sleep);
    let mut timed_out = false;

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("Launch: race for attempt #{} cancelled", generation);
                return;
            }
            changed = visibility_rx.changed() => {
                if changed.is_err() {
                    return;
                }
                if *visibility_rx.borrow_and_update() == Visibility::Visible {
                    shared.finish(generation, LaunchState::Succeeded);
                    return;
                }
            }
            _ = &mut sleep, if !timed_out => {
                timed_out = true;
                if signal.is_visible() {
                    shared.finish(generation, LaunchState::Failed);
                    return;
                }
                debug!("Launch: attempt #{} timed out while hidden, waiting for return", generation);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builtin;
    use crate::catalog::CatalogKind;
    use crate::launch::navigator::RecordingNavigator;

    fn paypay() -> CatalogEntry {
        builtin::entries(CatalogKind::Payment).remove(0)
    }

    fn line_pay() -> CatalogEntry {
        builtin::entries(CatalogKind::Payment).remove(1)
    }

    fn detector(timeout_ms: u64) -> (LaunchDetector, Arc<RecordingNavigator>, VisibilitySignal) {
        let nav = Arc::new(RecordingNavigator::new());
        let signal = VisibilitySignal::new();
        let detector = LaunchDetector::with_timeout(
            nav.clone(),
            signal.clone(),
            Duration::from_millis(timeout_ms),
        );
        (detector, nav, signal)
    }

    #[tokio::test]
    async fn test_foreground_return_within_timeout_is_success() {
        let (detector, nav, signal) = detector(2000);
        let app = paypay();

        let uri = detector.attempt_launch(&app, Platform::Ios).unwrap();
        assert_eq!(uri, "paypay://");
        assert_eq!(nav.visited(), vec!["paypay://"]);
        assert_eq!(detector.state().state, LaunchState::Launching);

        signal.set(Visibility::Hidden);
        tokio::time::sleep(Duration::from_millis(20)).await;
        signal.set(Visibility::Visible);

        let settled = detector.settled().await;
        assert_eq!(settled.state, LaunchState::Succeeded);
        assert!(detector.did_launch(&app.id));
    }

    #[tokio::test]
    async fn test_timeout_while_visible_is_failure() {
        let (detector, _nav, _signal) = detector(60);
        let app = paypay();

        detector.attempt_launch(&app, Platform::Ios).unwrap();
        let settled = detector.settled().await;

        assert_eq!(settled.state, LaunchState::Failed);
        assert!(!detector.did_launch(&app.id));
    }

    #[tokio::test]
    async fn test_timeout_while_hidden_waits_for_return() {
        let (detector, _nav, signal) = detector(40);
        let app = paypay();

        detector.attempt_launch(&app, Platform::Android).unwrap();
        signal.set(Visibility::Hidden);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(detector.state().state, LaunchState::Launching);

        signal.set(Visibility::Visible);
        assert_eq!(detector.settled().await.state, LaunchState::Succeeded);
        assert!(detector.did_launch(&app.id));
    }

    #[tokio::test]
    async fn test_new_attempt_supersedes_previous() {
        let (detector, nav, _signal) = detector(200);
        let first = paypay();
        let second = line_pay();

        detector.attempt_launch(&first, Platform::Ios).unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        detector.attempt_launch(&second, Platform::Ios).unwrap();

        // Past the first attempt's deadline: its timer must not have settled
        // the second attempt.
        tokio::time::sleep(Duration::from_millis(140)).await;
        let state = detector.state();
        assert_eq!(state.state, LaunchState::Launching);
        assert_eq!(state.attempted_entry_id.as_deref(), Some(second.id.as_str()));

        let settled = detector.settled().await;
        assert_eq!(settled.state, LaunchState::Failed);
        assert_eq!(settled.attempted_entry_id.as_deref(), Some(second.id.as_str()));
        assert_eq!(nav.visited(), vec!["paypay://", "line://"]);
    }

    #[tokio::test]
    async fn test_success_is_scoped_to_attempted_entry() {
        let (detector, _nav, signal) = detector(2000);
        let first = paypay();
        let second = line_pay();

        detector.attempt_launch(&first, Platform::Ios).unwrap();
        detector.attempt_launch(&second, Platform::Ios).unwrap();
        signal.set(Visibility::Hidden);
        signal.set(Visibility::Visible);

        detector.settled().await;
        assert!(!detector.did_launch(&first.id));
        assert!(detector.did_launch(&second.id));
    }

    #[tokio::test]
    async fn test_navigation_error_marks_failed() {
        let nav = Arc::new(RecordingNavigator::failing("scheme blocked"));
        let detector = LaunchDetector::new(nav, VisibilitySignal::new());

        let err = detector.attempt_launch(&paypay(), Platform::Ios).unwrap_err();
        assert!(err.contains("scheme blocked"));
        assert_eq!(detector.state().state, LaunchState::Failed);
    }

    #[tokio::test]
    async fn test_open_store_if_needed_after_failure() {
        let (detector, nav, _signal) = detector(30);
        let app = paypay();

        detector.attempt_launch(&app, Platform::Ios).unwrap();
        detector.settled().await;

        assert!(detector.open_store_if_needed(&app, Platform::Ios).unwrap());
        assert_eq!(nav.last(), app.ios_store_url);
    }

    #[tokio::test]
    async fn test_open_store_if_needed_skips_after_success() {
        let (detector, nav, signal) = detector(2000);
        let app = paypay();

        detector.attempt_launch(&app, Platform::Android).unwrap();
        signal.set(Visibility::Hidden);
        signal.set(Visibility::Visible);
        detector.settled().await;

        assert!(!detector.open_store_if_needed(&app, Platform::Android).unwrap());
        assert_eq!(nav.visited().len(), 1);
    }

    #[tokio::test]
    async fn test_open_store_without_listing_on_desktop() {
        let (detector, nav, _signal) = detector(2000);
        assert!(!detector.open_store(&paypay(), Platform::Other).unwrap());
        assert!(nav.visited().is_empty());
    }

    #[tokio::test]
    async fn test_reset_cancels_in_flight_attempt() {
        let (detector, _nav, _signal) = detector(40);
        let app = paypay();

        detector.attempt_launch(&app, Platform::Ios).unwrap();
        detector.reset();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(detector.state().state, LaunchState::Idle);
        assert!(!detector.did_launch(&app.id));
    }
}
