// Orchestrator - capture -> recognition -> catalog match -> auto-launch

use log::{info, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{FileCache, LocalCache};
use crate::catalog::{CatalogEntry, CatalogKind, CatalogSnapshot};
use crate::error::AppError;
use crate::identity::IdentityProvider;
use crate::launch::{LaunchDetector, Navigator, VisibilitySignal};
use crate::platform::Platform;
use crate::recognition::{self, RecognitionGateway, RecognitionOutcome};
use crate::selection::{SelectionBackend, SelectionManager, SqliteSelectionStore};
use crate::settings::Settings;

/// What one capture produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureReport {
    /// `None` when a newer capture superseded this one.
    pub outcome: Option<RecognitionOutcome>,
    /// Catalog entries for the recognized brands, in recognition order.
    pub matched: Vec<CatalogEntry>,
    /// Entry id handed to the launch detector, if any.
    pub launched: Option<String>,
}

impl CaptureReport {
    fn superseded() -> Self {
        Self {
            outcome: None,
            matched: Vec::new(),
            launched: None,
        }
    }
}

fn squash(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Map recognized brand names to catalog entries.
///
/// Exact name matches win; otherwise names are compared ignoring case and
/// whitespace. Unmatched names are dropped and each entry appears once.
pub fn match_services(services: &[String], catalog: &CatalogSnapshot) -> Vec<CatalogEntry> {
    let mut seen = HashSet::new();
    let mut matched = Vec::new();

    for service in services {
        let entry = catalog.find_by_name(service).or_else(|| {
            let wanted = squash(service);
            catalog.entries().iter().find(|e| squash(&e.name) == wanted)
        });
        match entry {
            Some(entry) if seen.insert(entry.id.clone()) => matched.push(entry.clone()),
            Some(_) => {}
            None => info!("Orchestrator: no catalog entry for recognized '{}'", service),
        }
    }

    matched
}

/// The match the user ranks highest, or the first match if none are selected.
pub fn pick_best<'a>(matches: &'a [CatalogEntry], selection_order: &[String]) -> Option<&'a CatalogEntry> {
    selection_order
        .iter()
        .find_map(|id| matches.iter().find(|m| &m.id == id))
        .or_else(|| matches.first())
}

/// Everything the UI talks to, wired together.
pub struct Orchestrator {
    payment: Arc<SelectionManager>,
    points: Arc<SelectionManager>,
    detector: Arc<LaunchDetector>,
    gateway: Arc<RecognitionGateway>,
    identity: Arc<dyn IdentityProvider>,
}

impl Orchestrator {
    pub fn new(
        payment: Arc<SelectionManager>,
        points: Arc<SelectionManager>,
        detector: Arc<LaunchDetector>,
        gateway: Arc<RecognitionGateway>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            payment,
            points,
            detector,
            gateway,
            identity,
        }
    }

    /// Build the whole graph from settings: sqlite store, file cache,
    /// recognition gateway, and a launch detector with the configured timeout.
    pub fn from_settings(
        settings: &Settings,
        identity: Arc<dyn IdentityProvider>,
        navigator: Arc<dyn Navigator>,
        visibility: VisibilitySignal,
    ) -> Result<Self, AppError> {
        let db_path = settings.storage.resolved_database_path().map_err(AppError::Config)?;
        let cache_path = settings.storage.resolved_cache_path().map_err(AppError::Config)?;

        let backend: Arc<dyn SelectionBackend> =
            Arc::new(SqliteSelectionStore::open(&db_path).map_err(AppError::Store)?);
        let cache: Arc<dyn LocalCache> =
            Arc::new(FileCache::open(cache_path).map_err(AppError::Store)?);

        let manager = |kind| {
            Arc::new(SelectionManager::new(
                kind,
                backend.clone(),
                cache.clone(),
                identity.clone(),
            ))
        };
        let payment = manager(CatalogKind::Payment);
        let points = manager(CatalogKind::Point);

        let detector = Arc::new(LaunchDetector::with_timeout(
            navigator,
            visibility,
            Duration::from_millis(settings.launch.timeout_ms),
        ));
        let gateway = Arc::new(recognition::create_gateway(&settings.recognition));

        info!(
            "Orchestrator: ready (db {}, launch timeout {}ms, recognition via {})",
            db_path.display(),
            settings.launch.timeout_ms,
            gateway.provider_name()
        );
        Ok(Self::new(payment, points, detector, gateway, identity))
    }

    pub fn selection(&self, kind: CatalogKind) -> &Arc<SelectionManager> {
        match kind {
            CatalogKind::Payment => &self.payment,
            CatalogKind::Point => &self.points,
        }
    }

    pub fn detector(&self) -> &Arc<LaunchDetector> {
        &self.detector
    }

    pub fn gateway(&self) -> &Arc<RecognitionGateway> {
        &self.gateway
    }

    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }

    /// Load both catalogs and start following session changes.
    pub async fn start(&self) -> Result<(), AppError> {
        for manager in [&self.payment, &self.points] {
            manager.load().await?;
            manager.watch_session();
        }
        Ok(())
    }

    /// Recognize the payment brands in `image` and open the best one.
    ///
    /// A capture that was superseded by a newer one reports `outcome: None`
    /// and launches nothing.
    pub async fn capture_and_launch(
        &self,
        image: &[u8],
        mime_type: &str,
        platform: Platform,
    ) -> Result<CaptureReport, AppError> {
        let Some(outcome) = self.gateway.recognize(image, mime_type).await? else {
            return Ok(CaptureReport::superseded());
        };

        let catalog = self.payment.catalog().await?;
        let matched = match_services(&outcome.services, &catalog);
        let order = self.payment.view().ids();

        let best = pick_best(&matched, &order).cloned();
        let launched = match best {
            Some(entry) if self.gateway.is_current(outcome.sequence) => {
                self.detector
                    .attempt_launch(&entry, platform)
                    .map_err(AppError::Navigation)?;
                Some(entry.id)
            }
            Some(_) => {
                warn!("Orchestrator: capture {} superseded before launch", outcome.sequence);
                return Ok(CaptureReport::superseded());
            }
            None => None,
        };

        Ok(CaptureReport {
            outcome: Some(outcome),
            matched,
            launched,
        })
    }

    /// Open one app from `kind`'s catalog by id. Returns the URI opened.
    pub async fn launch(
        &self,
        kind: CatalogKind,
        entry_id: &str,
        platform: Platform,
    ) -> Result<String, AppError> {
        let entry = self.entry(kind, entry_id).await?;
        self.detector
            .attempt_launch(&entry, platform)
            .map_err(AppError::Navigation)
    }

    /// Open the store listing for `entry_id` unless its launch was detected.
    pub async fn open_store_if_needed(
        &self,
        kind: CatalogKind,
        entry_id: &str,
        platform: Platform,
    ) -> Result<bool, AppError> {
        let entry = self.entry(kind, entry_id).await?;
        self.detector
            .open_store_if_needed(&entry, platform)
            .map_err(AppError::Navigation)
    }

    async fn entry(&self, kind: CatalogKind, entry_id: &str) -> Result<CatalogEntry, AppError> {
        let catalog = self.selection(kind).catalog().await?;
        catalog
            .get(entry_id)
            .cloned()
            .ok_or_else(|| AppError::UnknownEntry(entry_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::catalog::builtin;
    use crate::identity::GuestOnlyProvider;
    use crate::launch::{LaunchState, RecordingNavigator, Visibility};
    use crate::recognition::{NoOpProvider, RecognitionError, RecognitionProvider, ResponseNormalizer};
    use async_trait::async_trait;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn payment_catalog() -> CatalogSnapshot {
        CatalogSnapshot::new(builtin::entries(CatalogKind::Payment))
    }

    struct FixedProvider(&'static str);

    #[async_trait]
    impl RecognitionProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn classify(&self, _: &[u8], _: &str, _: &str) -> Result<String, RecognitionError> {
            Ok(self.0.to_string())
        }
    }

    fn orchestrator(
        provider: Arc<dyn RecognitionProvider>,
        navigator: Arc<RecordingNavigator>,
    ) -> (Orchestrator, VisibilitySignal) {
        let backend: Arc<dyn SelectionBackend> =
            Arc::new(SqliteSelectionStore::new_in_memory().unwrap());
        let cache: Arc<dyn LocalCache> = Arc::new(MemoryCache::new());
        let identity: Arc<dyn IdentityProvider> = Arc::new(GuestOnlyProvider::new());
        let manager = |kind| {
            Arc::new(SelectionManager::new(kind, backend.clone(), cache.clone(), identity.clone()))
        };
        let visibility = VisibilitySignal::new();
        let detector = Arc::new(LaunchDetector::with_timeout(
            navigator,
            visibility.clone(),
            Duration::from_millis(100),
        ));
        let brands: Vec<String> = builtin::KNOWN_PAYMENT_BRANDS.iter().map(|b| b.to_string()).collect();
        let gateway = Arc::new(RecognitionGateway::new(
            provider,
            ResponseNormalizer::new(brands.clone()),
            recognition::build_prompt(&brands),
        ));
        (
            Orchestrator::new(
                manager(CatalogKind::Payment),
                manager(CatalogKind::Point),
                detector,
                gateway,
                identity.clone(),
            ),
            visibility,
        )
    }

    #[test]
    fn test_match_services_exact_then_loose() {
        let matched = match_services(&names(&["LINE Pay", "aupay", "Unknown Pay", "paypay"]), &payment_catalog());
        let found: Vec<&str> = matched.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(found, vec!["LINE Pay", "au PAY", "PayPay"]);
    }

    #[test]
    fn test_match_services_deduplicates_entries() {
        let matched = match_services(&names(&["PayPay", "pay pay", "PayPay"]), &payment_catalog());
        assert_eq!(matched.len(), 1);
    }

    #[test]
    fn test_pick_best_prefers_user_priority() {
        let matched = match_services(&names(&["PayPay", "d払い"]), &payment_catalog());
        let d_barai = matched[1].id.clone();

        let best = pick_best(&matched, &[d_barai.clone(), "1".to_string()]).unwrap();
        assert_eq!(best.id, d_barai);

        let best = pick_best(&matched, &names(&["99"])).unwrap();
        assert_eq!(best.name, "PayPay");

        assert!(pick_best(&[], &names(&["1"])).is_none());
    }

    #[tokio::test]
    async fn test_capture_launches_best_match() {
        let navigator = Arc::new(RecordingNavigator::new());
        let (orch, visibility) = orchestrator(
            Arc::new(FixedProvider("```json\n[\"LINE Pay\",\"PayPay\"]\n```")),
            navigator.clone(),
        );
        orch.start().await.unwrap();
        orch.selection(CatalogKind::Payment)
            .commit(&names(&["1"]), &names(&["1"]))
            .await
            .unwrap();

        let report = orch.capture_and_launch(&[1, 2, 3], "image/png", Platform::Ios).await.unwrap();
        assert_eq!(report.outcome.unwrap().services, vec!["LINE Pay", "PayPay"]);
        assert_eq!(report.matched.len(), 2);
        assert_eq!(report.launched.as_deref(), Some("1"));
        assert_eq!(navigator.last().as_deref(), Some("paypay://"));

        visibility.set(Visibility::Hidden);
        visibility.set(Visibility::Visible);
        assert_eq!(orch.detector().settled().await.state, LaunchState::Succeeded);
        assert!(orch.detector().did_launch("1"));
    }

    #[tokio::test]
    async fn test_capture_with_no_matches_launches_nothing() {
        let navigator = Arc::new(RecordingNavigator::new());
        let (orch, _visibility) =
            orchestrator(Arc::new(FixedProvider("no logos here")), navigator.clone());

        let report = orch.capture_and_launch(&[1], "image/jpeg", Platform::Android).await.unwrap();
        assert!(report.outcome.unwrap().services.is_empty());
        assert!(report.launched.is_none());
        assert!(navigator.visited().is_empty());
    }

    #[tokio::test]
    async fn test_capture_surfaces_recognition_errors() {
        let navigator = Arc::new(RecordingNavigator::new());
        let (orch, _visibility) = orchestrator(
            Arc::new(NoOpProvider::new("not configured".to_string())),
            navigator,
        );
        let err = orch.capture_and_launch(&[1], "image/png", Platform::Other).await.unwrap_err();
        assert_eq!(err.status(), 503);
    }

    #[tokio::test]
    async fn test_launch_by_id_and_store_fallback() {
        let navigator = Arc::new(RecordingNavigator::new());
        let (orch, _visibility) = orchestrator(Arc::new(FixedProvider("[]")), navigator.clone());

        let uri = orch.launch(CatalogKind::Payment, "1", Platform::Ios).await.unwrap();
        assert_eq!(uri, "paypay://");
        assert_eq!(orch.detector().settled().await.state, LaunchState::Failed);

        assert!(orch.open_store_if_needed(CatalogKind::Payment, "1", Platform::Ios).await.unwrap());
        assert_eq!(
            navigator.last().as_deref(),
            Some("https://apps.apple.com/jp/app/paypay-qr/id1435783608")
        );

        let err = orch.launch(CatalogKind::Point, "nope", Platform::Ios).await.unwrap_err();
        assert_eq!(err, AppError::UnknownEntry("nope".to_string()));
    }
}
