// Tauri commands - the UI-facing surface of the orchestrator

use crate::catalog::{CatalogEntry, CatalogKind};
use crate::error::AppError;
use crate::identity::{IdentityProvider, LocalIdentityProvider, Session};
use crate::launch::{LaunchAttempt, Navigator};
use crate::orchestrator::{CaptureReport, Orchestrator};
use crate::platform::{Platform, PlatformDetector};
use crate::recognition::{self, RecognitionOutcome};
use crate::selection::{self, SelectionView};
use crate::settings::{Settings, SettingsManager};
use log::{info, warn};
use std::sync::{Arc, RwLock};
use tauri::{AppHandle, Emitter, State};
use tauri_plugin_opener::OpenerExt;

/// Opens deep links and store pages through the system URL handler.
pub struct OpenerNavigator {
    app_handle: AppHandle,
}

impl OpenerNavigator {
    pub fn new(app_handle: AppHandle) -> Self {
        Self { app_handle }
    }
}

impl Navigator for OpenerNavigator {
    fn navigate(&self, uri: &str) -> Result<(), String> {
        self.app_handle
            .opener()
            .open_url(uri, None::<&str>)
            .map_err(|e| format!("Failed to open URL: {}", e))
    }
}

#[derive(Clone, serde::Serialize)]
struct SelectionChanged {
    kind: CatalogKind,
    view: SelectionView,
}

fn emit_or_warn<S: serde::Serialize + Clone>(app_handle: &AppHandle, event: &str, payload: S) {
    if let Err(e) = app_handle.emit(event, payload) {
        warn!("Commands: failed to emit {}: {}", event, e);
    }
}

/// Forward launch-state and selection-view changes to the frontend as
/// "launch-state-changed" and "selection-changed" events.
pub async fn forward_events(app_handle: AppHandle, orchestrator: Arc<Orchestrator>) {
    let mut launch_rx = orchestrator.detector().subscribe();
    let mut payment_rx = orchestrator.selection(CatalogKind::Payment).subscribe();
    let mut point_rx = orchestrator.selection(CatalogKind::Point).subscribe();

    loop {
        tokio::select! {
            changed = launch_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let attempt = launch_rx.borrow_and_update().clone();
                emit_or_warn(&app_handle, "launch-state-changed", attempt);
            }
            changed = payment_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = payment_rx.borrow_and_update().clone();
                emit_or_warn(&app_handle, "selection-changed", SelectionChanged { kind: CatalogKind::Payment, view });
            }
            changed = point_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = point_rx.borrow_and_update().clone();
                emit_or_warn(&app_handle, "selection-changed", SelectionChanged { kind: CatalogKind::Point, view });
            }
        }
    }
    info!("Commands: event forwarding stopped");
}

fn platform_for(user_agent: Option<String>) -> Platform {
    match user_agent {
        Some(ua) if !ua.trim().is_empty() => PlatformDetector::from_user_agent(&ua),
        _ => PlatformDetector::current(),
    }
}

fn selection_error(error: AppError) -> String {
    error.to_string()
}

// ── Settings ──

#[tauri::command]
pub fn get_settings(
    state: State<'_, Arc<RwLock<SettingsManager>>>,
) -> Result<Settings, String> {
    let manager = state
        .read()
        .map_err(|e| format!("Failed to acquire read lock: {}", e))?;
    Ok(manager.get())
}

/// Validate and persist settings, then emit "settings-changed".
///
/// Launch timeout and recognition changes apply on next start.
#[tauri::command]
pub fn update_settings(
    settings: Settings,
    state: State<'_, Arc<RwLock<SettingsManager>>>,
    app_handle: AppHandle,
) -> Result<(), String> {
    let manager = state
        .read()
        .map_err(|e| format!("Failed to acquire read lock: {}", e))?;

    manager.update(settings.clone())?;

    app_handle
        .emit("settings-changed", &settings)
        .map_err(|e| format!("Failed to emit settings-changed event: {}", e))?;

    Ok(())
}

// ── Catalog & selection ──

#[tauri::command]
pub async fn list_catalog(
    kind: CatalogKind,
    orchestrator: State<'_, Arc<Orchestrator>>,
) -> Result<Vec<CatalogEntry>, String> {
    let catalog = orchestrator.selection(kind).catalog().await.map_err(selection_error)?;
    Ok(catalog.entries().to_vec())
}

#[tauri::command]
pub async fn load_selection(
    kind: CatalogKind,
    orchestrator: State<'_, Arc<Orchestrator>>,
) -> Result<Vec<CatalogEntry>, String> {
    orchestrator.selection(kind).load().await.map_err(selection_error)
}

#[tauri::command]
pub async fn materialize_selection(
    kind: CatalogKind,
    orchestrator: State<'_, Arc<Orchestrator>>,
) -> Result<Vec<CatalogEntry>, String> {
    orchestrator.selection(kind).materialize().await.map_err(selection_error)
}

#[tauri::command]
pub fn get_selection_view(
    kind: CatalogKind,
    orchestrator: State<'_, Arc<Orchestrator>>,
) -> SelectionView {
    orchestrator.selection(kind).view()
}

#[tauri::command]
pub fn get_selected_ids(
    kind: CatalogKind,
    orchestrator: State<'_, Arc<Orchestrator>>,
) -> Vec<String> {
    orchestrator.selection(kind).selected_ids()
}

#[tauri::command]
pub fn needs_initial_selection(
    kind: CatalogKind,
    orchestrator: State<'_, Arc<Orchestrator>>,
) -> bool {
    orchestrator.selection(kind).needs_initial_selection()
}

#[tauri::command]
pub fn is_saving_selection(
    kind: CatalogKind,
    orchestrator: State<'_, Arc<Orchestrator>>,
) -> bool {
    orchestrator.selection(kind).is_saving()
}

/// Returns whether the entry is selected after the toggle.
#[tauri::command]
pub async fn toggle_selection(
    kind: CatalogKind,
    entry_id: String,
    orchestrator: State<'_, Arc<Orchestrator>>,
) -> Result<bool, String> {
    orchestrator.selection(kind).toggle(&entry_id).await.map_err(selection_error)
}

#[tauri::command]
pub async fn commit_selection(
    kind: CatalogKind,
    selected: Vec<String>,
    ordered: Vec<String>,
    orchestrator: State<'_, Arc<Orchestrator>>,
) -> Result<Vec<CatalogEntry>, String> {
    orchestrator
        .selection(kind)
        .commit(&selected, &ordered)
        .await
        .map_err(selection_error)
}

/// Reorder helper for the priority screen: `direction` is "up" or "down".
#[tauri::command]
pub fn move_selection(
    ordered: Vec<String>,
    entry_id: String,
    direction: String,
) -> Result<Vec<String>, String> {
    match direction.as_str() {
        "up" => Ok(selection::move_up(&ordered, &entry_id)),
        "down" => Ok(selection::move_down(&ordered, &entry_id)),
        other => Err(format!("Direction must be 'up' or 'down', got '{}'", other)),
    }
}

// ── Launch ──

/// Open an app by id. Returns the URI that was opened.
#[tauri::command]
pub async fn launch_app(
    kind: CatalogKind,
    entry_id: String,
    user_agent: Option<String>,
    orchestrator: State<'_, Arc<Orchestrator>>,
) -> Result<String, String> {
    orchestrator
        .launch(kind, &entry_id, platform_for(user_agent))
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn did_launch(
    entry_id: String,
    orchestrator: State<'_, Arc<Orchestrator>>,
) -> bool {
    orchestrator.detector().did_launch(&entry_id)
}

#[tauri::command]
pub fn get_launch_state(
    orchestrator: State<'_, Arc<Orchestrator>>,
) -> LaunchAttempt {
    orchestrator.detector().state()
}

#[tauri::command]
pub fn reset_launch(
    orchestrator: State<'_, Arc<Orchestrator>>,
) {
    orchestrator.detector().reset();
}

/// Returns true if a store page was opened.
#[tauri::command]
pub async fn open_store_if_needed(
    kind: CatalogKind,
    entry_id: String,
    user_agent: Option<String>,
    orchestrator: State<'_, Arc<Orchestrator>>,
) -> Result<bool, String> {
    orchestrator
        .open_store_if_needed(kind, &entry_id, platform_for(user_agent))
        .await
        .map_err(|e| e.to_string())
}

// ── Recognition ──

/// Recognize brands in a `data:image/...;base64,` URL without launching.
#[tauri::command]
pub async fn recognize_image(
    image_data_url: String,
    orchestrator: State<'_, Arc<Orchestrator>>,
) -> Result<Option<RecognitionOutcome>, String> {
    orchestrator
        .gateway()
        .recognize_data_url(&image_data_url)
        .await
        .map_err(|e| AppError::from(e).to_string())
}

#[tauri::command]
pub async fn capture_and_launch(
    image_data_url: String,
    user_agent: Option<String>,
    orchestrator: State<'_, Arc<Orchestrator>>,
) -> Result<CaptureReport, String> {
    let (mime_type, image) = recognition::parse_data_url(&image_data_url)
        .map_err(|e| AppError::from(e).to_string())?;
    orchestrator
        .capture_and_launch(&image, &mime_type, platform_for(user_agent))
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn normalize_response(raw: String) -> Vec<String> {
    recognition::normalize(&raw)
}

// ── Identity ──

fn auth_error(message: String) -> String {
    AppError::Auth(message).to_string()
}

#[tauri::command]
pub async fn get_session(
    identity: State<'_, Arc<LocalIdentityProvider>>,
) -> Result<Option<Session>, String> {
    identity.get_session().await
}

#[tauri::command]
pub async fn sign_in(
    email: String,
    password: String,
    identity: State<'_, Arc<LocalIdentityProvider>>,
) -> Result<Session, String> {
    identity.sign_in(&email, &password).await.map_err(auth_error)
}

#[tauri::command]
pub async fn sign_up(
    email: String,
    password: String,
    identity: State<'_, Arc<LocalIdentityProvider>>,
) -> Result<(), String> {
    identity.sign_up(&email, &password).await.map_err(auth_error)
}

#[tauri::command]
pub async fn sign_in_with_magic_link(
    email: String,
    identity: State<'_, Arc<LocalIdentityProvider>>,
) -> Result<(), String> {
    identity.sign_in_with_magic_link(&email).await.map_err(auth_error)
}

#[tauri::command]
pub fn complete_magic_link(
    email: String,
    identity: State<'_, Arc<LocalIdentityProvider>>,
) -> Result<Session, String> {
    identity.complete_magic_link(&email).map_err(auth_error)
}

#[tauri::command]
pub async fn sign_in_with_oauth(
    provider: String,
    identity: State<'_, Arc<LocalIdentityProvider>>,
) -> Result<(), String> {
    identity.sign_in_with_oauth(&provider).await.map_err(auth_error)
}

#[tauri::command]
pub async fn sign_out(
    identity: State<'_, Arc<LocalIdentityProvider>>,
) -> Result<(), String> {
    identity.sign_out().await.map_err(auth_error)
}
