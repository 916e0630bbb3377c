// Module declarations
pub mod applink;
pub mod cache;
pub mod catalog;
pub mod error;
pub mod identity;
pub mod launch;
pub mod logging;
pub mod orchestrator;
pub mod platform;
pub mod recognition;
pub mod selection;
pub mod settings;

#[cfg(feature = "app")]
pub mod commands;

#[cfg(feature = "app")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use identity::{IdentityProvider, LocalIdentityProvider};
    use launch::{Navigator, Visibility, VisibilitySignal};
    use log::error;
    use orchestrator::Orchestrator;
    use settings::SettingsManager;
    use std::sync::{Arc, RwLock};
    use tauri::Manager;

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            if let Some(dir) = logging::logs_dir() {
                logging::init(&dir);
            }

            // Initialize SettingsManager and add to managed state (wrapped in Arc<RwLock>)
            let settings_manager = SettingsManager::new()
                .map_err(|e| format!("Failed to initialize SettingsManager: {}", e))?;
            let settings = settings_manager.effective();
            app.manage(Arc::new(RwLock::new(settings_manager)));

            // Accounts live in memory; selections for signed-in users persist in sqlite.
            let local_identity = Arc::new(LocalIdentityProvider::new());
            app.manage(local_identity.clone());
            let identity: Arc<dyn IdentityProvider> = local_identity;

            // Window focus stands in for page visibility.
            let visibility = VisibilitySignal::new();
            app.manage(visibility.clone());

            let navigator: Arc<dyn Navigator> =
                Arc::new(commands::OpenerNavigator::new(app.handle().clone()));

            let orchestrator = Orchestrator::from_settings(&settings, identity, navigator, visibility)
                .map_err(|e| format!("Failed to initialize Orchestrator: {}", e))?;
            let orchestrator = Arc::new(orchestrator);
            app.manage(orchestrator.clone());

            let app_handle = app.handle().clone();
            tauri::async_runtime::spawn(async move {
                if let Err(e) = orchestrator.start().await {
                    error!("Startup: failed to load selections: {}", e);
                }
                commands::forward_events(app_handle, orchestrator).await;
            });

            Ok(())
        })
        .on_window_event(|window, event| {
            if let tauri::WindowEvent::Focused(focused) = event {
                let visibility = window.state::<VisibilitySignal>();
                visibility.set(if *focused {
                    Visibility::Visible
                } else {
                    Visibility::Hidden
                });
            }
        })
        .invoke_handler(tauri::generate_handler![
            commands::get_settings,
            commands::update_settings,
            commands::list_catalog,
            commands::load_selection,
            commands::materialize_selection,
            commands::get_selection_view,
            commands::get_selected_ids,
            commands::needs_initial_selection,
            commands::is_saving_selection,
            commands::toggle_selection,
            commands::commit_selection,
            commands::move_selection,
            commands::launch_app,
            commands::did_launch,
            commands::get_launch_state,
            commands::reset_launch,
            commands::open_store_if_needed,
            commands::recognize_image,
            commands::capture_and_launch,
            commands::normalize_response,
            commands::get_session,
            commands::sign_in,
            commands::sign_up,
            commands::sign_in_with_magic_link,
            commands::complete_magic_link,
            commands::sign_in_with_oauth,
            commands::sign_out,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
