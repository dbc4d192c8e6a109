mod auth;
mod commands;
mod cycle;
mod db;
mod error;
mod llm;
mod models;
mod storage;
#[cfg(test)]
mod test_utils;

use db::AppState;
use std::sync::Arc;
use tauri::Manager;
use tracing_subscriber::EnvFilter;

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
  // Load environment variables from .env file
  dotenvy::dotenv().ok();

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  tauri::Builder::default()
    .plugin(tauri_plugin_opener::init())
    .setup(|app| {
      // Initialize database
      let app_handle = app.handle().clone();
      tauri::async_runtime::block_on(async move {
        match db::initialize_db(&app_handle).await {
          Ok(pool) => {
            let state = Arc::new(AppState::new(pool));
            app_handle.manage(state);
            tracing::info!("Database ready");
          }
          Err(e) => {
            tracing::error!(error = %e, "Failed to initialize database");
          }
        }
      });
      Ok(())
    })
    .invoke_handler(tauri::generate_handler![
      // Session
      commands::auth::auth_start_login,
      commands::auth::auth_complete_login,
      commands::auth::auth_get_status,
      commands::auth::auth_refresh_session,
      commands::auth::auth_logout,
      commands::auth::get_current_user,
      commands::auth::update_profile,
      // Cycles
      commands::cycles::get_cycles,
      commands::cycles::create_cycle,
      commands::cycles::set_cycle_end_date,
      commands::cycles::get_cycle_status,
      commands::cycles::get_calendar,
      commands::cycles::get_cycle_insights,
      // Symptoms
      commands::symptoms::get_symptoms,
      commands::symptoms::log_symptoms,
      // Chat
      commands::chat::get_chat_history,
      commands::chat::send_chat_message,
      // Wellness content
      commands::content::get_recipes,
      commands::content::get_meditation_videos,
      commands::content::get_educational_content,
      // Favorites
      commands::favorites::get_favorites,
      commands::favorites::add_favorite,
      commands::favorites::remove_favorite,
    ])
    .run(tauri::generate_context!())
    .expect("error while running tauri application");
}
