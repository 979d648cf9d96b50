use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tauri::{AppHandle, Emitter, Manager};
use tracing::{info, warn};

use crate::chat::{ChatMessage, ChatSession, Transcript};
use crate::gemini::GeminiClient;
use crate::models::ImageSize;
use crate::playback::{AudioClip, PlaybackHandle, PlaybackSink, PlaybackState};
use crate::session::{AppStatus, Session, SessionController, SessionSnapshot};
use crate::settings::{load_settings_from_dir, save_settings_to_dir, Settings};
use crate::utils::ensure_data_dir;
use crate::watermark::{WatermarkSnapshot, WatermarkWorkspace};

/// Forwards playback to the `<audio>` element in the webview. The page reports
/// a finished clip back through `playback_ended`.
struct WebviewPlayback {
    app: AppHandle,
    state: Mutex<PlaybackState>,
}

impl WebviewPlayback {
    fn new(app: AppHandle) -> Self {
        Self {
            app,
            state: Mutex::new(PlaybackState::Stopped),
        }
    }

    fn set(&self, next: PlaybackState) -> PlaybackState {
        let mut st = self.state.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *st, next)
    }

    fn emit<S: Serialize + Clone>(&self, event: &str, payload: S) {
        if let Err(e) = self.app.emit(event, payload) {
            warn!(error = %e, event, "failed to emit playback event");
        }
    }
}

impl PlaybackSink for WebviewPlayback {
    fn play(&self, clip: &AudioClip) {
        self.set(PlaybackState::Playing);
        self.emit("playback://play", clip);
    }

    fn pause(&self) {
        self.set(PlaybackState::Paused);
        self.emit("playback://pause", ());
    }

    fn resume(&self) {
        self.set(PlaybackState::Playing);
        self.emit("playback://resume", ());
    }

    fn stop(&self) {
        if self.set(PlaybackState::Stopped) != PlaybackState::Stopped {
            self.emit("playback://stop", ());
        }
    }

    fn ended(&self) {
        self.set(PlaybackState::Stopped);
    }

    fn state(&self) -> PlaybackState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Clone)]
struct AppState {
    data_dir: PathBuf,
    client: Arc<GeminiClient>,
    session: Arc<SessionController<GeminiClient>>,
    chat: Arc<ChatSession<GeminiClient>>,
    watermark: Arc<WatermarkWorkspace<GeminiClient>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AppHealth {
    ok: bool,
    data_dir: String,
    has_api_key: bool,
}

// ===== Tauri Commands =====

#[tauri::command]
async fn health(state: tauri::State<'_, AppState>) -> Result<AppHealth, String> {
    Ok(AppHealth {
        ok: true,
        data_dir: state.data_dir.display().to_string(),
        has_api_key: state.client.settings().resolve_api_key().is_some(),
    })
}

#[tauri::command]
async fn get_settings(state: tauri::State<'_, AppState>) -> Result<Settings, String> {
    Ok(state.client.settings())
}

#[tauri::command]
async fn update_settings(
    state: tauri::State<'_, AppState>,
    settings: Settings,
) -> Result<Settings, String> {
    save_settings_to_dir(&state.data_dir, &settings).map_err(|e| e.to_string())?;
    state.client.update_settings(settings.clone());
    Ok(settings)
}

#[tauri::command]
async fn create_session(
    state: tauri::State<'_, AppState>,
    topic: String,
    size: Option<ImageSize>,
    aspect_ratio: Option<String>,
) -> Result<Session, String> {
    state
        .session
        .generate(&topic, size.unwrap_or_default(), aspect_ratio.as_deref())
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
async fn session_state(state: tauri::State<'_, AppState>) -> Result<SessionSnapshot, String> {
    Ok(state.session.snapshot())
}

#[tauri::command]
async fn narrate_session(state: tauri::State<'_, AppState>) -> Result<String, String> {
    state.session.narrate().await.map_err(|e| e.to_string())
}

#[tauri::command]
async fn play_session(state: tauri::State<'_, AppState>) -> Result<(), String> {
    state.session.play().map_err(|e| e.to_string())
}

#[tauri::command]
async fn pause_playback(state: tauri::State<'_, AppState>) -> Result<(), String> {
    state.session.pause();
    Ok(())
}

#[tauri::command]
async fn resume_playback(state: tauri::State<'_, AppState>) -> Result<(), String> {
    state.session.resume();
    Ok(())
}

#[tauri::command]
async fn toggle_playback(state: tauri::State<'_, AppState>) -> Result<PlaybackState, String> {
    state.session.toggle_play().map_err(|e| e.to_string())
}

#[tauri::command]
async fn playback_ended(state: tauri::State<'_, AppState>) -> Result<(), String> {
    state.session.playback_ended();
    Ok(())
}

#[tauri::command]
async fn stop_playback(state: tauri::State<'_, AppState>) -> Result<(), String> {
    state.session.stop();
    Ok(())
}

#[tauri::command]
async fn retry_session(state: tauri::State<'_, AppState>) -> Result<AppStatus, String> {
    Ok(state.session.retry())
}

#[tauri::command]
async fn reset_session(state: tauri::State<'_, AppState>) -> Result<(), String> {
    state.session.reset();
    Ok(())
}

#[tauri::command]
async fn chat_send(
    state: tauri::State<'_, AppState>,
    message: String,
) -> Result<ChatMessage, String> {
    state.chat.send(&message).await.map_err(|e| e.to_string())
}

#[tauri::command]
async fn chat_transcript(state: tauri::State<'_, AppState>) -> Result<Transcript, String> {
    Ok(state.chat.transcript())
}

#[tauri::command]
async fn watermark_load(state: tauri::State<'_, AppState>, image: String) -> Result<(), String> {
    state.watermark.load(image).map_err(|e| e.to_string())
}

#[tauri::command]
async fn watermark_process(
    state: tauri::State<'_, AppState>,
    instruction: Option<String>,
) -> Result<WatermarkSnapshot, String> {
    state
        .watermark
        .process(instruction.as_deref())
        .await
        .map_err(|e| e.to_string())?;
    Ok(state.watermark.snapshot())
}

#[tauri::command]
async fn watermark_state(state: tauri::State<'_, AppState>) -> Result<WatermarkSnapshot, String> {
    Ok(state.watermark.snapshot())
}

#[tauri::command]
async fn watermark_reset(state: tauri::State<'_, AppState>) -> Result<(), String> {
    state.watermark.reset();
    Ok(())
}

// ===== Startup and Main =====

fn build_state(app: &AppHandle, data_dir: PathBuf) -> AppState {
    let settings = load_settings_from_dir(&data_dir);
    let client = Arc::new(GeminiClient::new(settings));
    let playback = PlaybackHandle::new(WebviewPlayback::new(app.clone()));

    AppState {
        data_dir,
        session: Arc::new(SessionController::new(client.clone(), playback)),
        chat: Arc::new(ChatSession::new(client.clone())),
        watermark: Arc::new(WatermarkWorkspace::new(client.clone())),
        client,
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let data_dir = ensure_data_dir().expect("startup failed: no data dir");
    let _log_guard = crate::logging::init(&data_dir).expect("startup failed: logging");
    info!(data_dir = %data_dir.display(), "starting stillpoint");

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(move |app| {
            let state = build_state(app.handle(), data_dir.clone());
            app.manage(state);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            health,
            get_settings,
            update_settings,
            create_session,
            session_state,
            narrate_session,
            play_session,
            pause_playback,
            resume_playback,
            toggle_playback,
            playback_ended,
            stop_playback,
            retry_session,
            reset_session,
            chat_send,
            chat_transcript,
            watermark_load,
            watermark_process,
            watermark_state,
            watermark_reset
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
