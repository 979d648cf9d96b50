use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info, warn};

use crate::audio::{pcm_to_wav, wav_data_url};
use crate::error::{AppError, ControlError};
use crate::gemini::GenerativeBackend;
use crate::models::ImageSize;
use crate::playback::{AudioClip, PlaybackHandle, PlaybackState};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AppStatus {
    #[default]
    Idle,
    Processing,
    Success,
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Session {
    pub topic: String,
    pub script: String,
    pub image_url: String,
    pub audio_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub status: AppStatus,
    pub session: Option<Session>,
    pub playing: bool,
    pub paused: bool,
}

#[derive(Default)]
struct ControllerState {
    status: AppStatus,
    session: Option<Session>,
    /// Single-flight gate. Stays set until the running call returns, even
    /// across a reset.
    in_flight: bool,
    /// Bumped on every reset so results of abandoned calls are dropped.
    epoch: u64,
}

/// Drives "script, then image" generation and owns the playback handle.
pub struct SessionController<B> {
    backend: Arc<B>,
    playback: PlaybackHandle,
    state: Mutex<ControllerState>,
}

impl<B: GenerativeBackend> SessionController<B> {
    pub fn new(backend: Arc<B>, playback: PlaybackHandle) -> Self {
        Self {
            backend,
            playback,
            state: Mutex::new(ControllerState::default()),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let st = self.lock();
        let playback = self.playback.state();
        SessionSnapshot {
            status: st.status.clone(),
            session: st.session.clone(),
            playing: playback == PlaybackState::Playing,
            paused: playback == PlaybackState::Paused,
        }
    }

    pub async fn generate(
        &self,
        topic: &str,
        size: ImageSize,
        aspect_ratio: Option<&str>,
    ) -> Result<Session, ControlError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ControlError::EmptyTopic);
        }
        let epoch = {
            let mut st = self.lock();
            if st.in_flight {
                warn!("generation already in progress");
                return Err(ControlError::Busy);
            }
            self.playback.stop();
            st.in_flight = true;
            st.session = None;
            st.status = AppStatus::Processing;
            st.epoch
        };
        info!(topic, size = size.as_str(), aspect_ratio, "generating session");

        let result = self.run_generation(topic, size, aspect_ratio).await;

        let mut st = self.lock();
        st.in_flight = false;
        if st.epoch != epoch {
            info!("discarding result of a reset session");
            return Err(ControlError::Reset);
        }
        match result {
            Ok(session) => {
                st.session = Some(session.clone());
                st.status = AppStatus::Success;
                Ok(session)
            }
            Err(e) => {
                error!(error = %e, "session generation failed");
                st.status = AppStatus::Error {
                    message: e.to_string(),
                };
                Err(e.into())
            }
        }
    }

    async fn run_generation(
        &self,
        topic: &str,
        size: ImageSize,
        aspect_ratio: Option<&str>,
    ) -> Result<Session, AppError> {
        let script = self.backend.generate_script(topic).await?;
        let image_url = self
            .backend
            .generate_image(topic, size, aspect_ratio)
            .await?;
        Ok(Session {
            topic: topic.to_string(),
            script,
            image_url,
            audio_url: String::new(),
        })
    }

    /// Voices the current script and stores the WAV on the session. Status is
    /// left alone, so a failed narration keeps the session on screen.
    pub async fn narrate(&self) -> Result<String, ControlError> {
        let (script, epoch) = {
            let mut st = self.lock();
            if st.in_flight {
                return Err(ControlError::Busy);
            }
            let script = match (&st.status, &st.session) {
                (AppStatus::Success, Some(s)) => s.script.clone(),
                _ => return Err(ControlError::NoSession),
            };
            self.playback.stop();
            st.in_flight = true;
            (script, st.epoch)
        };

        let result = self
            .backend
            .generate_speech(&script)
            .await
            .and_then(|pcm| {
                let wav = pcm_to_wav(&pcm.bytes, pcm.sample_rate)?;
                Ok(wav_data_url(&wav))
            });

        let mut st = self.lock();
        st.in_flight = false;
        if st.epoch != epoch {
            info!("discarding narration of a reset session");
            return Err(ControlError::Reset);
        }
        let audio_url = result.map_err(|e| {
            warn!(error = %e, "narration failed");
            ControlError::from(e)
        })?;
        if let Some(current) = st.session.clone() {
            st.session = Some(Session {
                audio_url: audio_url.clone(),
                ..current
            });
        }
        Ok(audio_url)
    }

    /// Starts the narration from the beginning.
    pub fn play(&self) -> Result<(), ControlError> {
        let url = self
            .lock()
            .session
            .as_ref()
            .map(|s| s.audio_url.clone())
            .filter(|u| !u.is_empty())
            .ok_or(ControlError::NoAudio)?;
        self.playback.play(&AudioClip { url });
        Ok(())
    }

    pub fn pause(&self) {
        self.playback.pause();
    }

    pub fn resume(&self) {
        self.playback.resume();
    }

    /// Play button: pauses while playing, resumes while paused, otherwise
    /// starts the narration.
    pub fn toggle_play(&self) -> Result<PlaybackState, ControlError> {
        match self.playback.state() {
            PlaybackState::Playing => self.playback.pause(),
            PlaybackState::Paused => self.playback.resume(),
            PlaybackState::Stopped => self.play()?,
        }
        Ok(self.playback.state())
    }

    /// Called by the renderer when the clip finishes or fails.
    pub fn playback_ended(&self) {
        self.playback.ended();
    }

    pub fn stop(&self) {
        self.playback.stop();
    }

    /// `Error -> Idle`. Any other state is left alone.
    pub fn retry(&self) -> AppStatus {
        let mut st = self.lock();
        if matches!(st.status, AppStatus::Error { .. }) {
            st.status = AppStatus::Idle;
        }
        st.status.clone()
    }

    pub fn reset(&self) {
        self.playback.stop();
        let mut st = self.lock();
        st.session = None;
        st.status = AppStatus::Idle;
        st.epoch += 1;
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
