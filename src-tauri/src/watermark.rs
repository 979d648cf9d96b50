use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info};

use crate::error::ControlError;
use crate::gemini::GenerativeBackend;
use crate::session::AppStatus;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessedImage {
    pub original: String,
    /// Empty until removal succeeds.
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatermarkSnapshot {
    pub status: AppStatus,
    pub image: Option<ProcessedImage>,
}

#[derive(Default)]
struct WorkspaceState {
    status: AppStatus,
    image: Option<ProcessedImage>,
    in_flight: bool,
    epoch: u64,
}

/// Holds one uploaded image and its cleaned counterpart.
pub struct WatermarkWorkspace<B> {
    backend: Arc<B>,
    state: Mutex<WorkspaceState>,
}

impl<B: GenerativeBackend> WatermarkWorkspace<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            state: Mutex::new(WorkspaceState::default()),
        }
    }

    pub fn snapshot(&self) -> WatermarkSnapshot {
        let st = self.lock();
        WatermarkSnapshot {
            status: st.status.clone(),
            image: st.image.clone(),
        }
    }

    /// Starts over with a freshly uploaded image.
    pub fn load(&self, original: String) -> Result<(), ControlError> {
        let mut st = self.lock();
        if st.in_flight {
            return Err(ControlError::Busy);
        }
        st.image = Some(ProcessedImage {
            original,
            result: String::new(),
        });
        st.status = AppStatus::Idle;
        Ok(())
    }

    pub async fn process(
        &self,
        custom_instruction: Option<&str>,
    ) -> Result<ProcessedImage, ControlError> {
        let (original, epoch) = {
            let mut st = self.lock();
            if st.in_flight {
                return Err(ControlError::Busy);
            }
            let original = st
                .image
                .as_ref()
                .map(|i| i.original.clone())
                .ok_or(ControlError::NoImage)?;
            st.in_flight = true;
            st.status = AppStatus::Processing;
            (original, st.epoch)
        };

        let result = self.backend.remove_watermark(&original, custom_instruction).await;

        let mut st = self.lock();
        st.in_flight = false;
        if st.epoch != epoch {
            info!("discarding watermark result of a reset workspace");
            return Err(ControlError::Reset);
        }
        match result {
            Ok(cleaned) => {
                info!("watermark removal finished");
                let processed = ProcessedImage {
                    original,
                    result: cleaned,
                };
                st.image = Some(processed.clone());
                st.status = AppStatus::Success;
                Ok(processed)
            }
            Err(e) => {
                error!(error = %e, "watermark removal failed");
                st.status = AppStatus::Error {
                    message: e.to_string(),
                };
                Err(e.into())
            }
        }
    }

    pub fn retry(&self) -> AppStatus {
        let mut st = self.lock();
        if matches!(st.status, AppStatus::Error { .. }) {
            st.status = AppStatus::Idle;
        }
        st.status.clone()
    }

    pub fn reset(&self) {
        let mut st = self.lock();
        st.image = None;
        st.status = AppStatus::Idle;
        st.epoch += 1;
    }

    fn lock(&self) -> MutexGuard<'_, WorkspaceState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
