//! In-process stand-in for the Gemini backend used by controller tests.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};

use crate::chat::ChatMessage;
use crate::error::AppError;
use crate::gemini::{GenerativeBackend, PcmAudio};
use crate::models::ImageSize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatCall {
    pub history: Vec<ChatMessage>,
    pub message: String,
}

#[derive(Default)]
struct Recorded {
    scripts: usize,
    images: Vec<(String, ImageSize, Option<String>)>,
    chats: Vec<ChatCall>,
    watermarks: Vec<(String, Option<String>)>,
    speeches: usize,
    fail_image: Option<AppError>,
    fail_chat: Option<AppError>,
    fail_watermark: Option<AppError>,
    fail_speech: Option<AppError>,
}

/// Closing the gate lets every held call through.
pub struct Gate(Arc<Semaphore>);

impl Gate {
    pub fn release(&self) {
        self.0.close();
    }
}

#[derive(Default)]
pub struct StubBackend {
    rec: Mutex<Recorded>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    entered: Notify,
}

impl StubBackend {
    /// Makes every call wait until the returned gate is released.
    pub fn hold(&self) -> Gate {
        let sem = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(sem.clone());
        Gate(sem)
    }

    /// Resolves once a call has reached a held gate.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn fail_image(&self, e: AppError) {
        self.rec.lock().unwrap().fail_image = Some(e);
    }

    pub fn fail_chat(&self, e: AppError) {
        self.rec.lock().unwrap().fail_chat = Some(e);
    }

    pub fn fail_watermark(&self, e: AppError) {
        self.rec.lock().unwrap().fail_watermark = Some(e);
    }

    pub fn fail_speech(&self, e: AppError) {
        self.rec.lock().unwrap().fail_speech = Some(e);
    }

    pub fn script_calls(&self) -> usize {
        self.rec.lock().unwrap().scripts
    }

    pub fn image_calls(&self) -> Vec<(String, ImageSize, Option<String>)> {
        self.rec.lock().unwrap().images.clone()
    }

    pub fn chat_calls(&self) -> Vec<ChatCall> {
        self.rec.lock().unwrap().chats.clone()
    }

    pub fn watermark_calls(&self) -> Vec<(String, Option<String>)> {
        self.rec.lock().unwrap().watermarks.clone()
    }

    pub fn speech_calls(&self) -> usize {
        self.rec.lock().unwrap().speeches
    }

    async fn pass_gate(&self) {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(sem) = gate {
            self.entered.notify_one();
            let _ = sem.acquire().await;
        }
    }
}

#[async_trait]
impl GenerativeBackend for StubBackend {
    async fn generate_script(&self, topic: &str) -> Result<String, AppError> {
        self.rec.lock().unwrap().scripts += 1;
        self.pass_gate().await;
        Ok(format!("script about {topic}"))
    }

    async fn generate_image(
        &self,
        topic: &str,
        size: ImageSize,
        aspect_ratio: Option<&str>,
    ) -> Result<String, AppError> {
        let fail = {
            let mut rec = self.rec.lock().unwrap();
            rec.images
                .push((topic.to_string(), size, aspect_ratio.map(str::to_string)));
            rec.fail_image.clone()
        };
        self.pass_gate().await;
        match fail {
            Some(e) => Err(e),
            None => Ok("data:image/png;base64,aW1n".to_string()),
        }
    }

    async fn chat(&self, history: &[ChatMessage], message: &str) -> Result<String, AppError> {
        let fail = {
            let mut rec = self.rec.lock().unwrap();
            rec.chats.push(ChatCall {
                history: history.to_vec(),
                message: message.to_string(),
            });
            rec.fail_chat.clone()
        };
        self.pass_gate().await;
        match fail {
            Some(e) => Err(e),
            None => Ok(format!("reply to {message}")),
        }
    }

    async fn remove_watermark(
        &self,
        image_data_url: &str,
        custom_instruction: Option<&str>,
    ) -> Result<String, AppError> {
        let fail = {
            let mut rec = self.rec.lock().unwrap();
            rec.watermarks
                .push((image_data_url.to_string(), custom_instruction.map(str::to_string)));
            rec.fail_watermark.clone()
        };
        self.pass_gate().await;
        match fail {
            Some(e) => Err(e),
            None => Ok("data:image/jpeg;base64,Y2xlYW4=".to_string()),
        }
    }

    async fn generate_speech(&self, _text: &str) -> Result<PcmAudio, AppError> {
        let fail = {
            let mut rec = self.rec.lock().unwrap();
            rec.speeches += 1;
            rec.fail_speech.clone()
        };
        self.pass_gate().await;
        match fail {
            Some(e) => Err(e),
            None => Ok(PcmAudio {
                bytes: vec![0, 0, 1, 0],
                sample_rate: 24_000,
            }),
        }
    }
}
