pub mod audio;
pub mod chat;
pub mod error;
pub mod gemini;
pub mod logging;
pub mod models;
pub mod playback;
pub mod session;
pub mod settings;
pub mod utils;
pub mod watermark;

#[cfg(feature = "desktop")]
mod desktop;
#[cfg(test)]
mod testing;

pub use audio::{pcm_base64_to_wav, pcm_to_wav, wav_data_url};
pub use chat::{ChatMessage, ChatSession, Role, Transcript};
pub use error::{AppError, ControlError, FALLBACK_CHAT_REPLY, FALLBACK_SCRIPT};
pub use gemini::{GeminiClient, GenerativeBackend, PcmAudio};
pub use models::{GenerationResult, ImageSize, ModelTable};
pub use playback::{AudioClip, PlaybackHandle, PlaybackSink, PlaybackState, TrackedPlayback};
pub use session::{AppStatus, Session, SessionController, SessionSnapshot};
pub use settings::Settings;
pub use watermark::{ProcessedImage, WatermarkWorkspace};

#[cfg(feature = "desktop")]
pub use desktop::run;
