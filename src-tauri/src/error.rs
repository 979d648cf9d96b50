use thiserror::Error;

/// Shown by the UI when script generation fails.
pub const FALLBACK_SCRIPT: &str =
    "Take a deep breath. Focus on the present moment. Inhale peace, exhale tension.";

/// Shown by the UI when the guide cannot answer.
pub const FALLBACK_CHAT_REPLY: &str = "I'm having trouble connecting. Please try again.";

/// Failures surfaced by the Gemini gateway and the audio codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("API key is missing. Set GEMINI_API_KEY or add it in settings.")]
    MissingApiKey,
    #[error("script generation failed: {0}")]
    GenerationFailed(String),
    #[error("image generation failed: {0}")]
    ImageGenerationFailed(String),
    #[error("no image returned: {0}")]
    NoImageReturned(String),
    #[error("chat failed: {0}")]
    ChatFailed(String),
    #[error("speech generation failed: {0}")]
    SpeechFailed(String),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<base64::DecodeError> for AppError {
    fn from(e: base64::DecodeError) -> Self {
        AppError::Decode(e.to_string())
    }
}

/// Rejections and failures from the UI state controllers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("a request is already in progress")]
    Busy,
    #[error("topic is empty")]
    EmptyTopic,
    #[error("message is empty")]
    EmptyMessage,
    #[error("no session to work with")]
    NoSession,
    #[error("no narration to play")]
    NoAudio,
    #[error("no image loaded")]
    NoImage,
    /// The call finished after a reset; its result was thrown away.
    #[error("request was cancelled by a reset")]
    Reset,
    #[error(transparent)]
    Gateway(#[from] AppError),
}
