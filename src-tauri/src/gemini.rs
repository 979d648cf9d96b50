use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

use crate::audio::{sample_rate_from_mime, DEFAULT_SAMPLE_RATE};
use crate::chat::ChatMessage;
use crate::error::AppError;
use crate::models::{
    GenerationRequest, GenerationResult, ImageSize, InlineImage, Operation, RequestOptions,
    ResponseShape,
};
use crate::settings::Settings;
use crate::utils::{data_url, split_data_url};

pub const GUIDE_PERSONA: &str =
    "You are a calming, empathetic meditation guide. Keep responses concise and soothing.";
pub const DEFAULT_VOICE: &str = "Kore";

const DEFAULT_WATERMARK_INSTRUCTION: &str = "Remove all watermarks, logos, and text overlays from this image. Reconstruct the background naturally where the watermarks were removed. Output the clean image.";

// ===== Wire types =====

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "inline_data")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(s: impl Into<String>) -> Self {
        Part {
            text: Some(s.into()),
            inline_data: None,
        }
    }

    pub fn inline(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Part {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_config: Option<ImageConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

// ===== Prompts =====

fn script_prompt(topic: &str) -> String {
    format!(
        r#"Write a short, soothing guided meditation script about: "{}".
The script should be around 150-200 words.
Focus on sensory details (sight, sound, feeling) and deep breathing.
Do not include instructions like [Pause] or *soft music*, just the spoken words.
Start directly with the meditation."#,
        topic
    )
}

fn image_prompt(topic: &str) -> String {
    format!(
        "meditation background, {}, serene, artistic, soft lighting, 8k, highly detailed, spiritual atmosphere, digital art, no text",
        topic
    )
}

fn watermark_prompt(custom_instruction: Option<&str>) -> String {
    match custom_instruction.map(str::trim).filter(|s| !s.is_empty()) {
        Some(instruction) => {
            format!("Edit this image: {}. Output only the modified image.", instruction)
        }
        None => DEFAULT_WATERMARK_INSTRUCTION.to_string(),
    }
}

fn speech_prompt(text: &str) -> String {
    format!("Read this guided meditation slowly, in a calm and gentle voice:\n\n{}", text)
}

// ===== Request building =====

fn user_content(parts: Vec<Part>) -> Content {
    Content {
        role: Some("user".to_string()),
        parts,
    }
}

/// Turns a request into the JSON body for `generateContent`.
/// `history` is only consulted for chat requests.
pub fn build_body(req: &GenerationRequest, history: &[ChatMessage]) -> GenerateContentRequest {
    match req.kind {
        Operation::Script => GenerateContentRequest {
            contents: vec![user_content(vec![Part::text(&req.text)])],
            ..Default::default()
        },
        Operation::Image => {
            let size = req.options.size;
            let image_config = ImageConfig {
                image_size: size.is_high_res().then(|| size.as_str().to_string()),
                aspect_ratio: req.options.aspect_ratio.clone(),
            };
            let generation_config =
                (image_config != ImageConfig::default()).then(|| GenerationConfig {
                    image_config: Some(image_config),
                    ..Default::default()
                });
            GenerateContentRequest {
                contents: vec![user_content(vec![Part::text(&req.text)])],
                generation_config,
                ..Default::default()
            }
        }
        Operation::WatermarkRemoval => {
            let mut parts = vec![Part::text(&req.text)];
            if let Some(img) = &req.image {
                parts.push(Part::inline(&img.mime_type, &img.data));
            }
            GenerateContentRequest {
                contents: vec![user_content(parts)],
                ..Default::default()
            }
        }
        Operation::Chat => {
            let mut contents: Vec<Content> = history
                .iter()
                .map(|m| Content {
                    role: Some(m.role.as_str().to_string()),
                    parts: vec![Part::text(&m.text)],
                })
                .collect();
            contents.push(user_content(vec![Part::text(&req.text)]));
            GenerateContentRequest {
                contents,
                system_instruction: Some(Content {
                    role: None,
                    parts: vec![Part::text(GUIDE_PERSONA)],
                }),
                ..Default::default()
            }
        }
        Operation::Speech => {
            let voice = req.options.voice.clone().unwrap_or_else(|| DEFAULT_VOICE.to_string());
            GenerateContentRequest {
                contents: vec![user_content(vec![Part::text(&req.text)])],
                generation_config: Some(GenerationConfig {
                    response_modalities: Some(vec!["AUDIO".to_string()]),
                    speech_config: Some(SpeechConfig {
                        voice_config: VoiceConfig {
                            prebuilt_voice_config: PrebuiltVoiceConfig {
                                voice_name: voice,
                            },
                        },
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }
        }
    }
}

// ===== Response decoding =====

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartsError {
    /// No part of the expected kind was present.
    Missing(ResponseShape),
    Malformed(String),
}

impl PartsError {
    fn into_app_error(self, fail: fn(String) -> AppError) -> AppError {
        match self {
            PartsError::Missing(ResponseShape::Text) => fail("response contained no text".into()),
            PartsError::Missing(ResponseShape::InlineImage) => {
                fail("response contained no inline image data".into())
            }
            PartsError::Missing(ResponseShape::InlineAudio) => {
                fail("response contained no inline audio data".into())
            }
            PartsError::Malformed(msg) => AppError::Decode(msg),
        }
    }
}

/// Maps a part list to a result of the requested shape. The first matching
/// part wins; empty text and empty inline payloads never match.
pub fn decode_parts(parts: &[Part], shape: ResponseShape) -> Result<GenerationResult, PartsError> {
    let first_inline = || {
        parts
            .iter()
            .filter_map(|p| p.inline_data.as_ref())
            .find(|d| !d.data.is_empty())
    };
    match shape {
        ResponseShape::Text => parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .find(|t| !t.trim().is_empty())
            .map(|t| GenerationResult::Text {
                text: t.to_string(),
            })
            .ok_or(PartsError::Missing(shape)),
        ResponseShape::InlineImage => {
            let inline = first_inline().ok_or(PartsError::Missing(shape))?;
            let mime = if inline.mime_type.is_empty() {
                "image/png"
            } else {
                inline.mime_type.as_str()
            };
            Ok(GenerationResult::ImageDataUrl {
                url: data_url(mime, &inline.data),
                mime: mime.to_string(),
            })
        }
        ResponseShape::InlineAudio => {
            let inline = first_inline().ok_or(PartsError::Missing(shape))?;
            let bytes = B64
                .decode(inline.data.trim())
                .map_err(|e| PartsError::Malformed(format!("audio payload: {e}")))?;
            let sample_rate =
                sample_rate_from_mime(&inline.mime_type).unwrap_or(DEFAULT_SAMPLE_RATE);
            Ok(GenerationResult::AudioPcm { bytes, sample_rate })
        }
    }
}

// ===== Backend seam =====

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmAudio {
    pub bytes: Vec<u8>,
    pub sample_rate: u32,
}

/// The remote generative service as seen by the UI controllers.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn generate_script(&self, topic: &str) -> Result<String, AppError>;
    async fn generate_image(
        &self,
        topic: &str,
        size: ImageSize,
        aspect_ratio: Option<&str>,
    ) -> Result<String, AppError>;
    async fn chat(&self, history: &[ChatMessage], message: &str) -> Result<String, AppError>;
    async fn remove_watermark(
        &self,
        image_data_url: &str,
        custom_instruction: Option<&str>,
    ) -> Result<String, AppError>;
    async fn generate_speech(&self, text: &str) -> Result<PcmAudio, AppError>;
}

// ===== Client =====

pub struct GeminiClient {
    http: reqwest::Client,
    settings: Arc<RwLock<Settings>>,
    env: fn(&str) -> Option<String>,
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

impl GeminiClient {
    pub fn new(settings: Settings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings: Arc::new(RwLock::new(settings)),
            env: read_env,
        }
    }

    /// Replaces how environment variables are looked up when resolving the API key.
    pub fn with_env_lookup(mut self, env: fn(&str) -> Option<String>) -> Self {
        self.env = env;
        self
    }

    pub fn settings(&self) -> Settings {
        self.settings.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn update_settings(&self, settings: Settings) {
        *self.settings.write().unwrap_or_else(|e| e.into_inner()) = settings;
    }

    /// Sends one request and returns the first candidate's parts. The API key
    /// is checked before anything goes on the wire.
    async fn execute(
        &self,
        req: &GenerationRequest,
        history: &[ChatMessage],
        fail: fn(String) -> AppError,
    ) -> Result<GenerationResult, AppError> {
        let settings = self.settings();
        let api_key = settings.resolve_api_key_with(self.env).ok_or(AppError::MissingApiKey)?;
        let route = settings.models.route(req.kind, req.options.size);
        let url = format!("{}/v1beta/models/{}:generateContent", settings.base_url(), route.model);
        let body = build_body(req, history);

        debug!(model = %route.model, "sending generateContent");
        let mut builder = self.http.post(url).header("x-goog-api-key", api_key).json(&body);
        if let Some(secs) = settings.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let resp = builder.send().await.map_err(|e| {
            error!(error = %e, model = %route.model, "gemini request failed");
            fail(format!("request failed: {e}"))
        })?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            error!(%status, model = %route.model, "gemini returned an error status");
            return Err(fail(format!("HTTP {}: {}", status, detail.trim())));
        }

        let value: GenerateContentResponse =
            resp.json().await.map_err(|e| fail(format!("response parse error: {e}")))?;
        let parts = value
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts)
            .unwrap_or_default();

        decode_parts(&parts, route.shape).map_err(|e| e.into_app_error(fail))
    }

    fn request(kind: Operation, text: String, options: RequestOptions) -> GenerationRequest {
        GenerationRequest {
            kind,
            text,
            image: None,
            options,
        }
    }
}

fn expect_text(result: GenerationResult, fail: fn(String) -> AppError) -> Result<String, AppError> {
    match result {
        GenerationResult::Text { text } => Ok(text),
        other => Err(fail(format!("unexpected result: {other:?}"))),
    }
}

fn expect_image(
    result: GenerationResult,
    fail: fn(String) -> AppError,
) -> Result<String, AppError> {
    match result {
        GenerationResult::ImageDataUrl { url, .. } => Ok(url),
        other => Err(fail(format!("unexpected result: {other:?}"))),
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    #[instrument(skip(self), fields(topic_len = topic.len()))]
    async fn generate_script(&self, topic: &str) -> Result<String, AppError> {
        let req = Self::request(Operation::Script, script_prompt(topic), RequestOptions::default());
        let result = self.execute(&req, &[], AppError::GenerationFailed).await?;
        let script = expect_text(result, AppError::GenerationFailed)?;
        info!(words = script.split_whitespace().count(), "script generated");
        Ok(script)
    }

    #[instrument(skip(self), fields(size = size.as_str()))]
    async fn generate_image(
        &self,
        topic: &str,
        size: ImageSize,
        aspect_ratio: Option<&str>,
    ) -> Result<String, AppError> {
        let options = RequestOptions {
            size,
            aspect_ratio: aspect_ratio.map(str::to_string),
            ..Default::default()
        };
        let req = Self::request(Operation::Image, image_prompt(topic), options);
        let result = self.execute(&req, &[], AppError::ImageGenerationFailed).await?;
        let url = expect_image(result, AppError::ImageGenerationFailed)?;
        info!("image generated");
        Ok(url)
    }

    #[instrument(skip(self, history, message), fields(history_len = history.len()))]
    async fn chat(&self, history: &[ChatMessage], message: &str) -> Result<String, AppError> {
        let req = Self::request(Operation::Chat, message.to_string(), RequestOptions::default());
        let result = self.execute(&req, history, AppError::ChatFailed).await?;
        expect_text(result, AppError::ChatFailed)
    }

    #[instrument(skip(self, image_data_url), fields(custom = custom_instruction.is_some()))]
    async fn remove_watermark(
        &self,
        image_data_url: &str,
        custom_instruction: Option<&str>,
    ) -> Result<String, AppError> {
        let (mime, data) = split_data_url(image_data_url);
        let prompt = watermark_prompt(custom_instruction);
        let mut req = Self::request(Operation::WatermarkRemoval, prompt, RequestOptions::default());
        req.image = Some(InlineImage {
            mime_type: mime.unwrap_or("image/jpeg").to_string(),
            data: data.to_string(),
        });
        let result = self.execute(&req, &[], AppError::NoImageReturned).await?;
        let url = expect_image(result, AppError::NoImageReturned)?;
        info!("watermark removed");
        Ok(url)
    }

    #[instrument(skip(self, text), fields(text_len = text.len()))]
    async fn generate_speech(&self, text: &str) -> Result<PcmAudio, AppError> {
        let options = RequestOptions {
            voice: self.settings().voice,
            ..Default::default()
        };
        let req = Self::request(Operation::Speech, speech_prompt(text), options);
        match self.execute(&req, &[], AppError::SpeechFailed).await? {
            GenerationResult::AudioPcm { bytes, sample_rate } => {
                info!(bytes = bytes.len(), sample_rate, "speech generated");
                Ok(PcmAudio { bytes, sample_rate })
            }
            other => Err(AppError::SpeechFailed(format!("unexpected result: {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Role;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client_for(server: &MockServer) -> GeminiClient {
        let settings = Settings {
            api_key: Some("test-key".into()),
            base_url: Some(server.base_url()),
            ..Settings::default()
        };
        GeminiClient::new(settings).with_env_lookup(|_| None)
    }

    fn reply(parts: serde_json::Value) -> serde_json::Value {
        json!({ "candidates": [ { "content": { "role": "model", "parts": parts } } ] })
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(reply(json!([{ "text": "hi" }])));
            })
            .await;

        let client = GeminiClient::new(Settings {
            api_key: Some("   ".into()),
            base_url: Some(server.base_url()),
            ..Settings::default()
        })
        .with_env_lookup(|_| None);

        assert_eq!(client.generate_script("rain").await.unwrap_err(), AppError::MissingApiKey);
        assert_eq!(client.chat(&[], "hello").await.unwrap_err(), AppError::MissingApiKey);
        assert_eq!(mock.hits_async().await, 0);
    }

    #[tokio::test]
    async fn script_uses_template_and_returns_first_text() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/gemini-2.5-flash:generateContent")
                    .header("x-goog-api-key", "test-key")
                    .body_contains("guided meditation script about")
                    .body_contains("foggy pine forest");
                then.status(200).json_body(reply(json!([
                    { "text": "" },
                    { "text": "Breathe in." },
                    { "text": "Later." }
                ])));
            })
            .await;

        let script = client_for(&server).generate_script("foggy pine forest").await.unwrap();
        assert_eq!(script, "Breathe in.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn provider_error_is_typed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(503).body("overloaded");
            })
            .await;

        let err = client_for(&server).generate_script("sea").await.unwrap_err();
        assert!(matches!(err, AppError::GenerationFailed(ref m) if m.contains("503")), "{err:?}");
    }

    #[tokio::test]
    async fn high_res_image_routes_to_pro_model() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/gemini-3-pro-image-preview:generateContent")
                    .body_contains("\"imageSize\":\"4K\"")
                    .body_contains("spiritual atmosphere");
                then.status(200).json_body(reply(json!([
                    { "text": "here you go" },
                    { "inlineData": { "mimeType": "image/webp", "data": "aW1hZ2U=" } }
                ])));
            })
            .await;

        let url = client_for(&server)
            .generate_image("lotus pond", ImageSize::K4, None)
            .await
            .unwrap();
        assert_eq!(url, "data:image/webp;base64,aW1hZ2U=");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn image_without_inline_part_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1beta/models/gemini-2.5-flash-image:generateContent");
                then.status(200).json_body(reply(json!([{ "text": "I cannot draw that" }])));
            })
            .await;

        let err = client_for(&server)
            .generate_image("lotus", ImageSize::K1, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ImageGenerationFailed(_)), "{err:?}");
    }

    #[tokio::test]
    async fn watermark_removal_strips_header_and_requires_an_image() {
        let server = MockServer::start_async().await;
        let ok = server
            .mock_async(|when, then| {
                when.method(POST)
                    .body_contains(r#""mimeType":"image/png","data":"cGl4ZWxz""#)
                    .body_contains(
                        "Edit this image: remove the date stamp. Output only the modified image.",
                    );
                then.status(200).json_body(reply(json!([
                    { "inlineData": { "mimeType": "image/jpeg", "data": "Y2xlYW4=" } }
                ])));
            })
            .await;

        let client = client_for(&server);
        let url = client
            .remove_watermark("data:image/png;base64,cGl4ZWxz", Some("remove the date stamp"))
            .await
            .unwrap();
        assert_eq!(url, "data:image/jpeg;base64,Y2xlYW4=");
        ok.assert_async().await;
        ok.delete_async().await;

        server
            .mock_async(|when, then| {
                when.method(POST).body_contains("Remove all watermarks");
                then.status(200).json_body(json!({ "candidates": [] }));
            })
            .await;
        let err = client.remove_watermark("cGl4ZWxz", Some("  ")).await.unwrap_err();
        assert!(matches!(err, AppError::NoImageReturned(_)), "{err:?}");
    }

    #[tokio::test]
    async fn chat_replays_history_with_persona() {
        let server = MockServer::start_async().await;
        let history = vec![
            ChatMessage::new(Role::Model, "How are you?"),
            ChatMessage::new(Role::User, "Tense."),
            ChatMessage::new(Role::Model, "Let us breathe."),
        ];
        let expected = json!({
            "contents": [
                { "role": "model", "parts": [{ "text": "How are you?" }] },
                { "role": "user", "parts": [{ "text": "Tense." }] },
                { "role": "model", "parts": [{ "text": "Let us breathe." }] },
                { "role": "user", "parts": [{ "text": "Better now" }] }
            ],
            "systemInstruction": { "parts": [{ "text": GUIDE_PERSONA }] }
        });
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).json_body(expected);
                then.status(200).json_body(reply(json!([{ "text": "Wonderful." }])));
            })
            .await;

        let answer = client_for(&server).chat(&history, "Better now").await.unwrap();
        assert_eq!(answer, "Wonderful.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn speech_decodes_pcm_and_rate() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/gemini-2.5-flash-preview-tts:generateContent")
                    .body_contains("\"responseModalities\":[\"AUDIO\"]")
                    .body_contains("\"voiceName\":\"Kore\"");
                then.status(200).json_body(reply(json!([{
                    "inlineData": {
                        "mimeType": "audio/L16;codec=pcm;rate=16000",
                        "data": "AAABAA=="
                    }
                }])));
            })
            .await;

        let audio = client_for(&server).generate_speech("Breathe.").await.unwrap();
        assert_eq!(
            audio,
            PcmAudio {
                bytes: vec![0, 0, 1, 0],
                sample_rate: 16_000
            }
        );
    }

    #[tokio::test]
    async fn speech_without_audio_part_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/gemini-2.5-flash-preview-tts:generateContent");
                then.status(200)
                    .json_body(reply(json!([{ "text": "I would rather not read that." }])));
            })
            .await;

        let err = client_for(&server).generate_speech("Breathe.").await.unwrap_err();
        assert!(matches!(err, AppError::SpeechFailed(ref m) if m.contains("audio")), "{err:?}");
    }

    #[tokio::test]
    async fn aspect_ratio_reaches_the_image_config() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/gemini-2.5-flash-image:generateContent")
                    .body_contains(r#""imageConfig":{"aspectRatio":"16:9"}"#);
                then.status(200).json_body(reply(json!([
                    { "inlineData": { "mimeType": "image/png", "data": "d2lkZQ==" } }
                ])));
            })
            .await;

        let url = client_for(&server)
            .generate_image("open plains", ImageSize::K1, Some("16:9"))
            .await
            .unwrap();
        assert_eq!(url, "data:image/png;base64,d2lkZQ==");
        mock.assert_async().await;
    }

    #[test]
    fn decoder_takes_first_match_and_never_returns_empty() {
        let parts = vec![
            Part::inline("image/png", ""),
            Part::text("caption"),
            Part::inline("image/png", "Zmlyc3Q="),
            Part::inline("image/jpeg", "c2Vjb25k"),
        ];
        assert_eq!(
            decode_parts(&parts, ResponseShape::InlineImage).unwrap(),
            GenerationResult::ImageDataUrl {
                url: "data:image/png;base64,Zmlyc3Q=".into(),
                mime: "image/png".into()
            }
        );
        assert_eq!(
            decode_parts(&[Part::text("  ")], ResponseShape::Text).unwrap_err(),
            PartsError::Missing(ResponseShape::Text)
        );
        assert!(matches!(
            decode_parts(&[Part::inline("audio/L16", "@@@")], ResponseShape::InlineAudio),
            Err(PartsError::Malformed(_))
        ));
    }

    #[test]
    fn standard_image_request_has_no_generation_config() {
        let req = GenerationRequest {
            kind: Operation::Image,
            text: image_prompt("dunes"),
            image: None,
            options: RequestOptions::default(),
        };
        let body = serde_json::to_value(build_body(&req, &[])).unwrap();
        assert!(body.get("generationConfig").is_none());

        let wide = GenerationRequest {
            options: RequestOptions {
                aspect_ratio: Some("16:9".into()),
                ..Default::default()
            },
            ..req
        };
        let body = serde_json::to_value(build_body(&wide, &[])).unwrap();
        assert_eq!(body["generationConfig"]["imageConfig"], json!({ "aspectRatio": "16:9" }));
    }
}
