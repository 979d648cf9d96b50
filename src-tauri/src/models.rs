use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageSize {
    #[default]
    #[serde(rename = "1K")]
    K1,
    #[serde(rename = "2K")]
    K2,
    #[serde(rename = "4K")]
    K4,
}

impl ImageSize {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageSize::K1 => "1K",
            ImageSize::K2 => "2K",
            ImageSize::K4 => "4K",
        }
    }

    /// 2K and 4K are only served by the high resolution image tier.
    pub fn is_high_res(self) -> bool {
        !matches!(self, ImageSize::K1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Script,
    Image,
    Chat,
    WatermarkRemoval,
    Speech,
}

/// Which kind of response part an operation expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseShape {
    Text,
    InlineImage,
    InlineAudio,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route<'a> {
    pub model: &'a str,
    pub shape: ResponseShape,
}

/// Model ids per operation. Every field can be overridden from settings.json.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelTable {
    pub script: String,
    pub image: String,
    pub image_high_res: String,
    pub chat: String,
    pub watermark: String,
    pub speech: String,
}

impl Default for ModelTable {
    fn default() -> Self {
        Self {
            script: "gemini-2.5-flash".to_string(),
            image: "gemini-2.5-flash-image".to_string(),
            image_high_res: "gemini-3-pro-image-preview".to_string(),
            chat: "gemini-2.5-flash".to_string(),
            watermark: "gemini-2.5-flash-image".to_string(),
            speech: "gemini-2.5-flash-preview-tts".to_string(),
        }
    }
}

impl ModelTable {
    pub fn route(&self, op: Operation, size: ImageSize) -> Route<'_> {
        let (model, shape) = match op {
            Operation::Script => (&self.script, ResponseShape::Text),
            Operation::Chat => (&self.chat, ResponseShape::Text),
            Operation::Image if size.is_high_res() => {
                (&self.image_high_res, ResponseShape::InlineImage)
            }
            Operation::Image => (&self.image, ResponseShape::InlineImage),
            Operation::WatermarkRemoval => (&self.watermark, ResponseShape::InlineImage),
            Operation::Speech => (&self.speech, ResponseShape::InlineAudio),
        };
        Route { model, shape }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub size: ImageSize,
    pub aspect_ratio: Option<String>,
    pub voice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

/// One outbound call, built fresh for every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub kind: Operation,
    pub text: String,
    pub image: Option<InlineImage>,
    pub options: RequestOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationResult {
    Text { text: String },
    ImageDataUrl { url: String, mime: String },
    AudioPcm { bytes: Vec<u8>, sample_rate: u32 },
}
