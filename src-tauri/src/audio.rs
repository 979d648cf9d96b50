use base64::{engine::general_purpose::STANDARD as B64, Engine as _};

use crate::error::AppError;

pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;
pub const WAV_HEADER_LEN: usize = 44;

const CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;
const BLOCK_ALIGN: u16 = CHANNELS * BITS_PER_SAMPLE / 8;

/// Decodes base64 16-bit mono PCM and wraps it in a WAV container.
pub fn pcm_base64_to_wav(b64: &str, sample_rate: u32) -> Result<Vec<u8>, AppError> {
    let pcm = B64.decode(b64.trim())?;
    pcm_to_wav(&pcm, sample_rate)
}

/// Prepends a 44 byte RIFF/WAVE header to raw 16-bit mono PCM.
pub fn pcm_to_wav(pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>, AppError> {
    let data_size = u32::try_from(pcm.len())
        .ok()
        .filter(|n| n.checked_add(36).is_some())
        .ok_or_else(|| AppError::Decode(format!("pcm payload too large: {} bytes", pcm.len())))?;
    let byte_rate = sample_rate
        .checked_mul(u32::from(BLOCK_ALIGN))
        .ok_or_else(|| AppError::Decode(format!("sample rate out of range: {sample_rate}")))?;

    let mut out = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_size).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes()); // fmt chunk size
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&CHANNELS.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&BLOCK_ALIGN.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_size.to_le_bytes());
    out.extend_from_slice(pcm);
    Ok(out)
}

/// Playable/downloadable form of a WAV buffer for the webview.
pub fn wav_data_url(wav: &[u8]) -> String {
    format!("data:audio/wav;base64,{}", B64.encode(wav))
}

/// Reads the `rate=` parameter of an `audio/L16;codec=pcm;rate=24000` style MIME type.
pub fn sample_rate_from_mime(mime: &str) -> Option<u32> {
    mime.split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("rate"))
        .and_then(|(_, value)| value.trim().parse().ok())
}
