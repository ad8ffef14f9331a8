//! 画像正規化モジュール
//!
//! アップロード画像のサイズ上限チェックと、大きすぎる画像の縮小・再圧縮を行う。
//!
//! - 生データが上限（5MiB）を超える画像はデコード前に拒否
//! - 1920×1920 以内かつエンコード後2MiB未満ならそのまま返す
//! - それ以外は縦横比を保って縮小（拡大はしない）し、品質85で再エンコード
//! - 再エンコード後も4MiBを超える場合は拒否

mod encode;

use crate::error::{PhotoTagError, Result};
use image::imageops::FilterType;
use image::ImageReader;
use phototag_common::{EncodedImage, DEFAULT_MIME_TYPE};
use std::io::Cursor;

pub use encode::{encode_image, output_mime_type};

const MIB: u64 = 1024 * 1024;

/// 正規化のしきい値
#[derive(Debug, Clone)]
pub struct NormalizerSettings {
    pub max_raw_bytes: u64,
    pub max_width: u32,
    pub max_height: u32,
    /// この値未満（かつ寸法内）なら再圧縮しない
    pub passthrough_bytes: u64,
    pub max_encoded_bytes: u64,
    /// JPEG品質 (0-100)
    pub quality: u8,
}

impl Default for NormalizerSettings {
    fn default() -> Self {
        Self {
            max_raw_bytes: 5 * MIB,
            max_width: 1920,
            max_height: 1920,
            passthrough_bytes: 2 * MIB,
            max_encoded_bytes: 4 * MIB,
            quality: 85,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImageNormalizer {
    settings: NormalizerSettings,
}

impl ImageNormalizer {
    pub fn new(settings: NormalizerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &NormalizerSettings {
        &self.settings
    }

    /// 画像を正規化してData URL形式で返す
    ///
    /// # Arguments
    /// * `raw` - アップロードされた生バイト列
    /// * `mime_type` - 元のMIMEタイプ（None/空ならバイト列から推定）
    pub fn normalize(&self, raw: &[u8], mime_type: Option<&str>) -> Result<EncodedImage> {
        let raw_size = raw.len() as u64;
        if raw_size > self.settings.max_raw_bytes {
            return Err(PhotoTagError::TooLarge {
                size: raw_size,
                limit: self.settings.max_raw_bytes,
            });
        }

        let mime_type = resolve_mime_type(raw, mime_type);
        let original = EncodedImage::from_bytes(&mime_type, raw);

        let (width, height) = ImageReader::new(Cursor::new(raw))
            .with_guessed_format()?
            .into_dimensions()
            .map_err(|e| PhotoTagError::ImageDecode(e.to_string()))?;

        if width <= self.settings.max_width
            && height <= self.settings.max_height
            && original.estimated_size() < self.settings.passthrough_bytes
        {
            log::debug!("再圧縮不要: {}x{} ({} bytes)", width, height, raw_size);
            return Ok(original);
        }

        let image = image::load_from_memory(raw).map_err(|e| PhotoTagError::ImageDecode(e.to_string()))?;
        let (new_width, new_height) = scaled_dimensions(
            width,
            height,
            self.settings.max_width,
            self.settings.max_height,
        );
        let image = if (new_width, new_height) != (width, height) {
            image.resize_exact(new_width, new_height, FilterType::Triangle)
        } else {
            image
        };

        let (out_mime, bytes) = encode_image(&image, &mime_type, self.settings.quality)?;
        let encoded = EncodedImage::from_bytes(out_mime, &bytes);
        log::debug!(
            "再圧縮: {}x{} → {}x{}, {} → {} bytes ({})",
            width,
            height,
            new_width,
            new_height,
            raw_size,
            bytes.len(),
            out_mime
        );

        let encoded_size = encoded.estimated_size();
        if encoded_size > self.settings.max_encoded_bytes {
            return Err(PhotoTagError::TooLarge {
                size: encoded_size,
                limit: self.settings.max_encoded_bytes,
            });
        }

        Ok(encoded)
    }

    /// デコード・再圧縮をブロッキングスレッドで実行する
    pub async fn normalize_async(&self, raw: Vec<u8>, mime_type: Option<String>) -> Result<EncodedImage> {
        let normalizer = self.clone();
        tokio::task::spawn_blocking(move || normalizer.normalize(&raw, mime_type.as_deref()))
            .await
            .map_err(|e| PhotoTagError::ImageDecode(format!("正規化タスク失敗: {}", e)))?
    }
}

/// 縦横比を保ったまま上限内に収まる寸法（拡大はしない）
pub fn scaled_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }
    let ratio = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );
    if ratio >= 1.0 {
        return (width, height);
    }
    (
        ((width as f64 * ratio).round() as u32).max(1),
        ((height as f64 * ratio).round() as u32).max(1),
    )
}

fn resolve_mime_type(raw: &[u8], mime_type: Option<&str>) -> String {
    if let Some(mime) = mime_type.map(str::trim).filter(|m| !m.is_empty()) {
        return mime.to_string();
    }
    image::guess_format(raw)
        .map(|f| f.to_mime_type().to_string())
        .unwrap_or_else(|_| DEFAULT_MIME_TYPE.to_string())
}
