//! Data URL形式のエンコード済み画像
//!
//! 保存・送信される画像はすべて `data:<mime>;base64,<payload>` 形式で扱う。

use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;

/// MIMEタイプが不明な場合のデフォルト
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// MIMEタイプ + Base64ペイロードの自己記述型画像
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EncodedImage {
    mime_type: String,
    payload: String,
}

impl EncodedImage {
    /// 生バイト列からエンコード済み画像を作成
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        let mime_type = if mime_type.trim().is_empty() {
            DEFAULT_MIME_TYPE
        } else {
            mime_type.trim()
        };
        Self {
            mime_type: mime_type.to_string(),
            payload: STANDARD.encode(bytes),
        }
    }

    /// `data:image/png;base64,....` 形式の文字列をパース
    ///
    /// Base64以外のエンコーディングは受け付けない。
    pub fn parse(data_url: &str) -> Result<Self> {
        let rest = data_url
            .strip_prefix("data:")
            .ok_or_else(|| Error::InvalidDataUrl("`data:` で始まっていません".into()))?;
        // Base64に `,` は現れないので最後の `,` で区切る（MIMEタイプ側の `,` は許す）
        let (header, payload) = rest
            .rsplit_once(',')
            .ok_or_else(|| Error::InvalidDataUrl("`,` がありません".into()))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| Error::InvalidDataUrl(format!("Base64ではありません: {}", header)))?;

        Ok(Self {
            mime_type: if mime_type.is_empty() {
                DEFAULT_MIME_TYPE.to_string()
            } else {
                mime_type.to_string()
            },
            payload: payload.to_string(),
        })
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// プレフィックスなしのBase64ペイロード
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// ペイロードをデコードして生バイト列を返す
    pub fn decode(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.payload.as_bytes())
            .map_err(|e| Error::InvalidDataUrl(format!("Base64デコード失敗: {}", e)))
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.payload)
    }

    /// Data URL文字列としての長さ
    pub fn data_url_len(&self) -> usize {
        "data:".len() + self.mime_type.len() + ";base64,".len() + self.payload.len()
    }

    /// Data URLの長さから見積もったバイトサイズ（Base64は約33%増えるため 3/4 を掛ける）
    pub fn estimated_size(&self) -> u64 {
        (self.data_url_len() as u64 * 3) / 4
    }
}

impl TryFrom<String> for EncodedImage {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<EncodedImage> for String {
    fn from(image: EncodedImage) -> Self {
        image.to_data_url()
    }
}

impl fmt::Display for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,", self.mime_type)?;
        f.write_str(&self.payload)
    }
}

/// Data URLからBase64データ部分を取り出す
///
/// `,` を含まない文字列はそのまま返す（既にプレフィックスなしとみなす）。
///
/// # Examples
/// ```
/// use phototag_common::strip_data_url_prefix;
///
/// assert_eq!(strip_data_url_prefix("data:image/png;base64,AAAA"), "AAAA");
/// assert_eq!(strip_data_url_prefix("AAAA"), "AAAA");
/// ```
pub fn strip_data_url_prefix(data: &str) -> &str {
    match data.rsplit_once(',') {
        Some((_, payload)) => payload,
        None => data,
    }
}
