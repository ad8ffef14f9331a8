//! 写真レコードの型定義
//!
//! CLIと保存層で共有される型:
//! - PhotoRecord: アップロードされた1枚の写真
//! - Collection: 挿入順の PhotoRecord 列

use crate::data_url::EncodedImage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 挿入順を保つ写真コレクション
pub type Collection = Vec<PhotoRecord>;

/// アップロードされた写真1枚分のレコード
///
/// `id` と `encoded_image` は作成後に変更できない。変更可能なのは `keywords` のみ。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord {
    id: String,
    encoded_image: EncodedImage,

    /// 元のファイル名（表示用）
    pub filename: String,

    /// キーワード（先頭ほど関連度が高い）
    #[serde(default)]
    keywords: Vec<String>,

    pub added_at: DateTime<Utc>,

    /// パイプラインで自動付与されたか
    #[serde(default)]
    pub auto_tagged: bool,

    #[serde(default)]
    pub original_size_bytes: u64,

    #[serde(default)]
    pub encoded_size_bytes: u64,
}

impl PhotoRecord {
    /// 新しいレコードを作成（IDと追加日時はここで一度だけ割り当てる）
    pub fn new(
        encoded_image: EncodedImage,
        filename: impl Into<String>,
        keywords: Vec<String>,
        auto_tagged: bool,
        original_size_bytes: u64,
    ) -> Self {
        let encoded_size_bytes = encoded_image.estimated_size();
        Self {
            id: new_photo_id(),
            encoded_image,
            filename: filename.into(),
            keywords,
            added_at: Utc::now(),
            auto_tagged,
            original_size_bytes,
            encoded_size_bytes,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn encoded_image(&self) -> &EncodedImage {
        &self.encoded_image
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// キーワードを丸ごと置き換え、以前のキーワードを返す
    pub fn replace_keywords(&mut self, keywords: Vec<String>) -> Vec<String> {
        std::mem::replace(&mut self.keywords, keywords)
    }

    /// 検索用: 小文字化したキーワードを空白で連結
    pub fn keyword_haystack(&self) -> String {
        self.keywords.join(" ").to_lowercase()
    }
}

/// 実用上一意なIDを生成（UUID v4）
pub fn new_photo_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
