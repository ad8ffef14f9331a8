use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhotoTagError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("APIキーが設定されていません: {0}")]
    MissingApiKey(&'static str),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("写真が見つかりません: {0}")]
    NotFound(String),

    #[error("画像が大きすぎます ({size} bytes、上限 {limit} bytes)")]
    TooLarge { size: u64, limit: u64 },

    #[error("保存容量を超えています ({size} bytes、上限 {limit} bytes)。古い写真を削除してください")]
    CapacityExceeded { size: u64, limit: u64 },

    #[error("画像読み込みエラー: {0}")]
    ImageDecode(String),

    #[error("画像エンコードエラー: {0}")]
    ImageEncode(String),

    #[error("上流サービスエラー (status {status}): {details}")]
    Upstream { status: u16, details: String },

    #[error("HTTPエラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error("データエラー: {0}")]
    Data(#[from] phototag_common::Error),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PhotoTagError>;
