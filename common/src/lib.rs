//! Phototag Common Library
//!
//! CLIと保存層・プロキシで共有される型とユーティリティ

pub mod data_url;
pub mod error;
pub mod keywords;
pub mod labels;
pub mod search;
pub mod tags;
pub mod types;

pub use data_url::{strip_data_url_prefix, EncodedImage, DEFAULT_MIME_TYPE};
pub use error::{Error, Result};
pub use keywords::{merge_keywords, parse_keyword_input};
pub use labels::{label_keywords, normalize_label, ClassificationPayload, Label, LabelItem};
pub use search::{matched_keywords, parse_query, search, SearchOutcome};
pub use types::{new_photo_id, Collection, PhotoRecord};
