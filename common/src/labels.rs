//! 画像分類APIレスポンスの正規化
//!
//! 推論サービスのレスポンスは形が一定しない:
//! - `[{label, score}, ...]`
//! - `[[{label, score}, ...]]`（入れ子）
//! - `["label", ...]`（文字列のみ）
//! - `{label, score}`（単一オブジェクト）
//!
//! いずれも [`ClassificationPayload`] で受け、[`ClassificationPayload::into_labels`]
//! で `{label, score?}` 列に揃えてから後段で扱う。

use crate::tags::translate_label;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::cmp::Ordering;

/// スコア順に並べた後に考慮するラベル数
pub const MAX_CONSIDERED_LABELS: usize = 10;

/// 最終的に返すキーワード数
pub const MAX_LABEL_KEYWORDS: usize = 8;

lazy_static! {
    /// ImageNetのクラスID接頭辞（例: "n02119789_"）
    static ref CLASS_ID_PREFIX: Regex = Regex::new(r"^n\d+_").unwrap();
}

/// 正規化後のラベル
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Label {
    pub label: String,
    #[serde(default)]
    pub score: Option<f64>,
}

/// ラベル1件（オブジェクトまたは文字列）
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LabelItem {
    Scored(Label),
    Text(String),
}

impl From<LabelItem> for Label {
    fn from(item: LabelItem) -> Self {
        match item {
            LabelItem::Scored(label) => label,
            LabelItem::Text(label) => Label { label, score: None },
        }
    }
}

/// 分類レスポンスの各形
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ClassificationPayload {
    List(Vec<LabelItem>),
    Nested(Vec<Vec<LabelItem>>),
    Single(Label),
}

impl ClassificationPayload {
    /// JSON文字列をパース（どの形にも当てはまらなければ None）
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }

    /// スコア降順（スコアなしは0扱い、同点は元の順）に並べ、上位10件を返す
    pub fn into_labels(self) -> Vec<Label> {
        let mut labels: Vec<Label> = match self {
            ClassificationPayload::List(items) => items.into_iter().map(Label::from).collect(),
            ClassificationPayload::Nested(groups) => groups
                .into_iter()
                .next()
                .unwrap_or_default()
                .into_iter()
                .map(Label::from)
                .collect(),
            ClassificationPayload::Single(label) => vec![label],
        };

        labels.sort_by(|a, b| {
            b.score
                .unwrap_or(0.0)
                .partial_cmp(&a.score.unwrap_or(0.0))
                .unwrap_or(Ordering::Equal)
        });
        labels.truncate(MAX_CONSIDERED_LABELS);
        labels
    }
}

/// 分類ラベルを表示用キーワードに変換
///
/// 小文字化 → クラスID接頭辞の除去 → `_` を空白に → 対応表で翻訳
///
/// # Examples
/// ```
/// use phototag_common::normalize_label;
///
/// assert_eq!(normalize_label("n02119789_kit_fox"), "kit fox");
/// assert_eq!(normalize_label("Dog"), "собака");
/// ```
pub fn normalize_label(label: &str) -> String {
    let lower = label.to_lowercase();
    let stripped = CLASS_ID_PREFIX.replace(&lower, "");
    let spaced = stripped.replace('_', " ");
    match translate_label(&spaced) {
        Some(tag) => tag.to_string(),
        None => spaced,
    }
}

/// 正規化済みラベル列からキーワード（最大8件）を作る
pub fn label_keywords(labels: &[Label]) -> Vec<String> {
    labels
        .iter()
        .map(|l| normalize_label(&l.label))
        .filter(|k| !k.is_empty())
        .take(MAX_LABEL_KEYWORDS)
        .collect()
}
