use super::{KeywordRequest, KeywordSource};
use crate::scanner::{read_exif, ExifSummary};
use async_trait::async_trait;
use chrono::{Datelike, Timelike};
use phototag_common::tags::{day_part_tag, season_tag, GPS_TAG};

/// EXIFからキーワードを作るソース
///
/// 各カテゴリ（GPS・季節・時間帯・メーカー）につき最大1件。
pub struct MetadataSource;

/// EXIF要約をキーワードに変換（GPS → 季節 → 時間帯 → メーカー）
pub fn metadata_keywords(summary: &ExifSummary) -> Vec<String> {
    let mut keywords = Vec::new();

    if summary.has_gps {
        keywords.push(GPS_TAG.to_string());
    }

    if let Some(taken_at) = summary.taken_at {
        keywords.push(season_tag(taken_at.month()).to_string());
        keywords.push(day_part_tag(taken_at.hour()).to_string());
    }

    if let Some(make) = &summary.make {
        keywords.push(make.to_lowercase());
    }

    keywords
}

#[async_trait]
impl KeywordSource for MetadataSource {
    fn name(&self) -> &'static str {
        "exif"
    }

    async fn keywords(&self, request: &KeywordRequest<'_>) -> Vec<String> {
        match read_exif(request.file_bytes) {
            Ok(summary) => metadata_keywords(&summary),
            Err(e) => {
                log::debug!("EXIFなし: {}", e);
                Vec::new()
            }
        }
    }
}
