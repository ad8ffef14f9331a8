//! ピクセル統計によるキーワード推定（ネットワーク不要）
//!
//! 縦横比・解像度・明るさ・コントラスト・主要色からタグを作る。
//! 推論サービスがすべて失敗したときの代替として使う。

use super::{KeywordRequest, KeywordSource};
use crate::error::{PhotoTagError, Result};
use crate::normalizer::scaled_dimensions;
use async_trait::async_trait;
use image::imageops::FilterType;
use image::DynamicImage;

/// 解析用に縮小する長辺の上限
const SAMPLE_EDGE: u32 = 200;
const MAX_TAGS: usize = 10;
const MAX_COLOR_TAGS: usize = 3;
const HIGH_RESOLUTION_MEGAPIXELS: f64 = 8.0;

/// 色の分類（並び順は同数時の優先順）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorBucket {
    Red,
    Orange,
    Yellow,
    Green,
    Cyan,
    Blue,
    Violet,
    Pink,
    White,
    Gray,
    Black,
    Brown,
    Beige,
}

impl ColorBucket {
    const ALL: [ColorBucket; 13] = [
        ColorBucket::Red,
        ColorBucket::Orange,
        ColorBucket::Yellow,
        ColorBucket::Green,
        ColorBucket::Cyan,
        ColorBucket::Blue,
        ColorBucket::Violet,
        ColorBucket::Pink,
        ColorBucket::White,
        ColorBucket::Gray,
        ColorBucket::Black,
        ColorBucket::Brown,
        ColorBucket::Beige,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            ColorBucket::Red => "красный",
            ColorBucket::Orange => "оранжевый",
            ColorBucket::Yellow => "желтый",
            ColorBucket::Green => "зеленый",
            ColorBucket::Cyan => "голубой",
            ColorBucket::Blue => "синий",
            ColorBucket::Violet => "фиолетовый",
            ColorBucket::Pink => "розовый",
            ColorBucket::White => "белый",
            ColorBucket::Gray => "серый",
            ColorBucket::Black => "черный",
            ColorBucket::Brown => "коричневый",
            ColorBucket::Beige => "бежевый",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// 1ピクセルを色名に分類する（HSVベース）
pub fn classify_pixel(r: u8, g: u8, b: u8) -> ColorBucket {
    let (hue, s, v) = to_hsv(r, g, b);

    if v < 0.2 {
        return ColorBucket::Black;
    }
    if s < 0.1 && v > 0.9 {
        return ColorBucket::White;
    }
    if s < 0.2 {
        return if v > 0.7 {
            ColorBucket::White
        } else if v > 0.4 {
            ColorBucket::Gray
        } else {
            ColorBucket::Black
        };
    }

    // 暗い橙は茶、淡く明るい橙〜黄はベージュ
    if (15.0..45.0).contains(&hue) && v < 0.6 {
        return ColorBucket::Brown;
    }
    if (15.0..75.0).contains(&hue) && s < 0.45 && v > 0.7 {
        return ColorBucket::Beige;
    }

    match hue {
        h if !(15.0..345.0).contains(&h) => ColorBucket::Red,
        h if h < 45.0 => ColorBucket::Orange,
        h if h < 75.0 => ColorBucket::Yellow,
        h if h < 150.0 => ColorBucket::Green,
        h if h < 210.0 => ColorBucket::Cyan,
        h if h < 270.0 => ColorBucket::Blue,
        h if h < 300.0 => ColorBucket::Violet,
        _ => ColorBucket::Pink,
    }
}

/// (色相 0-360, 彩度 0-1, 明度 0-1)
fn to_hsv(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let (r, g, b) = (r as f64, g as f64, b as f64);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let v = max / 255.0;
    let s = if max == 0.0 { 0.0 } else { delta / max };
    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        ((g - b) / delta + if g < b { 6.0 } else { 0.0 }) / 6.0
    } else if max == g {
        ((b - r) / delta + 2.0) / 6.0
    } else {
        ((r - g) / delta + 4.0) / 6.0
    };

    (h * 360.0, s, v)
}

/// 縦横比と解像度のタグ
pub fn shape_tags(width: u32, height: u32) -> Vec<&'static str> {
    let mut tags = Vec::new();
    if width == 0 || height == 0 {
        return tags;
    }

    let ratio = width as f64 / height as f64;
    if ratio > 1.5 {
        tags.extend(["пейзаж", "горизонтальное", "широкое"]);
    } else if ratio < 0.7 {
        tags.extend(["портрет", "вертикальное", "высокое"]);
    } else if (ratio - 1.0).abs() < 0.1 {
        tags.push("квадратное");
    }

    let megapixels = (width as f64 * height as f64) / 1_000_000.0;
    if megapixels > HIGH_RESOLUTION_MEGAPIXELS {
        tags.push("высокое разрешение");
    }
    tags
}

/// 平均輝度（0-255）から照明のタグ
pub fn lighting_tags(brightness: f64) -> &'static [&'static str] {
    if brightness < 40.0 {
        &["темное", "ночь", "темное время"]
    } else if brightness < 80.0 {
        &["сумерки", "вечер", "рассвет"]
    } else if brightness < 150.0 {
        &["дневное", "светлое"]
    } else if brightness < 200.0 {
        &["яркое", "солнечное"]
    } else {
        &["очень яркое", "переэкспонированное"]
    }
}

/// 輝度の標準偏差からコントラストのタグ
pub fn contrast_tags(contrast: f64) -> &'static [&'static str] {
    if contrast > 60.0 {
        &["контрастное", "выразительное"]
    } else if contrast < 20.0 {
        &["мягкое", "пастельное"]
    } else {
        &[]
    }
}

/// 画像全体からタグを推定する（重複除去、最大10件）
pub fn heuristic_keywords(image: &DynamicImage) -> Vec<String> {
    let (width, height) = (image.width(), image.height());
    let mut tags: Vec<&str> = shape_tags(width, height);

    let (sample_width, sample_height) = scaled_dimensions(width, height, SAMPLE_EDGE, SAMPLE_EDGE);
    let sample = if (sample_width, sample_height) != (width, height) {
        image.resize_exact(sample_width, sample_height, FilterType::Triangle)
    } else {
        image.clone()
    };
    let pixels = sample.to_rgb8();
    let pixel_count = (pixels.width() * pixels.height()) as usize;

    if pixel_count > 0 {
        let luma: Vec<f64> = pixels
            .pixels()
            .map(|p| p[0] as f64 * 0.299 + p[1] as f64 * 0.587 + p[2] as f64 * 0.114)
            .collect();
        let mean = luma.iter().sum::<f64>() / pixel_count as f64;
        let variance = luma.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / pixel_count as f64;

        tags.extend(lighting_tags(mean));
        tags.extend(contrast_tags(variance.sqrt()));

        let mut counts = [0usize; 13];
        for p in pixels.pixels() {
            counts[classify_pixel(p[0], p[1], p[2]).index()] += 1;
        }

        let mut ranked: Vec<ColorBucket> = ColorBucket::ALL
            .into_iter()
            .filter(|c| counts[c.index()] > 0)
            .collect();
        // 安定ソートなので同数は固定順のまま
        ranked.sort_by(|a, b| counts[b.index()].cmp(&counts[a.index()]));
        tags.extend(ranked.iter().take(MAX_COLOR_TAGS).map(|c| c.tag()));

        let total = pixel_count as f64;
        let green_yellow = counts[ColorBucket::Green.index()] + counts[ColorBucket::Yellow.index()];
        if green_yellow as f64 > total * 0.3 {
            tags.extend(["природа", "растительность"]);
        }
        if counts[ColorBucket::Brown.index()] as f64 > total * 0.2 {
            tags.extend(["осень", "земля"]);
        }
    }

    let mut unique: Vec<String> = Vec::new();
    for tag in tags {
        if !unique.iter().any(|t| t == tag) {
            unique.push(tag.to_string());
        }
    }
    unique.truncate(MAX_TAGS);
    unique
}

fn analyze(bytes: &[u8]) -> Result<Vec<String>> {
    let image = image::load_from_memory(bytes).map_err(|e| PhotoTagError::ImageDecode(e.to_string()))?;
    Ok(heuristic_keywords(&image))
}

/// ピクセル統計によるソース
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicSource;

#[async_trait]
impl KeywordSource for HeuristicSource {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn keywords(&self, request: &KeywordRequest<'_>) -> Vec<String> {
        let bytes = match request.image.decode() {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("画像データを復元できません: {}", e);
                return Vec::new();
            }
        };

        let result = tokio::task::spawn_blocking(move || analyze(&bytes))
            .await
            .map_err(|e| PhotoTagError::ImageDecode(format!("解析タスク失敗: {}", e)))
            .and_then(|r| r);

        match result {
            Ok(keywords) => keywords,
            Err(e) => {
                log::warn!("画像解析に失敗: {}", e);
                Vec::new()
            }
        }
    }
}
