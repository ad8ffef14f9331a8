//! キーワード集約・アップロード処理テスト
//!
//! ネットワークを使わず、固定のキーワードを返すソースで集約順序と
//! バッチ処理（除外・失敗の記録・保存失敗時の取り消し）を検証

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use phototag::error::PhotoTagError;
use phototag::keywords::{KeywordAggregator, KeywordRequest, KeywordSource, SourceMode};
use phototag::normalizer::ImageNormalizer;
use phototag::pipeline::{Notice, UploadOptions, Uploader};
use phototag::scanner::UploadFile;
use phototag::store::{BoundedStore, MemoryMedium, PhotoLibrary};
use phototag_common::EncodedImage;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// 決まったキーワードを返し、呼び出し回数を数えるソース
struct FixedSource {
    name: &'static str,
    keywords: Vec<String>,
    calls: Arc<AtomicUsize>,
}

impl FixedSource {
    fn boxed(name: &'static str, keywords: &[&str]) -> (Box<dyn KeywordSource>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = FixedSource {
            name,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            calls: calls.clone(),
        };
        (Box::new(source), calls)
    }
}

#[async_trait]
impl KeywordSource for FixedSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn keywords(&self, _request: &KeywordRequest<'_>) -> Vec<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.keywords.clone()
    }
}

struct Fixture {
    aggregator: KeywordAggregator,
    metadata_calls: Arc<AtomicUsize>,
    vision_calls: Arc<AtomicUsize>,
    inference_calls: Arc<AtomicUsize>,
}

fn fixture(metadata: &[&str], vision: &[&str], inference: &[&str]) -> Fixture {
    let (metadata, metadata_calls) = FixedSource::boxed("metadata", metadata);
    let (vision, vision_calls) = FixedSource::boxed("vision", vision);
    let (inference, inference_calls) = FixedSource::boxed("inference", inference);
    Fixture {
        aggregator: KeywordAggregator::new(metadata, vision, inference),
        metadata_calls,
        vision_calls,
        inference_calls,
    }
}

fn png_bytes(image: &RgbImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("PNGエンコード失敗");
    bytes
}

fn small_png() -> Vec<u8> {
    png_bytes(&RgbImage::from_pixel(2, 2, Rgb([30, 120, 200])))
}

/// 圧縮の効かないノイズ画像（数十KB）
fn noise_png() -> Vec<u8> {
    let mut state: u32 = 12345;
    let image = RgbImage::from_fn(96, 96, |_, _| {
        let mut next = || {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
            (state >> 16) as u8
        };
        Rgb([next(), next(), next()])
    });
    png_bytes(&image)
}

fn dummy_image() -> EncodedImage {
    EncodedImage::from_bytes("image/png", &small_png())
}

/// すべてのソースが空なら結果も空
#[tokio::test]
async fn test_all_sources_empty() {
    let f = fixture(&[], &[], &[]);
    let options = SourceMode::Combined.options(None);
    let keywords = f.aggregator.aggregate(&[], &dummy_image(), &options).await;
    assert!(keywords.is_empty());
}

/// メタデータ → Vision の順に結合し、重複を除く
#[tokio::test]
async fn test_metadata_then_vision_deduplicated() {
    let f = fixture(&["summer", "day"], &["day", "beach"], &["fox"]);
    let options = SourceMode::Combined.options(Some("vision-key".into()));

    let keywords = f.aggregator.aggregate(&[], &dummy_image(), &options).await;
    assert_eq!(keywords, vec!["summer", "day", "beach"]);
}

/// Visionのキーがあるときは推論サービスを呼ばない
#[tokio::test]
async fn test_vision_key_skips_inference() {
    let f = fixture(&[], &["beach"], &["fox"]);
    let options = SourceMode::Combined.options(Some("vision-key".into()));

    f.aggregator.aggregate(&[], &dummy_image(), &options).await;
    assert_eq!(f.metadata_calls.load(Ordering::SeqCst), 1);
    assert_eq!(f.vision_calls.load(Ordering::SeqCst), 1);
    assert_eq!(f.inference_calls.load(Ordering::SeqCst), 0);
}

/// キーがなければVisionを飛ばして推論サービスを使う
#[tokio::test]
async fn test_without_vision_key_uses_inference() {
    let f = fixture(&["autumn"], &["beach"], &["fox", "autumn"]);
    let options = SourceMode::Combined.options(None);

    let keywords = f.aggregator.aggregate(&[], &dummy_image(), &options).await;
    assert_eq!(keywords, vec!["autumn", "fox"]);
    assert_eq!(f.vision_calls.load(Ordering::SeqCst), 0);
    assert_eq!(f.inference_calls.load(Ordering::SeqCst), 1);
}

/// 集約結果は最大15件
#[tokio::test]
async fn test_aggregate_caps_at_fifteen() {
    let metadata: Vec<String> = (0..10).map(|i| format!("m{}", i)).collect();
    let inference: Vec<String> = (0..10).map(|i| format!("i{}", i)).collect();
    let metadata: Vec<&str> = metadata.iter().map(String::as_str).collect();
    let inference: Vec<&str> = inference.iter().map(String::as_str).collect();

    let f = fixture(&metadata, &[], &inference);
    let keywords = f
        .aggregator
        .aggregate(&[], &dummy_image(), &SourceMode::Combined.options(None))
        .await;

    assert_eq!(keywords.len(), 15);
    assert_eq!(keywords[0], "m0");
    assert_eq!(keywords[14], "i4");
}

/// バッチ処理: 画像以外は除外、失敗は記録して続行、保存失敗は取り消し
#[tokio::test]
async fn test_ingest_batch_collects_failures() {
    let f = fixture(&["summer"], &[], &["fox"]);
    let uploader = Uploader::new(ImageNormalizer::default(), f.aggregator);

    // 小さい画像1枚は入るが、ノイズ画像を足すと上限を超える
    let store = BoundedStore::with_ceiling(MemoryMedium::new(), 4000);
    let mut library = PhotoLibrary::open(store);

    let files = vec![
        UploadFile::from_bytes("small.png", "image/png", small_png()),
        UploadFile::from_bytes("notes.txt", "text/plain", b"hello".to_vec()),
        UploadFile::from_bytes("noise.png", "image/png", noise_png()),
        UploadFile::from_bytes("broken.jpg", "image/jpeg", b"not really a jpeg".to_vec()),
    ];
    let options = UploadOptions {
        auto_keywords: true,
        aggregate: SourceMode::Combined.options(None),
        manual_keywords: vec!["мой".to_string(), "fox".to_string()],
    };

    let mut progress = Vec::new();
    let report = uploader
        .ingest_batch(&mut library, files, &options, |done, total| progress.push((done, total)))
        .await;

    assert_eq!(report.skipped, 1);
    assert_eq!(report.added.len(), 1);
    assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);

    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.failures[0].filename, "noise.png");
    assert!(matches!(report.failures[0].error, PhotoTagError::CapacityExceeded { limit: 4000, .. }));
    assert_eq!(report.failures[1].filename, "broken.jpg");
    assert!(matches!(report.failures[1].error, PhotoTagError::ImageDecode(_)));

    // 取り消されたレコードはライブラリに残らない
    assert_eq!(library.len(), 1);
    let record = &library.records()[0];
    assert_eq!(record.filename, "small.png");
    assert!(record.auto_tagged);
    assert_eq!(record.keywords(), ["summer", "fox", "мой"]);

    assert_eq!(
        report.notices,
        vec![Notice::Detected {
            filename: "small.png".to_string(),
            keywords: vec!["summer".to_string(), "fox".to_string()],
        }]
    );
}

/// 推論サービスのみで何も得られなかった場合のお知らせ
#[tokio::test]
async fn test_inference_only_empty_notice() {
    let f = fixture(&["summer"], &[], &[]);
    let uploader = Uploader::new(ImageNormalizer::default(), f.aggregator);
    let options = UploadOptions {
        auto_keywords: true,
        aggregate: SourceMode::Inference.options(None),
        manual_keywords: Vec::new(),
    };

    let file = UploadFile::from_bytes("sky.png", "image/png", small_png());
    let (record, notice) = uploader.process_file(&file, &options).await.unwrap();

    assert!(record.keywords().is_empty());
    assert_eq!(
        notice,
        Some(Notice::NoKeywords {
            filename: "sky.png".to_string(),
            inference_only: true,
        })
    );
    assert_eq!(f.metadata_calls.load(Ordering::SeqCst), 0);
}

/// 自動取得を切ると手入力キーワードのみ
#[tokio::test]
async fn test_manual_keywords_only() {
    let f = fixture(&["summer"], &["beach"], &["fox"]);
    let uploader = Uploader::new(ImageNormalizer::default(), f.aggregator);
    let options = UploadOptions {
        auto_keywords: false,
        aggregate: SourceMode::Combined.options(None),
        manual_keywords: vec!["дом".to_string()],
    };

    let file = UploadFile::from_bytes("home.png", "image/png", small_png());
    let (record, notice) = uploader.process_file(&file, &options).await.unwrap();

    assert_eq!(record.keywords(), ["дом"]);
    assert!(!record.auto_tagged);
    assert!(notice.is_none());
    assert_eq!(f.metadata_calls.load(Ordering::SeqCst), 0);
}

/// パス指定のバッチ: 読み込めないファイルがあっても残りは追加される
#[tokio::test]
async fn test_ingest_paths_continues_past_unreadable_file() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let first = dir.path().join("first.png");
    let last = dir.path().join("last.png");
    let notes = dir.path().join("notes.txt");
    std::fs::write(&first, small_png()).unwrap();
    std::fs::write(&last, small_png()).unwrap();
    std::fs::write(&notes, "hello").unwrap();
    // 画像の拡張子だが実体はフォルダ（読み込めない）
    let unreadable = dir.path().join("folder.jpg");
    std::fs::create_dir(&unreadable).unwrap();
    let missing = dir.path().join("gone.jpg");

    let f = fixture(&["summer"], &[], &[]);
    let uploader = Uploader::new(ImageNormalizer::default(), f.aggregator);
    let mut library = PhotoLibrary::open(BoundedStore::new(MemoryMedium::new()));
    let options = UploadOptions {
        auto_keywords: true,
        aggregate: SourceMode::Exif.options(None),
        manual_keywords: Vec::new(),
    };

    let paths = vec![first, unreadable, notes, missing, last];
    let mut progress = Vec::new();
    let report = uploader
        .ingest_paths(&mut library, &paths, &options, |done, total| progress.push((done, total)))
        .await;

    assert_eq!(report.skipped, 1);
    assert_eq!(report.added.len(), 2);
    assert_eq!(progress.last(), Some(&(4, 4)));

    let failed: Vec<&str> = report.failures.iter().map(|f| f.filename.as_str()).collect();
    assert_eq!(failed, vec!["folder.jpg", "gone.jpg"]);
    assert!(report
        .failures
        .iter()
        .all(|f| matches!(f.error, PhotoTagError::FileNotFound(_))));

    let names: Vec<&str> = library.records().iter().map(|r| r.filename.as_str()).collect();
    assert_eq!(names, vec!["first.png", "last.png"]);
    assert!(library.records().iter().all(|r| r.keywords() == ["summer"]));
}
