//! アップロード処理
//!
//! 1ファイルずつ順に: 正規化 → キーワード取得 → レコード作成 → 保存。
//! 失敗したファイルはバッチ全体を止めずに記録し、最後にまとめて報告する。

use crate::error::{PhotoTagError, Result};
use crate::keywords::{AggregateOptions, KeywordAggregator};
use crate::normalizer::ImageNormalizer;
use crate::scanner::{is_image_path, UploadFile};
use crate::store::{PhotoLibrary, StorageMedium};
use phototag_common::{merge_keywords, PhotoRecord};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// キーワードを自動取得するか
    pub auto_keywords: bool,
    pub aggregate: AggregateOptions,
    /// 手入力キーワード（自動キーワードの後ろに追加）
    pub manual_keywords: Vec<String>,
}

/// 利用者向けのお知らせ（エラーではない）
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Detected { filename: String, keywords: Vec<String> },
    /// 自動取得でキーワードが1つも得られなかった
    NoKeywords { filename: String, inference_only: bool },
}

#[derive(Debug)]
pub struct UploadFailure {
    pub filename: String,
    pub error: PhotoTagError,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    /// 追加されたレコードのID（処理順）
    pub added: Vec<String>,
    pub failures: Vec<UploadFailure>,
    pub notices: Vec<Notice>,
    /// 画像ではないため除外したファイル数
    pub skipped: usize,
}

impl BatchReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    fn record(&mut self, filename: &str, result: Result<(String, Option<Notice>)>) {
        match result {
            Ok((id, notice)) => {
                self.added.push(id);
                self.notices.extend(notice);
            }
            Err(error) => {
                log::warn!("{} の追加に失敗: {}", filename, error);
                self.failures.push(UploadFailure {
                    filename: filename.to_string(),
                    error,
                });
            }
        }
    }
}

pub struct Uploader {
    normalizer: ImageNormalizer,
    aggregator: KeywordAggregator,
}

impl Uploader {
    pub fn new(normalizer: ImageNormalizer, aggregator: KeywordAggregator) -> Self {
        Self { normalizer, aggregator }
    }

    /// 1ファイルからレコードを作る（保存はしない）
    pub async fn process_file(&self, file: &UploadFile, options: &UploadOptions) -> Result<(PhotoRecord, Option<Notice>)> {
        let encoded = self
            .normalizer
            .normalize_async(file.bytes.clone(), Some(file.mime_type.clone()))
            .await?;

        let mut notice = None;
        let mut auto = Vec::new();
        if options.auto_keywords {
            auto = self.aggregator.aggregate(&file.bytes, &encoded, &options.aggregate).await;
            notice = Some(if auto.is_empty() {
                let a = &options.aggregate;
                Notice::NoKeywords {
                    filename: file.file_name.clone(),
                    inference_only: a.use_inference && !a.use_metadata && !a.use_vision,
                }
            } else {
                Notice::Detected {
                    filename: file.file_name.clone(),
                    keywords: auto.clone(),
                }
            });
        }

        let keywords = merge_keywords([auto, options.manual_keywords.clone()], usize::MAX);
        let record = PhotoRecord::new(encoded, &file.file_name, keywords, options.auto_keywords, file.size());
        Ok((record, notice))
    }

    /// 複数ファイルを順に処理して保存する
    ///
    /// `progress(done, total)` は1ファイル処理するごとに呼ばれる（成功・失敗問わず）。
    pub async fn ingest_batch<M, F>(
        &self,
        library: &mut PhotoLibrary<M>,
        files: Vec<UploadFile>,
        options: &UploadOptions,
        mut progress: F,
    ) -> BatchReport
    where
        M: StorageMedium,
        F: FnMut(usize, usize),
    {
        let mut report = BatchReport::default();

        let (images, others): (Vec<_>, Vec<_>) = files.into_iter().partition(UploadFile::is_image);
        report.skipped = others.len();
        for file in &others {
            log::info!("画像ではないためスキップ: {} ({})", file.file_name, file.mime_type);
        }

        let total = images.len();
        for (index, file) in images.iter().enumerate() {
            let result = self.ingest_one(library, file, options).await;
            report.record(&file.file_name, result);
            progress(index + 1, total);
        }

        report
    }

    /// パスから順に読み込んで処理・保存する
    ///
    /// ファイルは処理の直前に1件ずつ読む。読み込めないファイルは失敗として記録し、残りを続行する。
    pub async fn ingest_paths<M, F>(
        &self,
        library: &mut PhotoLibrary<M>,
        paths: &[PathBuf],
        options: &UploadOptions,
        mut progress: F,
    ) -> BatchReport
    where
        M: StorageMedium,
        F: FnMut(usize, usize),
    {
        let mut report = BatchReport::default();

        let (images, others): (Vec<&PathBuf>, Vec<&PathBuf>) = paths.iter().partition(|p| is_image_path(p));
        report.skipped = others.len();
        for path in &others {
            log::info!("画像ではないためスキップ: {}", path.display());
        }

        let total = images.len();
        for (index, path) in images.iter().enumerate() {
            let result = match UploadFile::open(path) {
                Ok(file) => self.ingest_one(library, &file, options).await,
                Err(e) => Err(e),
            };
            report.record(&display_name(path), result);
            progress(index + 1, total);
        }

        report
    }

    async fn ingest_one<M: StorageMedium>(
        &self,
        library: &mut PhotoLibrary<M>,
        file: &UploadFile,
        options: &UploadOptions,
    ) -> Result<(String, Option<Notice>)> {
        let (record, notice) = self.process_file(file, options).await?;
        // 保存に失敗した場合は PhotoLibrary 側で追加が取り消される
        let added = library.add(record)?;
        Ok((added.id().to_string(), notice))
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
