pub mod exif;

use crate::error::{PhotoTagError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub use exif::{read_exif, ExifSummary};

/// アップロード対象のファイル1件
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// ファイルを読み込み、拡張子からMIMEタイプを決める
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(PhotoTagError::FileNotFound(path.display().to_string()));
        }
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(Self {
            file_name,
            mime_type: mime_type_for(path).to_string(),
            bytes,
        })
    }

    pub fn from_bytes(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

const IMAGE_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
];

/// 拡張子からMIMEタイプを推定（画像以外は application/octet-stream）
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    IMAGE_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or("application/octet-stream")
}

/// 拡張子が画像のものか
pub fn is_image_path(path: &Path) -> bool {
    mime_type_for(path).starts_with("image/")
}

/// 引数のパスからアップロード候補を集める
///
/// - ファイルはそのまま（画像以外も含め、後段で除外する）
/// - フォルダは直下の画像のみ（`recursive` ならサブフォルダも）をファイル名順で追加
pub fn collect_paths(paths: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            files.extend(scan_folder(path, recursive)?);
        } else {
            return Err(PhotoTagError::FileNotFound(path.display().to_string()));
        }
    }

    Ok(files)
}

pub fn scan_folder(folder: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    if !folder.exists() {
        return Err(PhotoTagError::FolderNotFound(folder.display().to_string()));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut images: Vec<PathBuf> = WalkDir::new(folder)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && is_image_path(p))
        .collect();

    // ファイル名でソート
    images.sort();

    Ok(images)
}
