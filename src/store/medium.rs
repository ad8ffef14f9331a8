//! キー・バリュー型のローカル保存媒体
//!
//! ブラウザのローカルストレージ相当。媒体自身も容量上限を持ち、
//! 上限を超える書き込みは `MediumError::QuotaExceeded` で拒否する。

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediumError {
    #[error("保存媒体の容量を超えています ({requested} bytes、上限 {quota} bytes)")]
    QuotaExceeded { requested: u64, quota: u64 },

    #[error("保存媒体IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

pub trait StorageMedium {
    fn get_item(&self, key: &str) -> Result<Option<String>, MediumError>;

    /// 値を書き込む。失敗時は以前の値が残っていなければならない
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), MediumError>;

    fn remove_item(&mut self, key: &str) -> Result<(), MediumError>;
}

/// メモリ上の保存媒体（テスト・一時利用向け）
#[derive(Debug, Default)]
pub struct MemoryMedium {
    items: HashMap<String, String>,
    quota: Option<u64>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: u64) -> Self {
        Self {
            items: HashMap::new(),
            quota: Some(quota),
        }
    }

    fn used_except(&self, key: &str) -> u64 {
        self.items
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum()
    }
}

impl StorageMedium for MemoryMedium {
    fn get_item(&self, key: &str) -> Result<Option<String>, MediumError> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), MediumError> {
        if let Some(quota) = self.quota {
            let requested = self.used_except(key) + (key.len() + value.len()) as u64;
            if requested > quota {
                return Err(MediumError::QuotaExceeded { requested, quota });
            }
        }
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), MediumError> {
        self.items.remove(key);
        Ok(())
    }
}

const ITEM_EXTENSION: &str = "json";

/// ディレクトリ上の保存媒体（キーごとに1ファイル）
///
/// 書き込みは一時ファイル + rename で行うため、失敗しても以前の値は壊れない。
#[derive(Debug, Clone)]
pub struct FileMedium {
    dir: PathBuf,
    quota: u64,
}

impl FileMedium {
    pub fn open(dir: &Path, quota: u64) -> Result<Self, MediumError> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            quota,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn item_path(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.{}", safe, ITEM_EXTENSION))
    }

    /// 指定キー以外の項目が使っているバイト数
    fn used_except(&self, path: &Path) -> Result<u64, MediumError> {
        let mut used = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let entry_path = entry.path();
            if entry_path == path || entry_path.extension().and_then(|e| e.to_str()) != Some(ITEM_EXTENSION) {
                continue;
            }
            used += entry.metadata()?.len();
        }
        Ok(used)
    }
}

impl StorageMedium for FileMedium {
    fn get_item(&self, key: &str) -> Result<Option<String>, MediumError> {
        let path = self.item_path(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), MediumError> {
        let path = self.item_path(key);
        let requested = self.used_except(&path)? + value.len() as u64;
        if requested > self.quota {
            return Err(MediumError::QuotaExceeded {
                requested,
                quota: self.quota,
            });
        }

        let tmp_path = path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        if let Err(e) = fs::rename(&tmp_path, &path) {
            fs::remove_file(&tmp_path).ok();
            return Err(e.into());
        }
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), MediumError> {
        match fs::remove_file(self.item_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
