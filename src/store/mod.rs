//! 写真コレクションの保存層
//!
//! コレクション全体をJSONにシリアライズし、そのバイト数が上限を超える場合は
//! 書き込み前に `CapacityExceeded` で拒否する。媒体側の容量超過も同じエラーに揃える。
//! 保存層はロールバックしない（メモリ上の変更の巻き戻しは呼び出し側の責任）。

mod library;
mod medium;

pub use library::PhotoLibrary;
pub use medium::{FileMedium, MediumError, MemoryMedium, StorageMedium};

use crate::error::{PhotoTagError, Result};
use phototag_common::PhotoRecord;

/// コレクションを保存するキー
pub const COLLECTION_KEY: &str = "phototag_photos";

/// シリアライズ後のコレクション上限（4MiB）
pub const COLLECTION_CEILING: u64 = 4 * 1024 * 1024;

pub struct BoundedStore<M: StorageMedium> {
    medium: M,
    key: String,
    ceiling: u64,
}

impl<M: StorageMedium> BoundedStore<M> {
    pub fn new(medium: M) -> Self {
        Self::with_ceiling(medium, COLLECTION_CEILING)
    }

    pub fn with_ceiling(medium: M, ceiling: u64) -> Self {
        Self {
            medium,
            key: COLLECTION_KEY.to_string(),
            ceiling,
        }
    }

    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    pub fn medium(&self) -> &M {
        &self.medium
    }

    /// 保存済みコレクションを読み込む
    ///
    /// 未保存・読み込み失敗・壊れたデータはすべて空コレクションとして扱う。
    pub fn load(&self) -> Vec<PhotoRecord> {
        let content = match self.medium.get_item(&self.key) {
            Ok(Some(content)) => content,
            Ok(None) => return Vec::new(),
            Err(e) => {
                log::warn!("コレクションの読み込みに失敗、空として扱います: {}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(records) => records,
            Err(e) => {
                log::warn!("保存データが壊れています、空として扱います: {}", e);
                Vec::new()
            }
        }
    }

    /// コレクション全体を保存する
    pub fn save(&mut self, records: &[PhotoRecord]) -> Result<()> {
        let data = serde_json::to_string(records)?;
        let size = data.len() as u64;

        if size > self.ceiling {
            log::warn!("保存を拒否: {} bytes > 上限 {} bytes", size, self.ceiling);
            return Err(PhotoTagError::CapacityExceeded {
                size,
                limit: self.ceiling,
            });
        }

        self.medium.set_item(&self.key, &data).map_err(|e| match e {
            MediumError::QuotaExceeded { requested, quota } => {
                log::warn!("保存媒体が書き込みを拒否: {} bytes > {} bytes", requested, quota);
                PhotoTagError::CapacityExceeded {
                    size: requested,
                    limit: quota,
                }
            }
            MediumError::Io(e) => PhotoTagError::Io(e),
        })
    }

    /// シリアライズ後のサイズ（診断用）
    pub fn serialized_size(records: &[PhotoRecord]) -> Result<u64> {
        Ok(serde_json::to_string(records)?.len() as u64)
    }
}
