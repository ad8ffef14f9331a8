use super::{BoundedStore, StorageMedium};
use crate::error::{PhotoTagError, Result};
use phototag_common::{search, PhotoRecord, SearchOutcome};

/// 保存層と同期したメモリ上の写真コレクション
///
/// すべての変更は保存まで含めて1操作。保存に失敗した場合はメモリ上の変更を元に戻し、
/// 保存済みの状態とメモリ上の状態が食い違わないようにする。
pub struct PhotoLibrary<M: StorageMedium> {
    store: BoundedStore<M>,
    records: Vec<PhotoRecord>,
}

impl<M: StorageMedium> PhotoLibrary<M> {
    pub fn open(store: BoundedStore<M>) -> Self {
        let records = store.load();
        log::debug!("コレクション読み込み: {}件", records.len());
        Self { store, records }
    }

    pub fn records(&self) -> &[PhotoRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&PhotoRecord> {
        self.records.iter().find(|r| r.id() == id)
    }

    /// 末尾に追加して保存。保存に失敗したら追加を取り消す
    pub fn add(&mut self, record: PhotoRecord) -> Result<&PhotoRecord> {
        self.records.push(record);
        if let Err(e) = self.store.save(&self.records) {
            self.records.pop();
            return Err(e);
        }
        let index = self.records.len() - 1;
        Ok(&self.records[index])
    }

    /// キーワードを置き換えて保存。保存に失敗したら以前のキーワードに戻す
    pub fn update_keywords(&mut self, id: &str, keywords: Vec<String>) -> Result<&PhotoRecord> {
        let index = self.index_of(id)?;
        let previous = self.records[index].replace_keywords(keywords);
        if let Err(e) = self.store.save(&self.records) {
            self.records[index].replace_keywords(previous);
            return Err(e);
        }
        Ok(&self.records[index])
    }

    /// 削除して保存。保存に失敗したら元の位置に戻す
    pub fn delete(&mut self, id: &str) -> Result<PhotoRecord> {
        let index = self.index_of(id)?;
        let removed = self.records.remove(index);
        if let Err(e) = self.store.save(&self.records) {
            self.records.insert(index, removed);
            return Err(e);
        }
        Ok(removed)
    }

    pub fn search(&self, query: &str) -> SearchOutcome<'_> {
        search(&self.records, query)
    }

    /// (保存中のバイト数, 上限)
    pub fn usage(&self) -> Result<(u64, u64)> {
        let used = BoundedStore::<M>::serialized_size(&self.records)?;
        Ok((used, self.store.ceiling()))
    }

    fn index_of(&self, id: &str) -> Result<usize> {
        self.records
            .iter()
            .position(|r| r.id() == id)
            .ok_or_else(|| PhotoTagError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryMedium;
    use phototag_common::EncodedImage;

    fn record(name: &str, payload_len: usize, keywords: &[&str]) -> PhotoRecord {
        PhotoRecord::new(
            EncodedImage::from_bytes("image/jpeg", &vec![1u8; payload_len]),
            name,
            keywords.iter().map(|k| k.to_string()).collect(),
            false,
            payload_len as u64,
        )
    }

    fn library(ceiling: u64) -> PhotoLibrary<MemoryMedium> {
        PhotoLibrary::open(BoundedStore::with_ceiling(MemoryMedium::new(), ceiling))
    }

    #[test]
    fn test_add_persists() {
        let mut lib = library(1_000_000);
        lib.add(record("a.jpg", 10, &["море"])).unwrap();
        assert_eq!(lib.len(), 1);

        let reopened = lib.store.load();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened[0].filename, "a.jpg");
    }

    #[test]
    fn test_add_reverts_when_capacity_exceeded() {
        let mut lib = library(2000);
        lib.add(record("a.jpg", 10, &[])).unwrap();
        let err = lib.add(record("b.jpg", 5000, &[])).unwrap_err();
        assert!(matches!(err, PhotoTagError::CapacityExceeded { .. }));
        assert_eq!(lib.len(), 1);
        assert_eq!(lib.records()[0].filename, "a.jpg");
    }

    #[test]
    fn test_update_keywords() {
        let mut lib = library(1_000_000);
        let id = lib.add(record("a.jpg", 10, &["old"])).unwrap().id().to_string();
        let updated = lib
            .update_keywords(&id, vec!["море".into(), "пляж".into()])
            .unwrap();
        assert_eq!(updated.keywords(), ["море", "пляж"]);
        assert_eq!(lib.store.load()[0].keywords(), ["море", "пляж"]);
    }

    #[test]
    fn test_update_keywords_reverts_on_failure() {
        let mut lib = library(1_000_000);
        let id = lib.add(record("a.jpg", 10, &["old"])).unwrap().id().to_string();
        lib.store = BoundedStore::with_ceiling(MemoryMedium::new(), 10);
        let err = lib.update_keywords(&id, vec!["new".into()]).unwrap_err();
        assert!(matches!(err, PhotoTagError::CapacityExceeded { .. }));
        assert_eq!(lib.get(&id).unwrap().keywords(), ["old"]);
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let mut lib = library(1_000_000);
        assert!(matches!(
            lib.update_keywords("missing", vec![]),
            Err(PhotoTagError::NotFound(_))
        ));
        assert!(matches!(lib.delete("missing"), Err(PhotoTagError::NotFound(_))));
    }

    #[test]
    fn test_delete_keeps_order_and_reverts_on_failure() {
        let mut lib = library(1_000_000);
        let a = lib.add(record("a.jpg", 10, &[])).unwrap().id().to_string();
        let b = lib.add(record("b.jpg", 10, &[])).unwrap().id().to_string();
        let c = lib.add(record("c.jpg", 10, &[])).unwrap().id().to_string();

        lib.store = BoundedStore::with_ceiling(MemoryMedium::new(), 10);
        assert!(lib.delete(&b).is_err());
        let ids: Vec<&str> = lib.records().iter().map(|r| r.id()).collect();
        assert_eq!(ids, [a.as_str(), b.as_str(), c.as_str()]);

        lib.store = BoundedStore::with_ceiling(MemoryMedium::new(), 1_000_000);
        let removed = lib.delete(&b).unwrap();
        assert_eq!(removed.filename, "b.jpg");
        let ids: Vec<&str> = lib.records().iter().map(|r| r.id()).collect();
        assert_eq!(ids, [a.as_str(), c.as_str()]);
    }

    #[test]
    fn test_search_and_usage() {
        let mut lib = library(1_000_000);
        lib.add(record("a.jpg", 10, &["Море", "пляж"])).unwrap();
        lib.add(record("b.jpg", 10, &["город"])).unwrap();

        assert!(lib.search("  ").is_no_query());
        let found = lib.search("море");
        assert_eq!(found.matches().len(), 1);
        assert_eq!(found.matches()[0].filename, "a.jpg");

        let (used, limit) = lib.usage().unwrap();
        assert!(used > 0);
        assert_eq!(limit, 1_000_000);
    }
}
