//! Local collaborators: record collections, image files and the photo source.

use std::fs;
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use image::DynamicImage;
use serde::{Serialize, de::DeserializeOwned};
use tempfile::NamedTempFile;
use tracing::debug;
use wardrobe_common::{JobRecord, OutfitRecord, WardrobeItem};

use crate::error::{StoreError, StoreResult};

/// Records addressable by their id
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for WardrobeItem {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for JobRecord {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for OutfitRecord {
    fn key(&self) -> &str {
        &self.id
    }
}

/// A collection of records of one type
pub trait ObjectStore<R>: Send + Sync {
    /// Insert, or replace the record with the same id
    fn put(&self, record: &R) -> StoreResult<()>;

    /// Every record, in insertion order
    fn get_all(&self) -> StoreResult<Vec<R>>;

    /// `true` when a record was removed
    fn delete(&self, id: &str) -> StoreResult<bool>;
}

fn upsert<R: Keyed + Clone>(records: &mut Vec<R>, record: &R) {
    match records.iter_mut().find(|r| r.key() == record.key()) {
        Some(slot) => *slot = record.clone(),
        None => records.push(record.clone()),
    }
}

fn remove<R: Keyed>(records: &mut Vec<R>, id: &str) -> bool {
    let before = records.len();
    records.retain(|r| r.key() != id);
    records.len() != before
}

/// One JSON document per collection, replaced atomically on every write.
///
/// Writes are expected from a single owning context.
#[derive(Debug)]
pub struct JsonFileStore<R> {
    path: PathBuf,
    _records: PhantomData<fn() -> R>,
}

impl<R> JsonFileStore<R> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _records: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<R: Serialize + DeserializeOwned> JsonFileStore<R> {
    fn read(&self) -> StoreResult<Vec<R>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, records: &[R]) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(records)?;
        write_atomic(&self.path, &json)?;
        debug!(path = ?self.path, count = records.len(), "Wrote collection");
        Ok(())
    }
}

impl<R> ObjectStore<R> for JsonFileStore<R>
where
    R: Keyed + Clone + Serialize + DeserializeOwned,
{
    fn put(&self, record: &R) -> StoreResult<()> {
        let mut records = self.read()?;
        upsert(&mut records, record);
        self.write(&records)
    }

    fn get_all(&self) -> StoreResult<Vec<R>> {
        self.read()
    }

    fn delete(&self, id: &str) -> StoreResult<bool> {
        let mut records = self.read()?;
        if !remove(&mut records, id) {
            return Ok(false);
        }
        self.write(&records)?;
        Ok(true)
    }
}

/// In-process collection, used in tests and dry runs
#[derive(Debug)]
pub struct MemoryStore<R> {
    records: Mutex<Vec<R>>,
}

impl<R> Default for MemoryStore<R> {
    fn default() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }
}

impl<R> MemoryStore<R> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R> ObjectStore<R> for MemoryStore<R>
where
    R: Keyed + Clone + Send,
{
    fn put(&self, record: &R) -> StoreResult<()> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        upsert(&mut records, record);
        Ok(())
    }

    fn get_all(&self) -> StoreResult<Vec<R>> {
        Ok(self.records.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn delete(&self, id: &str) -> StoreResult<bool> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(remove(&mut records, id))
    }
}

/// Image files addressed by paths relative to a root
pub trait FileStore: Send + Sync {
    /// Write `bytes` under `name`, returning the relative path to record
    fn save_file(&self, bytes: &[u8], name: &str) -> StoreResult<String>;

    fn read_file(&self, relative: &str) -> StoreResult<Vec<u8>>;

    fn absolute_path(&self, relative: &str) -> PathBuf;

    /// `true` when a file was removed; a missing file is not an error
    fn delete_file(&self, relative: &str) -> StoreResult<bool>;
}

/// [`FileStore`] over a local directory
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, relative: &str) -> StoreResult<PathBuf> {
        let path = Path::new(relative);
        let contained = path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if relative.is_empty() || !contained {
            return Err(StoreError::InvalidPath(relative.to_string()));
        }
        Ok(self.root.join(path))
    }
}

impl FileStore for LocalFileStore {
    fn save_file(&self, bytes: &[u8], name: &str) -> StoreResult<String> {
        let path = self.resolve(name)?;
        write_atomic(&path, bytes)?;
        debug!(?path, size = bytes.len(), "Saved file");
        Ok(name.to_string())
    }

    fn read_file(&self, relative: &str) -> StoreResult<Vec<u8>> {
        Ok(fs::read(self.resolve(relative)?)?)
    }

    fn absolute_path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    fn delete_file(&self, relative: &str) -> StoreResult<bool> {
        match fs::remove_file(self.resolve(relative)?) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

/// Write through a sibling temp file so readers never see a partial file
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// Source of user-selected photos
pub trait ImageProvider: Send + Sync {
    fn load_image(&self, selection: &str) -> StoreResult<Vec<u8>>;
}

/// Photos picked from the local filesystem
#[derive(Debug, Clone, Default)]
pub struct FsImageProvider {
    base: Option<PathBuf>,
}

impl FsImageProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative selections against `base`
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self { base: Some(base.into()) }
    }
}

impl ImageProvider for FsImageProvider {
    fn load_image(&self, selection: &str) -> StoreResult<Vec<u8>> {
        let path = match &self.base {
            Some(base) => base.join(selection),
            None => PathBuf::from(selection),
        };
        Ok(fs::read(path)?)
    }
}

/// Load and decode a photo from `provider`
pub fn load_photo(provider: &dyn ImageProvider, selection: &str) -> StoreResult<DynamicImage> {
    let bytes = provider.load_image(selection)?;
    Ok(image::load_from_memory(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wardrobe_common::GarmentCategory;

    #[test]
    fn test_json_store_round_trips_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::<JobRecord>::new(dir.path().join("results.json"));
        assert!(store.get_all().unwrap().is_empty());

        let mut record = JobRecord::pending("job-1", GarmentCategory::Top);
        store.put(&record).unwrap();
        store.put(&JobRecord::pending("job-2", GarmentCategory::Dress)).unwrap();

        record.complete("https://cdn.example/1.jpg", Some("results/job-1.jpg".into())).unwrap();
        store.put(&record).unwrap();

        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], record);

        // A fresh handle sees the same document
        let reopened = JsonFileStore::<JobRecord>::new(dir.path().join("results.json"));
        assert_eq!(reopened.get_all().unwrap(), all);
    }

    #[test]
    fn test_json_store_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::<WardrobeItem>::new(dir.path().join("nested/items.json"));
        let item = WardrobeItem::new(GarmentCategory::Shoes, "items/a.png");
        store.put(&item).unwrap();

        assert!(store.delete(&item.id).unwrap());
        assert!(!store.delete(&item.id).unwrap());
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_json_store_rejects_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outfits.json");
        fs::write(&path, b"{ not json").unwrap();

        let store = JsonFileStore::<OutfitRecord>::new(path);
        assert!(matches!(store.get_all(), Err(StoreError::Serialization(_))));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        let outfit = OutfitRecord::processing("top", "bottom", Vec::new());
        store.put(&outfit).unwrap();
        store.put(&outfit).unwrap();
        assert_eq!(store.get_all().unwrap().len(), 1);
        assert!(store.delete(&outfit.id).unwrap());
    }

    #[test]
    fn test_file_store_paths() {
        let dir = tempfile::tempdir().unwrap();
        let files = LocalFileStore::new(dir.path());

        let relative = files.save_file(b"abc", "results/x.jpg").unwrap();
        assert_eq!(relative, "results/x.jpg");
        assert!(files.absolute_path(&relative).exists());
        assert_eq!(files.read_file(&relative).unwrap(), b"abc");

        assert!(files.delete_file(&relative).unwrap());
        assert!(!files.delete_file(&relative).unwrap());

        assert!(matches!(files.save_file(b"x", "../escape.jpg"), Err(StoreError::InvalidPath(_))));
        assert!(matches!(files.save_file(b"x", ""), Err(StoreError::InvalidPath(_))));
    }

    #[test]
    fn test_fs_image_provider() {
        let dir = tempfile::tempdir().unwrap();
        let image = image::RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 255]));
        image.save(dir.path().join("photo.png")).unwrap();

        let provider = FsImageProvider::with_base(dir.path());
        let photo = load_photo(&provider, "photo.png").unwrap();
        assert_eq!((photo.width(), photo.height()), (3, 2));
        assert!(matches!(load_photo(&provider, "missing.png"), Err(StoreError::Io(_))));
    }
}
