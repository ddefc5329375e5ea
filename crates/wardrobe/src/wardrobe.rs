use std::sync::Arc;

use cutout::encode_png;
use image::{DynamicImage, RgbaImage};
use tracing::{info, warn};
use wardrobe_common::{GarmentCategory, WardrobeItem};

use crate::{
    error::{Result, StudioError},
    store::{FileStore, ObjectStore},
};

/// The user's categorized garment cut-outs
pub struct Wardrobe {
    items: Vec<WardrobeItem>,
    store: Arc<dyn ObjectStore<WardrobeItem>>,
    files: Arc<dyn FileStore>,
}

impl std::fmt::Debug for Wardrobe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wardrobe").field("items", &self.items).finish_non_exhaustive()
    }
}

impl Wardrobe {
    /// Load the persisted items, oldest first
    pub fn open(store: Arc<dyn ObjectStore<WardrobeItem>>, files: Arc<dyn FileStore>) -> Result<Self> {
        let mut items = store.get_all()?;
        items.sort_by_key(|item| item.created_at);
        Ok(Self { items, store, files })
    }

    pub fn items(&self) -> &[WardrobeItem] {
        &self.items
    }

    pub fn item(&self, id: &str) -> Option<&WardrobeItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn items_in(&self, category: GarmentCategory) -> impl Iterator<Item = &WardrobeItem> {
        self.items.iter().filter(move |item| item.category == category)
    }

    pub fn files(&self) -> &Arc<dyn FileStore> {
        &self.files
    }

    /// File an extracted cut-out under `category` as a PNG
    pub fn add_cutout(&mut self, cutout: &RgbaImage, category: GarmentCategory) -> Result<WardrobeItem> {
        let png = encode_png(cutout)?;
        let mut item = WardrobeItem::new(category, String::new());
        item.local_path = self.files.save_file(&png, &format!("items/{}.png", item.id))?;

        if let Err(err) = self.store.put(&item) {
            self.discard_file(&item.local_path);
            return Err(err.into());
        }

        info!(id = %item.id, %category, "Added wardrobe item");
        self.items.push(item.clone());
        Ok(item)
    }

    /// Delete an item and its cut-out; `false` when no such item exists
    pub fn remove(&mut self, id: &str) -> Result<bool> {
        let Some(index) = self.items.iter().position(|item| item.id == id) else {
            return Ok(false);
        };
        self.store.delete(id)?;
        let item = self.items.remove(index);
        self.discard_file(&item.local_path);
        info!(%id, "Removed wardrobe item");
        Ok(true)
    }

    /// Decode the cut-out of `id`
    pub fn load_image(&self, id: &str) -> Result<DynamicImage> {
        let item = self.item(id).ok_or_else(|| StudioError::UnknownItem(id.to_string()))?;
        let bytes = self.files.read_file(&item.local_path)?;
        Ok(image::load_from_memory(&bytes)?)
    }

    fn discard_file(&self, relative: &str) {
        if let Err(err) = self.files.delete_file(relative) {
            warn!(path = relative, error = %err, "Could not delete file");
        }
    }
}
