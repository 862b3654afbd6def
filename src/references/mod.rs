use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use image::{DynamicImage, ImageFormat};
use log::{info, warn};
use serde::Serialize;
use uuid::Uuid;

/// One user-uploaded comparison image. The decoded pixels are shared, so
/// snapshots handed to the loop are cheap.
#[derive(Debug, Clone)]
pub struct ReferenceImage {
    pub id: String,
    pub image: Arc<DynamicImage>,
    pub added_at: DateTime<Utc>,
}

/// UI-facing view of a reference image, without the pixels.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceImageInfo {
    pub id: String,
    pub added_at: DateTime<Utc>,
}

impl From<&ReferenceImage> for ReferenceImageInfo {
    fn from(reference: &ReferenceImage) -> Self {
        Self {
            id: reference.id.clone(),
            added_at: reference.added_at,
        }
    }
}

/// The reference set. Uploads are accepted while a run is active; the loop
/// takes a snapshot at the start of each iteration, so additions apply from
/// the next iteration on and never retroactively. Removing an image leaves
/// historical decisions intact — they keep the id and the score, and the
/// bytes simply become unresolvable for display.
#[derive(Clone)]
pub struct ReferenceStore {
    inner: Arc<RwLock<Vec<ReferenceImage>>>,
    images_dir: Option<PathBuf>,
}

impl ReferenceStore {
    pub fn new(images_dir: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Vec::new())),
            images_dir,
        }
    }

    /// Decode and store an uploaded image. Returns its stable id.
    pub fn add(&self, bytes: &[u8]) -> Result<String> {
        let decoded =
            image::load_from_memory(bytes).context("could not decode uploaded image")?;

        let id = Uuid::new_v4().to_string();
        let added_at = Utc::now();

        // Persistence is best-effort: an unwritable images dir should not
        // reject the upload.
        if let Some(path) = self.image_path(&id) {
            if let Err(err) = decoded.save_with_format(&path, ImageFormat::Png) {
                warn!("failed to persist reference image {id}: {err}");
            }
        }

        let mut guard = self.inner.write().unwrap();
        guard.push(ReferenceImage {
            id: id.clone(),
            image: Arc::new(decoded),
            added_at,
        });

        Ok(id)
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        let mut guard = self.inner.write().unwrap();
        let before = guard.len();
        guard.retain(|reference| reference.id != id);

        if guard.len() == before {
            return Err(anyhow!("reference image {id} not found"));
        }
        drop(guard);

        if let Some(path) = self.image_path(id) {
            if path.exists() {
                if let Err(err) = std::fs::remove_file(&path) {
                    warn!("failed to delete reference image file {}: {err}", path.display());
                }
            }
        }

        Ok(())
    }

    /// Current reference set in stable insertion order.
    pub fn snapshot(&self) -> Vec<ReferenceImage> {
        self.inner.read().unwrap().clone()
    }

    pub fn clear(&self) {
        self.inner.write().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }

    /// Rehydrate previously saved reference images. Ids are the file stems,
    /// so they stay stable across restarts. Unreadable files are skipped.
    pub fn load_from_disk(&self) -> Result<usize> {
        let Some(dir) = &self.images_dir else {
            return Ok(0);
        };
        if !dir.exists() {
            return Ok(0);
        }

        let mut loaded = 0usize;
        let mut entries: Vec<_> = std::fs::read_dir(dir)
            .with_context(|| format!("failed to read images dir {}", dir.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "png"))
            .collect();
        entries.sort();

        for path in entries {
            let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let decoded = match image::open(&path) {
                Ok(img) => img,
                Err(err) => {
                    warn!("skipping unreadable reference image {}: {err}", path.display());
                    continue;
                }
            };

            let added_at = std::fs::metadata(&path)
                .and_then(|meta| meta.modified())
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            self.inner.write().unwrap().push(ReferenceImage {
                id: id.to_string(),
                image: Arc::new(decoded),
                added_at,
            });
            loaded += 1;
        }

        if loaded > 0 {
            info!("loaded {loaded} saved reference images");
        }

        Ok(loaded)
    }

    fn image_path(&self, id: &str) -> Option<PathBuf> {
        self.images_dir.as_ref().map(|dir| dir.join(format!("{id}.png")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(rgb: [u8; 3]) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb(rgb)));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn add_list_remove_round_trip() {
        let store = ReferenceStore::new(None);
        let id_a = store.add(&png_bytes([255, 0, 0])).unwrap();
        let id_b = store.add(&png_bytes([0, 255, 0])).unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, id_a);
        assert_eq!(snapshot[1].id, id_b);

        store.remove(&id_a).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.remove(&id_a).is_err());
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        let store = ReferenceStore::new(None);
        assert!(store.add(b"definitely not an image").is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn snapshot_is_isolated_from_later_additions() {
        let store = ReferenceStore::new(None);
        store.add(&png_bytes([1, 2, 3])).unwrap();

        let snapshot = store.snapshot();
        store.add(&png_bytes([4, 5, 6])).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn persists_and_reloads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReferenceStore::new(Some(dir.path().to_path_buf()));
        let id = store.add(&png_bytes([9, 9, 9])).unwrap();

        let reloaded = ReferenceStore::new(Some(dir.path().to_path_buf()));
        assert_eq!(reloaded.load_from_disk().unwrap(), 1);
        assert_eq!(reloaded.snapshot()[0].id, id);
    }
}
