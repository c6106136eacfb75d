use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;

use crate::client;
use crate::gallery::{FileEntry, Manifest, Post};

/// Where manifests and post files come from.
pub trait GallerySource: Send + Sync {
    fn manifest(&self) -> Result<Manifest>;
    fn post(&self, file: &str) -> Result<Post>;
}

pub struct HttpGallerySource {
    client: Arc<client::Client>,
}

impl HttpGallerySource {
    pub fn new(client: Arc<client::Client>) -> Self {
        Self { client }
    }
}

impl GallerySource for HttpGallerySource {
    fn manifest(&self) -> Result<Manifest> {
        self.client.manifest().context("fetch manifest")
    }

    fn post(&self, file: &str) -> Result<Post> {
        self.client.post(file).context("fetch post file")
    }
}

/// In-memory source. Records every post fetch so callers can inspect order.
#[derive(Default)]
pub struct MockGallerySource {
    manifest: Mutex<Option<Manifest>>,
    posts: Mutex<HashMap<String, Post>>,
    failing: Mutex<HashSet<String>>,
    fetches: Mutex<Vec<String>>,
}

impl MockGallerySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_posts<I>(version: &str, posts: I) -> Self
    where
        I: IntoIterator<Item = (String, Post)>,
    {
        let source = Self::new();
        let mut files = Vec::new();
        for (file, post) in posts {
            files.push(FileEntry { file: file.clone() });
            source.posts.lock().insert(file, post);
        }
        source.set_manifest(Manifest {
            last_modified: version.to_string(),
            files,
        });
        source
    }

    pub fn set_manifest(&self, manifest: Manifest) {
        *self.manifest.lock() = Some(manifest);
    }

    pub fn clear_manifest(&self) {
        *self.manifest.lock() = None;
    }

    pub fn set_version(&self, version: &str) {
        if let Some(manifest) = self.manifest.lock().as_mut() {
            manifest.last_modified = version.to_string();
        }
    }

    pub fn add_post(&self, file: &str, post: Post) {
        self.posts.lock().insert(file.to_string(), post);
        if let Some(manifest) = self.manifest.lock().as_mut() {
            manifest.files.push(FileEntry {
                file: file.to_string(),
            });
        }
    }

    pub fn fail_file(&self, file: &str, failing: bool) {
        let mut set = self.failing.lock();
        if failing {
            set.insert(file.to_string());
        } else {
            set.remove(file);
        }
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().clone()
    }

    pub fn reset_fetches(&self) {
        self.fetches.lock().clear();
    }
}

impl GallerySource for MockGallerySource {
    fn manifest(&self) -> Result<Manifest> {
        self.manifest
            .lock()
            .clone()
            .ok_or_else(|| anyhow!("mock manifest unavailable"))
    }

    fn post(&self, file: &str) -> Result<Post> {
        self.fetches.lock().push(file.to_string());
        if self.failing.lock().contains(file) {
            return Err(anyhow!("mock fetch of {file} failed"));
        }
        self.posts
            .lock()
            .get(file)
            .cloned()
            .ok_or_else(|| anyhow!("mock post {file} not found"))
    }
}
