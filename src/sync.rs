use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;

use crate::data::GallerySource;
use crate::gallery::{sort_newest_first, Post};
use crate::storage::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncProgress {
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
}

impl SyncProgress {
    fn new(completed: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100
        } else {
            (completed * 100 / total).min(100) as u8
        };
        Self {
            completed,
            total,
            percent,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Full collection after the pass, newest first.
    pub posts: Vec<Post>,
    /// Files fetched and persisted during this pass, in fetch order.
    pub fetched: Vec<String>,
    /// Files that were due but could not be fetched or stored.
    pub skipped: Vec<String>,
    pub index_version: String,
}

/// Reconciles the remote manifest against the download ledger and the local store.
pub struct Synchronizer {
    source: Arc<dyn GallerySource>,
    store: Arc<Store>,
    pass: Mutex<()>,
}

impl Synchronizer {
    pub fn new(source: Arc<dyn GallerySource>, store: Arc<Store>) -> Self {
        Self {
            source,
            store,
            pass: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// One sequential pass. Only a manifest failure aborts; everything else is
    /// logged and left for the next pass. Concurrent callers wait their turn.
    pub fn synchronize<F>(&self, mut on_progress: F) -> Result<SyncReport>
    where
        F: FnMut(SyncProgress),
    {
        let _pass = self.pass.lock();
        let manifest = self.source.manifest().context("synchronize: manifest")?;
        if let Err(err) = self.store.set_index_version(&manifest.last_modified) {
            tracing::warn!(error = %err, "could not persist index version");
        }

        let total = manifest.files.len();
        tracing::info!(
            files = total,
            version = %manifest.last_modified,
            "synchronizing gallery"
        );

        let mut report = SyncReport {
            index_version: manifest.last_modified.clone(),
            ..SyncReport::default()
        };
        let mut posts = Vec::new();
        let mut completed = 0usize;

        for entry in manifest.files.iter().rev() {
            let file = entry.file.as_str();
            let already = match self.store.is_downloaded(file) {
                Ok(flag) => flag,
                Err(err) => {
                    tracing::warn!(file, error = %err, "download ledger lookup failed");
                    false
                }
            };
            if already {
                continue;
            }

            let post = match self.source.post(file) {
                Ok(post) => post,
                Err(err) => {
                    tracing::debug!(file, error = %format!("{err:#}"), "post file skipped");
                    report.skipped.push(file.to_string());
                    continue;
                }
            };

            posts.push(post.clone());
            if let Err(err) = self.store.save_post(&post) {
                tracing::warn!(file, id = %post.id, error = %err, "could not store post");
                report.skipped.push(file.to_string());
                continue;
            }
            if let Err(err) = self.store.mark_downloaded(file) {
                tracing::warn!(file, error = %err, "could not update download ledger");
                report.skipped.push(file.to_string());
                continue;
            }

            completed += 1;
            report.fetched.push(file.to_string());
            on_progress(SyncProgress::new(completed, total));
        }

        match self.store.list_posts() {
            Ok(cached) if !cached.is_empty() => posts = cached,
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "could not load cached posts"),
        }
        sort_newest_first(&mut posts);
        report.posts = posts;

        tracing::info!(
            fetched = report.fetched.len(),
            skipped = report.skipped.len(),
            posts = report.posts.len(),
            "synchronization finished"
        );
        Ok(report)
    }
}
