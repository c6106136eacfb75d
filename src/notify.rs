use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::data::GallerySource;
use crate::sync::Synchronizer;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    ContentUpdated,
}

/// Background worker that watches the manifest version stamp.
pub struct Notifier {
    commands: Sender<Command>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Notifier {
    pub fn spawn(
        source: Arc<dyn GallerySource>,
        poll_interval: Duration,
        signals: Sender<Signal>,
    ) -> io::Result<Self> {
        let (tx, rx) = unbounded();
        let poll_interval = if poll_interval.is_zero() {
            DEFAULT_POLL_INTERVAL
        } else {
            poll_interval
        };
        let handle = thread::Builder::new()
            .name("update-notifier".into())
            .spawn(move || Watcher::new(source, poll_interval, signals).run(rx))?;
        Ok(Self {
            commands: tx,
            handle: Some(handle),
        })
    }

    pub fn start(&self) {
        let _ = self.commands.send(Command::Start);
    }

    /// Asks the watcher to stop. A check already in flight may still be
    /// waiting on the network, so the thread is detached rather than joined.
    fn shutdown(&mut self) {
        let _ = self.commands.send(Command::Stop);
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                tracing::debug!("update notifier detached while a check is in flight");
            }
        }
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Watcher {
    source: Arc<dyn GallerySource>,
    poll_interval: Duration,
    signals: Sender<Signal>,
    baseline: Option<String>,
}

impl Watcher {
    fn new(source: Arc<dyn GallerySource>, poll_interval: Duration, signals: Sender<Signal>) -> Self {
        Self {
            source,
            poll_interval,
            signals,
            baseline: None,
        }
    }

    fn run(mut self, commands: Receiver<Command>) {
        loop {
            match commands.recv() {
                Ok(Command::Start) => break,
                Ok(Command::Stop) | Err(_) => return,
            }
        }
        tracing::debug!(interval = ?self.poll_interval, "update notifier started");

        self.check();
        loop {
            match commands.recv_timeout(self.poll_interval) {
                Ok(Command::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(Command::Start) => {}
                Err(RecvTimeoutError::Timeout) => {
                    if !self.check() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("update notifier stopped");
    }

    /// Returns false once nobody is listening for signals.
    fn check(&mut self) -> bool {
        let version = match self.source.manifest() {
            Ok(manifest) => manifest.last_modified,
            Err(err) => {
                tracing::debug!(error = %format!("{err:#}"), "update check failed");
                return true;
            }
        };

        match self.baseline.replace(version.clone()) {
            Some(previous) if previous != version => {
                tracing::info!(%previous, current = %version, "new gallery content published");
                self.signals.send(Signal::ContentUpdated).is_ok()
            }
            _ => true,
        }
    }
}

/// One-shot background reconciliation. Emits `ContentUpdated` if the pass
/// fetched anything new.
pub fn register_background_sync(
    synchronizer: Arc<Synchronizer>,
    signals: Sender<Signal>,
) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("background-sync".into())
        .spawn(move || match synchronizer.synchronize(|_| {}) {
            Ok(report) if !report.fetched.is_empty() => {
                tracing::info!(fetched = report.fetched.len(), "background sync found new posts");
                let _ = signals.send(Signal::ContentUpdated);
            }
            Ok(_) => tracing::debug!("background sync: nothing new"),
            Err(err) => tracing::warn!(error = %format!("{err:#}"), "background sync failed"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MockGallerySource;
    use crate::gallery::sample_post;
    use crate::storage::{Options, Store};
    use tempfile::tempdir;

    const FAST: Duration = Duration::from_millis(20);
    const WAIT: Duration = Duration::from_millis(500);

    #[test]
    fn stays_idle_until_started() {
        let source = Arc::new(MockGallerySource::with_posts("v1", Vec::new()));
        let (tx, rx) = unbounded();
        let notifier = Notifier::spawn(source.clone(), FAST, tx).unwrap();

        source.set_version("v2");
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(notifier);
    }

    #[test]
    fn signals_when_version_changes() {
        let source = Arc::new(MockGallerySource::with_posts("v1", Vec::new()));
        let (tx, rx) = unbounded();
        let notifier = Notifier::spawn(source.clone(), FAST, tx).unwrap();
        notifier.start();

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        source.set_version("v2");
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), Signal::ContentUpdated);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    struct SlowSource;

    impl GallerySource for SlowSource {
        fn manifest(&self) -> anyhow::Result<crate::gallery::Manifest> {
            thread::sleep(Duration::from_secs(2));
            Ok(crate::gallery::Manifest::default())
        }

        fn post(&self, file: &str) -> anyhow::Result<crate::gallery::Post> {
            Err(anyhow::anyhow!("no post {file}"))
        }
    }

    #[test]
    fn drop_does_not_wait_for_a_slow_check() {
        let (tx, _rx) = unbounded();
        let notifier = Notifier::spawn(Arc::new(SlowSource), FAST, tx).unwrap();
        notifier.start();
        thread::sleep(Duration::from_millis(50));

        let started = std::time::Instant::now();
        drop(notifier);
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn manifest_errors_do_not_signal() {
        let source = Arc::new(MockGallerySource::new());
        let (tx, rx) = unbounded();
        let notifier = Notifier::spawn(source, FAST, tx).unwrap();
        notifier.start();
        assert!(rx.recv_timeout(Duration::from_millis(150)).is_err());
    }

    #[test]
    fn background_sync_signals_only_when_something_was_fetched() {
        let dir = tempdir().unwrap();
        let store = Arc::new(
            Store::open(Options {
                path: Some(dir.path().join("gallery.db")),
            })
            .unwrap(),
        );
        let source = Arc::new(MockGallerySource::with_posts(
            "v1",
            vec![("a.json".to_string(), sample_post("a", "Anime", "2024-01-01"))],
        ));
        let sync = Arc::new(Synchronizer::new(source.clone(), store));
        let (tx, rx) = unbounded();

        register_background_sync(sync.clone(), tx.clone())
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(rx.try_recv().unwrap(), Signal::ContentUpdated);

        register_background_sync(sync, tx).unwrap().join().unwrap();
        assert!(rx.try_recv().is_err());
    }
}
