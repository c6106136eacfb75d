use std::io::IsTerminal as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam_channel::unbounded;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::client;
use crate::config::{self, Config};
use crate::data::{GallerySource, HttpGallerySource};
use crate::links::LinkDecoder;
use crate::logging;
use crate::notify::Notifier;
use crate::storage;
use crate::sync::{SyncReport, Synchronizer};
use crate::ui;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_file: Option<PathBuf>,
    /// Initial location fragment, e.g. `#anime`.
    pub fragment: Option<String>,
}

struct Services {
    cfg: Config,
    store: Arc<storage::Store>,
    source: Result<Arc<dyn GallerySource>>,
}

fn build_services(opts: &RunOptions, log_target: logging::Target) -> Result<Services> {
    let cfg = config::load(config::LoadOptions {
        config_file: opts.config_file.clone(),
        env_prefix: None,
    })
    .context("load config")?;

    match logging::init(&cfg.logging, log_target) {
        Ok(Some(path)) => tracing::info!(log = %path.display(), "gallery-tui {}", crate::VERSION),
        Ok(None) => {}
        Err(err) => eprintln!("warning: logging disabled: {err:#}"),
    }

    let store = Arc::new(
        storage::Store::open(storage::Options {
            path: cfg.storage.path.clone(),
        })
        .context("open storage")?,
    );

    let source = client::Client::new(client::ClientConfig {
        base_url: cfg.source.base_url.clone(),
        manifest_path: cfg.source.manifest_path.clone(),
        data_path: cfg.source.data_path.clone(),
        user_agent: cfg.source.user_agent.clone(),
        timeout: Some(cfg.source.timeout),
        http_client: None,
    })
    .map(|client| Arc::new(HttpGallerySource::new(Arc::new(client))) as Arc<dyn GallerySource>);

    Ok(Services { cfg, store, source })
}

pub fn run(opts: RunOptions) -> Result<()> {
    let Services { cfg, store, source } = build_services(&opts, logging::Target::File)?;
    let config_path = config_display_path(opts.config_file.as_ref());

    let fragment = opts.fragment.clone().or_else(|| match store.location() {
        Ok(location) => location,
        Err(err) => {
            tracing::warn!(error = %err, "could not read saved location");
            None
        }
    });

    let (signal_tx, signal_rx) = unbounded();
    let (synchronizer, notifier, status) = match source {
        Ok(source) => {
            let notifier = match Notifier::spawn(
                source.clone(),
                cfg.notifier.poll_interval,
                signal_tx.clone(),
            ) {
                Ok(notifier) => {
                    notifier.start();
                    Some(notifier)
                }
                Err(err) => {
                    tracing::error!(error = %err, "could not start update notifier");
                    None
                }
            };
            (
                Some(Arc::new(Synchronizer::new(source, store.clone()))),
                notifier,
                "Synchronizing gallery…".to_string(),
            )
        }
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "gallery source unavailable");
            (
                None,
                None,
                format!("Gallery source unavailable: {err}. Edit {config_path} to set source.base_url."),
            )
        }
    };

    let options = ui::Options {
        status_message: status,
        synchronizer,
        store: store.clone(),
        decoder: LinkDecoder::new(
            cfg.links.redirect_base.clone(),
            cfg.links.redirect_domains.clone(),
        ),
        fragment,
        transition_delay: cfg.ui.transition_delay,
        background_sync: cfg.notifier.background_sync,
        signal_tx,
        signal_rx,
    };

    let mut model = ui::Model::new(options);
    let result = model.run();

    drop(notifier);
    result
}

/// Headless single pass with a progress bar on stderr.
pub fn sync_once(opts: RunOptions) -> Result<SyncReport> {
    let Services { store, source, .. } = build_services(&opts, logging::Target::Stderr)?;
    let source = source.context("gallery source unavailable")?;
    let synchronizer = Synchronizer::new(source, store);

    let bar = if std::io::stderr().is_terminal() {
        ProgressBar::with_draw_target(Some(100), ProgressDrawTarget::stderr())
    } else {
        ProgressBar::hidden()
    };
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message("downloading posts");

    let result = synchronizer.synchronize(|progress| {
        bar.set_position(progress.percent as u64);
        bar.set_message(format!("{}/{} files", progress.completed, progress.total));
    });
    bar.finish_and_clear();
    result
}

/// The file the user should edit: the one passed with `--config`, else the default.
fn config_display_path(explicit: Option<&PathBuf>) -> String {
    match explicit {
        Some(path) => friendly_path(Some(path)),
        None => friendly_path(config::default_path().as_ref()),
    }
}

fn friendly_path(path: Option<&PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/gallery-tui/config.yaml".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_hint_prefers_explicit_file() {
        let explicit = PathBuf::from("/srv/gallery/custom-config.yaml");
        let shown = config_display_path(Some(&explicit));
        assert!(shown.ends_with("custom-config.yaml"), "shown: {shown}");

        let fallback = config_display_path(None);
        assert!(fallback.ends_with("config.yaml"), "fallback: {fallback}");
        assert!(!fallback.contains("custom-config"));
    }

    #[test]
    fn friendly_path_abbreviates_home() {
        if let Some(home) = dirs::home_dir() {
            let path = home.join(".config").join("gallery-tui").join("config.yaml");
            assert_eq!(
                friendly_path(Some(&path)),
                "~/.config/gallery-tui/config.yaml"
            );
        }
    }
}
