use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{CACHE_CONTROL, PRAGMA, USER_AGENT};
use url::Url;

use crate::gallery::{Manifest, Post};

pub const DEFAULT_MANIFEST_PATH: &str = "data/index.json";
pub const DEFAULT_DATA_PATH: &str = "data/";

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub base_url: String,
    pub manifest_path: String,
    pub data_path: String,
    pub user_agent: String,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    manifest_url: Url,
    data_url: Url,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("gallery client user agent required");
        }
        if config.base_url.trim().is_empty() {
            bail!("gallery client base url required (set source.base_url)");
        }

        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).with_context(|| format!("parse base url {base:?}"))?;

        let manifest_path = non_empty_or(&config.manifest_path, DEFAULT_MANIFEST_PATH);
        let mut data_path = non_empty_or(&config.data_path, DEFAULT_DATA_PATH);
        if !data_path.ends_with('/') {
            data_path.push('/');
        }
        let manifest_url = base_url
            .join(manifest_path.trim_start_matches('/'))
            .context("resolve manifest url")?;
        let data_url = base_url
            .join(data_path.trim_start_matches('/'))
            .context("resolve data url")?;

        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(Duration::from_secs(20)))
                .build()
                .context("build gallery http client")?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            manifest_url,
            data_url,
        })
    }

    pub fn manifest_url(&self) -> &Url {
        &self.manifest_url
    }

    /// Always goes to the network; the manifest is the only way to learn about new posts.
    pub fn manifest(&self) -> Result<Manifest> {
        let response = self
            .http
            .get(self.manifest_url.clone())
            .header(USER_AGENT, &self.user_agent)
            .header(CACHE_CONTROL, "no-store")
            .header(PRAGMA, "no-cache")
            .send()
            .with_context(|| format!("request manifest {}", self.manifest_url))?;

        if !response.status().is_success() {
            bail!(
                "manifest request {} failed with status {}",
                self.manifest_url,
                response.status()
            );
        }

        response.json().context("decode manifest")
    }

    pub fn post(&self, file: &str) -> Result<Post> {
        let url = self.post_url(file)?;
        let response = self
            .http
            .get(url.clone())
            .header(USER_AGENT, &self.user_agent)
            .send()
            .with_context(|| format!("request post file {url}"))?;

        if !response.status().is_success() {
            bail!("post file {url} failed with status {}", response.status());
        }

        response
            .json()
            .with_context(|| format!("decode post file {file}"))
    }

    pub fn post_url(&self, file: &str) -> Result<Url> {
        let file = file.trim().trim_start_matches('/');
        if file.is_empty() {
            bail!("post file name is empty");
        }
        self.data_url
            .join(file)
            .with_context(|| format!("resolve post file {file:?}"))
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::GET;
    use httpmock::MockServer;

    fn client_for(server: &MockServer) -> Client {
        Client::new(ClientConfig {
            base_url: server.base_url(),
            user_agent: "gallery-tui-test".into(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn requires_base_url_and_user_agent() {
        assert!(Client::new(ClientConfig {
            user_agent: "agent".into(),
            ..Default::default()
        })
        .is_err());
        assert!(Client::new(ClientConfig {
            base_url: "https://gallery.example".into(),
            ..Default::default()
        })
        .is_err());
    }

    #[test]
    fn resolves_default_paths_against_base() {
        let client = Client::new(ClientConfig {
            base_url: "https://gallery.example/site".into(),
            user_agent: "agent".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            client.manifest_url().as_str(),
            "https://gallery.example/site/data/index.json"
        );
        assert_eq!(
            client.post_url("a.json").unwrap().as_str(),
            "https://gallery.example/site/data/a.json"
        );
        assert!(client.post_url("  ").is_err());
    }

    #[test]
    fn manifest_bypasses_caches() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/data/index.json")
                .header("cache-control", "no-store")
                .header("user-agent", "gallery-tui-test");
            then.status(200)
                .header("Content-Type", "application/json")
                .body(r#"{"lastModified":"v7","files":[{"file":"a.json"}]}"#);
        });

        let manifest = client_for(&server).manifest().unwrap();
        mock.assert();
        assert_eq!(manifest.last_modified, "v7");
        assert_eq!(manifest.files[0].file, "a.json");
    }

    #[test]
    fn manifest_error_status_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/data/index.json");
            then.status(503);
        });
        let err = client_for(&server).manifest().unwrap_err();
        assert!(err.to_string().contains("503"), "{err:#}");
    }

    #[test]
    fn fetches_post_file() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/data/a.json");
            then.status(200)
                .header("Content-Type", "application/json")
                .body(r#"{"id":"a","title":"A","image":"i","genre":"Anime","date":"2024-01-01","links":{}}"#);
        });
        server.mock(|when, then| {
            when.method(GET).path("/data/missing.json");
            then.status(404);
        });

        let client = client_for(&server);
        let post = client.post("a.json").unwrap();
        assert_eq!(post.id, "a");
        assert_eq!(post.genre.as_deref(), Some("Anime"));
        assert!(client.post("missing.json").is_err());
    }
}
