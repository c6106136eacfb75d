use base64::{engine::general_purpose, Engine as _};
use url::Url;

/// Target used when a link cannot be decoded. Never opened.
pub const PLACEHOLDER: &str = "#";

pub const DEFAULT_REDIRECT_BASE: &str = "https://nekopara-savelink.netlify.app/";

pub fn default_redirect_domains() -> Vec<String> {
    vec!["videy.co".into(), "mediafire".into(), "terabox".into()]
}

/// Turns the base64 link text found in post files into a navigable URL.
#[derive(Debug, Clone)]
pub struct LinkDecoder {
    redirect_base: String,
    redirect_domains: Vec<String>,
}

impl Default for LinkDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_REDIRECT_BASE, default_redirect_domains())
    }
}

impl LinkDecoder {
    pub fn new<S: Into<String>>(redirect_base: S, redirect_domains: Vec<String>) -> Self {
        Self {
            redirect_base: redirect_base.into(),
            redirect_domains: redirect_domains
                .into_iter()
                .map(|domain| domain.trim().to_ascii_lowercase())
                .filter(|domain| !domain.is_empty())
                .collect(),
        }
    }

    pub fn decode(&self, encoded: &str) -> String {
        match self.try_decode(encoded) {
            Some(url) => url,
            None => {
                tracing::warn!(link = encoded, "could not decode link");
                PLACEHOLDER.to_string()
            }
        }
    }

    fn try_decode(&self, encoded: &str) -> Option<String> {
        let encoded = encoded.trim();
        let bytes = general_purpose::STANDARD.decode(encoded).ok()?;
        let decoded = String::from_utf8(bytes).ok()?;
        let url = Url::parse(decoded.trim()).ok()?;
        let host = url.host_str()?.to_ascii_lowercase();

        if self
            .redirect_domains
            .iter()
            .any(|domain| host.contains(domain.as_str()))
        {
            Some(format!("{}?url={}", self.redirect_base, encoded))
        } else {
            Some(decoded)
        }
    }
}

pub fn is_navigable(target: &str) -> bool {
    target != PLACEHOLDER
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(raw: &str) -> String {
        general_purpose::STANDARD.encode(raw)
    }

    #[test]
    fn passes_through_plain_hosts() {
        let decoder = LinkDecoder::default();
        let encoded = encode("https://pixeldrain.com/u/abc");
        assert_eq!(decoder.decode(&encoded), "https://pixeldrain.com/u/abc");
    }

    #[test]
    fn rewrites_redirect_domains_with_original_text() {
        let decoder = LinkDecoder::default();
        for raw in [
            "https://videy.co/v?id=1",
            "https://www.mediafire.com/file/x",
            "https://1024terabox.com/s/abc",
        ] {
            let encoded = encode(raw);
            assert_eq!(
                decoder.decode(&encoded),
                format!("https://nekopara-savelink.netlify.app/?url={encoded}")
            );
        }
    }

    #[test]
    fn custom_redirect_configuration() {
        let decoder = LinkDecoder::new("https://go.example/", vec!["Example.org".into()]);
        let encoded = encode("https://cdn.example.org/f");
        assert_eq!(
            decoder.decode(&encoded),
            format!("https://go.example/?url={encoded}")
        );
        let other = encode("https://videy.co/v");
        assert_eq!(decoder.decode(&other), "https://videy.co/v");
    }

    #[test]
    fn malformed_links_become_placeholder() {
        let decoder = LinkDecoder::default();
        assert_eq!(decoder.decode("%%% not base64"), PLACEHOLDER);
        assert_eq!(decoder.decode(&encode("just some words")), PLACEHOLDER);
        assert_eq!(decoder.decode(""), PLACEHOLDER);
        assert!(!is_navigable(PLACEHOLDER));
        assert!(is_navigable("https://example.com"));
    }
}
