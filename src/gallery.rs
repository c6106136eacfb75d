use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub last_modified: String,
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub links: BTreeMap<String, LinkValue>,
}

/// A channel entry in a post file is either one encoded link or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkValue {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Videy,
    Terabox,
    Mediafire,
    PixelDrain,
}

impl Channel {
    /// Display priority in the detail overlay.
    pub const ALL: [Channel; 4] = [
        Channel::Videy,
        Channel::Terabox,
        Channel::Mediafire,
        Channel::PixelDrain,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Channel::Videy => "videy",
            Channel::Terabox => "terabox",
            Channel::Mediafire => "mediafire",
            Channel::PixelDrain => "pixeldrain",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Channel::Videy => "Videy",
            Channel::Terabox => "Terabox",
            Channel::Mediafire => "Mediafire",
            Channel::PixelDrain => "PixelDrain",
        }
    }
}

impl Post {
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        parse_date(&self.date)
    }

    pub fn channel(&self, channel: Channel) -> Option<&LinkValue> {
        self.links.get(channel.key())
    }

    pub fn genre_matches(&self, category: &str) -> bool {
        self.genre
            .as_deref()
            .map(|genre| !genre.is_empty() && genre.to_lowercase() == category.to_lowercase())
            .unwrap_or(false)
    }
}

pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Newest first. Undated posts go last and keep their relative order.
pub fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.published_at().cmp(&a.published_at()));
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Int(value) => value.to_string(),
        Raw::Float(value) => value.to_string(),
    })
}

#[cfg(test)]
pub(crate) fn sample_post(id: &str, genre: &str, date: &str) -> Post {
    Post {
        id: id.to_string(),
        title: format!("Post {id}"),
        image: format!("https://img.example/{id}.jpg"),
        genre: if genre.is_empty() {
            None
        } else {
            Some(genre.to_string())
        },
        date: date.to_string(),
        links: BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_post_with_mixed_link_shapes() {
        let raw = r#"{
            "id": 42,
            "title": "Sample",
            "image": "https://img.example/42.jpg",
            "genre": "Anime",
            "date": "2024-03-01",
            "links": {
                "mediafire": "aHR0cHM6Ly9tZWRpYWZpcmUuY29tL2Zvbw==",
                "videy": ["YQ==", "Yg=="]
            }
        }"#;
        let post: Post = serde_json::from_str(raw).unwrap();
        assert_eq!(post.id, "42");
        assert_eq!(
            post.channel(Channel::Mediafire),
            Some(&LinkValue::One(
                "aHR0cHM6Ly9tZWRpYWZpcmUuY29tL2Zvbw==".to_string()
            ))
        );
        assert_eq!(
            post.channel(Channel::Videy),
            Some(&LinkValue::Many(vec!["YQ==".into(), "Yg==".into()]))
        );
        assert!(post.channel(Channel::Terabox).is_none());
    }

    #[test]
    fn decodes_manifest() {
        let raw = r#"{"lastModified":"2024-05-01T10:00:00Z","files":[{"file":"a.json"},{"file":"b.json"}]}"#;
        let manifest: Manifest = serde_json::from_str(raw).unwrap();
        assert_eq!(manifest.last_modified, "2024-05-01T10:00:00Z");
        assert_eq!(manifest.files.len(), 2);
        assert_eq!(manifest.files[1].file, "b.json");
    }

    #[test]
    fn parses_common_date_shapes() {
        assert!(parse_date("2024-03-01").is_some());
        assert!(parse_date("2024-03-01 12:30:00").is_some());
        assert!(parse_date("2024-03-01T12:30:00+07:00").is_some());
        assert!(parse_date("not a date").is_none());
        assert!(parse_date("").is_none());
    }

    #[test]
    fn sorts_newest_first_with_undated_last() {
        let mut posts = vec![
            sample_post("old", "a", "2023-01-01"),
            sample_post("undated", "a", ""),
            sample_post("new", "a", "2024-06-01"),
            sample_post("mid", "a", "2023-09-15 08:00:00"),
        ];
        sort_newest_first(&mut posts);
        let ids: Vec<_> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old", "undated"]);
    }

    #[test]
    fn genre_match_is_case_insensitive() {
        let post = sample_post("1", "Anime", "2024-01-01");
        assert!(post.genre_matches("anime"));
        assert!(post.genre_matches("ANIME"));
        assert!(!post.genre_matches("anim"));
        assert!(!sample_post("2", "", "2024-01-01").genre_matches(""));
    }
}
