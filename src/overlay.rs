use crate::gallery::{Channel, LinkValue, Post};
use crate::links::{self, LinkDecoder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEntry {
    pub label: String,
    pub url: String,
}

impl LinkEntry {
    fn new<L: Into<String>, U: Into<String>>(label: L, url: U) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }

    pub fn is_navigable(&self) -> bool {
        links::is_navigable(&self.url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSection {
    pub channel: Channel,
    pub entries: Vec<LinkEntry>,
}

impl LinkSection {
    pub fn heading(&self) -> String {
        format!("Download via {}", self.channel.label())
    }
}

/// Where a dismiss request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseEvent {
    Backdrop,
    CloseControl,
    Inside,
}

#[derive(Debug, Clone)]
pub struct Overlay {
    pub post_id: String,
    pub title: String,
    pub image: String,
    pub sections: Vec<LinkSection>,
}

impl Overlay {
    pub fn open(post: &Post, decoder: &LinkDecoder) -> Self {
        let sections = Channel::ALL
            .iter()
            .filter_map(|channel| {
                post.channel(*channel).map(|value| LinkSection {
                    channel: *channel,
                    entries: section_entries(*channel, value, decoder),
                })
            })
            .collect();

        Self {
            post_id: post.id.clone(),
            title: post.title.clone(),
            image: post.image.clone(),
            sections,
        }
    }

    /// Returns true when the event dismisses the overlay.
    pub fn close(event: CloseEvent) -> bool {
        matches!(event, CloseEvent::Backdrop | CloseEvent::CloseControl)
    }

    /// All entries in display order, for keyboard selection.
    pub fn entries(&self) -> Vec<&LinkEntry> {
        self.sections
            .iter()
            .flat_map(|section| section.entries.iter())
            .collect()
    }

    pub fn entry_count(&self) -> usize {
        self.sections.iter().map(|section| section.entries.len()).sum()
    }
}

fn section_entries(channel: Channel, value: &LinkValue, decoder: &LinkDecoder) -> Vec<LinkEntry> {
    match value {
        LinkValue::Many(links) => links
            .iter()
            .enumerate()
            .map(|(i, link)| LinkEntry::new(format!("{} {}", channel.label(), i + 1), decoder.decode(link)))
            .collect(),
        LinkValue::One(link) if !link.trim().is_empty() => {
            vec![LinkEntry::new("Full Content", decoder.decode(link))]
        }
        LinkValue::One(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::sample_post;
    use base64::{engine::general_purpose, Engine as _};

    fn encode(raw: &str) -> String {
        general_purpose::STANDARD.encode(raw)
    }

    #[test]
    fn renders_single_and_list_channels() {
        let mut post = sample_post("1", "Anime", "2024-01-01");
        post.links.insert(
            "mediafire".into(),
            LinkValue::One(encode("https://www.mediafire.com/file/one")),
        );
        post.links.insert(
            "videy".into(),
            LinkValue::Many(vec![
                encode("https://videy.co/v?id=1"),
                encode("https://videy.co/v?id=2"),
            ]),
        );

        let overlay = Overlay::open(&post, &LinkDecoder::default());
        assert_eq!(overlay.sections.len(), 2);

        let videy = &overlay.sections[0];
        assert_eq!(videy.channel, Channel::Videy);
        assert_eq!(videy.heading(), "Download via Videy");
        let labels: Vec<_> = videy.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["Videy 1", "Videy 2"]);

        let mediafire = &overlay.sections[1];
        assert_eq!(mediafire.channel, Channel::Mediafire);
        assert_eq!(mediafire.entries.len(), 1);
        assert_eq!(mediafire.entries[0].label, "Full Content");
        assert_eq!(overlay.entry_count(), 3);
    }

    #[test]
    fn channels_follow_priority_and_ignore_unknown_keys() {
        let mut post = sample_post("2", "Anime", "2024-01-01");
        for key in ["pixeldrain", "mediafire", "terabox", "videy", "gdrive"] {
            post.links.insert(
                key.into(),
                LinkValue::One(encode("https://pixeldrain.com/u/x")),
            );
        }
        let overlay = Overlay::open(&post, &LinkDecoder::default());
        let order: Vec<_> = overlay.sections.iter().map(|s| s.channel).collect();
        assert_eq!(order.to_vec(), Channel::ALL.to_vec());
    }

    #[test]
    fn blank_single_link_keeps_heading_without_entries() {
        let mut post = sample_post("3", "Anime", "2024-01-01");
        post.links.insert("terabox".into(), LinkValue::One("   ".into()));
        let overlay = Overlay::open(&post, &LinkDecoder::default());
        assert_eq!(overlay.sections.len(), 1);
        assert!(overlay.sections[0].entries.is_empty());
        assert!(overlay.entries().is_empty());
    }

    #[test]
    fn undecodable_links_are_not_navigable() {
        let mut post = sample_post("4", "Anime", "2024-01-01");
        post.links
            .insert("pixeldrain".into(), LinkValue::Many(vec!["***".into()]));
        let overlay = Overlay::open(&post, &LinkDecoder::default());
        let entry = overlay.entries()[0];
        assert_eq!(entry.url, links::PLACEHOLDER);
        assert!(!entry.is_navigable());
    }

    #[test]
    fn only_backdrop_or_close_control_dismisses() {
        assert!(Overlay::close(CloseEvent::Backdrop));
        assert!(Overlay::close(CloseEvent::CloseControl));
        assert!(!Overlay::close(CloseEvent::Inside));
    }
}
