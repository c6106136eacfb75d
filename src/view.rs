use std::collections::BTreeMap;

use crate::gallery::Post;

pub const PAGE_SIZE: usize = 20;
pub const HOME: &str = "home";
pub const ALL: &str = "all";

/// Exact match: a genre spelled `Home` or `ALL` stays a concrete category.
pub fn is_unfiltered(category: &str) -> bool {
    category == HOME || category == ALL
}

/// Current category, 1-based page, and the posts that survive the filter
/// (as indices into the collection, already newest first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    category: String,
    page: usize,
    filtered: Vec<usize>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            category: HOME.to_string(),
            page: 1,
            filtered: Vec::new(),
        }
    }
}

impl ViewState {
    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn filtered_len(&self) -> usize {
        self.filtered.len()
    }

    pub fn total_pages(&self) -> usize {
        self.filtered.len().div_ceil(PAGE_SIZE)
    }
}

/// The in-memory collection plus what is currently visible.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    posts: Vec<Post>,
    view: ViewState,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    /// Rebuilds the collection wholesale and re-applies the current category.
    pub fn replace_posts(&mut self, posts: Vec<Post>) {
        self.posts = posts;
        let category = self.view.category.clone();
        self.filter(&category);
    }

    pub fn clear(&mut self) {
        self.posts.clear();
        self.view = ViewState::default();
    }

    /// Selects a category and resets to the first page.
    pub fn filter(&mut self, category: &str) -> Vec<&Post> {
        let category = category_from_fragment(category);
        let filtered = if is_unfiltered(&category) {
            (0..self.posts.len()).collect()
        } else {
            self.posts
                .iter()
                .enumerate()
                .filter(|(_, post)| post.genre_matches(&category))
                .map(|(idx, _)| idx)
                .collect()
        };
        self.view = ViewState {
            category,
            page: 1,
            filtered,
        };
        self.current_page_posts()
    }

    /// Advances one page; no-op on the last page.
    pub fn next_page(&mut self) -> bool {
        if self.view.page < self.view.total_pages() {
            self.view.page += 1;
            true
        } else {
            false
        }
    }

    /// Goes back one page; no-op on the first page.
    pub fn previous_page(&mut self) -> bool {
        if self.view.page > 1 {
            self.view.page -= 1;
            true
        } else {
            false
        }
    }

    pub fn current_page_posts(&self) -> Vec<&Post> {
        let start = (self.view.page - 1).saturating_mul(PAGE_SIZE);
        self.view
            .filtered
            .iter()
            .skip(start)
            .take(PAGE_SIZE)
            .filter_map(|idx| self.posts.get(*idx))
            .collect()
    }

    /// `home` first, then each distinct genre (case-insensitive) sorted.
    pub fn categories(&self) -> Vec<String> {
        let mut genres: BTreeMap<String, String> = BTreeMap::new();
        for post in &self.posts {
            if let Some(genre) = post.genre.as_deref().map(str::trim) {
                if genre.is_empty() || is_unfiltered(genre) {
                    continue;
                }
                genres
                    .entry(genre.to_lowercase())
                    .or_insert_with(|| genre.to_string());
            }
        }
        std::iter::once(HOME.to_string())
            .chain(genres.into_values())
            .collect()
    }
}

/// Parses a location fragment such as `#anime` into a category.
pub fn category_from_fragment(fragment: &str) -> String {
    let trimmed = fragment.trim().trim_start_matches('#').trim();
    if trimmed.is_empty() {
        HOME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Fragment recorded for a category; `all` is recorded as `home`.
pub fn fragment_for(category: &str) -> String {
    if category.trim() == ALL {
        HOME.to_string()
    } else {
        category_from_fragment(category)
    }
}

/// Current fragment plus a back stack of earlier ones.
#[derive(Debug, Clone, Default)]
pub struct Location {
    fragment: Option<String>,
    back: Vec<String>,
}

impl Location {
    pub fn from_fragment(fragment: Option<&str>) -> Self {
        Self {
            fragment: fragment
                .map(category_from_fragment)
                .filter(|category| !category.is_empty()),
            back: Vec::new(),
        }
    }

    pub fn category(&self) -> String {
        self.fragment
            .clone()
            .unwrap_or_else(|| HOME.to_string())
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Records a new fragment. Returns false when it matches the current one.
    pub fn push(&mut self, category: &str) -> bool {
        let next = fragment_for(category);
        if self.fragment.as_deref() == Some(next.as_str()) {
            return false;
        }
        if let Some(current) = self.fragment.replace(next) {
            self.back.push(current);
        }
        true
    }

    /// Pops back to the previous fragment, if any.
    pub fn back(&mut self) -> Option<String> {
        let previous = self.back.pop()?;
        self.fragment = Some(previous.clone());
        Some(previous)
    }

    pub fn can_go_back(&self) -> bool {
        !self.back.is_empty()
    }
}
