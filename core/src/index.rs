use crate::tokenizer::{positions, tokenize_html, tokenize_term};
use crate::{Page, PageId, PageMeta, SearchResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub page_id: PageId,
    /// Always `positions.len()`.
    pub frequency: u32,
    pub positions: Vec<u32>,
}

/// token -> postings, in the order pages were added.
pub type InvertedIndex = HashMap<String, Vec<Posting>>;
/// page id -> page, last write wins.
pub type ForwardIndex = HashMap<PageId, Page>;

/// How query terms are matched against indexed tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// `inverted[term]` only.
    Exact,
    /// Every indexed token that contains the term.
    Substring,
    /// Exact first, substring when fewer than `min_results` pages matched.
    Fallback { min_results: usize },
}

impl Default for MatchMode {
    fn default() -> Self {
        MatchMode::Fallback { min_results: 10 }
    }
}

impl FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(MatchMode::Exact),
            "substring" | "fuzzy" => Ok(MatchMode::Substring),
            "fallback" => Ok(MatchMode::default()),
            other => match other.strip_prefix("fallback:") {
                Some(n) => n
                    .parse()
                    .map(|min_results| MatchMode::Fallback { min_results })
                    .map_err(|_| format!("invalid fallback threshold: {n}")),
                None => Err(format!("unknown match mode: {s}")),
            },
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::Exact => write!(f, "exact"),
            MatchMode::Substring => write!(f, "substring"),
            MatchMode::Fallback { min_results } => write!(f, "fallback:{min_results}"),
        }
    }
}

/// A node-local forward + inverted index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub inverted: InvertedIndex,
    pub forward: ForwardIndex,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pages in the forward index.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Number of distinct tokens in the inverted index.
    pub fn token_count(&self) -> usize {
        self.inverted.len()
    }

    pub fn page(&self, id: &str) -> Option<&Page> {
        self.forward.get(id)
    }

    /// Index a page. Re-adding a known id first drops its previous postings, so a
    /// re-crawl replaces rather than inflates its scores.
    pub fn add_page(&mut self, page: Page) {
        if let Some(previous) = self.forward.remove(&page.id) {
            self.purge_postings(&previous);
        }

        let tokens = tokenize_html(&page.content);
        for (token, pos) in positions(&tokens) {
            let posting = Posting {
                page_id: page.id.clone(),
                frequency: pos.len() as u32,
                positions: pos.into_iter().map(|p| p as u32).collect(),
            };
            self.inverted.entry(token).or_default().push(posting);
        }

        tracing::debug!(page_id = %page.id, tokens = tokens.len(), "page indexed");
        self.forward.insert(page.id.clone(), page);
    }

    /// Remove a page and every posting it contributed.
    pub fn remove_page(&mut self, id: &str) -> Option<Page> {
        let page = self.forward.remove(id)?;
        self.purge_postings(&page);
        Some(page)
    }

    fn purge_postings(&mut self, page: &Page) {
        let words: HashSet<String> = tokenize_html(&page.content).into_iter().map(|(w, _)| w).collect();
        for word in words {
            if let Some(list) = self.inverted.get_mut(&word) {
                list.retain(|p| p.page_id != page.id);
                if list.is_empty() {
                    self.inverted.remove(&word);
                }
            }
        }
    }

    /// Score pages by the summed frequency of every matching posting, best first.
    pub fn search(&self, query: &str, mode: MatchMode) -> Vec<SearchResult> {
        let terms = tokenize_term(query);
        let scores = match mode {
            MatchMode::Exact => self.score(&terms, false),
            MatchMode::Substring => self.score(&terms, true),
            MatchMode::Fallback { min_results } => {
                let exact = self.score(&terms, false);
                if exact.len() < min_results {
                    self.score(&terms, true)
                } else {
                    exact
                }
            }
        };

        let mut results: Vec<SearchResult> = scores
            .into_iter()
            .map(|(id, freq)| SearchResult {
                page: self.forward.get(&id).map(PageMeta::from),
                score: freq as f64,
                id,
            })
            .collect();
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        results
    }

    fn score(&self, terms: &[String], substring: bool) -> HashMap<PageId, u64> {
        let mut scores: HashMap<PageId, u64> = HashMap::new();
        let mut add = |postings: &[Posting]| {
            for p in postings {
                *scores.entry(p.page_id.clone()).or_insert(0) += p.frequency as u64;
            }
        };
        for term in terms {
            if substring {
                for (token, postings) in &self.inverted {
                    if token.contains(term.as_str()) {
                        add(postings);
                    }
                }
            } else if let Some(postings) = self.inverted.get(term) {
                add(postings);
            }
        }
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(id: &str, content: &str) -> Page {
        Page {
            id: id.into(),
            url: format!("https://example.com/{id}"),
            title: id.to_uppercase(),
            content: content.into(),
            meta_description: String::new(),
        }
    }

    #[test]
    fn postings_carry_frequency_and_positions() {
        let mut idx = Index::new();
        idx.add_page(page("p1", "rust is fast and rust is safe"));
        let postings = &idx.inverted["rust"];
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].frequency, 2);
        assert_eq!(postings[0].positions, vec![0, 4]);
        assert_eq!(idx.inverted["safe"][0].positions, vec![6]);
    }

    #[test]
    fn readding_a_page_replaces_its_postings() {
        let mut idx = Index::new();
        idx.add_page(page("p1", "alpha beta"));
        idx.add_page(page("p1", "alpha gamma"));
        assert_eq!(idx.inverted["alpha"].len(), 1);
        assert!(!idx.inverted.contains_key("beta"));
        assert_eq!(idx.search("alpha", MatchMode::Exact)[0].score, 1.0);
    }

    #[test]
    fn remove_page_purges_postings() {
        let mut idx = Index::new();
        idx.add_page(page("p1", "shared only1"));
        idx.add_page(page("p2", "shared"));
        assert!(idx.remove_page("p1").is_some());
        assert!(!idx.inverted.contains_key("only1"));
        assert_eq!(idx.inverted["shared"].len(), 1);
        assert!(idx.remove_page("p1").is_none());
    }

    #[test]
    fn exact_mode_ignores_partial_tokens() {
        let mut idx = Index::new();
        idx.add_page(page("p1", "searching engines"));
        assert!(idx.search("search", MatchMode::Exact).is_empty());
        let hits = idx.search("search", MatchMode::Substring);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "p1");
    }

    #[test]
    fn fallback_switches_to_substring_below_threshold() {
        let mut idx = Index::new();
        idx.add_page(page("p1", "search"));
        idx.add_page(page("p2", "research"));
        let few = idx.search("search", MatchMode::Fallback { min_results: 2 });
        assert_eq!(few.len(), 2);
        let enough = idx.search("search", MatchMode::Fallback { min_results: 1 });
        assert_eq!(enough.len(), 1);
        assert_eq!(enough[0].id, "p1");
    }

    #[test]
    fn missing_forward_entry_leaves_page_empty() {
        let mut idx = Index::new();
        idx.add_page(page("p1", "orphan"));
        idx.forward.remove("p1");
        let hits = idx.search("orphan", MatchMode::Exact);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].page.is_none());
    }

    #[test]
    fn match_mode_parses() {
        assert_eq!("exact".parse::<MatchMode>().unwrap(), MatchMode::Exact);
        assert_eq!("Substring".parse::<MatchMode>().unwrap(), MatchMode::Substring);
        assert_eq!(
            "fallback:3".parse::<MatchMode>().unwrap(),
            MatchMode::Fallback { min_results: 3 }
        );
        assert!("nearest".parse::<MatchMode>().is_err());
        assert_eq!(MatchMode::default().to_string(), "fallback:10");
    }
}
