use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Node};
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref STRIP: Regex = Regex::new(r"[^a-z0-9\s]+").expect("valid regex");
}

/// Elements whose subtree never contributes visible text.
const SKIPPED: &[&str] = &["script", "style", "noscript", "head", "meta", "template"];

fn normalize(text: &str) -> String {
    let lowered = text.nfkc().collect::<String>().to_lowercase();
    STRIP.replace_all(&lowered, "").into_owned()
}

/// Tokenize plain text into (word, position) pairs.
///
/// Words are NFKC-normalized, lower-cased and stripped of everything outside
/// `[a-z0-9\s]`. Positions are the 0-based ordinal of the word in the stream, so
/// a repeated word shows up once per occurrence.
pub fn tokenize(text: &str) -> Vec<(String, usize)> {
    normalize(text)
        .split_whitespace()
        .enumerate()
        .map(|(pos, word)| (word.to_string(), pos))
        .collect()
}

/// Normalize a query into its ordered list of terms.
pub fn tokenize_term(text: &str) -> Vec<String> {
    normalize(text).split_whitespace().map(str::to_string).collect()
}

/// Tokenize an HTML document's visible text.
pub fn tokenize_html(html: &str) -> Vec<(String, usize)> {
    tokenize(&extract_text(html))
}

/// Extract visible text depth-first, one space after every text node so words in
/// adjacent elements never merge.
pub fn extract_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut out = String::new();
    collect_text(doc.root_element(), &mut out);
    out
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    out.push_str(trimmed);
                    out.push(' ');
                }
            }
            Node::Element(el) if SKIPPED.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}

/// Group a token stream by word, keeping every position in stream order.
pub fn positions(tokens: &[(String, usize)]) -> HashMap<String, Vec<usize>> {
    let mut grouped: HashMap<String, Vec<usize>> = HashMap::new();
    for (word, pos) in tokens {
        grouped.entry(word.clone()).or_default().push(*pos);
    }
    grouped
}
