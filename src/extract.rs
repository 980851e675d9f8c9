use std::fmt;

use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ExtractError;

/// Tags whose whole subtree is treated as page chrome.
const EXCLUDED_TAGS: &[&str] = &[
    "script", "style", "noscript", "header", "footer", "nav", "aside",
];

/// Class tokens and ids that mark navigation, sidebars and footers.
const CHROME_NAMES: &[&str] = &[
    "nav",
    "navigation",
    "sidebar",
    "footer",
    "header",
    "menu",
    "breadcrumbs",
    "breadcrumb",
    "site-footer",
    "site-header",
    "widget",
    "widgets",
    "site-navigation",
    "main-navigation",
    "secondary-navigation",
    "site-sidebar",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HeadingLevel {
    H2,
    H3,
    H4,
}

impl HeadingLevel {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "h2" => Some(Self::H2),
            "h3" => Some(Self::H3),
            "h4" => Some(Self::H4),
            _ => None,
        }
    }

    pub fn depth(self) -> u8 {
        match self {
            Self::H2 => 2,
            Self::H3 => 3,
            Self::H4 => 4,
        }
    }
}

impl fmt::Display for HeadingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H{}", self.depth())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: HeadingLevel,
    pub text: String,
}

impl Heading {
    pub fn new(level: HeadingLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

impl fmt::Display for Heading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.level, self.text)
    }
}

/// Meta information and heading outline of one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageStructure {
    pub meta_title: String,
    pub meta_description: String,
    pub h1: String,
    pub headings: Vec<Heading>,
}

impl PageStructure {
    /// One `H2: text` line per heading.
    pub fn outline(&self) -> String {
        format_headings(&self.headings)
    }
}

pub fn format_headings(headings: &[Heading]) -> String {
    headings
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decode raw bytes and extract. Empty documents are reported as an error so
/// the caller can decide whether that is fatal.
pub fn load_structure(bytes: &[u8]) -> Result<PageStructure, ExtractError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let html = std::str::from_utf8(bytes)?;
    if html.trim().is_empty() {
        return Err(ExtractError::Empty);
    }
    Ok(extract_structure(html))
}

/// Extract title, meta description, first H1 and all H2-H4 headings outside
/// of page chrome, in document order.
pub fn extract_structure(html: &str) -> PageStructure {
    let document = Html::parse_document(html);
    if !document.errors.is_empty() {
        debug!(errors = document.errors.len(), "recovered from malformed markup");
    }

    let mut title = None;
    let mut description = None;
    let mut h1 = None;
    let mut headings = Vec::new();

    let mut stack = vec![document.root_element()];
    while let Some(el) = stack.pop() {
        match el.value().name() {
            "title" if title.is_none() => title = Some(collapse_text(el)),
            "meta" if description.is_none() => {
                let is_description = el
                    .value()
                    .attr("name")
                    .is_some_and(|n| n.eq_ignore_ascii_case("description"));
                if is_description {
                    description = Some(el.value().attr("content").unwrap_or("").trim().to_string());
                }
            }
            "h1" if h1.is_none() => h1 = Some(collapse_text(el)),
            name => {
                if let Some(level) = HeadingLevel::from_tag(name) {
                    headings.push(Heading::new(level, collapse_text(el)));
                }
            }
        }

        let children: Vec<_> = el
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|c| !is_chrome(c))
            .collect();
        stack.extend(children.into_iter().rev());
    }

    PageStructure {
        meta_title: title.unwrap_or_default(),
        meta_description: description.unwrap_or_default(),
        h1: h1.unwrap_or_default(),
        headings,
    }
}

fn is_chrome(el: &ElementRef<'_>) -> bool {
    let value = el.value();
    EXCLUDED_TAGS.contains(&value.name())
        || value.classes().any(|c| CHROME_NAMES.contains(&c))
        || value.id().is_some_and(|id| CHROME_NAMES.contains(&id))
}

/// Trimmed text nodes joined by single spaces, skipping chrome inside the element.
fn collapse_text(el: ElementRef<'_>) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let mut stack: Vec<_> = el.children().collect();
    stack.reverse();

    while let Some(node) = stack.pop() {
        if let Some(text) = node.value().as_text() {
            let t = text.trim();
            if !t.is_empty() {
                parts.push(t);
            }
            continue;
        }
        if let Some(child) = ElementRef::wrap(node) {
            if is_chrome(&child) {
                continue;
            }
            let mut children: Vec<_> = child.children().collect();
            children.reverse();
            stack.extend(children);
        }
    }

    parts.join(" ")
}

// ── Tests ──
