use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::extract::{Heading, HeadingLevel};

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^#{0,6}\s*(?:\d+[.)]\s*)?\*{0,2}\s*(meta title recommendations?|meta description recommendations?|h1(?: tag)? recommendations?|content recommendations?|final summary|summary)(?:\s*:\s*\*{0,2}|\s*\*{2}\s*:?|\s*$)\s*(.*)$",
    )
    .unwrap()
});
static RULE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:-\s*){3,}|(?:\*\s*){3,}|(?:_\s*){3,})$").unwrap()
});
static RECOMMENDATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^#{0,6}\s*\*{0,2}\s*(recommendation\s*#?\s*\d+)\s*\*{0,2}\s*[:.\-–]?\s*(.*)$").unwrap()
});
static HEADING_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^h([2-4])\s*[:\-–]\s*(.+)$").unwrap());
static MD_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").unwrap());
static BOLD_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+[.)]\s*)?\*\*([^*]+)\*\*:?$").unwrap());
static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-*•+]|\d+[.)])\s+(.*)$").unwrap());
static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\*{0,2}(placement|details)\*{0,2}\s*:\s*\*{0,2}\s*(.*)$").unwrap()
});
static TITLE_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\(?\bh([2-4])\)?\s*[:\-–]\s*(.+)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    MetaTitle,
    MetaDescription,
    H1,
    Content,
    Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulletLabel {
    Placement,
    Details,
}

impl fmt::Display for BulletLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Placement => f.write_str("Placement"),
            Self::Details => f.write_str("Details"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Empty,
    Rule,
    /// A section marker, with any text that followed it on the same line.
    SectionMarker { section: Section, inline: Option<String> },
    /// `Recommendation #n` line.
    Recommendation { title: String, heading: Option<Heading> },
    /// Fully bold line or markdown heading.
    Action { title: String, heading: Option<Heading> },
    /// Bare `H2: Topic` line.
    HeadingLine(Heading),
    Bullet { label: Option<BulletLabel>, text: String },
    Text(String),
}

pub fn classify_lines(text: &str) -> Vec<Line> {
    text.lines().map(classify_line).collect()
}

pub fn classify_line(raw: &str) -> Line {
    let line = raw.trim();

    if line.is_empty() {
        return Line::Empty;
    }

    // ── Horizontal rule ──
    if RULE_RE.is_match(line) {
        return Line::Rule;
    }

    // ── **Meta Title Recommendation:** and friends ──
    if let Some(caps) = SECTION_RE.captures(line) {
        if let Some(section) = section_for(&caps[1]) {
            let inline = caps[2].trim().trim_matches('*').trim();
            return Line::SectionMarker {
                section,
                inline: (!inline.is_empty()).then(|| inline.to_string()),
            };
        }
    }

    // ── Recommendation #n ──
    if let Some(caps) = RECOMMENDATION_RE.captures(line) {
        let rest = strip_emphasis(&caps[2]);
        let title = if rest.is_empty() {
            strip_emphasis(&caps[1])
        } else {
            rest
        };
        let heading = heading_in_title(&title);
        return Line::Recommendation { title, heading };
    }

    // ── H2: Topic ──
    if let Some(caps) = HEADING_LINE_RE.captures(&strip_emphasis(line)) {
        if let Some(level) = level_from_digit(&caps[1]) {
            return Line::HeadingLine(Heading::new(level, clean_topic(&caps[2])));
        }
    }

    // ── ### Markdown heading ──
    if let Some(caps) = MD_HEADING_RE.captures(line) {
        return action(&caps[2]);
    }

    // ── **Whole line bold** ──
    if let Some(caps) = BOLD_LINE_RE.captures(line) {
        return action(&caps[1]);
    }

    // ── - bullet, optionally - **Label:** text ──
    if let Some(caps) = BULLET_RE.captures(line) {
        let body = caps[1].trim();
        if let Some(label) = LABEL_RE.captures(body) {
            let kind = if label[1].eq_ignore_ascii_case("placement") {
                BulletLabel::Placement
            } else {
                BulletLabel::Details
            };
            return Line::Bullet {
                label: Some(kind),
                text: label[2].trim().to_string(),
            };
        }
        return Line::Bullet {
            label: None,
            text: body.to_string(),
        };
    }

    Line::Text(line.to_string())
}

fn action(raw_title: &str) -> Line {
    let title = strip_emphasis(raw_title);
    let title = title.trim_end_matches(':').trim().to_string();
    let heading = heading_in_title(&title);
    Line::Action { title, heading }
}

fn section_for(name: &str) -> Option<Section> {
    let lower = name.to_lowercase();
    if lower.starts_with("meta title") {
        Some(Section::MetaTitle)
    } else if lower.starts_with("meta description") {
        Some(Section::MetaDescription)
    } else if lower.starts_with("h1") {
        Some(Section::H1)
    } else if lower.starts_with("content") {
        Some(Section::Content)
    } else if lower.ends_with("summary") {
        Some(Section::Summary)
    } else {
        None
    }
}

/// Proposed heading named inside an action title, e.g. `Add New Section: H3 - Shipping`.
pub fn heading_in_title(title: &str) -> Option<Heading> {
    let caps = TITLE_HEADING_RE.captures(title)?;
    let level = level_from_digit(&caps[1])?;
    let text = clean_topic(&caps[2]);
    (!text.is_empty()).then(|| Heading::new(level, text))
}

fn level_from_digit(d: &str) -> Option<HeadingLevel> {
    HeadingLevel::from_tag(&format!("h{}", d))
}

pub fn strip_emphasis(s: &str) -> String {
    s.replace("**", "").trim().to_string()
}

fn clean_topic(s: &str) -> String {
    strip_emphasis(s)
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '“' || c == '”' || c == '`')
        .trim_end_matches(|c: char| c == ':' || c == '.')
        .trim()
        .to_string()
}
