use serde::Serialize;

use super::lines::{classify_line, classify_lines, heading_in_title, BulletLabel, Line, Section};
use crate::extract::Heading;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionItem {
    pub title: String,
    /// Heading the action proposes, when the title names a level.
    pub heading: Option<Heading>,
    pub placement: String,
    pub details: String,
    pub notes: Vec<String>,
}

/// Best-effort structure recovered from the model's reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Recommendations {
    pub meta_title: String,
    pub meta_description: String,
    pub h1: String,
    pub actions: Vec<ActionItem>,
    pub summary: Vec<String>,
    /// Lines that matched no rule, in input order.
    pub unclassified: Vec<String>,
}

impl Recommendations {
    pub fn is_empty(&self) -> bool {
        self.meta_title.is_empty()
            && self.meta_description.is_empty()
            && self.h1.is_empty()
            && self.actions.is_empty()
            && self.summary.is_empty()
    }
}

/// Fold classified lines into sections. Nothing is dropped: any line that has
/// no home ends up in `unclassified`.
pub fn parse_recommendations(text: &str) -> Recommendations {
    let mut recs = Recommendations::default();
    let mut section: Option<Section> = None;
    let mut open_action = false;

    for (raw, line) in text.lines().zip(classify_lines(text)) {
        let raw = raw.trim();
        match line {
            Line::Empty => {}
            Line::Rule => open_action = false,
            Line::SectionMarker { section: s, inline } => {
                section = Some(s);
                open_action = false;
                if let Some(inline) = inline {
                    route_text(&mut recs, section, open_action, &inline, raw);
                }
            }
            Line::Recommendation { title, heading } | Line::Action { title, heading }
                if opens_action(section, raw) =>
            {
                section = Some(Section::Content);
                open_action = true;
                recs.actions.push(ActionItem {
                    heading: heading.or_else(|| heading_in_title(&title)),
                    title,
                    ..Default::default()
                });
            }
            Line::Recommendation { title, .. } | Line::Action { title, .. } => {
                // Bold line inside a meta or summary section is just emphasis.
                route_text(&mut recs, section, open_action, &format!("**{}**", title), raw);
            }
            Line::HeadingLine(heading) => {
                if section == Some(Section::Summary) {
                    recs.summary.push(raw.to_string());
                    continue;
                }
                section = Some(Section::Content);
                open_action = true;
                recs.actions.push(ActionItem {
                    title: heading.text.clone(),
                    heading: Some(heading),
                    ..Default::default()
                });
            }
            Line::Bullet { label, text } => {
                if section == Some(Section::Content) && open_action {
                    if let Some(item) = recs.actions.last_mut() {
                        match label {
                            Some(BulletLabel::Placement) => append(&mut item.placement, &text),
                            Some(BulletLabel::Details) => append(&mut item.details, &text),
                            None => item.notes.push(text),
                        }
                        continue;
                    }
                }
                let text = match label {
                    Some(label) => format!("**{}:** {}", label, text),
                    None => text,
                };
                route_text(&mut recs, section, open_action, &text, raw);
            }
            Line::Text(text) => route_text(&mut recs, section, open_action, &text, raw),
        }
    }

    recs
}

/// `Recommendation #n` always opens an action; bold lines and markdown
/// headings only do so outside the meta and summary sections.
fn opens_action(section: Option<Section>, raw: &str) -> bool {
    match section {
        None | Some(Section::Content) => true,
        Some(_) => matches!(classify_line(raw), Line::Recommendation { .. }),
    }
}

fn route_text(
    recs: &mut Recommendations,
    section: Option<Section>,
    open_action: bool,
    text: &str,
    raw: &str,
) {
    match section {
        Some(Section::MetaTitle) => append_line(&mut recs.meta_title, text),
        Some(Section::MetaDescription) => append_line(&mut recs.meta_description, text),
        Some(Section::H1) => append_line(&mut recs.h1, text),
        Some(Section::Summary) => recs.summary.push(text.to_string()),
        Some(Section::Content) if open_action => match recs.actions.last_mut() {
            Some(item) => item.notes.push(text.to_string()),
            None => recs.unclassified.push(raw.to_string()),
        },
        Some(Section::Content) | None => recs.unclassified.push(raw.to_string()),
    }
}

fn append(field: &mut String, text: &str) {
    if !field.is_empty() {
        field.push(' ');
    }
    field.push_str(text);
}

fn append_line(field: &mut String, text: &str) {
    if !field.is_empty() {
        field.push('\n');
    }
    field.push_str(text);
}

// ── Tests ──
