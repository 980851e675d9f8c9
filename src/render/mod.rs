pub mod docx;

use chrono::{DateTime, Local};

use crate::aggregate::SkippedSource;
use crate::extract::{Heading, PageStructure};
use crate::recommend::lines::{classify_line, BulletLabel, Line, Section};
use crate::recommend::{ActionItem, Recommendations};

pub use self::docx::write_docx;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub bold: bool,
}

/// Format-independent document content; `docx::write_docx` maps it onto styles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocBlock {
    Title(String),
    Heading { level: u8, text: String },
    Paragraph(Vec<Span>),
    Bullet(Vec<Span>),
}

pub struct LayoutContext<'a> {
    pub keyword: &'a str,
    pub generated_at: DateTime<Local>,
    pub primary: &'a PageStructure,
    pub missing: &'a [Heading],
    pub skipped: &'a [SkippedSource],
}

pub fn layout(recs: &Recommendations, ctx: &LayoutContext<'_>) -> Vec<DocBlock> {
    let mut out = header(ctx);

    meta_section(&mut out, "Meta Title", &ctx.primary.meta_title, &recs.meta_title);
    meta_section(
        &mut out,
        "Meta Description",
        &ctx.primary.meta_description,
        &recs.meta_description,
    );
    meta_section(&mut out, "H1 Tag", &ctx.primary.h1, &recs.h1);

    if !recs.actions.is_empty() {
        out.push(heading(1, "Content Recommendations"));
        for action in &recs.actions {
            action_blocks(&mut out, action);
        }
    }

    if !recs.summary.is_empty() {
        out.push(heading(1, "Summary"));
        out.extend(recs.summary.iter().map(|s| DocBlock::Paragraph(spans(s))));
    }

    if !ctx.missing.is_empty() {
        out.push(heading(1, "Candidate Missing Topics"));
        out.push(DocBlock::Paragraph(spans(
            "Competitor headings with no match on your page:",
        )));
        out.extend(ctx.missing.iter().map(|h| {
            DocBlock::Bullet(vec![bold(&format!("{} ", h.level)), plain(&h.text)])
        }));
    }

    if !recs.unclassified.is_empty() {
        out.push(heading(1, "Unparsed Model Output"));
        out.extend(
            recs.unclassified
                .iter()
                .map(|l| DocBlock::Paragraph(vec![plain(l)])),
        );
    }

    if !ctx.skipped.is_empty() {
        out.push(heading(1, "Skipped Sources"));
        out.extend(ctx.skipped.iter().map(|s| {
            DocBlock::Bullet(vec![bold(&format!("{}: ", s.source)), plain(&s.reason)])
        }));
    }

    out
}

/// Lay out the raw reply line by line, matching the same prefixes as the parser.
pub fn layout_raw(text: &str, ctx: &LayoutContext<'_>) -> Vec<DocBlock> {
    let mut out = header(ctx);
    for raw in text.lines() {
        match classify_line(raw) {
            Line::Empty | Line::Rule => {}
            Line::SectionMarker { section, inline } => {
                out.push(heading(1, section_title(section)));
                if let Some(inline) = inline {
                    out.push(DocBlock::Paragraph(spans(&inline)));
                }
            }
            Line::Recommendation { title, heading: h } | Line::Action { title, heading: h } => {
                match h {
                    Some(h) => out.push(heading(h.level.depth(), &h.text)),
                    None => out.push(heading(2, &title)),
                }
            }
            Line::HeadingLine(h) => out.push(heading(h.level.depth(), &h.text)),
            Line::Bullet { label, text } => {
                let mut line = Vec::new();
                match label {
                    Some(BulletLabel::Placement) => line.push(bold("Placement: ")),
                    Some(BulletLabel::Details) => line.push(bold("Details: ")),
                    None => {}
                }
                line.extend(spans(&text));
                out.push(DocBlock::Bullet(line));
            }
            Line::Text(t) => out.push(DocBlock::Paragraph(spans(&t))),
        }
    }
    out
}

fn header(ctx: &LayoutContext<'_>) -> Vec<DocBlock> {
    vec![
        DocBlock::Title(format!("Content Recommendations: {}", ctx.keyword)),
        DocBlock::Paragraph(vec![plain(&format!(
            "Generated {}",
            ctx.generated_at.format("%Y-%m-%d %H:%M")
        ))]),
    ]
}

fn meta_section(out: &mut Vec<DocBlock>, name: &str, current: &str, recommended: &str) {
    if recommended.is_empty() {
        return;
    }
    out.push(heading(1, &format!("{} Recommendation", name)));
    if !current.is_empty() {
        out.push(DocBlock::Paragraph(vec![bold("Current: "), plain(current)]));
    }
    out.extend(recommended.lines().map(|l| DocBlock::Paragraph(spans(l))));
}

fn action_blocks(out: &mut Vec<DocBlock>, action: &ActionItem) {
    match &action.heading {
        Some(h) => {
            out.push(heading(h.level.depth(), &h.text));
            out.push(DocBlock::Paragraph(vec![bold("Action: "), plain(&action.title)]));
        }
        None => out.push(heading(2, &action.title)),
    }
    if !action.placement.is_empty() {
        let mut line = vec![bold("Placement: ")];
        line.extend(spans(&action.placement));
        out.push(DocBlock::Bullet(line));
    }
    if !action.details.is_empty() {
        let mut line = vec![bold("Details: ")];
        line.extend(spans(&action.details));
        out.push(DocBlock::Bullet(line));
    }
    out.extend(action.notes.iter().map(|n| DocBlock::Paragraph(spans(n))));
}

fn section_title(section: Section) -> &'static str {
    match section {
        Section::MetaTitle => "Meta Title Recommendation",
        Section::MetaDescription => "Meta Description Recommendation",
        Section::H1 => "H1 Tag Recommendation",
        Section::Content => "Content Recommendations",
        Section::Summary => "Summary",
    }
}

fn heading(level: u8, text: &str) -> DocBlock {
    DocBlock::Heading {
        level,
        text: text.to_string(),
    }
}

fn plain(text: &str) -> Span {
    Span {
        text: text.to_string(),
        bold: false,
    }
}

fn bold(text: &str) -> Span {
    Span {
        text: text.to_string(),
        bold: true,
    }
}

/// Split `**bold**` markdown into runs.
pub fn spans(text: &str) -> Vec<Span> {
    text.split("**")
        .enumerate()
        .filter(|(_, part)| !part.is_empty())
        .map(|(i, part)| Span {
            text: part.to_string(),
            bold: i % 2 == 1,
        })
        .collect()
}
