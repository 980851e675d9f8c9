use std::io::Cursor;

use docx_rs::{
    AbstractNumbering, Docx, IndentLevel, Level, LevelJc, LevelText, NumberFormat, Numbering,
    NumberingId, Paragraph, Run, Start, Style, StyleType,
};

use super::{DocBlock, Span};
use crate::error::RenderError;

const BULLET_NUMBERING: usize = 1;

/// (style id, display name, half-point size)
const HEADING_STYLES: &[(&str, &str, usize)] = &[
    ("Heading1", "Heading 1", 32),
    ("Heading2", "Heading 2", 28),
    ("Heading3", "Heading 3", 24),
    ("Heading4", "Heading 4", 22),
];

/// Pack the blocks into an in-memory `.docx`.
pub fn write_docx(blocks: &[DocBlock]) -> Result<Vec<u8>, RenderError> {
    let mut doc = Docx::new()
        .add_style(Style::new("Title", StyleType::Paragraph).name("Title").size(48).bold())
        .add_abstract_numbering(AbstractNumbering::new(BULLET_NUMBERING).add_level(Level::new(
            0,
            Start::new(1),
            NumberFormat::new("bullet"),
            LevelText::new("•"),
            LevelJc::new("left"),
        )))
        .add_numbering(Numbering::new(BULLET_NUMBERING, BULLET_NUMBERING));

    for (id, name, size) in HEADING_STYLES {
        doc = doc.add_style(Style::new(*id, StyleType::Paragraph).name(*name).size(*size).bold());
    }

    for block in blocks {
        doc = doc.add_paragraph(paragraph(block));
    }

    let mut buf = Cursor::new(Vec::new());
    doc.build()
        .pack(&mut buf)
        .map_err(|e| RenderError::Pack(e.to_string()))?;
    Ok(buf.into_inner())
}

fn paragraph(block: &DocBlock) -> Paragraph {
    match block {
        DocBlock::Title(text) => Paragraph::new()
            .add_run(Run::new().add_text(text))
            .style("Title"),
        DocBlock::Heading { level, text } => Paragraph::new()
            .add_run(Run::new().add_text(text))
            .style(&heading_style(*level)),
        DocBlock::Paragraph(spans) => with_runs(Paragraph::new(), spans),
        DocBlock::Bullet(spans) => with_runs(Paragraph::new(), spans)
            .numbering(NumberingId::new(BULLET_NUMBERING), IndentLevel::new(0)),
    }
}

/// Levels past the registered styles fall back to the deepest one.
fn heading_style(level: u8) -> String {
    let level = level.clamp(1, HEADING_STYLES.len() as u8);
    format!("Heading{}", level)
}

fn with_runs(mut p: Paragraph, spans: &[Span]) -> Paragraph {
    for span in spans {
        let run = Run::new().add_text(&span.text);
        p = p.add_run(if span.bold { run.bold() } else { run });
    }
    p
}
