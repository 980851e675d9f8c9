use std::fmt::Write;

use crate::aggregate::{AggregateMode, CompetitorAggregate};
use crate::extract::{format_headings, Heading, PageStructure};
use crate::llm::ChatMessage;

pub const SYSTEM_PROMPT: &str =
    "Provide detailed SEO content recommendations based on the analysis.";

const INSTRUCTIONS: &str = r#"Instructions:

1. Analyze the original meta title, meta description, and H1 tag. Provide specific recommendations for improving each based on SEO best practices and the target keyword.
2. Identify important topics or subtopics in the competitor headings that are missing or underdeveloped in the original content. The candidate missing topics above are a starting point, not an exhaustive list.
3. For each identified area:
   - Provide a clear, concise action item.
   - Use bold headings to describe the action, such as "**Add New Section: H3 - Energy Efficiency Metrics**".
   - Include a brief description of what content should be added or modified.
4. If rearranging existing sections would improve content flow, provide specific suggestions using the same format.
5. If the original content is already comprehensive, acknowledge that but suggest any minor improvements if applicable.
6. Avoid using branded terms unless necessary.
7. Present the recommendations in a clear, structured format using markdown syntax, including bold text and bullet points where appropriate.

Format:

**Meta Title Recommendation:**

Your recommendation here

---

**Meta Description Recommendation:**

Your recommendation here

---

**H1 Tag Recommendation:**

Your recommendation here

---

**Content Recommendations:**

For each recommendation:

---

**[Action Item]**

- **Placement:** Where to insert in the existing structure
- **Details:** Brief description of what to include

---

**Summary:**

Provide a final summary acknowledging if the content is comprehensive or noting any overall improvements.

IMPORTANT: Use markdown syntax for bold text and horizontal lines. Present the recommendations as clear, actionable items. Do not include any extraneous text or commentary."#;

/// Everything the prompt is built from.
pub struct PromptInput<'a> {
    pub keyword: &'a str,
    pub primary: &'a PageStructure,
    pub competitors: &'a CompetitorAggregate,
    pub missing: &'a [Heading],
    pub mode: AggregateMode,
}

pub fn build_messages(input: &PromptInput<'_>) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(build_prompt(input)),
    ]
}

pub fn build_prompt(input: &PromptInput<'_>) -> String {
    let primary = input.primary;
    let mut out = String::new();

    out.push_str("You are an SEO content strategist.\n\n");
    out.push_str("Your task is to analyze the provided original content structure, meta information, and competitor data to generate specific, actionable recommendations for improvement.\n\n");

    let _ = writeln!(out, "- **Keyword**: \"{}\"", input.keyword);
    let _ = writeln!(out, "- **Original Meta Title**: {}", primary.meta_title);
    let _ = writeln!(out, "- **Original Meta Description**: {}", primary.meta_description);
    let _ = writeln!(out, "- **Original H1 Tag**: {}", primary.h1);
    let _ = writeln!(out, "- **Original Content Structure**:\n{}\n", primary.outline());

    match input.mode {
        AggregateMode::PerPage => {
            let _ = writeln!(out, "- **Competitor Meta Information and Headings**:");
            out.push_str(&competitor_blocks(input.competitors));
        }
        AggregateMode::Flat => {
            let _ = writeln!(
                out,
                "- **Competitor Headings** ({} pages):\n{}\n",
                input.competitors.pages.len(),
                format_headings(&input.competitors.flat_headings())
            );
        }
    }

    if input.missing.is_empty() {
        out.push_str("- **Candidate Missing Topics**: none detected\n\n");
    } else {
        let _ = writeln!(
            out,
            "- **Candidate Missing Topics** (competitor headings absent from the original):\n{}\n",
            format_headings(input.missing)
        );
    }

    out.push_str(INSTRUCTIONS);
    out.push('\n');
    out
}

fn competitor_blocks(competitors: &CompetitorAggregate) -> String {
    let mut out = String::new();
    for (idx, page) in competitors.pages.iter().enumerate() {
        let n = idx + 1;
        let s = &page.structure;
        let _ = writeln!(out, "Competitor #{} Meta Title: {}", n, s.meta_title);
        let _ = writeln!(out, "Competitor #{} Meta Description: {}", n, s.meta_description);
        let _ = writeln!(out, "Competitor #{} H1 Tag: {}", n, s.h1);
        let _ = writeln!(out, "Competitor #{} Headings:\n{}\n", n, s.outline());
    }
    out
}
