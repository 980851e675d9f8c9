use std::collections::HashSet;

use crate::aggregate::CompetitorAggregate;
use crate::extract::{Heading, PageStructure};

/// Competitor headings with no counterpart among the primary page's headings.
/// First occurrence wins; competitor order and levels are preserved.
pub fn missing_topics(primary: &PageStructure, competitors: &CompetitorAggregate) -> Vec<Heading> {
    let covered: HashSet<String> = primary
        .headings
        .iter()
        .map(|h| normalize_topic(&h.text))
        .collect();

    let mut seen = HashSet::new();
    competitors
        .flat_headings()
        .into_iter()
        .filter(|h| {
            let key = normalize_topic(&h.text);
            !key.is_empty() && !covered.contains(&key) && seen.insert(key)
        })
        .collect()
}

/// Lowercase, collapse whitespace and strip trailing punctuation.
pub fn normalize_topic(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::CompetitorPage;
    use crate::extract::HeadingLevel::{H2, H3, H4};

    fn page(headings: Vec<Heading>) -> PageStructure {
        PageStructure {
            headings,
            ..Default::default()
        }
    }

    fn competitors(pages: Vec<Vec<Heading>>) -> CompetitorAggregate {
        CompetitorAggregate {
            pages: pages
                .into_iter()
                .enumerate()
                .map(|(i, h)| CompetitorPage {
                    source: format!("c{}", i),
                    structure: page(h),
                })
                .collect(),
            skipped: Vec::new(),
        }
    }

    #[test]
    fn finds_faq_and_shipping() {
        let primary = page(vec![Heading::new(H2, "Overview"), Heading::new(H3, "Pricing")]);
        let comps = competitors(vec![vec![
            Heading::new(H2, "Overview"),
            Heading::new(H2, "FAQ"),
            Heading::new(H3, "Pricing"),
            Heading::new(H3, "Shipping"),
        ]]);
        assert_eq!(
            missing_topics(&primary, &comps),
            vec![Heading::new(H2, "FAQ"), Heading::new(H3, "Shipping")]
        );
    }

    #[test]
    fn normalization_and_dedup_across_competitors() {
        let primary = page(vec![Heading::new(H2, "Frequently  Asked Questions?")]);
        let comps = competitors(vec![
            vec![
                Heading::new(H3, "frequently asked questions"),
                Heading::new(H4, "Returns"),
            ],
            vec![Heading::new(H2, "RETURNS."), Heading::new(H2, "  ")],
        ]);
        assert_eq!(missing_topics(&primary, &comps), vec![Heading::new(H4, "Returns")]);
    }

    #[test]
    fn nothing_missing_without_competitors() {
        let primary = page(vec![Heading::new(H2, "Overview")]);
        assert!(missing_topics(&primary, &CompetitorAggregate::default()).is_empty());
    }
}
