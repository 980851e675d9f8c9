use std::fmt;
use std::path::PathBuf;

use chrono::Local;
use tracing::{info, warn};

use crate::aggregate::{
    aggregate, AggregateMode, AggregateOptions, CompetitorAggregate, CompetitorSource,
    SkippedSource,
};
use crate::analysis::missing_topics;
use crate::error::{ExtractError, PipelineError};
use crate::extract::{load_structure, Heading, PageStructure};
use crate::fetch::PageFetcher;
use crate::llm::{ChatMessage, CompletionClient};
use crate::prompt::{build_messages, PromptInput};
use crate::recommend::{parse_recommendations, Recommendations};
use crate::render::{layout, layout_raw, write_docx, DocBlock, LayoutContext};
use crate::search::{competitor_urls, WebSearcher};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenderMode {
    /// Lay out the parsed structure.
    #[default]
    Structured,
    /// Lay out the reply line by line.
    Raw,
}

/// Everything one run needs, passed explicitly.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub keyword: String,
    pub primary: PathBuf,
    /// Public URL of the primary page, excluded from search results.
    pub own_url: Option<String>,
    pub competitors: Vec<CompetitorSource>,
    /// Number of search results to use; `None` disables search.
    pub search_results: Option<usize>,
    pub mode: AggregateMode,
    pub render: RenderMode,
    pub fetch: AggregateOptions,
}

impl RunRequest {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.keyword.trim().is_empty() {
            return Err(PipelineError::Input("a target keyword is required".into()));
        }
        if self.competitors.is_empty() && self.search_results.is_none() {
            return Err(PipelineError::Input(
                "provide competitor files or URLs, or enable search".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    PrimaryExtraction(String),
    Search(String),
    Skipped(SkippedSource),
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrimaryExtraction(e) => write!(f, "primary page could not be parsed: {}", e),
            Self::Search(e) => write!(f, "search failed: {}", e),
            Self::Skipped(s) => write!(f, "skipped {}: {}", s.source, s.reason),
        }
    }
}

/// Result of the local stages, before the model is called.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub primary: PageStructure,
    pub competitors: CompetitorAggregate,
    pub missing: Vec<Heading>,
    pub warnings: Vec<Warning>,
}

impl Analysis {
    pub fn messages(&self, request: &RunRequest) -> Vec<ChatMessage> {
        build_messages(&PromptInput {
            keyword: &request.keyword,
            primary: &self.primary,
            competitors: &self.competitors,
            missing: &self.missing,
            mode: request.mode,
        })
    }
}

pub struct RunReport {
    pub analysis: Analysis,
    pub recommendation_text: String,
    pub recommendations: Recommendations,
    pub blocks: Vec<DocBlock>,
    pub document: Vec<u8>,
}

/// Extract the primary page, discover and aggregate competitors, and find
/// missing topics.
pub async fn prepare<F, S>(
    request: &RunRequest,
    fetcher: &F,
    searcher: Option<&S>,
) -> Result<Analysis, PipelineError>
where
    F: PageFetcher,
    S: WebSearcher,
{
    request.validate()?;
    let mut warnings = Vec::new();

    let path = request.primary.display().to_string();
    let bytes = tokio::fs::read(&request.primary)
        .await
        .map_err(|source| PipelineError::Primary {
            path: path.clone(),
            source,
        })?;
    let primary = match load_structure(&bytes) {
        Ok(s) => s,
        Err(ExtractError::Empty) => {
            return Err(PipelineError::Input(format!("primary page {} is empty", path)))
        }
        Err(e) => {
            warn!("Error extracting content structure: {}", e);
            warnings.push(Warning::PrimaryExtraction(e.to_string()));
            PageStructure::default()
        }
    };
    info!(headings = primary.headings.len(), "extracted primary page");

    let mut sources = request.competitors.clone();
    if let (Some(limit), Some(searcher)) = (request.search_results, searcher) {
        // One spare hit so the user's own page does not cost a competitor.
        match searcher.search(&request.keyword, limit + 1).await {
            Ok(hits) => {
                let found: Vec<CompetitorSource> = competitor_urls(&hits, request.own_url.as_deref())
                    .into_iter()
                    .map(CompetitorSource::Url)
                    .filter(|s| !sources.contains(s))
                    .take(limit)
                    .collect();
                info!("Search returned {} new competitor URLs", found.len());
                sources.extend(found);
            }
            Err(e) => {
                warn!("Search failed: {}", e);
                warnings.push(Warning::Search(e.to_string()));
            }
        }
    }
    if sources.is_empty() {
        return Err(PipelineError::Input(
            "no competitor pages to compare against".into(),
        ));
    }

    let competitors = aggregate(&sources, fetcher, &request.fetch).await;
    warnings.extend(competitors.skipped.iter().cloned().map(Warning::Skipped));

    let missing = missing_topics(&primary, &competitors);
    info!("{} candidate missing topics", missing.len());

    Ok(Analysis {
        primary,
        competitors,
        missing,
        warnings,
    })
}

/// Full run: local analysis, completion, parse and render. Skipped sources
/// are warnings in the report; a failed completion aborts with no document.
pub async fn run<F, S, C>(
    request: &RunRequest,
    fetcher: &F,
    searcher: Option<&S>,
    completer: &C,
) -> Result<RunReport, PipelineError>
where
    F: PageFetcher,
    S: WebSearcher,
    C: CompletionClient,
{
    let analysis = prepare(request, fetcher, searcher).await?;

    let messages = analysis.messages(request);
    let recommendation_text = completer.complete(&messages).await?;

    let recommendations = parse_recommendations(&recommendation_text);
    if recommendations.is_empty() {
        warn!("The reply matched none of the expected sections");
    } else if !recommendations.unclassified.is_empty() {
        warn!(
            "{} lines of the reply matched no known section",
            recommendations.unclassified.len()
        );
    }

    let ctx = LayoutContext {
        keyword: &request.keyword,
        generated_at: Local::now(),
        primary: &analysis.primary,
        missing: &analysis.missing,
        skipped: &analysis.competitors.skipped,
    };
    let blocks = match request.render {
        RenderMode::Structured => layout(&recommendations, &ctx),
        RenderMode::Raw => layout_raw(&recommendation_text, &ctx),
    };
    let document = write_docx(&blocks)?;

    Ok(RunReport {
        analysis,
        recommendation_text,
        recommendations,
        blocks,
        document,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CompletionError, FetchError, SearchError};
    use crate::extract::HeadingLevel::{H2, H3};
    use crate::search::SearchHit;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const ECHO_REPLY: &str = "**Content Recommendations:**\n\n---\n\n**Add New Section: H2 - FAQ**\n\n- **Placement:** After \"Overview\"\n- **Details:** Answer common questions.\n\n---\n\n**Add New Section: H3 - Shipping**\n\n- **Placement:** Under \"Pricing\"\n- **Details:** Delivery times and costs.\n";

    struct MockFetcher(HashMap<String, String>);

    impl PageFetcher for MockFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.0.get(url).cloned().ok_or(FetchError::Status {
                url: url.to_string(),
                status: 503,
            })
        }
    }

    struct MockSearcher(Result<Vec<&'static str>, ()>);

    impl WebSearcher for MockSearcher {
        async fn search(&self, _query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
            match &self.0 {
                Ok(urls) => Ok(urls
                    .iter()
                    .take(limit)
                    .enumerate()
                    .map(|(i, u)| SearchHit {
                        url: u.to_string(),
                        title: String::new(),
                        position: i as u32 + 1,
                    })
                    .collect()),
                Err(()) => Err(SearchError::Status {
                    status: 401,
                    body: "invalid key".into(),
                }),
            }
        }
    }

    /// Records the prompt and replies with a fixed string.
    struct EchoCompleter {
        reply: Option<&'static str>,
        prompts: Mutex<Vec<String>>,
    }

    impl EchoCompleter {
        fn replying(reply: &'static str) -> Self {
            Self {
                reply: Some(reply),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: None,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl CompletionClient for EchoCompleter {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
            let prompt = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            self.prompts.lock().unwrap().push(prompt);
            match self.reply {
                Some(r) => Ok(r.to_string()),
                None => Err(CompletionError::Status {
                    status: 500,
                    body: "upstream error".into(),
                }),
            }
        }
    }

    fn no_fetch() -> MockFetcher {
        MockFetcher(HashMap::new())
    }

    fn request(competitors: Vec<CompetitorSource>) -> RunRequest {
        RunRequest {
            keyword: "widgets".into(),
            primary: "tests/fixtures/primary.html".into(),
            own_url: None,
            competitors,
            search_results: None,
            mode: AggregateMode::PerPage,
            render: RenderMode::Structured,
            fetch: AggregateOptions::default(),
        }
    }

    fn competitor_file() -> CompetitorSource {
        CompetitorSource::File("tests/fixtures/competitor.html".into())
    }

    #[tokio::test]
    async fn end_to_end_faq_and_shipping() {
        let completer = EchoCompleter::replying(ECHO_REPLY);
        let report = run(
            &request(vec![competitor_file()]),
            &no_fetch(),
            None::<&MockSearcher>,
            &completer,
        )
        .await
        .unwrap();

        assert_eq!(
            report.analysis.primary.headings,
            vec![Heading::new(H2, "Overview"), Heading::new(H3, "Pricing")]
        );
        assert_eq!(
            report.analysis.missing,
            vec![Heading::new(H2, "FAQ"), Heading::new(H3, "Shipping")]
        );

        let prompts = completer.prompts.lock().unwrap();
        assert!(prompts[0].contains("absent from the original):\nH2: FAQ\nH3: Shipping"));

        let leveled: Vec<(u8, &str)> = report
            .blocks
            .iter()
            .filter_map(|b| match b {
                DocBlock::Heading { level, text } => Some((*level, text.as_str())),
                _ => None,
            })
            .collect();
        assert!(leveled.contains(&(2, "FAQ")));
        assert!(leveled.contains(&(3, "Shipping")));
        assert!(report.document.starts_with(b"PK"));
        assert!(report.analysis.warnings.is_empty());
    }

    #[tokio::test]
    async fn failed_competitor_is_a_warning() {
        let fetcher = MockFetcher(HashMap::from([(
            "https://ok.example".to_string(),
            "<h2>Returns</h2>".to_string(),
        )]));
        let req = request(vec![
            competitor_file(),
            CompetitorSource::Url("https://down.example".into()),
            CompetitorSource::Url("https://ok.example".into()),
        ]);
        let report = run(
            &req,
            &fetcher,
            None::<&MockSearcher>,
            &EchoCompleter::replying(ECHO_REPLY),
        )
        .await
        .unwrap();

        assert_eq!(report.analysis.competitors.pages.len(), 2);
        assert_eq!(report.analysis.warnings.len(), 1);
        assert!(matches!(
            &report.analysis.warnings[0],
            Warning::Skipped(s) if s.source == "https://down.example"
        ));
        assert!(report
            .blocks
            .contains(&DocBlock::Heading { level: 1, text: "Skipped Sources".into() }));
    }

    #[tokio::test]
    async fn completion_failure_aborts() {
        let err = run(
            &request(vec![competitor_file()]),
            &no_fetch(),
            None::<&MockSearcher>,
            &EchoCompleter::failing(),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, PipelineError::Completion(_)));
    }

    #[tokio::test]
    async fn input_errors_fail_fast() {
        let mut req = request(vec![competitor_file()]);
        req.keyword = "  ".into();
        let err = prepare(&req, &no_fetch(), None::<&MockSearcher>).await.unwrap_err();
        assert!(matches!(err, PipelineError::Input(_)));

        let err = prepare(&request(vec![]), &no_fetch(), None::<&MockSearcher>)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Input(_)));

        let mut req = request(vec![competitor_file()]);
        req.primary = "tests/fixtures/nope.html".into();
        let err = prepare(&req, &no_fetch(), None::<&MockSearcher>).await.unwrap_err();
        assert!(matches!(err, PipelineError::Primary { .. }));
    }

    #[tokio::test]
    async fn search_hits_become_competitors() {
        let fetcher = MockFetcher(HashMap::from([
            ("https://a.example/w".to_string(), "<h2>Warranty</h2>".to_string()),
            ("https://b.example/w".to_string(), "<h2>Overview</h2>".to_string()),
        ]));
        let searcher = MockSearcher(Ok(vec![
            "https://mysite.example/widgets",
            "https://a.example/w",
            "https://b.example/w",
        ]));
        let mut req = request(vec![]);
        req.search_results = Some(3);
        req.own_url = Some("https://mysite.example/widgets".into());

        let analysis = prepare(&req, &fetcher, Some(&searcher)).await.unwrap();
        let sources: Vec<&str> = analysis
            .competitors
            .pages
            .iter()
            .map(|p| p.source.as_str())
            .collect();
        assert_eq!(sources, vec!["https://a.example/w", "https://b.example/w"]);
        assert_eq!(analysis.missing, vec![Heading::new(H2, "Warranty")]);
    }

    #[tokio::test]
    async fn own_page_in_results_does_not_reduce_competitor_count() {
        let fetcher = MockFetcher(HashMap::from([
            ("https://a.example/w".to_string(), "<h2>Warranty</h2>".to_string()),
            ("https://b.example/w".to_string(), "<h2>Returns</h2>".to_string()),
            ("https://c.example/w".to_string(), "<h2>Care</h2>".to_string()),
        ]));
        let searcher = MockSearcher(Ok(vec![
            "https://mysite.example/widgets",
            "https://a.example/w",
            "https://b.example/w",
            "https://c.example/w",
        ]));
        let mut req = request(vec![]);
        req.search_results = Some(2);
        req.own_url = Some("https://mysite.example/widgets".into());

        let analysis = prepare(&req, &fetcher, Some(&searcher)).await.unwrap();
        let sources: Vec<&str> = analysis
            .competitors
            .pages
            .iter()
            .map(|p| p.source.as_str())
            .collect();
        assert_eq!(sources, vec!["https://a.example/w", "https://b.example/w"]);
    }

    #[tokio::test]
    async fn search_failure_falls_back_to_given_competitors() {
        let mut req = request(vec![competitor_file()]);
        req.search_results = Some(5);
        let analysis = prepare(&req, &no_fetch(), Some(&MockSearcher(Err(()))))
            .await
            .unwrap();
        assert_eq!(analysis.competitors.pages.len(), 1);
        assert!(matches!(&analysis.warnings[0], Warning::Search(e) if e.contains("401")));

        let mut req = request(vec![]);
        req.search_results = Some(5);
        let err = prepare(&req, &no_fetch(), Some(&MockSearcher(Err(()))))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Input(_)));
    }

    #[tokio::test]
    async fn raw_render_mode() {
        let mut req = request(vec![competitor_file()]);
        req.render = RenderMode::Raw;
        let report = run(
            &req,
            &no_fetch(),
            None::<&MockSearcher>,
            &EchoCompleter::replying("H2: FAQ\nSome advice."),
        )
        .await
        .unwrap();
        assert!(report
            .blocks
            .contains(&DocBlock::Heading { level: 2, text: "FAQ".into() }));
        assert_eq!(report.recommendations.actions.len(), 1);
    }
}
