use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::extract::{load_structure, Heading, PageStructure};
use crate::fetch::PageFetcher;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompetitorSource {
    File(PathBuf),
    Url(String),
}

impl fmt::Display for CompetitorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(p) => write!(f, "{}", p.display()),
            Self::Url(u) => f.write_str(u),
        }
    }
}

/// How competitor headings are presented to the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AggregateMode {
    /// One block per competitor with its own meta fields.
    #[default]
    PerPage,
    /// All competitor headings merged into a single list.
    Flat,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompetitorPage {
    pub source: String,
    pub structure: PageStructure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSource {
    pub source: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CompetitorAggregate {
    pub pages: Vec<CompetitorPage>,
    pub skipped: Vec<SkippedSource>,
}

impl CompetitorAggregate {
    pub fn flat_headings(&self) -> Vec<Heading> {
        self.pages
            .iter()
            .flat_map(|p| p.structure.headings.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AggregateOptions {
    /// Pause after each network fetch.
    pub delay: Duration,
    /// Upper bound of a random extra pause added to `delay`.
    pub jitter: Duration,
}

/// Extract every competitor source in order. A source that cannot be read,
/// fetched or decoded is recorded in `skipped` and the rest carry on.
pub async fn aggregate<F: PageFetcher>(
    sources: &[CompetitorSource],
    fetcher: &F,
    options: &AggregateOptions,
) -> CompetitorAggregate {
    let mut result = CompetitorAggregate::default();
    let last_url = sources
        .iter()
        .rposition(|s| matches!(s, CompetitorSource::Url(_)));

    let pb = ProgressBar::new(sources.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    for (i, source) in sources.iter().enumerate() {
        let name = source.to_string();
        pb.set_message(name.clone());

        match load_source(source, fetcher).await {
            Ok(structure) => {
                info!(source = %name, headings = structure.headings.len(), "extracted competitor");
                result.pages.push(CompetitorPage {
                    source: name,
                    structure,
                });
            }
            Err(reason) => {
                warn!("Skipping {}: {}", name, reason);
                result.skipped.push(SkippedSource {
                    source: name,
                    reason,
                });
            }
        }
        pb.inc(1);

        if matches!(source, CompetitorSource::Url(_)) && Some(i) != last_url {
            let pause = pause_for(options);
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }
    }

    pb.finish_and_clear();
    info!(
        "Competitors: {} extracted, {} skipped",
        result.pages.len(),
        result.skipped.len()
    );
    result
}

async fn load_source<F: PageFetcher>(
    source: &CompetitorSource,
    fetcher: &F,
) -> Result<PageStructure, String> {
    let bytes = match source {
        CompetitorSource::File(path) => tokio::fs::read(path).await.map_err(|e| e.to_string())?,
        CompetitorSource::Url(url) => fetcher
            .fetch(url)
            .await
            .map_err(|e| e.to_string())?
            .into_bytes(),
    };
    load_structure(&bytes).map_err(|e| e.to_string())
}

fn pause_for(options: &AggregateOptions) -> Duration {
    let jitter_ms = options.jitter.as_millis() as u64;
    if jitter_ms == 0 {
        return options.delay;
    }
    options.delay + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
}
