mod aggregate;
mod analysis;
mod error;
mod extract;
mod fetch;
mod llm;
mod pipeline;
mod prompt;
mod recommend;
mod render;
mod search;
mod settings;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use chrono::Local;
use clap::{Args, Parser, Subcommand};

use aggregate::{AggregateMode, AggregateOptions, CompetitorSource};
use error::PipelineError;
use fetch::HttpFetcher;
use llm::OpenAiClient;
use pipeline::{RenderMode, RunRequest};
use search::SerperSearcher;
use settings::Settings;

#[derive(Parser)]
#[command(
    name = "content_optimizer",
    about = "Compare a page's heading structure against competitors and get SEO content recommendations"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze competitors, ask the model for recommendations and write a .docx
    Optimize {
        #[command(flatten)]
        analysis: AnalysisArgs,
        /// Output document (default: recommendations-<timestamp>.docx)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Lay out the reply line by line instead of the parsed structure
        #[arg(long)]
        raw_layout: bool,
        /// Model name (overrides OPTIMIZER_MODEL)
        #[arg(long)]
        model: Option<String>,
        /// OpenAI API key (overrides OPTIMIZER_OPENAI_API_KEY)
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Print the extracted title, description, H1 and headings of an HTML file
    Extract {
        file: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the prompt that would be sent, without calling the model
    Prompt {
        #[command(flatten)]
        analysis: AnalysisArgs,
    },
}

#[derive(Args)]
struct AnalysisArgs {
    /// Target keyword
    #[arg(short, long)]
    keyword: String,
    /// Your page's HTML file
    #[arg(short, long)]
    primary: PathBuf,
    /// Competitor HTML file (repeatable)
    #[arg(short, long = "competitor")]
    competitors: Vec<PathBuf>,
    /// Competitor URL to fetch (repeatable)
    #[arg(short, long = "url")]
    urls: Vec<String>,
    /// Discover competitors by searching for the keyword
    #[arg(long)]
    search: bool,
    /// Number of search results to fetch
    #[arg(short = 'n', long)]
    results: Option<usize>,
    /// Public URL of your page, excluded from search results
    #[arg(long)]
    own_url: Option<String>,
    /// Merge all competitor headings into one list in the prompt
    #[arg(long)]
    flat: bool,
    /// Search API key (overrides OPTIMIZER_SEARCH_API_KEY)
    #[arg(long)]
    search_api_key: Option<String>,
}

impl AnalysisArgs {
    fn to_request(&self, settings: &Settings, render: RenderMode) -> RunRequest {
        let competitors = self
            .competitors
            .iter()
            .cloned()
            .map(CompetitorSource::File)
            .chain(self.urls.iter().cloned().map(CompetitorSource::Url))
            .collect();

        RunRequest {
            keyword: self.keyword.trim().to_string(),
            primary: self.primary.clone(),
            own_url: self.own_url.clone(),
            competitors,
            search_results: self
                .search
                .then(|| self.results.unwrap_or(settings.search_results)),
            mode: if self.flat {
                AggregateMode::Flat
            } else {
                AggregateMode::PerPage
            },
            render,
            fetch: AggregateOptions {
                delay: settings.fetch_delay(),
                jitter: settings.fetch_jitter(),
            },
        }
    }

    fn searcher(&self, settings: &Settings) -> anyhow::Result<Option<SerperSearcher>> {
        if !self.search {
            return Ok(None);
        }
        let key = pick_key(self.search_api_key.as_deref(), &settings.search_api_key).ok_or_else(|| {
            PipelineError::Input(
                "--search needs a search API key (--search-api-key or OPTIMIZER_SEARCH_API_KEY)".into(),
            )
        })?;
        Ok(Some(SerperSearcher::new(
            &settings.search_endpoint,
            key,
            settings.fetch_timeout(),
        )?))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load().context("Failed to load settings")?;

    let result = match cli.command {
        Commands::Optimize {
            analysis,
            output,
            raw_layout,
            model,
            api_key,
        } => {
            let api_key = pick_key(api_key.as_deref(), &settings.openai_api_key).ok_or_else(|| {
                PipelineError::Input(
                    "an OpenAI API key is required (--api-key or OPTIMIZER_OPENAI_API_KEY)".into(),
                )
            })?;
            let render = if raw_layout {
                RenderMode::Raw
            } else {
                RenderMode::Structured
            };
            let request = analysis.to_request(&settings, render);
            let fetcher = HttpFetcher::new(settings.fetch_timeout(), &settings.user_agent)?;
            let searcher = analysis.searcher(&settings)?;
            let completer = OpenAiClient::new(
                &settings.openai_base_url,
                api_key,
                model.unwrap_or_else(|| settings.model.clone()),
                settings.temperature,
                settings.completion_timeout(),
            )?;

            let report = pipeline::run(&request, &fetcher, searcher.as_ref(), &completer).await?;

            println!("{}\n", report.recommendation_text.trim());
            print_summary(&report.analysis, report.recommendations.actions.len());

            let path = output.unwrap_or_else(default_output_path);
            std::fs::write(&path, &report.document)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Saved recommendations to {}", path.display());
            Ok(())
        }
        Commands::Extract { file, json } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let structure = extract::load_structure(&bytes)
                .with_context(|| format!("Failed to extract {}", file.display()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&structure)?);
            } else {
                println!("Title:       {}", structure.meta_title);
                println!("Description: {}", structure.meta_description);
                println!("H1:          {}", structure.h1);
                println!("Headings:    {}", structure.headings.len());
                if !structure.headings.is_empty() {
                    println!("\n{}", structure.outline());
                }
            }
            Ok(())
        }
        Commands::Prompt { analysis } => {
            let request = analysis.to_request(&settings, RenderMode::Structured);
            let fetcher = HttpFetcher::new(settings.fetch_timeout(), &settings.user_agent)?;
            let searcher = analysis.searcher(&settings)?;

            let prepared = pipeline::prepare(&request, &fetcher, searcher.as_ref()).await?;
            for message in prepared.messages(&request) {
                println!("--- {:?} ---\n{}\n", message.role, message.content);
            }
            print_summary(&prepared, 0);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// CLI value first, then the configured one; blank counts as missing.
fn pick_key(flag: Option<&str>, configured: &str) -> Option<String> {
    flag.map(str::trim)
        .filter(|k| !k.is_empty())
        .or_else(|| Some(configured.trim()).filter(|k| !k.is_empty()))
        .map(str::to_string)
}

fn print_summary(analysis: &pipeline::Analysis, actions: usize) {
    println!(
        "Compared against {} competitors ({} skipped), {} candidate missing topics, {} actions.",
        analysis.competitors.pages.len(),
        analysis.competitors.skipped.len(),
        analysis.missing.len(),
        actions,
    );
    for warning in &analysis.warnings {
        println!("  warning: {}", warning);
    }
}

fn default_output_path() -> PathBuf {
    PathBuf::from(format!(
        "recommendations-{}.docx",
        Local::now().format("%Y%m%d-%H%M%S")
    ))
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
