use thiserror::Error;

/// Failure to turn raw bytes into a page structure.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("document is not valid UTF-8: {0}")]
    Decode(#[from] std::str::Utf8Error),
    #[error("document is empty")]
    Empty,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{url} timed out")]
    Timeout { url: String },
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("search API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("search response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("completion response contained no text")]
    Empty,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to pack document: {0}")]
    Pack(String),
}

/// Errors that abort a run. Skipped sources are reported as warnings instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    Input(String),
    #[error("could not read primary page {path}: {source}")]
    Primary {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Truncate a response body for inclusion in an error message.
pub(crate) fn excerpt(body: &str) -> String {
    const MAX: usize = 300;
    if body.chars().count() <= MAX {
        body.trim().to_string()
    } else {
        let cut: String = body.chars().take(MAX).collect();
        format!("{}...", cut.trim_end())
    }
}
