use thiserror::Error;

/// Failures talking to the inverter.
///
/// Only [`FetchError::Connect`], [`FetchError::Timeout`] and [`FetchError::Status`] are transport
/// failures; the run carries them as a status line and skips acquisition-dependent work.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Cannot connect to inverter")]
    Connect,
    #[error("Timeout reading from API: {url}")]
    Timeout { url: String },
    #[error("Inverter answered {status} for {url}")]
    Status { status: u16, url: String },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl FetchError {
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            FetchError::Connect | FetchError::Timeout { .. } | FetchError::Status { .. }
        )
    }
}

/// The inverter answered with a document we do not understand.
#[derive(Debug, Error)]
pub enum ShapeError {
    #[error("unexpected payload structure: {0}")]
    Json(#[from] serde_json::Error),
    #[error("realtime payload has no PAC value for the system")]
    MissingPower,
    #[error("PAC value {0} is not a number")]
    BadPower(String),
    #[error("archive payload has no device {0}")]
    MissingDevice(&'static str),
    #[error("archive payload has no channel {0}")]
    MissingChannel(&'static str),
    #[error("archive offset {seconds}s cannot be placed on today: {source}")]
    Offset {
        seconds: u32,
        #[source]
        source: jiff::Error,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("bad row in {path}: {reason}")]
    Row { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot load chart font {path}: {reason}")]
    Font { path: String, reason: String },
    #[error("chart drawing failed: {0}")]
    Draw(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("time error: {0}")]
    Time(#[from] jiff::Error),
}
