use thiserror::Error;

#[derive(Error, Debug)]
pub enum WikiError {
    #[error("wiki {operation} request failed: {source}")]
    Request {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("wiki {operation} request failed with HTTP {status}")]
    Status {
        operation: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("wiki {operation} response could not be decoded: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("wiki API error {code}: {info}")]
    Api { code: String, info: String },
}

impl WikiError {
    pub(crate) fn request(operation: &'static str, source: reqwest::Error) -> Self {
        Self::Request { operation, source }
    }

    pub(crate) fn decode(operation: &'static str, source: reqwest::Error) -> Self {
        Self::Decode { operation, source }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateError {
    #[error("content aggregation was cancelled")]
    Cancelled,
}
