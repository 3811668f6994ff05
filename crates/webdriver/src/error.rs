//! Error types for the WebDriver backend

use flowcheck_core::FlowError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Driver process failed to start: {0}")]
    DriverStartup(String),

    #[error("Driver not ready after {0} attempts")]
    DriverHealthCheck(usize),

    #[error("WebDriver error: {0}")]
    WebDriver(String),

    #[error("Unsupported browser: {0}")]
    UnsupportedBrowser(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<thirtyfour::error::WebDriverError> for SessionError {
    fn from(e: thirtyfour::error::WebDriverError) -> Self {
        SessionError::WebDriver(e.to_string())
    }
}

impl From<SessionError> for FlowError {
    fn from(e: SessionError) -> Self {
        FlowError::Driver(e.to_string())
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
