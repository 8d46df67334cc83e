//! Browser-style client for the OpenEMR web interface.
//!
//! - `transport`: cookie-holding HTTP seam (`EmrTransport`) with a real and a mock impl
//! - `scrape`: regex extraction of CSRF tokens and created-entity identifiers
//! - `forms`: pure payload builders, one per form
//! - `session`: the authenticated session that ties the three together

pub mod endpoints;
pub mod forms;
pub mod scrape;
pub mod session;
pub mod transport;

pub use forms::*;
pub use session::*;
pub use transport::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmrError {
    #[error("OpenEMR is not reachable at {0}")]
    Connection(String),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("HTTP {status} from {page}")]
    HttpStatus { status: u16, page: String },

    #[error("Could not get CSRF token from {0}")]
    MissingCsrfToken(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Could not confirm {0} ID in response")]
    IdentifierNotFound(&'static str),

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}
