//! HTTP surface: entropy ingestion and issuance, plus the thin envelope
//! record stores that sealed messages and files are handed to.

pub mod entropy;
pub mod error;
pub mod files;
pub mod messages;
pub mod middleware;
pub mod objects;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, AppStateInner};
