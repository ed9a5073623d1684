pub mod errors;
pub mod models;
pub mod parser;
pub mod providers;

pub use errors::{ErrorCode, ProviderError, ProviderResult};
pub use providers::base::{ApiHandler, ApiStream};
