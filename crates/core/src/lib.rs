pub mod config;
pub mod error;
pub mod host;
pub mod namespace;

pub use config::Config;
pub use error::*;
pub use host::*;
pub use namespace::NamespacePath;

/// Tag the host must observe for personalized contexts to activate.
///
/// Every generated artifact's match predicate is conjoined with this tag;
/// the engine declares it while enabled and withdraws it on disable.
pub const ENABLE_TAG: &str = "personalization";
