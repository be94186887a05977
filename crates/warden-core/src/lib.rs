//! Configuration, startup wiring and grounded answer composition.

pub mod composer;
pub mod config;
pub mod context;
pub mod error;
pub mod principal;
pub mod prompt;

pub use composer::{Answer, AnswerComposer, Citation, ComposerSettings};
pub use config::Config;
pub use context::RagContext;
pub use error::{RagError, StatusHint};
pub use principal::{Principal, PrincipalResolver, StaticPrincipals};
