//! Solder: cross-cutting helpers
//!
//! - Token expansion (`${token}` templates) via the `solder-tokens` crate
//! - Application settings loaded from YAML with environment overrides
//! - Contextual (ambient) key/value storage
//! - Declarative token wiring from a YAML config
//!
//! The `solder` binary (feature `cli`) expands templates from the command line.

pub mod settings;
pub mod storage;
pub mod wiring;

// Re-export the token engine
pub use solder_tokens as tokens;
pub use solder_tokens::{
    DynamicValue, DynamicWildcard, Expansion, StaticValue, TokenError, TokenReplacement,
    TokenStrategies, Tokenizer,
};

pub use settings::{AppSettings, SettingsError};
pub use storage::{
    contextual_token, ContextualStorage, KeyComparison, SharedStorage, StorageError, ThreadStorage,
};
pub use wiring::{TokenConfig, TokenSource, WiredTokenizer, WiringContext, WiringError};
