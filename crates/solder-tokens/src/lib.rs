//! solder-tokens: token expansion engine for Solder
//!
//! Expands `${token}` expressions embedded in text. Each token's lookup key
//! selects a replacement strategy; an optional dotted suffix walks into the
//! resolved value.
//!
//! - `grammar` - token expression recognition
//! - `tokenizer` - strict/loose expansion over a strategy map
//! - `strategy` - static, dynamic, contextual and wildcard strategies
//! - `property` - logical property access over `serde_json::Value`
//! - `members` - named static members wired from configuration
//! - `error` - typed errors
//!
//! # Example
//!
//! ```
//! use solder_tokens::{StaticValue, TokenStrategies, Tokenizer};
//!
//! let strategies = TokenStrategies::new()
//!     .with("greeting", StaticValue::new("hello"))
//!     .with("user", StaticValue::new(serde_json::json!({ "name": "Ada" })));
//! let tokenizer = Tokenizer::new(strategies, true);
//!
//! let out = tokenizer.expand_tokens("${greeting}, ${user.name}!").unwrap();
//! assert_eq!(out, "hello, Ada!");
//! ```

pub mod error;
pub mod grammar;
pub mod members;
pub mod property;
pub mod strategy;
pub mod tokenizer;

pub use error::{BoxError, FailureReason, PathError, ResolutionError, StrategyError, TokenError};
pub use grammar::{TokenExpression, MAX_TOKEN_ID_LEN};
pub use members::{Member, MemberRegistry, ValueKind, Visibility};
pub use property::{assign_path, resolve_path, stringify, to_value, LogicalProperties};
pub use strategy::{
    ContextualDynamicValue, DynamicValue, DynamicWildcard, StaticValue, TokenReplacement,
    TokenStrategies,
};
pub use tokenizer::{CaseSensitivity, Expansion, Tokenizer, TokenizerBuilder};

// Re-export so hosts can build values without a direct serde_json dependency
pub use serde_json::{json, Value};
