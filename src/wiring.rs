//! Declarative Token Wiring
//!
//! Builds a [`Tokenizer`] from a YAML document that names each token and
//! where its value comes from.
//!
//! # Example
//!
//! ```yaml
//! strict: true
//! case_sensitive: false
//! wildcard_settings: true
//! tokens:
//!   app:    { kind: static, value: "Solder" }
//!   db:     { kind: setting, key: database.name }
//!   home:   { kind: env, var: HOME, default: "/" }
//!   user:   { kind: context, key: user }
//!   today:  { kind: property, type: DateTime, member: Today }
//!   getenv: { kind: method, type: Environment, member: GetEnvironmentVariable, params: [string] }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use solder_tokens::{
    CaseSensitivity, DynamicValue, DynamicWildcard, Expansion, MemberRegistry, ResolutionError,
    StaticValue, TokenError, TokenReplacement, TokenStrategies, Tokenizer, ValueKind,
};

use crate::settings::AppSettings;
use crate::storage::{contextual_token, ContextualStorage};

#[derive(Debug, Error)]
pub enum WiringError {
    #[error("Failed to read token config from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid token config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Token '{token}' references missing setting '{key}'")]
    MissingSetting { token: String, key: String },

    #[error("Token '{token}' needs contextual storage but none was provided")]
    NoStorage { token: String },

    #[error("Token '{token}' could not be resolved: {source}")]
    Resolution {
        token: String,
        #[source]
        source: ResolutionError,
    },

    #[error(transparent)]
    Tokenizer(#[from] TokenError),
}

/// Where a token's value comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TokenSource {
    /// Fixed value.
    Static { value: Value },

    /// Application setting, read once at wiring time.
    Setting { key: String },

    /// Environment variable, read at expansion time.
    Env {
        var: String,
        #[serde(default)]
        default: Option<String>,
    },

    /// Contextual storage entry, read at expansion time.
    Context { key: String },

    /// Registered static property.
    Property {
        #[serde(rename = "type")]
        type_name: String,
        member: String,
    },

    /// Registered static method; token arguments are converted to `params`.
    Method {
        #[serde(rename = "type")]
        type_name: String,
        member: String,
        #[serde(default)]
        params: Vec<ValueKind>,
    },
}

/// Token configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenConfig {
    #[serde(default)]
    pub strict: bool,

    #[serde(default = "default_case_sensitive")]
    pub case_sensitive: bool,

    /// Resolve unregistered tokens against the settings tree.
    #[serde(default)]
    pub wildcard_settings: bool,

    #[serde(default)]
    pub tokens: BTreeMap<String, TokenSource>,
}

fn default_case_sensitive() -> bool {
    true
}

/// What a [`TokenConfig`] is built against.
#[derive(Clone, Default)]
pub struct WiringContext {
    pub settings: AppSettings,
    pub members: MemberRegistry,
    pub storage: Option<Arc<dyn ContextualStorage>>,
}

impl WiringContext {
    /// Settings plus the builtin member registry, no storage.
    pub fn new(settings: AppSettings) -> Self {
        Self {
            settings,
            members: MemberRegistry::with_builtins(),
            storage: None,
        }
    }

    pub fn with_storage(mut self, storage: Arc<dyn ContextualStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_members(mut self, members: MemberRegistry) -> Self {
        self.members = members;
        self
    }
}

impl TokenConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, WiringError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, WiringError> {
        let path = path.as_ref();
        info!("Loading token config from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| WiringError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Resolve every token source and build the tokenizer.
    pub fn build(&self, ctx: &WiringContext) -> Result<WiredTokenizer, WiringError> {
        let mut strategies = TokenStrategies::new();

        for (token, source) in &self.tokens {
            debug!("Wiring token {} from {:?}", token, source);
            match source {
                TokenSource::Static { value } => {
                    strategies.insert(token.clone(), StaticValue::new(value.clone()));
                }
                TokenSource::Setting { key } => {
                    let value = ctx.settings.get(key).ok_or_else(|| WiringError::MissingSetting {
                        token: token.clone(),
                        key: key.clone(),
                    })?;
                    strategies.insert(token.clone(), StaticValue::new(value));
                }
                TokenSource::Env { var, default } => {
                    strategies.insert(token.clone(), env_token(var.clone(), default.clone()));
                }
                TokenSource::Context { key } => {
                    let storage = ctx.storage.clone().ok_or_else(|| WiringError::NoStorage {
                        token: token.clone(),
                    })?;
                    strategies.insert(token.clone(), contextual_token(storage, key.clone()));
                }
                TokenSource::Property { type_name, member } => {
                    let strategy = ctx
                        .members
                        .resolve_property(type_name, member)
                        .map_err(|source| WiringError::Resolution {
                            token: token.clone(),
                            source,
                        })?;
                    strategies.insert(token.clone(), strategy);
                }
                TokenSource::Method {
                    type_name,
                    member,
                    params,
                } => {
                    let strategy = ctx
                        .members
                        .resolve_method(type_name, member, params)
                        .map_err(|source| WiringError::Resolution {
                            token: token.clone(),
                            source,
                        })?;
                    strategies.insert(token.clone(), strategy);
                }
            }
        }

        let case_sensitivity = if self.case_sensitive {
            CaseSensitivity::Sensitive
        } else {
            CaseSensitivity::Insensitive
        };
        let tokenizer = Tokenizer::builder()
            .strategies(strategies)
            .strict(self.strict)
            .case_sensitivity(case_sensitivity)
            .build()?;

        // Misses are errors; the tokenizer's mode decides abort vs verbatim
        let wildcard = self
            .wildcard_settings
            .then(|| DynamicWildcard::new(vec![ctx.settings.to_value()]).strict(true));

        info!(
            "Wired {} tokens (strict: {}, settings wildcard: {})",
            tokenizer.strategies().len(),
            self.strict,
            wildcard.is_some()
        );

        Ok(WiredTokenizer {
            tokenizer,
            wildcard,
        })
    }
}

fn env_token(var: String, default: Option<String>) -> DynamicValue {
    DynamicValue::named(format!("env {var}"), move |_args| {
        match (std::env::var(&var), &default) {
            (Ok(value), _) => Ok(Value::String(value)),
            (Err(_), Some(fallback)) => Ok(Value::String(fallback.clone())),
            (Err(e), None) => Err(e.into()),
        }
    })
}

/// A tokenizer with its optional settings wildcard.
#[derive(Debug)]
pub struct WiredTokenizer {
    tokenizer: Tokenizer,
    wildcard: Option<DynamicWildcard>,
}

impl WiredTokenizer {
    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn wildcard(&self) -> Option<&DynamicWildcard> {
        self.wildcard.as_ref()
    }

    pub fn expand_tokens(&self, input: &str) -> Result<String, TokenError> {
        self.expand(input).map(Expansion::into_output)
    }

    pub fn expand(&self, input: &str) -> Result<Expansion, TokenError> {
        let wildcard = self
            .wildcard
            .as_ref()
            .map(|w| w as &dyn TokenReplacement);
        self.tokenizer.expand(input, wildcard)
    }
}
