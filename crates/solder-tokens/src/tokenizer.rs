//! Tokenizer
//!
//! Expands `${...}` token expressions in a string using registered
//! [`TokenReplacement`] strategies, with an optional per-call wildcard.
//!
//! Resolution order for each token:
//! 1. Strategy registered under the lookup key
//! 2. Wildcard strategy, if one was passed to the call
//! 3. Otherwise the token is unknown
//!
//! A resolved value then walks the logical property path (`${a.b.c}` walks
//! `b` then `c`) and is rendered to text.
//!
//! In strict mode the first failure aborts the call. In loose mode a failed
//! token is left in the output exactly as written.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

use crate::error::{FailureReason, TokenError};
use crate::grammar::{self, TokenExpression};
use crate::property::{resolve_path, stringify};
use crate::strategy::{TokenReplacement, TokenStrategies};

/// How lookup keys are matched against registered strategy keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseSensitivity {
    #[default]
    Sensitive,
    /// Exact match first, then a match ignoring ASCII case.
    Insensitive,
}

/// Result of a single expansion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    /// The substituted text.
    pub output: String,
    /// Tokens left verbatim because they could not be resolved (loose mode).
    pub unresolved: usize,
    lookup_keys: BTreeSet<String>,
}

impl Expansion {
    /// Distinct lookup keys seen during the call, sorted.
    pub fn ordered_tokens(&self) -> Vec<String> {
        self.lookup_keys.iter().cloned().collect()
    }

    pub fn into_output(self) -> String {
        self.output
    }
}

/// Token expansion engine.
///
/// Built once and reused; safe to share across threads.
#[derive(Debug)]
pub struct Tokenizer {
    strategies: TokenStrategies,
    strict: bool,
    case_sensitivity: CaseSensitivity,
    /// lower-cased key → registered key, populated for case-insensitive lookup
    folded: HashMap<String, String>,
    previous: Mutex<Vec<String>>,
}

impl Tokenizer {
    /// Case-sensitive tokenizer over `strategies`.
    pub fn new(strategies: TokenStrategies, strict: bool) -> Self {
        Self {
            strategies,
            strict,
            case_sensitivity: CaseSensitivity::Sensitive,
            folded: HashMap::new(),
            previous: Mutex::new(Vec::new()),
        }
    }

    pub fn builder() -> TokenizerBuilder {
        TokenizerBuilder::default()
    }

    pub fn strategies(&self) -> &TokenStrategies {
        &self.strategies
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn case_sensitivity(&self) -> CaseSensitivity {
        self.case_sensitivity
    }

    /// Sorted distinct lookup keys from the most recent call on this instance.
    ///
    /// Concurrent callers overwrite each other here; use [`Self::expand`] to
    /// get the keys for a specific call.
    pub fn ordered_previous_expansion_tokens(&self) -> Vec<String> {
        self.previous
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Expand without a wildcard.
    pub fn expand_tokens(&self, input: &str) -> Result<String, TokenError> {
        self.expand_tokens_with(input, None)
    }

    /// Expand, falling back to `wildcard` for unregistered lookup keys.
    pub fn expand_tokens_with(
        &self,
        input: &str,
        wildcard: Option<&dyn TokenReplacement>,
    ) -> Result<String, TokenError> {
        self.expand(input, wildcard).map(Expansion::into_output)
    }

    /// Expand and return the output together with this call's lookup keys.
    pub fn expand(
        &self,
        input: &str,
        wildcard: Option<&dyn TokenReplacement>,
    ) -> Result<Expansion, TokenError> {
        let mut lookup_keys = BTreeSet::new();

        if input.trim().is_empty() {
            self.remember(&lookup_keys);
            return Ok(Expansion {
                output: input.to_string(),
                unresolved: 0,
                lookup_keys,
            });
        }

        let mut output = String::with_capacity(input.len());
        let mut last_end = 0;
        let mut seen = 0usize;
        let mut unresolved = 0usize;

        for token in grammar::scan(input) {
            seen += 1;
            output.push_str(&input[last_end..token.range.start]);
            last_end = token.range.end;

            let key = token.lookup_key();
            if !key.trim().is_empty() {
                lookup_keys.insert(key.to_string());
            }

            match self.resolve(&token, wildcard) {
                Ok(text) => output.push_str(&text),
                Err(reason) if self.strict => {
                    self.remember(&lookup_keys);
                    warn!("Token expansion aborted at {}: {}", token.matched, reason);
                    return Err(TokenError::Tokenization {
                        matched: token.matched.to_string(),
                        reason,
                    });
                }
                Err(reason) => {
                    debug!("Leaving {} unexpanded: {}", token.matched, reason.tag());
                    unresolved += 1;
                    output.push_str(token.matched);
                }
            }
        }
        output.push_str(&input[last_end..]);

        debug!(
            tokens = seen,
            unresolved,
            keys = lookup_keys.len(),
            "Expanded tokens"
        );
        self.remember(&lookup_keys);

        Ok(Expansion {
            output,
            unresolved,
            lookup_keys,
        })
    }

    fn resolve(
        &self,
        token: &TokenExpression<'_>,
        wildcard: Option<&dyn TokenReplacement>,
    ) -> Result<String, FailureReason> {
        let key = token.lookup_key();
        if key.trim().is_empty() {
            return Err(FailureReason::TokenMissing);
        }

        let args = token.args.as_deref();
        let evaluated = match (self.find(key), wildcard) {
            (Some(strategy), _) => strategy.evaluate(args),
            (None, Some(wildcard)) => wildcard.evaluate_token(key, args),
            (None, None) => return Err(FailureReason::TokenUnknown),
        };
        let value = evaluated.map_err(FailureReason::FunctionException)?;

        let path = token.property_path();
        let value = if path.is_empty() {
            value
        } else {
            resolve_path(&value, &path).map_err(FailureReason::LogicalPropertyExpansionFailed)?
        };

        Ok(stringify(&value))
    }

    fn find(&self, key: &str) -> Option<&dyn TokenReplacement> {
        match self.case_sensitivity {
            CaseSensitivity::Sensitive => self.strategies.get(key),
            CaseSensitivity::Insensitive => self.strategies.get(key).or_else(|| {
                self.folded
                    .get(&key.to_ascii_lowercase())
                    .and_then(|registered| self.strategies.get(registered))
            }),
        }
    }

    fn remember(&self, keys: &BTreeSet<String>) {
        let mut previous = self.previous.lock().unwrap_or_else(PoisonError::into_inner);
        previous.clear();
        previous.extend(keys.iter().cloned());
    }
}

/// Builder for [`Tokenizer`].
#[derive(Debug, Default)]
pub struct TokenizerBuilder {
    strategies: TokenStrategies,
    strict: bool,
    case_sensitivity: CaseSensitivity,
}

impl TokenizerBuilder {
    pub fn strategies(mut self, strategies: TokenStrategies) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn strategy(mut self, key: impl Into<String>, strategy: impl TokenReplacement + 'static) -> Self {
        self.strategies.insert(key, strategy);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn case_sensitivity(mut self, case_sensitivity: CaseSensitivity) -> Self {
        self.case_sensitivity = case_sensitivity;
        self
    }

    /// Fails when a case-insensitive tokenizer has two keys that differ only by case.
    pub fn build(self) -> Result<Tokenizer, TokenError> {
        let mut folded = HashMap::new();

        if self.case_sensitivity == CaseSensitivity::Insensitive {
            for key in self.strategies.keys() {
                if let Some(existing) = folded.insert(key.to_ascii_lowercase(), key.to_string()) {
                    return Err(TokenError::invalid_argument(
                        "strategies",
                        format!("keys '{existing}' and '{key}' collide when case is ignored"),
                    ));
                }
            }
        }

        Ok(Tokenizer {
            strategies: self.strategies,
            strict: self.strict,
            case_sensitivity: self.case_sensitivity,
            folded,
            previous: Mutex::new(Vec::new()),
        })
    }
}
