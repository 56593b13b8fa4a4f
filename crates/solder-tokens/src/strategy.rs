//! Token Replacement Strategies
//!
//! A strategy turns an optional argument array into a replacement value.
//!
//! - [`StaticValue`] - always the same value
//! - [`DynamicValue`] - invokes a callback with the arguments
//! - [`ContextualDynamicValue`] - same, with a shared context threaded through
//! - [`DynamicWildcard`] - resolves unknown tokens against a list of targets

use serde_json::Value;
use std::collections::{btree_map, BTreeMap};
use std::fmt;
use std::sync::Arc;

use crate::error::{BoxError, PathError, StrategyError};
use crate::property::{assign_path, resolve_path};

/// Resolve a token to a replacement value.
pub trait TokenReplacement: Send + Sync {
    /// Evaluate with the call arguments.
    ///
    /// `None` means the token used value semantics (`${name}`), `Some(&[])`
    /// means it was called with no arguments (`${name()}`).
    fn evaluate(&self, args: Option<&[String]>) -> Result<Value, StrategyError>;

    /// Evaluate with the lookup key that selected this strategy.
    ///
    /// Only wildcard strategies care about `token`.
    fn evaluate_token(&self, token: &str, args: Option<&[String]>) -> Result<Value, StrategyError> {
        let _ = token;
        self.evaluate(args)
    }
}

impl<T: TokenReplacement + ?Sized> TokenReplacement for Box<T> {
    fn evaluate(&self, args: Option<&[String]>) -> Result<Value, StrategyError> {
        (**self).evaluate(args)
    }

    fn evaluate_token(&self, token: &str, args: Option<&[String]>) -> Result<Value, StrategyError> {
        (**self).evaluate_token(token, args)
    }
}

impl<T: TokenReplacement + ?Sized> TokenReplacement for Arc<T> {
    fn evaluate(&self, args: Option<&[String]>) -> Result<Value, StrategyError> {
        (**self).evaluate(args)
    }

    fn evaluate_token(&self, token: &str, args: Option<&[String]>) -> Result<Value, StrategyError> {
        (**self).evaluate_token(token, args)
    }
}

// =============================================================================
// STRATEGY MAP
// =============================================================================

/// Registered strategies keyed by lookup key.
#[derive(Default, Clone)]
pub struct TokenStrategies {
    entries: BTreeMap<String, Arc<dyn TokenReplacement>>,
}

impl TokenStrategies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a strategy, replacing any previous one under the same key.
    pub fn insert(&mut self, key: impl Into<String>, strategy: impl TokenReplacement + 'static) {
        self.entries.insert(key.into(), Arc::new(strategy));
    }

    /// Register an already shared strategy.
    pub fn insert_shared(&mut self, key: impl Into<String>, strategy: Arc<dyn TokenReplacement>) {
        self.entries.insert(key.into(), strategy);
    }

    /// Builder-style [`Self::insert`].
    pub fn with(mut self, key: impl Into<String>, strategy: impl TokenReplacement + 'static) -> Self {
        self.insert(key, strategy);
        self
    }

    pub fn get(&self, key: &str) -> Option<&dyn TokenReplacement> {
        self.entries.get(key).map(|s| s.as_ref())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn TokenReplacement)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for TokenStrategies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

impl<K: Into<String>, S: TokenReplacement + 'static> FromIterator<(K, S)> for TokenStrategies {
    fn from_iter<I: IntoIterator<Item = (K, S)>>(iter: I) -> Self {
        let mut strategies = Self::new();
        for (key, strategy) in iter {
            strategies.insert(key, strategy);
        }
        strategies
    }
}

impl<'a> IntoIterator for &'a TokenStrategies {
    type Item = (&'a String, &'a Arc<dyn TokenReplacement>);
    type IntoIter = btree_map::Iter<'a, String, Arc<dyn TokenReplacement>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

// =============================================================================
// STATIC VALUE
// =============================================================================

/// Always returns the value it was built with.
#[derive(Debug, Clone)]
pub struct StaticValue {
    value: Value,
}

impl StaticValue {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl TokenReplacement for StaticValue {
    fn evaluate(&self, _args: Option<&[String]>) -> Result<Value, StrategyError> {
        Ok(self.value.clone())
    }
}

// =============================================================================
// DYNAMIC VALUE
// =============================================================================

type DynamicFn = dyn Fn(Option<&[String]>) -> Result<Value, BoxError> + Send + Sync;

/// Invokes a callback with the token's arguments.
#[derive(Clone)]
pub struct DynamicValue {
    name: String,
    func: Arc<DynamicFn>,
}

impl DynamicValue {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(Option<&[String]>) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self::named("dynamic value", func)
    }

    /// Like [`Self::new`] with a name used in error messages.
    pub fn named<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Option<&[String]>) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Callback that cannot fail.
    pub fn infallible<F>(func: F) -> Self
    where
        F: Fn(Option<&[String]>) -> Value + Send + Sync + 'static,
    {
        Self::new(move |args| Ok(func(args)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for DynamicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicValue")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl TokenReplacement for DynamicValue {
    fn evaluate(&self, args: Option<&[String]>) -> Result<Value, StrategyError> {
        (self.func)(args).map_err(|e| StrategyError::wrap(format!("{} failed", self.name), e))
    }
}

// =============================================================================
// CONTEXTUAL DYNAMIC VALUE
// =============================================================================

/// Invokes a callback with a shared context and the token's arguments.
pub struct ContextualDynamicValue<C: ?Sized> {
    context: Arc<C>,
    #[allow(clippy::type_complexity)]
    func: Arc<dyn Fn(&C, Option<&[String]>) -> Result<Value, BoxError> + Send + Sync>,
}

impl<C: ?Sized + Send + Sync> ContextualDynamicValue<C> {
    pub fn new<F>(context: Arc<C>, func: F) -> Self
    where
        F: Fn(&C, Option<&[String]>) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self {
            context,
            func: Arc::new(func),
        }
    }

    pub fn context(&self) -> &Arc<C> {
        &self.context
    }
}

impl<C: ?Sized> Clone for ContextualDynamicValue<C> {
    fn clone(&self) -> Self {
        Self {
            context: Arc::clone(&self.context),
            func: Arc::clone(&self.func),
        }
    }
}

impl<C: ?Sized> fmt::Debug for ContextualDynamicValue<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextualDynamicValue").finish_non_exhaustive()
    }
}

impl<C: ?Sized + Send + Sync> TokenReplacement for ContextualDynamicValue<C> {
    fn evaluate(&self, args: Option<&[String]>) -> Result<Value, StrategyError> {
        (self.func)(self.context.as_ref(), args)
            .map_err(|e| StrategyError::wrap("contextual dynamic value failed", e))
    }
}

// =============================================================================
// DYNAMIC WILDCARD
// =============================================================================

/// Resolves any token as a logical property path against an ordered list of
/// targets. The first target where the whole path resolves wins.
#[derive(Debug, Clone, Default)]
pub struct DynamicWildcard {
    targets: Vec<Value>,
    strict: bool,
}

impl DynamicWildcard {
    pub fn new(targets: Vec<Value>) -> Self {
        Self {
            targets,
            strict: false,
        }
    }

    /// Lookup and set failures become errors instead of `Null`/`false`.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn push_target(&mut self, target: Value) {
        self.targets.push(target);
    }

    pub fn targets(&self) -> &[Value] {
        &self.targets
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Resolve a dotted path. Non-strict misses give `Ok(None)`.
    pub fn lookup(&self, path: &str) -> Result<Option<Value>, StrategyError> {
        let segments: Vec<&str> = path.split('.').collect();
        let mut last_error: Option<PathError> = None;

        for target in &self.targets {
            match resolve_path(target, &segments) {
                Ok(value) => return Ok(Some(value)),
                Err(e) => last_error = Some(e),
            }
        }

        if !self.strict {
            return Ok(None);
        }
        Err(match last_error {
            Some(e) => StrategyError::wrap(format!("wildcard lookup of '{path}' failed"), e),
            None => StrategyError::new(format!("wildcard lookup of '{path}' failed: no targets")),
        })
    }

    /// Assign `value` at `path` on the first target whose parent path
    /// resolves. Non-strict failures give `Ok(false)`.
    pub fn try_set(&mut self, path: &str, value: Value) -> Result<bool, StrategyError> {
        let segments: Vec<&str> = path.split('.').collect();
        let mut last_error: Option<PathError> = None;

        for target in &mut self.targets {
            match assign_path(target, &segments, value.clone()) {
                Ok(()) => return Ok(true),
                Err(e) => last_error = Some(e),
            }
        }

        if !self.strict {
            return Ok(false);
        }
        Err(match last_error {
            Some(e) => StrategyError::wrap(format!("wildcard set of '{path}' failed"), e),
            None => StrategyError::new(format!("wildcard set of '{path}' failed: no targets")),
        })
    }
}

impl TokenReplacement for DynamicWildcard {
    /// A wildcard needs the token to do anything.
    fn evaluate(&self, _args: Option<&[String]>) -> Result<Value, StrategyError> {
        Err(StrategyError::new("wildcard evaluated without a token"))
    }

    fn evaluate_token(&self, token: &str, _args: Option<&[String]>) -> Result<Value, StrategyError> {
        self.lookup(token).map(Option::unwrap_or_default)
    }
}
