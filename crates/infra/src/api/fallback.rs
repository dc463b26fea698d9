//! Opt-in fallback strategies
//!
//! A [`FallbackRegistry`] maps each [`Operation`] to an ordered list of
//! strategies. They are consulted only by
//! [`ResilientClient::fetch_with_fallbacks`](super::ResilientClient::fetch_with_fallbacks);
//! the plain fetch path never substitutes values.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use statline_domain::{ClientError, ErrorReport, Operation, RequestDescriptor};

/// A way to produce a substitute value after a terminal failure
pub trait Fallback: Send + Sync {
    /// Name recorded in the recovery result
    fn name(&self) -> &str;

    /// Substitute value for `request`, or `None` to defer to the next
    /// strategy
    fn recover(&self, request: &RequestDescriptor, error: &ClientError) -> Option<Value>;
}

/// Always returns the same value
#[derive(Debug, Clone)]
pub struct StaticFallback {
    name: String,
    value: Value,
}

impl StaticFallback {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self { name: name.into(), value }
    }

    /// An empty record list
    pub fn empty_list(name: impl Into<String>) -> Self {
        Self::new(name, Value::Array(Vec::new()))
    }
}

impl Fallback for StaticFallback {
    fn name(&self) -> &str {
        &self.name
    }

    fn recover(&self, _request: &RequestDescriptor, _error: &ClientError) -> Option<Value> {
        Some(self.value.clone())
    }
}

type RecoverFn = dyn Fn(&RequestDescriptor, &ClientError) -> Option<Value> + Send + Sync;

/// Closure-backed strategy
pub struct FnFallback {
    name: String,
    recover: Box<RecoverFn>,
}

impl FnFallback {
    pub fn new<F>(name: impl Into<String>, recover: F) -> Self
    where
        F: Fn(&RequestDescriptor, &ClientError) -> Option<Value> + Send + Sync + 'static,
    {
        Self { name: name.into(), recover: Box::new(recover) }
    }
}

impl fmt::Debug for FnFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFallback").field("name", &self.name).finish_non_exhaustive()
    }
}

impl Fallback for FnFallback {
    fn name(&self) -> &str {
        &self.name
    }

    fn recover(&self, request: &RequestDescriptor, error: &ClientError) -> Option<Value> {
        (self.recover)(request, error)
    }
}

/// Ordered fallback strategies per operation
#[derive(Clone, Default)]
pub struct FallbackRegistry {
    strategies: HashMap<Operation, Vec<Arc<dyn Fallback>>>,
}

impl FallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `fallback` to the strategies of `operation`
    pub fn register(&mut self, operation: Operation, fallback: impl Fallback + 'static) {
        self.strategies.entry(operation).or_default().push(Arc::new(fallback));
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, operation: Operation, fallback: impl Fallback + 'static) -> Self {
        self.register(operation, fallback);
        self
    }

    pub fn strategies(&self, operation: Operation) -> &[Arc<dyn Fallback>] {
        self.strategies.get(&operation).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn has_strategies(&self, operation: Operation) -> bool {
        !self.strategies(operation).is_empty()
    }

    /// First value produced by the strategies of `operation`, with the
    /// name of the strategy that produced it
    pub fn recover(
        &self,
        operation: Operation,
        request: &RequestDescriptor,
        error: &ClientError,
    ) -> Option<(String, Value)> {
        self.strategies(operation).iter().find_map(|strategy| {
            strategy.recover(request, error).map(|value| (strategy.name().to_string(), value))
        })
    }
}

impl fmt::Debug for FallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (operation, strategies) in &self.strategies {
            let names: Vec<&str> = strategies.iter().map(|s| s.name()).collect();
            map.entry(operation, &names);
        }
        map.finish()
    }
}

/// Result of [`ResilientClient::fetch_with_fallbacks`](super::ResilientClient::fetch_with_fallbacks)
#[derive(Debug, Clone)]
pub struct Recovery {
    /// Fetched or substituted value
    pub value: Value,
    /// Strategy that produced `value`; `None` when the fetch succeeded
    pub strategy: Option<String>,
    /// Report of the failure that was recovered from
    pub report: Option<ErrorReport>,
}

impl Recovery {
    pub fn is_fallback(&self) -> bool {
        self.strategy.is_some()
    }
}
