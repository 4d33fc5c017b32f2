//! Name-to-pattern registry owned by one ingestor.

use std::collections::HashMap;
use std::sync::Arc;

use super::{
    DescribePattern, FullEmbeddingPattern, HybridPattern, PatternInfo, PatternStrategy,
    SummarizePattern, TextPattern,
};
use crate::error::{IndexError, IndexResult};
use crate::traits::{Embedder, ImageDescriber, ObjectStore, TextSummarizer};

/// Capabilities the built-in patterns are constructed from.
#[derive(Clone)]
pub struct PatternDependencies {
    pub embedder: Arc<dyn Embedder>,
    pub object_store: Arc<dyn ObjectStore>,
    pub describer: Option<Arc<dyn ImageDescriber>>,
    pub summarizer: Option<Arc<dyn TextSummarizer>>,
    pub summarize_min_length: usize,
}

/// Registry of pattern strategies keyed by name.
///
/// Lookups of unregistered names fail with
/// [`IndexError::UnknownPattern`]; there is no fallback pattern.
#[derive(Clone, Default)]
pub struct PatternEngine {
    patterns: HashMap<String, Arc<dyn PatternStrategy>>,
}

impl std::fmt::Debug for PatternEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternEngine")
            .field("patterns", &self.names())
            .finish()
    }
}

impl PatternEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with the built-in patterns.
    ///
    /// `describe` and `summarize` are only registered when their capability
    /// is supplied.
    pub fn with_defaults(deps: PatternDependencies) -> Self {
        let mut engine = Self::new();
        engine.register(Arc::new(TextPattern::new(deps.embedder.clone())));
        engine.register(Arc::new(HybridPattern::new(
            deps.embedder.clone(),
            deps.object_store.clone(),
        )));
        engine.register(Arc::new(FullEmbeddingPattern::new(deps.embedder.clone())));

        if let Some(describer) = deps.describer {
            engine.register(Arc::new(DescribePattern::new(
                deps.embedder.clone(),
                describer,
                deps.object_store.clone(),
            )));
        }
        if let Some(summarizer) = deps.summarizer {
            engine.register(Arc::new(SummarizePattern::new(
                deps.embedder,
                summarizer,
                deps.object_store,
                deps.summarize_min_length,
            )));
        }

        tracing::debug!("Pattern engine initialized with {:?}", engine.names());
        engine
    }

    /// Register a pattern, replacing any pattern with the same name.
    pub fn register(&mut self, pattern: Arc<dyn PatternStrategy>) {
        let name = pattern.name().to_string();
        if self.patterns.insert(name.clone(), pattern).is_some() {
            tracing::warn!("Replaced existing pattern '{}'", name);
        }
    }

    /// Remove a pattern.
    pub fn unregister(&mut self, name: &str) -> IndexResult<Arc<dyn PatternStrategy>> {
        self.patterns
            .remove(name)
            .ok_or_else(|| IndexError::unknown_pattern(name, self.names()))
    }

    /// Look up a pattern by name.
    pub fn get(&self, name: &str) -> IndexResult<Arc<dyn PatternStrategy>> {
        self.patterns
            .get(name)
            .cloned()
            .ok_or_else(|| IndexError::unknown_pattern(name, self.names()))
    }

    /// Whether a pattern is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.patterns.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.patterns.keys().cloned().collect();
        names.sort();
        names
    }

    /// Describe a registered pattern.
    pub fn info(&self, name: &str) -> IndexResult<PatternInfo> {
        self.get(name).map(|p| p.info())
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
