//! Ordered rule registry

use crate::context::GenerationContext;
use crate::error::Result;
use crate::pattern::{Captures, Pattern, PatternSpec};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Deferred computation that shapes a module under generation
pub type Generator = Arc<dyn Fn(&mut GenerationContext<'_>) -> Result<()> + Send + Sync>;

/// A pattern paired with the generator it triggers
#[derive(Clone)]
pub struct Rule {
    pattern: Pattern,
    generator: Generator,
}

impl Rule {
    pub fn new(pattern: Pattern, generator: Generator) -> Self {
        Self { pattern, generator }
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    /// Whether this rule and `other` share the same generator
    pub fn shares_generator(&self, other: &Rule) -> bool {
        Arc::ptr_eq(&self.generator, &other.generator)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

/// Rules in registration order; the first registered is the first tried
#[derive(Debug, Clone)]
pub struct RuleRegistry {
    separator: String,
    rules: Vec<Rule>,
}

impl RuleRegistry {
    /// Create an empty registry compiling globs against `separator`
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
            rules: Vec::new(),
        }
    }

    /// Register a generator for a pattern.
    ///
    /// A list pattern becomes one rule per element, in list order, all
    /// sharing the generator. Nothing is registered if any element fails
    /// to compile. Returns the number of rules added.
    pub fn register<P, G>(&mut self, pattern: P, generator: G) -> Result<usize>
    where
        P: Into<PatternSpec>,
        G: Fn(&mut GenerationContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.register_shared(pattern, Arc::new(generator))
    }

    /// Register an already shared generator
    pub fn register_shared<P: Into<PatternSpec>>(&mut self, pattern: P, generator: Generator) -> Result<usize> {
        let patterns = pattern.into().compile(&self.separator)?;
        let added = patterns.len();
        for pattern in patterns {
            trace!("Registered rule #{}: {}", self.rules.len(), pattern);
            self.rules.push(Rule::new(pattern, generator.clone()));
        }
        Ok(added)
    }

    /// The first rule matching `name`, with its captures
    pub fn first_match(&self, name: &str) -> Option<(&Rule, Captures)> {
        self.rules
            .iter()
            .find_map(|rule| rule.pattern.match_name(name).map(|caps| (rule, caps)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new("::")
    }
}
