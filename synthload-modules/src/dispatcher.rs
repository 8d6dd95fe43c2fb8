//! First-match-wins dispatch of module names to generators

use crate::context::GenerationContext;
use crate::error::Result;
use crate::registry::RuleRegistry;
use crate::runtime::Runtime;
use synthload_core::Module;
use tracing::{debug, info, warn};

/// Result of dispatching one module name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A rule matched and the module was generated and published
    Generated(String),
    /// No rule matched; other providers may still handle the name
    NotFound,
}

impl Outcome {
    pub fn is_generated(&self) -> bool {
        matches!(self, Outcome::Generated(_))
    }
}

/// Walks a registry in order and runs the first matching generator.
///
/// The dispatcher never caches: every call re-runs matching and, on a hit,
/// generation. Skipping already defined modules is the runtime's job.
pub struct Dispatcher<'r> {
    registry: &'r RuleRegistry,
}

impl<'r> Dispatcher<'r> {
    pub fn new(registry: &'r RuleRegistry) -> Self {
        Self { registry }
    }

    /// Resolve `name`, publishing the generated module into `runtime`
    pub fn resolve(&self, name: &str, runtime: &mut Runtime) -> Result<Outcome> {
        let Some((rule, captures)) = self.registry.first_match(name) else {
            debug!("No rule matched {}", name);
            return Ok(Outcome::NotFound);
        };

        debug!(
            "Rule {} matched {} with {} capture(s)",
            rule.pattern(),
            name,
            captures.len()
        );

        let mut ctx = GenerationContext::new(name, captures, runtime);
        if let Err(e) = (rule.generator())(&mut ctx) {
            warn!("Generation of {} failed: {}", name, e);
            return Err(e);
        }
        let module = ctx.finish();

        Self::publish(module, runtime);
        Ok(Outcome::Generated(name.to_string()))
    }

    fn publish(module: Module, runtime: &mut Runtime) {
        info!(
            "Generated module: {} ({} supertype(s), {} dependency(ies))",
            module.name(),
            module.supertypes().len(),
            module.dependencies().len()
        );
        runtime.define(module);
    }
}
