//! Pre/post lifecycle hooks registered per model type.

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{OdmError, Result};
use crate::model::ModelInstance;

/// Lifecycle events hooks can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    Validate,
    Save,
    Load,
    Remove,
}

impl HookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::Validate => "validate",
            HookEvent::Save => "save",
            HookEvent::Load => "load",
            HookEvent::Remove => "remove",
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookEvent {
    type Err = OdmError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "validate" => Ok(HookEvent::Validate),
            "save" => Ok(HookEvent::Save),
            "load" => Ok(HookEvent::Load),
            "remove" => Ok(HookEvent::Remove),
            other => Err(OdmError::hook(format!("unknown hook event `{}`", other))),
        }
    }
}

/// A registered hook. Receives the instance the event concerns; an `Err`
/// stops the hook chain.
pub type Hook = Arc<dyn Fn(ModelInstance) -> BoxFuture<'static, Result<()>> + Send + Sync>;

#[derive(Clone, Copy)]
enum Phase {
    Pre,
    Post,
}

/// Ordered hook lists per (phase, event).
#[derive(Default)]
pub struct HookRegistry {
    pre: RwLock<HashMap<HookEvent, Vec<Hook>>>,
    post: RwLock<HashMap<HookEvent, Vec<Hook>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pre(&self, event: HookEvent, hook: Hook) {
        self.add(Phase::Pre, event, hook);
    }

    pub fn add_post(&self, event: HookEvent, hook: Hook) {
        self.add(Phase::Post, event, hook);
    }

    pub fn pre_count(&self, event: HookEvent) -> usize {
        self.snapshot(Phase::Pre, event).len()
    }

    pub fn post_count(&self, event: HookEvent) -> usize {
        self.snapshot(Phase::Post, event).len()
    }

    /// Run pre hooks in registration order, stopping at the first error.
    pub async fn run_pre(&self, event: HookEvent, instance: &ModelInstance) -> Result<()> {
        self.run(Phase::Pre, event, instance).await
    }

    /// Run post hooks in registration order, stopping at the first error.
    pub async fn run_post(&self, event: HookEvent, instance: &ModelInstance) -> Result<()> {
        self.run(Phase::Post, event, instance).await
    }

    fn table(&self, phase: Phase) -> &RwLock<HashMap<HookEvent, Vec<Hook>>> {
        match phase {
            Phase::Pre => &self.pre,
            Phase::Post => &self.post,
        }
    }

    fn add(&self, phase: Phase, event: HookEvent, hook: Hook) {
        self.table(phase)
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event)
            .or_default()
            .push(hook);
    }

    fn snapshot(&self, phase: Phase, event: HookEvent) -> Vec<Hook> {
        self.table(phase)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event)
            .cloned()
            .unwrap_or_default()
    }

    async fn run(&self, phase: Phase, event: HookEvent, instance: &ModelInstance) -> Result<()> {
        // Cloned out so no lock is held while hooks await.
        for hook in self.snapshot(phase, event) {
            hook(instance.clone()).await?;
        }
        Ok(())
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = |phase| {
            let table = self.table(phase).read().unwrap_or_else(PoisonError::into_inner);
            table
                .iter()
                .map(|(event, hooks)| (event.as_str(), hooks.len()))
                .collect::<HashMap<_, _>>()
        };
        f.debug_struct("HookRegistry")
            .field("pre", &counts(Phase::Pre))
            .field("post", &counts(Phase::Post))
            .finish()
    }
}
