//! Scoped variable store.
//!
//! A [`ConfigVarStack`] is a stack of scopes.  Scope 0 is the base scope and
//! is never popped; lookups search from the innermost scope outward, writes
//! always land in the innermost scope.
//!
//! Scopes are pushed with [`ConfigVarStack::push_scope`], which returns a
//! [`ScopeGuard`].  The guard derefs to the stack and pops its scope when
//! dropped, including on an early `?` return.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use log::debug;

use crate::error::{Result, VarError};
use crate::var::{ConfigVar, RawValue, ValueGetter};

type Scope = IndexMap<String, ConfigVar>;

/// A stack shared between threads; each resolve call holds the lock
/// throughout.
pub type SharedConfigVars = Arc<Mutex<ConfigVarStack>>;

// ── ConfigVarStack ────────────────────────────────────────────────────────────

/// Layered table of [`ConfigVar`]s.
#[derive(Debug)]
pub struct ConfigVarStack {
    scopes: Vec<Scope>,
    /// Names whose values are being resolved right now, outermost first.
    pub(crate) resolve_stack: Vec<String>,
    /// Freeze every variable not marked non-freeze.
    pub(crate) freeze_all: bool,
    /// Ignore frozen values (diagnostic re-evaluation).
    pub(crate) force_resolve: bool,
    /// Raised while a parameterized expansion is evaluated.
    pub(crate) non_freeze_depth: usize,
}

impl Default for ConfigVarStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigVarStack {
    pub fn new() -> Self {
        ConfigVarStack {
            scopes: vec![Scope::new()],
            resolve_stack: Vec::new(),
            freeze_all: false,
            force_resolve: false,
            non_freeze_depth: 0,
        }
    }

    /// Wrap in `Arc<Mutex<_>>` for use from several threads.
    pub fn into_shared(self) -> SharedConfigVars {
        Arc::new(Mutex::new(self))
    }

    /// Number of scopes, base included.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    fn top(&mut self) -> &mut Scope {
        // At least the base scope always exists.
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    // ── Lookup ───────────────────────────────────────────────────────────────

    /// Innermost variable called `name`.
    pub fn get(&self, name: &str) -> Result<&ConfigVar> {
        self.lookup(name).ok_or_else(|| VarError::not_found(name))
    }

    /// Like [`get`](Self::get) but `None` when absent.
    pub fn lookup(&self, name: &str) -> Option<&ConfigVar> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut ConfigVar> {
        self.scopes.iter_mut().rev().find_map(|scope| scope.get_mut(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut ConfigVar> {
        self.lookup_mut(name).ok_or_else(|| VarError::not_found(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// `true` when `name` exists and has something to resolve: a getter, or at
    /// least one value that is not a lone empty slot.
    pub fn defined(&self, name: &str) -> bool {
        self.lookup(name).is_some_and(|var| {
            var.is_dynamic() || (!var.is_empty() && !var.is_single_none())
        })
    }

    /// Visible variables, innermost shadowing outer, in first-definition order.
    pub fn visible(&self) -> Vec<&ConfigVar> {
        let mut seen: IndexMap<&str, &ConfigVar> = IndexMap::new();
        for scope in &self.scopes {
            for (name, var) in scope {
                seen.insert(name.as_str(), var);
            }
        }
        seen.into_values().collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.visible().into_iter().map(ConfigVar::name).collect()
    }

    // ── Mutation ─────────────────────────────────────────────────────────────

    /// Replace the values of `name` in the innermost scope, creating it there
    /// if needed.  Outer variables with the same name are left alone.
    pub fn set(&mut self, name: &str, value: impl Into<RawValue>) -> Result<&mut ConfigVar> {
        let var = self.entry(name);
        var.assign(value)?;
        Ok(var)
    }

    /// The innermost-scope variable `name`, created empty if missing.
    pub fn entry(&mut self, name: &str) -> &mut ConfigVar {
        self.top()
            .entry(name.to_owned())
            .or_insert_with(|| ConfigVar::new(name))
    }

    /// Create (or replace) a computed variable in the innermost scope.
    pub fn set_dynamic(&mut self, name: &str, getter: Arc<dyn ValueGetter>) -> &mut ConfigVar {
        let var = self.entry(name);
        var.clear();
        var.set_getter(getter);
        var
    }

    /// Remove `name` from the innermost scope that has it.
    pub fn delete(&mut self, name: &str) -> Result<ConfigVar> {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.shift_remove(name))
            .ok_or_else(|| VarError::not_found(name))
    }

    /// Copy process environment variables into the base scope.
    ///
    /// With `only`, just those names are imported (when set).  Names that are
    /// not UTF-8 are skipped; values that are not UTF-8 are imported with
    /// replacement characters.  Returns the number of variables written.
    pub fn read_environment(&mut self, only: Option<&[&str]>) -> usize {
        let mut count = 0;
        for (key, value) in std::env::vars_os() {
            let Some(key) = key.to_str() else {
                debug!("skipping non-UTF-8 environment name {}", key.to_string_lossy());
                continue;
            };
            if only.is_some_and(|names| !names.contains(&key)) {
                continue;
            }
            let value = match value.into_string() {
                Ok(value) => value,
                Err(raw) => {
                    debug!("environment variable {key} is not UTF-8; importing it lossily");
                    raw.to_string_lossy().into_owned()
                }
            };
            let var = self.scopes[0]
                .entry(key.to_owned())
                .or_insert_with(|| ConfigVar::new(key));
            var.clear();
            var.set_description("from environment");
            var.push_value(value);
            count += 1;
        }
        debug!("imported {count} environment variables");
        count
    }

    // ── Scopes ───────────────────────────────────────────────────────────────

    /// Push an empty scope; it is popped when the guard drops.
    pub fn push_scope(&mut self) -> ScopeGuard<'_> {
        self.scopes.push(Scope::new());
        debug!("push scope -> depth {}", self.scopes.len());
        ScopeGuard { stack: self, suspend_freeze: false }
    }

    /// Scope for one parameterized expansion: nothing resolved inside it is
    /// frozen.
    pub(crate) fn push_param_scope(&mut self) -> ScopeGuard<'_> {
        self.non_freeze_depth += 1;
        let mut guard = self.push_scope();
        guard.suspend_freeze = true;
        guard
    }

    // ── Freezing ─────────────────────────────────────────────────────────────

    /// Freeze every variable (not marked non-freeze) on first resolve.
    pub fn set_freeze_on_first_resolve(&mut self, on: bool) {
        self.freeze_all = on;
    }

    /// Bypass frozen values.  Returns the previous setting.
    pub fn set_force_resolve(&mut self, on: bool) -> bool {
        std::mem::replace(&mut self.force_resolve, on)
    }
}

// ── ScopeGuard ────────────────────────────────────────────────────────────────

/// A pushed scope.  Derefs to the stack; pops the scope on drop.
pub struct ScopeGuard<'a> {
    stack: &'a mut ConfigVarStack,
    suspend_freeze: bool,
}

impl Deref for ScopeGuard<'_> {
    type Target = ConfigVarStack;

    fn deref(&self) -> &ConfigVarStack {
        self.stack
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut ConfigVarStack {
        self.stack
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.stack.scopes.pop();
        if self.suspend_freeze {
            self.stack.non_freeze_depth -= 1;
        }
        debug!("pop scope -> depth {}", self.stack.scopes.len());
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
