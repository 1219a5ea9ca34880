//! Reference resolution.
//!
//! Resolution walks the segments produced by [`parse`](crate::parse::parse)
//! left to right.  Each reference to a known variable is replaced by that
//! variable's values, themselves resolved recursively; references to unknown
//! variables, and indices that fall outside a non-empty value list, are kept
//! verbatim.
//!
//! A reference with parameters, `$(F<a,k=v>)`, is expanded inside a freshly
//! pushed scope in which `__F_1__ = a` and `k = v` are defined.  Parameter
//! text is resolved first, in the scope where the reference appears.  The
//! pushed scope is gone once the expansion is done.
//!
//! Every variable being resolved sits on the stack's resolve-stack until its
//! values are done; meeting it again is a
//! [`CircularReference`](VarError::CircularReference).

use std::ops::{Deref, DerefMut};

use log::{trace, warn};

use crate::error::{Result, VarError};
use crate::parse::{self, Params, Segment};
use crate::path;
use crate::stack::ConfigVarStack;
use crate::var::is_truthy;

type Values = Vec<Option<String>>;

// ── Resolve-stack guard ───────────────────────────────────────────────────────

/// Holds one name on the resolve-stack; pops it on drop.
struct ResolveGuard<'a> {
    stack: &'a mut ConfigVarStack,
}

impl Deref for ResolveGuard<'_> {
    type Target = ConfigVarStack;

    fn deref(&self) -> &ConfigVarStack {
        self.stack
    }
}

impl DerefMut for ResolveGuard<'_> {
    fn deref_mut(&mut self) -> &mut ConfigVarStack {
        self.stack
    }
}

impl Drop for ResolveGuard<'_> {
    fn drop(&mut self) {
        self.stack.resolve_stack.pop();
    }
}

// ── Public entry points ───────────────────────────────────────────────────────

impl ConfigVarStack {
    /// Resolve every reference in `text` and concatenate.
    pub fn resolve_str(&mut self, text: &str) -> Result<String> {
        if !parse::has_reference_marker(text) {
            return Ok(text.to_owned());
        }
        let mut out = String::with_capacity(text.len());
        for segment in parse::parse(text) {
            self.render_segment(&segment, &mut out)?;
        }
        Ok(out)
    }

    /// Resolve `text` to a list.
    ///
    /// When `text` is exactly one reference and nothing else, the referenced
    /// values come back as separate items.  Otherwise the result is the
    /// single resolved string.
    pub fn resolve_str_to_list(&mut self, text: &str) -> Result<Vec<String>> {
        if !parse::has_reference_marker(text) {
            return Ok(vec![text.to_owned()]);
        }
        let segments: Vec<Segment> = parse::parse(text).collect();
        if let [only] = segments.as_slice() {
            if only.literal.is_empty() {
                if let Some(name) = only.name.as_deref() {
                    return Ok(match self.resolve_segment(only)? {
                        Some(values) => to_list(name, values),
                        None => vec![only.original.clone()],
                    });
                }
            }
        }
        let mut out = String::with_capacity(text.len());
        for segment in &segments {
            self.render_segment(segment, &mut out)?;
        }
        Ok(vec![out])
    }

    /// Resolved, concatenated value of `name`.
    ///
    /// An undefined variable yields `default`, or [`VarError::NotFound`]
    /// without one.
    pub fn resolve_var(&mut self, name: &str, default: Option<&str>) -> Result<String> {
        if !self.contains(name) {
            return default.map(str::to_owned).ok_or_else(|| VarError::not_found(name));
        }
        let values = self.resolve_var_values(name)?;
        Ok(values.into_iter().flatten().collect())
    }

    /// Resolved values of `name`, normalized when `name` is a path variable.
    pub fn resolve_var_to_list(&mut self, name: &str) -> Result<Vec<String>> {
        let values = self.resolve_var_values(name)?;
        Ok(to_list(name, values))
    }

    /// `true` iff `name` resolves to a single truthy value; `default` when
    /// `name` is undefined.
    pub fn resolve_var_to_bool(&mut self, name: &str, default: bool) -> Result<bool> {
        if !self.contains(name) {
            return Ok(default);
        }
        Ok(match self.resolve_var_values(name)?.as_slice() {
            [Some(v)] => is_truthy(v),
            _ => false,
        })
    }

    /// Expand a list mixing bare variable names and text.
    ///
    /// An item naming a variable is replaced by all its values; any other item
    /// is resolved as a string.
    pub fn resolve_list_to_list<S: AsRef<str>>(&mut self, items: &[S]) -> Result<Vec<String>> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let item = item.as_ref();
            if self.contains(item) {
                out.extend(self.resolve_var_to_list(item)?);
            } else {
                out.push(self.resolve_str(item)?);
            }
        }
        Ok(out)
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn render_segment(&mut self, segment: &Segment, out: &mut String) -> Result<()> {
        out.push_str(&segment.literal);
        if segment.is_reference() {
            match self.resolve_segment(segment)? {
                Some(values) => values.iter().flatten().for_each(|v| out.push_str(v)),
                None => out.push_str(&segment.original),
            }
        }
        Ok(())
    }

    /// Values for one reference, or `None` when it should stay verbatim.
    fn resolve_segment(&mut self, segment: &Segment) -> Result<Option<Values>> {
        let Some(name) = segment.name.as_deref() else {
            return Ok(None);
        };
        if !self.contains(name) {
            warn!("undefined variable in {}", segment.original);
            return Ok(None);
        }
        let values = match &segment.params {
            Some(params) => {
                let bound = self.resolve_params(params)?;
                let mut scope = self.push_param_scope();
                scope.bind_params(name, &bound)?;
                scope.resolve_var_values(name)?
            }
            None => self.resolve_var_values(name)?,
        };
        trace!("{} -> {:?}", segment.original, values);
        Ok(select_index(values, segment.index))
    }

    /// Parameter text resolved where the reference appears, before the
    /// callee's scope exists.
    fn resolve_params(&mut self, params: &Params) -> Result<Params> {
        let mut resolved = Params::default();
        for value in &params.positional {
            resolved.positional.push(self.resolve_str(value)?);
        }
        for (key, value) in &params.keyword {
            let value = self.resolve_str(value)?;
            resolved.keyword.insert(key.clone(), value);
        }
        Ok(resolved)
    }

    /// `__NAME_1__`, `__NAME_2__`, ... for positional parameters; keyword
    /// parameters under their own names.
    fn bind_params(&mut self, name: &str, params: &Params) -> Result<()> {
        for (i, value) in params.positional.iter().enumerate() {
            self.set(&format!("__{name}_{}__", i + 1), value.as_str())?;
        }
        for (key, value) in &params.keyword {
            self.set(key, value.as_str())?;
        }
        Ok(())
    }

    fn enter(&mut self, name: &str) -> ResolveGuard<'_> {
        self.resolve_stack.push(name.to_owned());
        ResolveGuard { stack: self }
    }

    /// All values of `name`, fully resolved.
    pub(crate) fn resolve_var_values(&mut self, name: &str) -> Result<Values> {
        if self.resolve_stack.iter().any(|n| n == name) {
            let mut chain = self.resolve_stack.clone();
            chain.push(name.to_owned());
            return Err(VarError::CircularReference { chain });
        }

        let var = self.get(name)?;
        let cache = var.freezes(self.freeze_all) && !self.force_resolve && self.non_freeze_depth == 0;
        if cache {
            if let Some(frozen) = var.frozen() {
                return Ok(frozen.to_vec());
            }
        }
        let raw = var.resolve();

        let resolved = {
            let mut guard = self.enter(name);
            let mut out = Vec::with_capacity(raw.len());
            for value in raw {
                out.push(match value {
                    Some(s) => Some(guard.resolve_str(&s)?),
                    None => None,
                });
            }
            out
        };

        if cache {
            if let Some(var) = self.lookup_mut(name) {
                var.store_frozen(resolved.clone());
            }
        }
        Ok(resolved)
    }
}

/// Apply an optional `[i]`.  Negative `i` counts from the end.
///
/// An empty list stays empty whatever the index; an index outside a
/// non-empty list gives `None`.
fn select_index(values: Values, index: Option<i64>) -> Option<Values> {
    let Some(i) = index else {
        return Some(values);
    };
    if values.is_empty() {
        return Some(values);
    }
    let len = values.len() as i64;
    let i = if i < 0 { len + i } else { i };
    if (0..len).contains(&i) {
        values.into_iter().nth(i as usize).map(|v| vec![v])
    } else {
        None
    }
}

fn to_list(name: &str, values: Values) -> Vec<String> {
    let normalize = path::is_path_var(name);
    values
        .into_iter()
        .map(|v| {
            let v = v.unwrap_or_default();
            if normalize { path::normalize(&v) } else { v }
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
