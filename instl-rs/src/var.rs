//! A single named configuration variable.
//!
//! A [`ConfigVar`] holds an ordered list of raw string values.  Raw values may
//! contain `$(...)` references; resolving them is the owning
//! [`ConfigVarStack`](crate::stack::ConfigVarStack)'s job.  The variable itself
//! only applies its optional [`ValueGetter`] on the way out.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Result, VarError};

// ── Raw input values ──────────────────────────────────────────────────────────

/// A value handed to [`ConfigVar::append`] / [`ConfigVar::extend`].
///
/// This is the shape of a leaf (or subtree) coming out of a define document.
/// Everything is stored as a string; sequences are flattened.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Intentionally empty slot.
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Path(PathBuf),
    Seq(Vec<RawValue>),
    /// Not storable; present so define readers can hand over any node.
    Map(Vec<(String, RawValue)>),
}

impl RawValue {
    fn kind(&self) -> &'static str {
        match self {
            RawValue::Null => "null",
            RawValue::Str(_) => "string",
            RawValue::Int(_) => "integer",
            RawValue::Float(_) => "float",
            RawValue::Bool(_) => "boolean",
            RawValue::Path(_) => "path",
            RawValue::Seq(_) => "sequence",
            RawValue::Map(_) => "mapping",
        }
    }

    /// String form of a scalar; `None` for `Null` and containers.
    fn scalar_string(&self) -> Option<String> {
        match self {
            RawValue::Str(s) => Some(s.clone()),
            RawValue::Int(n) => Some(n.to_string()),
            RawValue::Float(x) => Some(x.to_string()),
            RawValue::Bool(b) => Some(b.to_string()),
            RawValue::Path(p) => Some(p.to_string_lossy().into_owned()),
            RawValue::Null | RawValue::Seq(_) | RawValue::Map(_) => None,
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Str(s.to_owned())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Str(s)
    }
}

impl From<&String> for RawValue {
    fn from(s: &String) -> Self {
        RawValue::Str(s.clone())
    }
}

impl From<i64> for RawValue {
    fn from(n: i64) -> Self {
        RawValue::Int(n)
    }
}

impl From<i32> for RawValue {
    fn from(n: i32) -> Self {
        RawValue::Int(n.into())
    }
}

impl From<f64> for RawValue {
    fn from(x: f64) -> Self {
        RawValue::Float(x)
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        RawValue::Bool(b)
    }
}

impl From<PathBuf> for RawValue {
    fn from(p: PathBuf) -> Self {
        RawValue::Path(p)
    }
}

impl From<&Path> for RawValue {
    fn from(p: &Path) -> Self {
        RawValue::Path(p.to_owned())
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(RawValue::Null, Into::into)
    }
}

impl<T: Into<RawValue>> From<Vec<T>> for RawValue {
    fn from(v: Vec<T>) -> Self {
        RawValue::Seq(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<RawValue> + Clone> From<&[T]> for RawValue {
    fn from(v: &[T]) -> Self {
        RawValue::Seq(v.iter().cloned().map(Into::into).collect())
    }
}

// ── Strategies ────────────────────────────────────────────────────────────────

/// Computes the value handed out for one raw slot.
///
/// Used for dynamic variables whose value is not known until resolution time.
/// The result is still subject to `$(...)` resolution by the stack.
pub trait ValueGetter: Send + Sync {
    fn get(&self, raw: Option<&str>) -> Option<String>;
}

impl<F> ValueGetter for F
where
    F: Fn(Option<&str>) -> Option<String> + Send + Sync,
{
    fn get(&self, raw: Option<&str>) -> Option<String> {
        self(raw)
    }
}

/// Reads an environment variable each time the value is asked for.
///
/// Falls back to the raw value when the environment variable is unset.
#[derive(Debug, Clone)]
pub struct EnvGetter {
    key: String,
}

impl EnvGetter {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl ValueGetter for EnvGetter {
    fn get(&self, raw: Option<&str>) -> Option<String> {
        std::env::var(&self.key).ok().or_else(|| raw.map(str::to_owned))
    }
}

/// Notified with `(variable name, stored value)` on every append.
pub trait ValueObserver: Send + Sync {
    fn on_append(&self, name: &str, value: &str);
}

impl<F> ValueObserver for F
where
    F: Fn(&str, &str) + Send + Sync,
{
    fn on_append(&self, name: &str, value: &str) {
        self(name, value)
    }
}

// ── ConfigVar ─────────────────────────────────────────────────────────────────

const TRUTHY: &[&str] = &["yes", "true", "y", "t", "1"];

/// A named, ordered, multi-valued configuration variable.
#[derive(Clone)]
pub struct ConfigVar {
    name: String,
    values: Vec<Option<String>>,
    description: Option<String>,
    getter: Option<Arc<dyn ValueGetter>>,
    observer: Option<Arc<dyn ValueObserver>>,
    /// Cache the first full resolution.
    freeze: bool,
    /// Never cache, even when the stack freezes everything.
    non_freeze: bool,
    frozen: Option<Vec<Option<String>>>,
}

impl fmt::Debug for ConfigVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigVar")
            .field("name", &self.name)
            .field("values", &self.values)
            .field("description", &self.description)
            .field("dynamic", &self.getter.is_some())
            .field("frozen", &self.frozen.is_some())
            .finish()
    }
}

impl PartialEq for ConfigVar {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.values == other.values
    }
}

impl ConfigVar {
    pub fn new(name: impl Into<String>) -> Self {
        ConfigVar {
            name: name.into(),
            values: Vec::new(),
            description: None,
            getter: None,
            observer: None,
            freeze: false,
            non_freeze: false,
            frozen: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    pub fn set_getter(&mut self, getter: Arc<dyn ValueGetter>) {
        self.getter = Some(getter);
        self.frozen = None;
    }

    pub fn set_observer(&mut self, observer: Arc<dyn ValueObserver>) {
        self.observer = Some(observer);
    }

    pub fn is_dynamic(&self) -> bool {
        self.getter.is_some()
    }

    /// Raw values, unresolved.
    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `true` when the variable holds exactly one intentionally empty slot.
    pub fn is_single_none(&self) -> bool {
        matches!(self.values.as_slice(), [None])
    }

    /// Drop all values (and any frozen resolution).
    pub fn clear(&mut self) {
        self.values.clear();
        self.frozen = None;
    }

    /// Store one scalar.  `Null` is ignored; containers are a type error.
    pub fn append(&mut self, value: impl Into<RawValue>) -> Result<()> {
        let value = value.into();
        match value {
            RawValue::Null => Ok(()),
            RawValue::Seq(_) | RawValue::Map(_) => Err(VarError::Type {
                name: self.name.clone(),
                found: value.kind(),
            }),
            scalar => {
                if let Some(s) = scalar.scalar_string() {
                    self.push_value(s);
                }
                Ok(())
            }
        }
    }

    /// Store one string value; strings always fit.
    pub(crate) fn push_value(&mut self, s: String) {
        if let Some(observer) = &self.observer {
            observer.on_append(&self.name, &s);
        }
        self.values.push(Some(s));
    }

    /// Store a scalar, or every leaf of a (nested) sequence, in order.
    pub fn extend(&mut self, values: impl Into<RawValue>) -> Result<()> {
        match values.into() {
            RawValue::Seq(items) => {
                for item in items {
                    self.extend(item)?;
                }
                Ok(())
            }
            other => self.append(other),
        }
    }

    /// Replace the content with a single intentionally empty slot.
    pub fn set_none(&mut self) {
        self.clear();
        self.values.push(None);
    }

    /// Replace all values.  A top-level `Null` becomes a single empty slot.
    ///
    /// The value is checked before anything is cleared, so a type error leaves
    /// the variable as it was.
    pub fn assign(&mut self, value: impl Into<RawValue>) -> Result<()> {
        let value = value.into();
        if let Some(found) = unstorable(&value) {
            return Err(VarError::Type { name: self.name.clone(), found });
        }
        match value {
            RawValue::Null => {
                self.set_none();
                Ok(())
            }
            other => {
                self.clear();
                self.extend(other)
            }
        }
    }

    /// Values after the getter, without `$(...)` resolution.
    pub fn resolve(&self) -> Vec<Option<String>> {
        match &self.getter {
            Some(getter) => {
                if self.values.is_empty() {
                    return vec![getter.get(None)];
                }
                self.values.iter().map(|v| getter.get(v.as_deref())).collect()
            }
            None => self.values.clone(),
        }
    }

    /// Concatenated value, or `None` for a single empty slot.
    pub fn joined(&self) -> Option<String> {
        let resolved = self.resolve();
        if matches!(resolved.as_slice(), [None]) {
            return None;
        }
        Some(resolved.into_iter().flatten().collect())
    }

    /// `true` iff exactly one value that spells a truthy token.
    pub fn to_bool(&self) -> bool {
        match self.resolve().as_slice() {
            [Some(v)] => is_truthy(v),
            _ => false,
        }
    }

    pub fn to_int(&self) -> Option<i64> {
        self.joined()?.trim().parse().ok()
    }

    pub fn to_float(&self) -> Option<f64> {
        self.joined()?.trim().parse().ok()
    }

    // ── Freezing ─────────────────────────────────────────────────────────────

    pub fn set_freeze(&mut self, freeze: bool) {
        self.freeze = freeze;
        if !freeze {
            self.frozen = None;
        }
    }

    pub fn set_non_freeze(&mut self, non_freeze: bool) {
        self.non_freeze = non_freeze;
        if non_freeze {
            self.frozen = None;
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.is_some()
    }

    /// Whether this variable caches its first resolution, given the stack-wide
    /// default.
    pub(crate) fn freezes(&self, freeze_all: bool) -> bool {
        !self.non_freeze && (self.freeze || freeze_all)
    }

    pub(crate) fn frozen(&self) -> Option<&[Option<String>]> {
        self.frozen.as_deref()
    }

    pub(crate) fn store_frozen(&mut self, values: Vec<Option<String>>) {
        self.frozen = Some(values);
    }
}

/// Kind name of the first leaf `extend` would reject.
fn unstorable(value: &RawValue) -> Option<&'static str> {
    match value {
        RawValue::Map(_) => Some(value.kind()),
        RawValue::Seq(items) => items.iter().find_map(unstorable),
        _ => None,
    }
}

pub(crate) fn is_truthy(s: &str) -> bool {
    let s = s.trim();
    TRUTHY.iter().any(|t| t.eq_ignore_ascii_case(s))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
