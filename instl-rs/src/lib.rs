//! instl configuration variables.
//!
//! The engine behind instl's `$(NAME)` macro language:
//!
//! - [`parse`] — splits text into literal and `$(...)` reference segments
//! - [`var`] — [`ConfigVar`], a named list of raw values
//! - [`stack`] — [`ConfigVarStack`], scoped storage with get/set/delete
//! - [`resolve`] — recursive resolution with parameters, indices and cycle
//!   detection
//! - [`define`] — seeding a stack from define documents
//!
//! # Quick start
//!
//! ```rust
//! use instl::ConfigVarStack;
//!
//! let mut vars = ConfigVarStack::new();
//! vars.set("ROOT", "/opt/app").unwrap();
//! vars.set("BIN", "$(ROOT)/bin").unwrap();
//! vars.set("TOOLS", vec!["cc", "ld"]).unwrap();
//! assert_eq!(vars.resolve_str("$(BIN)/$(TOOLS[-1])").unwrap(), "/opt/app/bin/ld");
//! assert_eq!(vars.resolve_str_to_list("$(TOOLS)").unwrap(), vec!["cc", "ld"]);
//! ```

pub mod cli;
pub mod define;
pub mod error;
pub mod parse;
pub mod path;
pub mod resolve;
pub mod stack;
pub mod var;

// Re-exports for convenience.
pub use define::{DefineDoc, DefineSource};
pub use error::{DefineError, Result, VarError};
pub use stack::{ConfigVarStack, ScopeGuard, SharedConfigVars};
pub use var::{ConfigVar, EnvGetter, RawValue, ValueGetter, ValueObserver};
