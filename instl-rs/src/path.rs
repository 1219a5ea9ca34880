//! Path-valued variables.
//!
//! Variables whose name ends in `_DIR` or `_PATH` (optionally followed by a
//! closing `__`, as in `__INSTL_DATA_DIR__`) hold filesystem paths.  When such
//! a variable is resolved to a list, each value is normalized: existing
//! entries become absolute canonical paths, anything else only gets its
//! separators and `.` components cleaned up.  A path made only of `.`
//! components collapses to `.`, but an empty value stays empty: it means
//! "no path", not the current directory.

use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

static PATH_VAR_RE: OnceLock<Regex> = OnceLock::new();

fn path_var_re() -> &'static Regex {
    PATH_VAR_RE.get_or_init(|| Regex::new(r"(_DIR|_PATH)(__)?$").expect("static regex"))
}

/// `true` if values of `name` are paths.
pub fn is_path_var(name: &str) -> bool {
    path_var_re().is_match(name)
}

/// Normalize one path value.
pub fn normalize(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let path = Path::new(value);
    if path.exists() {
        if let Ok(canonical) = path.canonicalize() {
            return canonical.to_string_lossy().into_owned();
        }
    }
    normalize_pure(path)
}

/// Separator and `.` clean-up only; `..` is kept since nothing on disk says
/// what it points to.
fn normalize_pure(path: &Path) -> String {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        return ".".to_owned();
    }
    out.to_string_lossy().into_owned()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_path_names() {
        for name in ["INSTALL_DIR", "LOG_PATH", "__USER_TEMP_DIR__", "__SITE_PATH__"] {
            assert!(is_path_var(name), "{name}");
        }
        for name in ["DIRECTORY", "PATH_LIST", "MY_DIR_NAME", "_DIR_", "LOG_PATH_"] {
            assert!(!is_path_var(name), "{name}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn pure_normalization() {
        assert_eq!(normalize("/no/such//place/./x/"), "/no/such/place/x");
        assert_eq!(normalize("rel/./../y"), "rel/../y");
        assert_eq!(normalize("./no-such-instl-dir/."), "no-such-instl-dir");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn empty_value_is_not_the_current_directory() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize_pure(Path::new("./.")), ".");
    }

    #[test]
    fn existing_path_is_canonical() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        let dotted = format!("{}/./sub/../sub", dir.path().display());
        let expected = sub.canonicalize().unwrap();
        assert_eq!(normalize(&dotted), expected.to_string_lossy());
        assert!(Path::new(&normalize(&dotted)).is_absolute());
    }
}
