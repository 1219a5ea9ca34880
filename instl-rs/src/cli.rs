//! Command-line argument parsing and the `instl` driver.
//!
//! Usage:
//!   instl [-f<file>]... [-D<NAME=VALUE>]... [-enlad] [--] <text>...

use std::path::PathBuf;

use log::debug;

use crate::error::Result;
use crate::stack::ConfigVarStack;

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Define files to load, in order (`-f<file>`).
    pub define_files: Vec<PathBuf>,
    /// `NAME=VALUE` assignments applied after the files (`-D`).
    pub assignments: Vec<(String, String)>,
    /// Import the process environment (`-e`).
    pub environment: bool,
    /// Skip the user defaults file (`-n`).
    pub no_user_defaults: bool,
    /// Print list resolutions one value per line (`-l`).
    pub list: bool,
    /// Dump every visible variable (`-a`).
    pub dump: bool,
    /// Debug logging (`-d`).
    pub debug: bool,
    /// Texts to resolve.
    pub texts: Vec<String>,
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> std::result::Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(&raw[1..])
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> std::result::Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();

        // `--` ends flag processing.
        if arg == "--" {
            args.texts.extend(argv[i + 1..].iter().cloned());
            break;
        }

        if !arg.starts_with('-') || arg == "-" {
            args.texts.push(arg.to_owned());
            i += 1;
            continue;
        }

        let chars: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;
        while j < chars.len() {
            match chars[j] {
                'e' => args.environment = true,
                'n' => args.no_user_defaults = true,
                'l' => args.list = true,
                'a' => args.dump = true,
                'd' => args.debug = true,

                // -f<file> / -f <file>
                'f' => {
                    let file = take_value(&chars, &mut j, argv, &mut i)
                        .ok_or("-f requires a file argument")?;
                    args.define_files.push(PathBuf::from(file));
                }

                // -D<NAME=VALUE> / -D <NAME=VALUE>
                'D' => {
                    let assignment = take_value(&chars, &mut j, argv, &mut i)
                        .ok_or("-D requires NAME=VALUE")?;
                    let (name, value) = assignment
                        .split_once('=')
                        .filter(|(name, _)| !name.is_empty())
                        .ok_or_else(|| format!("-D expects NAME=VALUE, got '{assignment}'"))?;
                    args.assignments.push((name.to_owned(), value.to_owned()));
                }

                c => return Err(format!("unknown option: -{c}")),
            }
            j += 1;
        }
        i += 1;
    }

    Ok(args)
}

/// Value of a flag: the rest of this argument, or the next argument.
fn take_value(chars: &[char], j: &mut usize, argv: &[String], i: &mut usize) -> Option<String> {
    if *j + 1 < chars.len() {
        let s: String = chars[*j + 1..].iter().collect();
        *j = chars.len();
        Some(s)
    } else if *i + 1 < argv.len() {
        *i += 1;
        Some(argv[*i].clone())
    } else {
        None
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// Locate the user defaults file.
///
/// Priority: `INSTL_DEFAULTS` env var → `<config dir>/instl/defaults.yaml`.
/// Returns `None` when the chosen file does not exist.
pub fn find_user_defaults() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("INSTL_DEFAULTS") {
        let p = PathBuf::from(p);
        return p.exists().then_some(p);
    }
    directories::ProjectDirs::from("", "", "instl")
        .map(|dirs| dirs.config_dir().join("defaults.yaml"))
        .filter(|p| p.exists())
}

// ── Driver ────────────────────────────────────────────────────────────────────

/// Build the variable stack described by `args`.
///
/// Order: environment, user defaults, `-f` files, `-D` assignments; later
/// sources override earlier ones.  Non-fatal define-file problems are logged
/// by the loader.
pub fn load_stack(args: &CliArgs) -> Result<ConfigVarStack> {
    let mut vars = ConfigVarStack::new();
    if args.environment {
        vars.read_environment(None);
    }
    if !args.no_user_defaults {
        if let Some(path) = find_user_defaults() {
            debug!("loading user defaults from {}", path.display());
            vars.read_defines_file(&path)?;
        }
    }
    for path in &args.define_files {
        vars.read_defines_file(path)?;
    }
    for (name, value) in &args.assignments {
        vars.set(name, value.as_str())?;
    }
    Ok(vars)
}

/// Output lines for `args.texts` (and the dump, when asked for).
pub fn render(vars: &mut ConfigVarStack, args: &CliArgs) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    if args.dump {
        let names: Vec<String> = vars.names().into_iter().map(str::to_owned).collect();
        for name in names {
            let value = vars.resolve_var(&name, None)?;
            lines.push(format!("{name}: {value}"));
        }
    }
    for text in &args.texts {
        if args.list {
            lines.extend(vars.resolve_str_to_list(text)?);
        } else {
            lines.push(vars.resolve_str(text)?);
        }
    }
    Ok(lines)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
