use instl::cli;

fn main() {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("instl: {e}");
            eprintln!(
                "Usage: instl [-f<file>]... [-D<NAME=VALUE>]... [-enlad] [--] <text>..."
            );
            std::process::exit(1);
        }
    };

    // ── Logging: warnings by default, RUST_LOG or -d for more ────────────────
    let level = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    // ── Build the variable stack ─────────────────────────────────────────────
    let mut vars = match cli::load_stack(&args) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("instl: {e}");
            std::process::exit(1);
        }
    };

    // ── Resolve and print ────────────────────────────────────────────────────
    match cli::render(&mut vars, &args) {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
        }
        Err(e) => {
            eprintln!("instl: {e}");
            std::process::exit(1);
        }
    }
}
