mod app_dir;
mod commands;
mod error;
mod history;
mod preferences;
mod shell;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use futures::executor::block_on;
use oceannav_sync::InMemoryCatalog;
use tracing::{error, info, warn};

use preferences::ShellPreferences;
use shell::Shell;

/// Catalog used when no catalog file is configured or found.
const BUILTIN_CATALOG: &str = include_str!("../catalog.json");

const USAGE: &str = "usage: oceannav [--catalog PATH] [--link URL]";

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Args {
    catalog: Option<PathBuf>,
    link: Option<String>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--catalog" => {
                parsed.catalog = Some(PathBuf::from(args.next().ok_or(USAGE)?));
            }
            "--link" => parsed.link = Some(args.next().ok_or(USAGE)?),
            "-h" | "--help" => return Err(USAGE.to_string()),
            other => return Err(format!("unexpected argument {other:?}\n{USAGE}")),
        }
    }
    Ok(parsed)
}

fn load_catalog(path: Option<PathBuf>) -> InMemoryCatalog {
    if let Some(path) = path {
        match InMemoryCatalog::load(&path) {
            Ok(catalog) => {
                info!(datasets = catalog.len(), "Loaded catalog from {}", path.display());
                return catalog;
            }
            Err(e) => error!("Failed to load catalog {}: {e}", path.display()),
        }
    }
    match InMemoryCatalog::from_json(BUILTIN_CATALOG) {
        Ok(catalog) => {
            info!(datasets = catalog.len(), "Using built-in catalog");
            catalog
        }
        Err(e) => {
            error!("Built-in catalog is unreadable: {e}");
            InMemoryCatalog::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(2);
        }
    };

    info!("Starting OceanNav shell");

    let prefs = ShellPreferences::load();
    let catalog = load_catalog(args.catalog.or_else(|| prefs.catalog_file()));
    let mut shell = block_on(Shell::start(catalog, prefs, args.link.as_deref()));
    let state = shell.navigator().snapshot();
    info!(
        dataset = %state.primary().dataset,
        variable = %state.primary().variable,
        "Ready"
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut lines = stdin.lock().lines();
    loop {
        let _ = write!(stdout, "> ");
        let _ = stdout.flush();
        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                error!("Failed to read input: {e}");
                break;
            }
            None => break,
        };
        if line.trim().is_empty() {
            continue;
        }
        match block_on(shell.execute_line(&line)) {
            Ok(reply) => {
                for line in &reply.lines {
                    let _ = writeln!(stdout, "{line}");
                }
                if reply.quit {
                    break;
                }
            }
            Err(e) => {
                warn!("{e}");
                let _ = writeln!(stdout, "error: {e}");
            }
        }
    }

    shell.preferences().save();
    info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args, String> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_catalog_and_link() {
        let parsed = args(&["--catalog", "/srv/catalog.json", "--link", "?query=%7B%7D"]).unwrap();
        assert_eq!(parsed.catalog, Some(PathBuf::from("/srv/catalog.json")));
        assert_eq!(parsed.link.as_deref(), Some("?query=%7B%7D"));
    }

    #[test]
    fn rejects_missing_values_and_unknown_flags() {
        assert!(args(&["--catalog"]).is_err());
        assert!(args(&["--verbose"]).is_err());
        assert!(args(&[]).unwrap().link.is_none());
    }

    #[test]
    fn builtin_catalog_parses() {
        assert_eq!(load_catalog(None).len(), 3);
    }
}
