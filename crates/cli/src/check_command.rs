use std::path::Path;

use {
    anyhow::Result,
    telegate_config::{Severity, TelegateConfig, validate},
};

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Print diagnostics for the resolved config, exiting non-zero on errors.
pub fn check(config: &TelegateConfig, explicit: Option<&Path>, verbose: bool) -> Result<()> {
    match explicit {
        Some(path) => eprintln!("Checking {}\n", path.display()),
        None => eprintln!("Checking discovered config with environment overrides\n"),
    }

    let result = validate(config);

    let mut shown = 0;
    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }

        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
            Severity::Info => (CYAN, "info"),
        };

        if d.path.is_empty() {
            eprintln!("  {BOLD}{color}{label}{RESET} {}", d.message);
        } else {
            eprintln!("  {BOLD}{color}{label}{RESET} {}: {}", d.path, d.message);
        }
        shown += 1;
    }

    if verbose {
        print_summary(config);
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);

    if shown > 0 {
        eprintln!();
    }

    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn print_summary(config: &TelegateConfig) {
    let server = &config.server;
    eprintln!("  {BOLD}listen{RESET}   {}:{}", server.bind, server.port);
    eprintln!(
        "  {BOLD}routes{RESET}   GET {}  POST {}  GET /health",
        server.sse_path, server.message_path
    );
    eprintln!(
        "  {BOLD}auth{RESET}     {}",
        if server.auth_token.is_some() {
            "bearer token"
        } else {
            "disabled"
        }
    );
    eprintln!(
        "  {BOLD}legacy{RESET}   {}",
        if config.protocol.legacy_dialect {
            "accepted"
        } else {
            "rejected"
        }
    );
    let allowed = &config.telegram.allowed_chat_ids;
    if allowed.is_empty() {
        eprintln!("  {BOLD}chats{RESET}    unrestricted");
    } else {
        eprintln!("  {BOLD}chats{RESET}    {}", allowed.join(", "));
    }
    eprintln!();
}
