//! Veil — redact PII from text and restore it later.

use std::io::Read;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;
use veil_core::{Severity, VeilConfig};
use veil_engine::{RedactionEngine, RestorationEngine};
use veil_vault::MappingVault;

fn print_usage() {
    println!("Veil — reversible PII redaction");
    println!();
    println!("Usage: veil <command> [args]");
    println!();
    println!("Commands:");
    println!("  redact <file|-> [severity]       Redact a text file, print the result");
    println!("  restore <session-id> <file|->    Restore a previously redacted file");
    println!("  reveal <session-id>              Print a session's token -> value mapping");
    println!("  invalidate <session-id>          Delete a session's mapping");
    println!("  help                             Show this message");
    println!();
    println!("Environment:");
    println!("  VEIL_MASTER_KEY                  Base64 32-byte master key (required)");
    println!("  REDIS_URL                        Mapping store (default: redis://localhost:6379)");
    println!("  VEIL_MAPPING_TTL_SECS            Mapping lifetime (default: 86400)");
    println!("  VEIL_SEVERITY                    0, 20, 40, 60, 80 or 100 (default: 100)");
    println!("  VEIL_SEMANTIC_PROVIDER           openai, anthropic, groq or auto");
    println!("  RUST_LOG                         Log filter (default: info)");
}

/// Read a file, or stdin for `-`.
fn read_input(path: &str) -> anyhow::Result<String> {
    if path == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))
    }
}

fn parse_severity(level: &str) -> anyhow::Result<Severity> {
    let level: u8 = level
        .parse()
        .with_context(|| format!("Invalid severity: {}", level))?;
    Ok(Severity::from_level(level)?)
}

fn usage_error(message: &str) -> ! {
    eprintln!("{}", message);
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only document text.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");

    if matches!(command, "help" | "--help" | "-h") {
        print_usage();
        return Ok(());
    }

    let config = VeilConfig::from_env().context("Invalid configuration")?;
    let vault = Arc::new(MappingVault::from_config(&config)?);

    match command {
        "redact" => {
            let Some(path) = args.get(2) else {
                usage_error("Usage: veil redact <file|-> [severity]");
            };
            let engine = RedactionEngine::from_config(&config, vault)?;
            let severity = match args.get(3) {
                Some(level) => parse_severity(level)?,
                None => engine.severity(),
            };
            let text = read_input(path)?;
            info!("Redacting at severity {}", severity.level());

            let redaction = engine.redact_at(&text, severity).await?;
            print!("{}", redaction.text());
            eprintln!("session: {}", redaction.session_id());
            if redaction.is_degraded() {
                eprintln!(
                    "warning: detectors failed: {:?}",
                    redaction.failed_detectors
                );
            }
        }
        "restore" => {
            let (Some(session_id), Some(path)) = (args.get(2), args.get(3)) else {
                usage_error("Usage: veil restore <session-id> <file|->");
            };
            let text = read_input(path)?;
            let engine = RestorationEngine::new(vault);
            let restored = engine.restore(session_id, &text).await?;
            print!("{}", restored.text);
        }
        "reveal" => {
            let Some(session_id) = args.get(2) else {
                usage_error("Usage: veil reveal <session-id>");
            };
            let engine = RestorationEngine::new(vault);
            let record = engine.reveal(session_id).await?;
            for (token, value) in &record.entries {
                println!("{}\t{}", token, value);
            }
        }
        "invalidate" => {
            let Some(session_id) = args.get(2) else {
                usage_error("Usage: veil invalidate <session-id>");
            };
            vault.invalidate(session_id).await?;
            eprintln!("invalidated: {}", session_id);
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            std::process::exit(2);
        }
    }

    Ok(())
}
