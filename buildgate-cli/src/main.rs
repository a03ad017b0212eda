//! buildgate CLI - offline tooling for the build admission gate

use anyhow::{Context, Result};
use buildgate_core::{
    digest_header, encode, http_date, resolve, Algorithm, Disposition, PolicyTable, RequestHead,
    Signer,
};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "buildgate")]
#[command(about = "buildgate - Build admission gate tooling")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a policy file
    Check {
        /// Policy file path (.json or .toml)
        file: PathBuf,
    },

    /// Show the decision the gate returns for an author
    Resolve {
        /// Policy file path
        #[arg(long = "cfg", default_value = "users.json")]
        policy_file: PathBuf,

        /// Author login
        author: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print signed headers for a request to the gate
    Sign {
        /// Shared secret
        #[arg(long, env = "BUILDGATE_SECRET", hide_env_values = true)]
        secret: String,

        /// Key identifier
        #[arg(long, default_value = "hmac-key")]
        key_id: String,

        /// HTTP method
        #[arg(long, default_value = "POST")]
        method: String,

        /// Request path and query
        #[arg(long, default_value = "/")]
        path: String,

        /// File holding the request body
        #[arg(long)]
        body: Option<PathBuf>,

        /// Signature algorithm
        #[arg(long, value_enum, default_value_t = SignAlgorithm::HmacSha256)]
        algorithm: SignAlgorithm,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SignAlgorithm {
    HmacSha256,
    HmacSha1,
}

impl From<SignAlgorithm> for Algorithm {
    fn from(algorithm: SignAlgorithm) -> Self {
        match algorithm {
            SignAlgorithm::HmacSha256 => Algorithm::HmacSha256,
            SignAlgorithm::HmacSha1 => Algorithm::HmacSha1,
        }
    }
}

#[derive(Serialize)]
struct ResolveOutput<'a> {
    author: &'a str,
    disposition: Disposition,
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { file } => check_command(file),
        Commands::Resolve {
            policy_file,
            author,
            format,
        } => resolve_command(policy_file, author, format),
        Commands::Sign {
            secret,
            key_id,
            method,
            path,
            body,
            algorithm,
        } => sign_command(secret, key_id, method, path, body, algorithm),
    }
}

fn check_command(file: PathBuf) -> Result<()> {
    println!("{} Checking {}...", "→".blue(), file.display());

    let table = match PolicyTable::load(&file) {
        Ok(table) => table,
        Err(e) => {
            println!("{} Policy file is invalid:", "✗".red());
            println!("  {}", e);
            std::process::exit(1);
        }
    };

    let summary = table.summary();
    println!("{} Policy file is valid!", "✓".green());
    println!("  Authors: {}", table.len());
    println!("  autoBuild: {}", summary.auto_build);
    println!("  noBuild: {}", summary.no_build);
    println!("  skipBuild: {}", summary.skip_build);
    println!("  manualBuild: {}", summary.manual_build);

    if !summary.unknown.is_empty() {
        println!(
            "{} {} unknown label(s), treated as manualBuild:",
            "!".yellow(),
            summary.unknown.len()
        );
        for (author, label) in &summary.unknown {
            println!("  {} = {:?}", author, label);
        }
    }

    Ok(())
}

fn resolve_command(policy_file: PathBuf, author: String, format: OutputFormat) -> Result<()> {
    let table = PolicyTable::load(&policy_file)
        .with_context(|| format!("Failed to load policies from {}", policy_file.display()))?;

    let disposition = resolve(&author, &table);
    let decision = encode(disposition, &author);

    match format {
        OutputFormat::Json => {
            let output = ResolveOutput {
                author: &author,
                disposition,
                status: decision.status,
                message: decision.message,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            let status = match disposition {
                Disposition::AutoBuild => decision.status.to_string().green(),
                Disposition::NoBuild => decision.status.to_string().red(),
                Disposition::SkipBuild | Disposition::ManualBuild => {
                    decision.status.to_string().yellow()
                }
            };

            println!("{} Decision for {}", "═".blue().bold(), author);
            println!("{} Disposition: {:?}", "▸".blue(), disposition);
            println!("{} Status: {}", "▸".blue(), status);
            if let Some(message) = &decision.message {
                println!("{} Message: {}", "▸".blue(), message);
            }
        }
    }

    Ok(())
}

fn sign_command(
    secret: String,
    key_id: String,
    method: String,
    path: String,
    body: Option<PathBuf>,
    algorithm: SignAlgorithm,
) -> Result<()> {
    if secret.is_empty() {
        anyhow::bail!("missing secret key");
    }

    let body = match body {
        Some(file) => fs::read(&file)
            .with_context(|| format!("Failed to read body from {}", file.display()))?,
        None => Vec::new(),
    };

    let date = http_date(Utc::now());
    let digest = digest_header(&body);
    let head = RequestHead::new(method, path)
        .header("Date", date.clone())
        .header("Digest", digest.clone());

    let signature = Signer::new(&secret, key_id)
        .with_algorithm(algorithm.into())
        .sign(&head)?;

    println!("Date: {}", date);
    println!("Digest: {}", digest);
    println!("Signature: {}", signature.to_header_value());

    Ok(())
}
