use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use smscr_exec::{execute, RequestContext, SharedParameters};
use smscr_server::{ServerConfig, SmartHttpServer};

#[derive(Parser)]
#[command(name = "smscr")]
#[command(about = "SmartScript template server")]
#[command(version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// JSON configuration file
        #[arg(short, long, default_value = "config/server.json")]
        config: PathBuf,
    },

    /// Execute a template and print the full response
    Render {
        /// Input .smscr file
        path: PathBuf,

        /// Request parameter as name=value (repeatable)
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },

    /// Parse a template and print its reconstructed source
    Tree {
        /// Input .smscr file
        path: PathBuf,
    },

    /// Check a template for syntax errors
    Check {
        /// Input .smscr file
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Serve { config } => cmd_serve(&config),
        Command::Render { path, params } => cmd_render(&path, params),
        Command::Tree { path } => cmd_tree(&path),
        Command::Check { path } => cmd_check(&path),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn parse_param(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected name=value, got '{arg}'")),
    }
}

fn read_template(path: &Path) -> Result<smscr_parser::DocumentNode> {
    let source =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    smscr_parser::Parser::parse(&source).with_context(|| format!("failed to parse {}", path.display()))
}

fn cmd_serve(config_path: &Path) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let server = SmartHttpServer::new(config).context("failed to initialize server")?;
    let running = server.start().context("failed to start server")?;
    running.wait();
    Ok(())
}

fn cmd_render(path: &Path, params: Vec<(String, String)>) -> Result<()> {
    let document = read_template(path)?;
    let params: HashMap<String, String> = params.into_iter().collect();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    {
        let mut context = RequestContext::new(&mut out, params, SharedParameters::default(), Vec::new());
        execute(&document, &mut context).with_context(|| format!("failed to execute {}", path.display()))?;
        if !context.header_generated() {
            // Empty output still produces a complete response.
            context.write_str("")?;
        }
    }
    out.flush()?;
    Ok(())
}

fn cmd_tree(path: &Path) -> Result<()> {
    let document = read_template(path)?;
    println!("{document}");
    Ok(())
}

fn cmd_check(path: &Path) -> Result<()> {
    read_template(path)?;
    eprintln!("OK: {}", path.display());
    Ok(())
}
