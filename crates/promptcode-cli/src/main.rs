#![deny(unsafe_code)]

//! promptcode CLI — list, inspect, export, and serve presets.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use promptcode_config::AppConfig;
use promptcode_core::http::{self, AppState};
use promptcode_core::{ContextAssembler, ContextError, Preset, TokenizerCache, sanitize_name};

/// promptcode — assemble token-annotated context bundles from file presets.
#[derive(Parser)]
#[command(name = "promptcode", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "promptcode.toml")]
    config: PathBuf,

    /// Workspace root (overrides WORKSPACE and the config file).
    #[arg(short, long)]
    workspace: Option<PathBuf>,

    /// Tokenizer model or encoding used for token counts.
    #[arg(short, long)]
    tokenizer: Option<String>,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all presets with file and token counts (JSON).
    #[command(alias = "ls")]
    List,

    /// Export a preset's bundle to a temp file and print its path.
    Get {
        /// Preset name.
        name: String,

        /// Open the exported file with the default application.
        #[arg(long)]
        open: bool,
    },

    /// Print the file tree for a preset.
    Tree {
        /// Preset name.
        name: String,
    },

    /// Print a preset's per-file token breakdown (JSON).
    Show {
        /// Preset name.
        name: String,
    },

    /// Create or overwrite a preset.
    Save {
        /// Preset name.
        name: String,

        /// Workspace-relative files, in bundle order.
        #[arg(required = true)]
        files: Vec<String>,

        /// Optional description.
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Serve the HTTP API.
    Serve {
        /// Port to listen on (overrides PORT and the config file).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show detailed build information.
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<ContextError>() {
                Some(ContextError::PresetNotFound { name }) => {
                    eprintln!("Preset \"{name}\" not found");
                }
                _ => eprintln!("Error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli).await?;
    init_tracing(cli.verbose, &config.logging.level);

    let assembler = ContextAssembler::from_config(&config, Arc::new(TokenizerCache::new()));

    match cli.command {
        Commands::List => cmd_list(&assembler).await?,
        Commands::Get { name, open } => cmd_get(&assembler, &name, open).await?,
        Commands::Tree { name } => cmd_tree(&assembler, &name).await?,
        Commands::Show { name } => cmd_show(&assembler, &name).await?,
        Commands::Save {
            name,
            files,
            description,
        } => cmd_save(&assembler, name, files, description).await?,
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.server.listen_port);
            cmd_serve(assembler, &config.server.listen_addr, port).await?
        }
        Commands::Version => println!("{}", promptcode_core::build_info::version_string()),
    }

    Ok(())
}

/// Config file, then environment, then command-line flags.
async fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load_or_default(&cli.config)
        .await
        .with_context(|| format!("loading {}", cli.config.display()))?;
    config.apply_env()?;
    apply_flags(&mut config, cli);
    config.validate()?;
    Ok(config)
}

fn apply_flags(config: &mut AppConfig, cli: &Cli) {
    if let Some(workspace) = &cli.workspace {
        config.workspace.root = Some(workspace.display().to_string());
    }
    if let Some(tokenizer) = &cli.tokenizer {
        config.tokenizer.default = tokenizer.clone();
    }
}

fn init_tracing(verbose: u8, configured: &str) {
    let filter = match verbose {
        0 => configured,
        1 => "debug",
        _ => "trace",
    };

    // Logs go to stderr so stdout stays pipeable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn cmd_list(assembler: &ContextAssembler) -> Result<()> {
    let summaries = assembler.list().await?;
    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}

async fn cmd_get(assembler: &ContextAssembler, name: &str, open: bool) -> Result<()> {
    let path = export_bundle(assembler, name).await?;
    println!("{}", path.display());

    if open {
        if let Err(e) = open_path(&path) {
            warn!(path = %path.display(), error = %e, "Could not open exported bundle");
        }
    }
    Ok(())
}

async fn cmd_tree(assembler: &ContextAssembler, name: &str) -> Result<()> {
    println!("{}", assembler.tree(name).await?);
    Ok(())
}

async fn cmd_show(assembler: &ContextAssembler, name: &str) -> Result<()> {
    let detail = assembler.detail(name).await?;
    println!("{}", serde_json::to_string_pretty(&detail)?);
    Ok(())
}

async fn cmd_save(
    assembler: &ContextAssembler,
    name: String,
    files: Vec<String>,
    description: Option<String>,
) -> Result<()> {
    let mut preset = Preset::new(name, files);
    preset.description = description;
    let path = assembler.store().save(&preset).await?;
    println!("{}", path.display());
    Ok(())
}

async fn cmd_serve(assembler: ContextAssembler, addr: &str, port: u16) -> Result<()> {
    let state = Arc::new(AppState { assembler });
    http::serve(addr, port, state, async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
        }
    })
    .await
    .with_context(|| format!("serving on {addr}:{port}"))?;
    Ok(())
}

/// Assemble the bundle and persist it as `preset-<name>-<epoch>-XXXX.txt` in
/// the system temp directory.
async fn export_bundle(assembler: &ContextAssembler, name: &str) -> Result<PathBuf> {
    let bundle = assembler.bundle(name).await?;

    let stamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let mut file = tempfile::Builder::new()
        .prefix(&format!("preset-{}-{stamp}-", sanitize_name(name)))
        .suffix(".txt")
        .tempfile()
        .context("creating export file")?;
    file.write_all(bundle.to_string().as_bytes())
        .context("writing export file")?;

    let (_, path) = file.keep().context("keeping export file")?;
    info!(preset = name, path = %path.display(), "Exported bundle");
    Ok(path)
}

/// Hand `path` to the platform's default opener.
fn open_path(path: &Path) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    let mut command = std::process::Command::new("open");
    #[cfg(target_os = "windows")]
    let mut command = {
        let mut command = std::process::Command::new("cmd");
        command.args(["/C", "start", ""]);
        command
    };
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let mut command = std::process::Command::new("xdg-open");

    command.arg(path).spawn().map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use promptcode_test_utils::TestWorkspace;

    #[test]
    fn test_parse_list_alias() {
        let cli = Cli::try_parse_from(["promptcode", "ls"]).unwrap();
        assert!(matches!(cli.command, Commands::List));
    }

    #[test]
    fn test_parse_get_with_open() {
        let cli = Cli::try_parse_from(["promptcode", "get", "demo", "--open"]).unwrap();
        match cli.command {
            Commands::Get { name, open } => {
                assert_eq!(name, "demo");
                assert!(open);
            }
            _ => panic!("expected get"),
        }
    }

    #[test]
    fn test_get_requires_name() {
        assert!(Cli::try_parse_from(["promptcode", "get"]).is_err());
    }

    #[test]
    fn test_save_requires_files() {
        assert!(Cli::try_parse_from(["promptcode", "save", "p"]).is_err());
        let cli = Cli::try_parse_from(["promptcode", "save", "p", "a.rs", "b.rs", "-d", "two"])
            .unwrap();
        match cli.command {
            Commands::Save {
                name,
                files,
                description,
            } => {
                assert_eq!(name, "p");
                assert_eq!(files, vec!["a.rs".to_string(), "b.rs".to_string()]);
                assert_eq!(description.as_deref(), Some("two"));
            }
            _ => panic!("expected save"),
        }
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "promptcode",
            "--workspace",
            "/srv/ws",
            "--tokenizer",
            "approx",
            "list",
        ])
        .unwrap();
        let mut config = AppConfig::default();
        apply_flags(&mut config, &cli);
        assert_eq!(config.workspace.root.as_deref(), Some("/srv/ws"));
        assert_eq!(config.tokenizer.default, "approx");
    }

    #[tokio::test]
    async fn test_export_bundle_writes_temp_file() {
        let ws = TestWorkspace::demo();
        let assembler = ws.assembler();

        let path = export_bundle(&assembler, "demo").await.unwrap();
        let file_name = path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(file_name.starts_with("preset-demo-"));
        assert!(file_name.ends_with(".txt"));

        let written = std::fs::read_to_string(&path).unwrap();
        let expected = assembler.bundle("demo").await.unwrap().to_string();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(written, expected);
    }

    #[tokio::test]
    async fn test_export_missing_preset() {
        let ws = TestWorkspace::demo();
        let err = export_bundle(&ws.assembler(), "ghost").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ContextError>(),
            Some(ContextError::PresetNotFound { .. })
        ));
    }
}
