//! Ragex CLI — code-intelligence server with MCP transport.
//!
//! Usage:
//!   ragex mcp [--transport stdio] [--project path] [--config path]
//!   ragex index <path> [--project path]
//!   ragex cache stats|clear [--all] [--older-than-days N]

use clap::{Parser, Subcommand};
use ragex::engine::CancellationToken;
use ragex::persist::CacheScope;
use ragex::RagexConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "ragex",
    version,
    about = "Code-intelligence server: knowledge graph, hybrid retrieval, safe refactoring"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP (Model Context Protocol) server
    Mcp {
        /// Transport type (currently only stdio)
        #[arg(long, default_value = "stdio")]
        transport: String,
        /// Project root (defaults to the current directory)
        #[arg(long)]
        project: Option<PathBuf>,
        /// Path to a JSON config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// One-shot incremental indexing of a file or directory
    Index {
        /// File or directory to index
        path: PathBuf,
        /// Project root (defaults to the current directory)
        #[arg(long)]
        project: Option<PathBuf>,
        /// Path to a JSON config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Cache maintenance
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Show cache sizes, counts, and model info
    Stats,
    /// Delete cached project data
    Clear {
        /// Clear every project, not just the current one
        #[arg(long)]
        all: bool,
        /// Only clear caches older than this many days
        #[arg(long)]
        older_than_days: Option<u64>,
    },
}

fn project_or_cwd(project: Option<PathBuf>) -> PathBuf {
    project.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn load_config(path: Option<PathBuf>) -> Result<RagexConfig, i32> {
    RagexConfig::load(path.as_deref()).map_err(|e| {
        eprintln!("failed to load config: {}", e);
        1
    })
}

fn run_index(path: PathBuf, project: Option<PathBuf>, config: Option<PathBuf>) -> i32 {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to create tokio runtime: {}", e);
            return 1;
        }
    };

    rt.block_on(async {
        let config = match load_config(config) {
            Ok(config) => config,
            Err(code) => return code,
        };
        let engine = ragex::mcp::build_engine(project_or_cwd(project), config);
        engine.load_cache();

        let cancel = CancellationToken::new();
        match engine.analyze(&path, &cancel).await {
            Ok(report) => {
                if let Err(e) = engine.save_cache() {
                    eprintln!("failed to persist cache: {}", e);
                    return 1;
                }
                println!(
                    "analyzed {} files, skipped {}, removed {}, {} errors in {} ms",
                    report.analyzed,
                    report.skipped,
                    report.deleted,
                    report.errors.len(),
                    report.elapsed_ms
                );
                for error in &report.errors {
                    eprintln!("  {}: {}", error.path.display(), error.message);
                }
                0
            }
            Err(e) => {
                eprintln!("indexing failed: {}", e);
                1
            }
        }
    })
}

fn run_cache(command: CacheCommands) -> i32 {
    let config = match load_config(None) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let engine = ragex::mcp::build_engine(project_or_cwd(None), config);
    let persistence = engine.persistence();

    match command {
        CacheCommands::Stats => match persistence.stats(CacheScope::All) {
            Ok(stats) => {
                for project in &stats.projects {
                    println!(
                        "{}  {:>10} bytes  entities={:?}  model={}",
                        project.project_hash,
                        project.size_bytes,
                        project.entity_count,
                        project.model_id.as_deref().unwrap_or("?")
                    );
                }
                println!("total: {} bytes", stats.total_size_bytes);
                0
            }
            Err(e) => {
                eprintln!("cache stats failed: {}", e);
                1
            }
        },
        CacheCommands::Clear {
            all,
            older_than_days,
        } => {
            let scope = if let Some(days) = older_than_days {
                CacheScope::OlderThan(Duration::from_secs(days * 24 * 3600))
            } else if all {
                CacheScope::All
            } else {
                CacheScope::Current
            };
            match persistence.clear(scope) {
                Ok(removed) => {
                    println!("removed {} cached project(s)", removed);
                    0
                }
                Err(e) => {
                    eprintln!("cache clear failed: {}", e);
                    1
                }
            }
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Mcp {
            transport,
            project,
            config,
        } => {
            if transport != "stdio" {
                eprintln!("error: only 'stdio' transport is currently supported");
                std::process::exit(1);
            }
            ragex::mcp::run_mcp_server(project, config)
        }
        Commands::Index {
            path,
            project,
            config,
        } => run_index(path, project, config),
        Commands::Cache { command } => run_cache(command),
    };
    std::process::exit(code);
}
