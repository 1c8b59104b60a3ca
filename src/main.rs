use clap::{Parser, Subcommand};
use semdex::Result;
use semdex::commands;
use semdex::config::{Config, get_config_dir};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "semdex")]
#[command(about = "Semantic document indexing and hybrid search")]
#[command(version)]
struct Cli {
    /// Directory holding the vector index (defaults to <config dir>/index)
    #[arg(long, global = true, value_name = "PATH")]
    index_dir: Option<PathBuf>,

    /// Configuration directory (defaults to the platform config dir)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index files or directories into the vector store
    Index {
        /// Files and/or directories to index
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Recurse into subdirectories
        #[arg(long, short = 'r')]
        recursive: bool,
        /// Only index these document types (pdf, docx, excel, text)
        #[arg(long, value_delimiter = ',')]
        types: Vec<String>,
    },
    /// Search the index with a natural-language query
    Search {
        query: String,
        /// Number of results to return
        #[arg(long, short = 'n', default_value_t = 5)]
        count: usize,
        /// Drop results scoring below this similarity
        #[arg(long, default_value_t = 0.0)]
        min_score: f32,
        /// Re-rank results using literal query-token matches
        #[arg(long)]
        text_matches: bool,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run searches in a prompt loop
    Interactive,
    /// Show index statistics and embedding server health
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },
    /// Break the index down by document type and file
    Analyze {
        /// Print the analysis as JSON
        #[arg(long)]
        json: bool,
    },
    /// Find stored chunks containing a literal string
    FindText {
        needle: String,
        /// Match case exactly
        #[arg(long)]
        case_sensitive: bool,
        /// Print the matches as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete the entire index
    Clear {
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Copy the index directory to a backup location
    Backup {
        /// Destination directory
        dest: PathBuf,
    },
    /// Replace the index with a backup copy
    Restore {
        /// Backup directory to restore from
        src: PathBuf,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Dump raw search candidates with lexical analysis
    Debug {
        query: String,
        /// Number of candidates to fetch
        #[arg(long, short = 'n', default_value_t = 5)]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::new("semdex=debug")
    } else {
        tracing_subscriber::EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_dir = match &cli.config {
        Some(dir) => dir.clone(),
        None => get_config_dir()?,
    };
    let mut config = Config::load(&config_dir)?;
    config.index_override = cli.index_dir.clone();

    match cli.command {
        Commands::Index {
            paths,
            recursive,
            types,
        } => {
            commands::index(&config, &paths, recursive, &types).await?;
        }
        Commands::Search {
            query,
            count,
            min_score,
            text_matches,
            json,
        } => {
            commands::search(&config, &query, count, min_score, text_matches, json).await?;
        }
        Commands::Interactive => {
            commands::interactive(&config).await?;
        }
        Commands::Status { json } => {
            commands::status(&config, json).await?;
        }
        Commands::Analyze { json } => {
            commands::analyze(&config, json).await?;
        }
        Commands::FindText {
            needle,
            case_sensitive,
            json,
        } => {
            commands::find_text(&config, &needle, case_sensitive, json).await?;
        }
        Commands::Clear { yes } => {
            commands::clear(&config, yes).await?;
        }
        Commands::Backup { dest } => {
            commands::backup(&config, &dest)?;
        }
        Commands::Restore { src, yes } => {
            commands::restore(&config, &src, yes)?;
        }
        Commands::Debug { query, count } => {
            commands::debug(&config, &query, count).await?;
        }
    }

    Ok(())
}
