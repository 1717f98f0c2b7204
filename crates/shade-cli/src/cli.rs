use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use shade_core::SortMode;

#[derive(Parser)]
#[command(name = "shade")]
#[command(about = "Keep your colour swatches in sync, online or off")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local card cache
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional JSON config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List cached cards (works offline)
    #[command(alias = "ls")]
    List {
        /// Only cards whose name contains this text
        #[arg(short, long)]
        search: Option<String>,
        /// Sort order
        #[arg(long, value_enum, default_value_t = SortArg::DateDesc)]
        sort: SortArg,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export cached cards
    Export {
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Output file, or a directory to create a timestamped file in (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Save a new card to your account
    #[command(alias = "new")]
    Add {
        /// Pick a random colour instead of taking a hex code
        #[arg(long)]
        random: bool,
        /// Hex code (unless --random) followed by the colour name
        #[arg(required = true, value_name = "HEX|NAME")]
        values: Vec<String>,
    },
    /// Delete a card from your account (requires a connection)
    #[command(alias = "rm")]
    Delete {
        /// Card ID or unique ID prefix
        id: String,
    },
    /// Mirror the remote document into the cache until interrupted
    Watch,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl From<ExportFormat> for shade_core::export::ExportFormat {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Json => Self::Json,
            ExportFormat::Markdown => Self::Markdown,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SortArg {
    DateAsc,
    DateDesc,
    NameAsc,
    NameDesc,
}

impl From<SortArg> for SortMode {
    fn from(sort: SortArg) -> Self {
        match sort {
            SortArg::DateAsc => Self::DateAsc,
            SortArg::DateDesc => Self::DateDesc,
            SortArg::NameAsc => Self::NameAsc,
            SortArg::NameDesc => Self::NameDesc,
        }
    }
}
