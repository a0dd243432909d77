use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use flomo_core::export::UrlMode;
use flomo_core::models::{SortDirection, SortField, SortOrder};

#[derive(Parser)]
#[command(name = "flomo")]
#[command(about = "Mirror flomo memos locally, then list, search and export them offline")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pull memos from flomo into the local store
    Sync {
        /// Resume after the newest stored memo instead of starting over
        #[arg(long)]
        incremental: bool,
    },
    /// Show local store and sync state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List stored memos
    List {
        #[command(flatten)]
        page: PageArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search stored memos by content or tag
    Search {
        /// Search query
        query: String,
        #[command(flatten)]
        page: PageArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export stored memos
    Export {
        /// Export format
        #[arg(short, long, value_enum, default_value_t = ExportFormatArg::Json)]
        format: ExportFormatArg,
        /// Single-line JSON
        #[arg(long)]
        compact: bool,
        /// Leave out dates, tags and links
        #[arg(long)]
        no_meta: bool,
        /// Markdown content only
        #[arg(long)]
        min: bool,
        /// How Markdown refers back to each memo
        #[arg(long, value_enum, default_value_t = UrlModeArg::Full)]
        url: UrlModeArg,
        #[arg(long, value_enum, default_value_t = OrderByArg::CreatedAt)]
        order_by: OrderByArg,
        #[arg(long, value_enum, default_value_t = OrderDirArg::Desc)]
        order_dir: OrderDirArg,
        /// Export at most this many memos
        #[arg(short, long)]
        limit: Option<usize>,
        /// Output file, or a directory to write a timestamped file into (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Store the flomo token or show the current configuration
    Config {
        /// Authorization token copied from the flomo web app
        #[arg(long, value_name = "TOKEN")]
        token: Option<String>,
        /// Print the effective configuration
        #[arg(long)]
        show: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

/// Ordering and paging shared by `list` and `search`
#[derive(Args, Clone, Copy, Debug)]
pub struct PageArgs {
    #[arg(long, value_enum, default_value_t = OrderByArg::CreatedAt)]
    pub order_by: OrderByArg,
    #[arg(long, value_enum, default_value_t = OrderDirArg::Desc)]
    pub order_dir: OrderDirArg,
    /// Number of memos to skip
    #[arg(long, default_value = "0")]
    pub offset: i64,
    /// Number of memos to show
    #[arg(short, long, default_value = "20")]
    pub limit: i64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormatArg {
    Json,
    Markdown,
    Table,
}

impl From<ExportFormatArg> for flomo_core::export::ExportFormat {
    fn from(value: ExportFormatArg) -> Self {
        match value {
            ExportFormatArg::Json => Self::Json,
            ExportFormatArg::Markdown => Self::Markdown,
            ExportFormatArg::Table => Self::Table,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum UrlModeArg {
    Full,
    Id,
    None,
}

impl From<UrlModeArg> for UrlMode {
    fn from(value: UrlModeArg) -> Self {
        match value {
            UrlModeArg::Full => Self::Full,
            UrlModeArg::Id => Self::Id,
            UrlModeArg::None => Self::None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum OrderByArg {
    CreatedAt,
    UpdatedAt,
}

impl OrderByArg {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum OrderDirArg {
    Asc,
    Desc,
}

impl OrderDirArg {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Combine the two order flags into a store ordering
pub const fn sort_order(order_by: OrderByArg, order_dir: OrderDirArg) -> SortOrder {
    let field = match order_by {
        OrderByArg::CreatedAt => SortField::CreatedAt,
        OrderByArg::UpdatedAt => SortField::UpdatedAt,
    };
    let direction = match order_dir {
        OrderDirArg::Asc => SortDirection::Asc,
        OrderDirArg::Desc => SortDirection::Desc,
    };
    SortOrder::new(field, direction)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
