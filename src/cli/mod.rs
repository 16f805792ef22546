pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "entity-audit")]
#[command(about = "entity-audit - audit column migrations and database checks")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Print the audit column migration for one or more tables")]
    Ddl {
        #[arg(long = "table", required = true, help = "Table to migrate (repeatable)")]
        tables: Vec<String>,

        #[arg(long, help = "Print the revert migration instead")]
        down: bool,
    },

    #[command(about = "Apply the audit column migration in one transaction")]
    Migrate {
        #[arg(long = "table", required = true, help = "Table to migrate (repeatable)")]
        tables: Vec<String>,

        #[arg(long, help = "Revert the migration instead")]
        down: bool,

        #[arg(long, help = "Database name (defaults to the one in DATABASE_URL)")]
        database: Option<String>,
    },

    #[command(about = "Check connectivity to the main database")]
    Health,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Direction of the audit column migration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn from_flag(down: bool) -> Self {
        if down {
            Direction::Down
        } else {
            Direction::Up
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Ddl { tables, down } => {
            commands::ddl::handle(&tables, Direction::from_flag(down), output_format)
        }
        Commands::Migrate { tables, down, database } => {
            commands::migrate::handle(&tables, Direction::from_flag(down), database, output_format).await
        }
        Commands::Health => commands::health::handle(output_format).await,
    }
}
