use clap::{Parser, Subcommand};
use quotesheet::config::{self, AppConfig};
use quotesheet::downloader;
use quotesheet::loader;
use quotesheet::{FileWorkbook, ProjectSheet, RetryingStore, create_project, list_projects};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quotesheet-cli")]
#[command(about = "Inspect and update project quotations in a workbook file", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Workbook file (overrides the configured one)
    #[arg(long)]
    workbook: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List projects whose name contains FILTER
    Projects {
        #[arg(default_value = "")]
        filter: String,
    },

    /// Create an empty project worksheet
    Create { name: String },

    /// Print a project's line items and terms
    Show { name: String },

    /// Save a CSV quotation into a project, writing only the rows that changed
    Import { name: String, csv: PathBuf },

    /// Write a project's quotation to CSV
    Export { name: String, out: PathBuf },

    /// Print a project's terms & conditions
    Terms { name: String },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_from_file(path)?,
        None => AppConfig::default(),
    };
    let workbook_path = cli.workbook.clone().unwrap_or_else(|| config.workbook_path.clone());
    let layout = config.layout();
    let mut store = RetryingStore::new(FileWorkbook::open(&workbook_path)?, config.retry_policy());

    match cli.command {
        Commands::Projects { filter } => {
            for name in list_projects(&store, &filter)? {
                println!("{}", name);
            }
        }
        Commands::Create { name } => {
            create_project(&mut store, &layout, &name)?;
            println!("Created project '{}'", name.trim());
        }
        Commands::Show { name } => {
            let sheet = ProjectSheet::open(&mut store, &layout, &name)?;
            let table = sheet.load_table()?;
            println!("Project: {}", name);
            for row in table.to_sheet_values() {
                println!("{}", row.join(" | "));
            }
            println!("Total: {:.2}", table.total());
            for (label, value) in sheet.read_terms().entries() {
                println!("{}: {}", label, value);
            }
        }
        Commands::Import { name, csv } => {
            let table = loader::from_csv(&csv)?;
            let mut sheet = ProjectSheet::open(&mut store, &layout, &name)?;
            let report = sheet.save_changes(&table)?;
            println!(
                "Saved {} row(s) to '{}' in {} write(s)",
                report.rows_written, name, report.writes
            );
        }
        Commands::Export { name, out } => {
            let sheet = ProjectSheet::open(&mut store, &layout, &name)?;
            let table = sheet.load_table()?;
            std::fs::write(&out, downloader::to_csv(&table))?;
            println!("Wrote {} item(s) to {}", table.len(), out.display());
        }
        Commands::Terms { name } => {
            let sheet = ProjectSheet::open(&mut store, &layout, &name)?;
            for (label, value) in sheet.read_terms().entries() {
                println!("{}: {}", label, value);
            }
        }
    }

    Ok(())
}
