// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

// Use library instead of local modules
use operation_history::{
    group_accounts_operations_by_day, load_accounts, render_text, Account, GroupOpsByDayOpts,
    HistoryConfig,
};

#[derive(Parser)]
#[command(name = "operation-history")]
#[command(about = "Paginated, day-grouped history across accounts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print one page of the merged history
    Show {
        /// Accounts file (.json or .csv); defaults to HISTORY_DATA
        path: Option<PathBuf>,

        /// Records to return; defaults to HISTORY_PAGE_SIZE
        #[arg(long)]
        count: Option<usize>,

        /// Only merge top-level accounts
        #[arg(long, default_value_t = false)]
        no_sub_accounts: bool,

        /// Print the page as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Browse the history interactively
    Browse {
        /// Accounts file (.json or .csv); defaults to HISTORY_DATA
        path: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Silent if there is no .env
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let config = HistoryConfig::from_env()?;

    match cli.cmd {
        Commands::Show {
            path,
            count,
            no_sub_accounts,
            json,
        } => {
            let accounts = load(path, &config)?;
            let opts = GroupOpsByDayOpts::new(count.unwrap_or(config.page_size))
                .with_sub_accounts(config.with_sub_accounts && !no_sub_accounts);
            run_show(&accounts, opts, json)?;
        }
        Commands::Browse { path } => {
            let accounts = load(path, &config)?;
            run_ui_mode(accounts, &config)?;
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: Option<PathBuf>, config: &HistoryConfig) -> Result<Vec<Account>> {
    let path = path
        .or_else(|| config.data_path.clone())
        .context("No accounts file given (pass a path or set HISTORY_DATA)")?;
    load_accounts(&path)
}

fn run_show(accounts: &[Account], opts: GroupOpsByDayOpts, json: bool) -> Result<()> {
    let page = group_accounts_operations_by_day(accounts, opts);

    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
    } else {
        print!("{}", render_text(&page));
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(accounts: Vec<Account>, config: &HistoryConfig) -> Result<()> {
    let mut app = ui::App::new(accounts, config.page_size, config.with_sub_accounts);
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_accounts: Vec<Account>, _config: &HistoryConfig) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use: operation-history show <file>");
    std::process::exit(1);
}
