//! keygram CLI
//!
//! Privacy-bounded keystroke n-gram frequency counter.

use clap::{Parser, Subcommand};
use keygram::{
    capture::check_permission,
    config::Config,
    store::{CountStore, NgramTable},
    Engine, PRIVACY_DECLARATION, VERSION,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "keygram")]
#[command(version = VERSION)]
#[command(about = "Privacy-bounded keystroke n-gram frequency counter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start counting keystrokes (runs in the foreground)
    Start,

    /// Pause a running agent
    Pause,

    /// Resume a paused agent
    Resume,

    /// Show permission, monitoring, and counter status
    Status {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the most frequent n-grams
    Stats {
        /// Which table to query (characters, bigrams, trigrams)
        #[arg(long, default_value = "characters")]
        table: NgramTable,

        /// Number of rows to show
        #[arg(long, short, default_value = "10")]
        limit: u32,
    },

    /// Erase all collected counts
    Clear,

    /// Change the counter database location
    SetDbPath {
        /// New database file path
        path: PathBuf,
    },

    /// Display privacy declaration
    Privacy,

    /// Show configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start => cmd_start(),
        Commands::Pause => cmd_pause(),
        Commands::Resume => cmd_resume(),
        Commands::Status { json } => cmd_status(json),
        Commands::Stats { table, limit } => cmd_stats(table, limit),
        Commands::Clear => cmd_clear(),
        Commands::SetDbPath { path } => cmd_set_db_path(path),
        Commands::Privacy => println!("{PRIVACY_DECLARATION}"),
        Commands::Config => cmd_config(),
    }
}

fn open_store(config: &Config) -> Arc<CountStore> {
    match CountStore::open(&config.database_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!(
                "Error: could not open counter database at {:?}: {e}",
                config.database_path
            );
            std::process::exit(1);
        }
    }
}

fn cmd_start() {
    println!("keygram v{VERSION}");
    println!();

    let mut config = Config::load().unwrap_or_default();
    let store = open_store(&config);
    let mut engine = Engine::new(store.clone());

    if !engine.check_permission() {
        engine.request_permission();
        eprintln!("Error: input monitoring permission not granted.");
        eprintln!();
        eprintln!("To grant permission:");
        eprintln!("1. Open System Settings > Privacy & Security > Input Monitoring");
        eprintln!("2. Add this application to the allowed list");
        eprintln!("3. Run `keygram start` again");
        std::process::exit(1);
    }

    println!("Counter database: {:?}", config.database_path);
    println!("Press Ctrl+C to stop");
    println!();

    // Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    // Honor a pre-existing pause; `keygram resume` will pick things up.
    let mut paused = config.paused;
    if paused {
        println!("Collection is currently paused.");
        println!("Run `keygram resume` to start counting.");
        println!();
    } else if let Err(e) = engine.start() {
        eprintln!("Error starting capture: {e}");
        std::process::exit(1);
    }

    // Main loop: the engine's worker does the counting; this thread only
    // polls the config file so `keygram pause/resume/set-db-path` from
    // another process can control a running agent.
    let mut last_config_check = std::time::Instant::now();
    while running.load(Ordering::SeqCst) {
        if last_config_check.elapsed() >= Duration::from_secs(1) {
            if let Ok(cfg) = Config::load() {
                if cfg.paused != paused {
                    paused = cfg.paused;
                    if paused {
                        println!();
                        println!("Pausing collection...");
                        engine.stop();
                    } else {
                        println!();
                        println!("Resuming collection...");
                        if let Err(e) = engine.start() {
                            eprintln!("Error resuming capture: {e}");
                            std::process::exit(1);
                        }
                    }
                }

                if cfg.database_path != config.database_path {
                    println!();
                    println!("Relocating counter database to {:?}...", cfg.database_path);
                    match store.relocate(&cfg.database_path) {
                        Ok(()) => config.database_path = cfg.database_path,
                        Err(e) => eprintln!("Error relocating database: {e}"),
                    }
                }
            }
            last_config_check = std::time::Instant::now();
        }

        thread::sleep(Duration::from_millis(100));
    }

    println!();
    println!("Stopping collection...");
    let session_start = engine.started_at();
    engine.stop();

    print_summary(&store, session_start);
}

fn cmd_pause() {
    let mut config = Config::load().unwrap_or_default();
    config.paused = true;
    if let Err(e) = config.save() {
        eprintln!("Error saving config: {e}");
        std::process::exit(1);
    }
    println!("Collection paused. Use 'keygram resume' to continue.");
}

fn cmd_resume() {
    let mut config = Config::load().unwrap_or_default();
    config.paused = false;
    if let Err(e) = config.save() {
        eprintln!("Error saving config: {e}");
        std::process::exit(1);
    }
    println!("Collection resumed.");
}

fn cmd_status(json: bool) {
    let config = Config::load().unwrap_or_default();
    let has_permission = check_permission();
    let store = open_store(&config);

    if json {
        let status = serde_json::json!({
            "has_permission": has_permission,
            "paused": config.paused,
            "database_path": config.database_path,
            "total_characters": store.total_count(NgramTable::Characters),
        });
        println!("{}", serde_json::to_string_pretty(&status).unwrap());
        return;
    }

    println!("keygram Status");
    println!("==============");
    println!();
    println!(
        "Input Monitoring Permission: {}",
        if has_permission {
            "Granted ✓"
        } else {
            "Not Granted ✗"
        }
    );
    println!("Paused: {}", config.paused);
    println!("Counter database: {:?}", config.database_path);
    println!();
    println!(
        "Total characters counted: {}",
        store.total_count(NgramTable::Characters)
    );
}

fn cmd_stats(table: NgramTable, limit: u32) {
    let config = Config::load().unwrap_or_default();
    let store = open_store(&config);

    let rows = store.top_n(table, limit);
    if rows.is_empty() {
        println!("No data recorded in the {} table yet.", table.table_name());
        println!("Run 'keygram start' to begin counting.");
        return;
    }

    println!("Top {} in {}:", rows.len(), table.table_name());
    for (i, (key, count)) in rows.iter().enumerate() {
        println!("  {:>3}. {:<6} {count}", i + 1, key);
    }
}

fn cmd_clear() {
    let config = Config::load().unwrap_or_default();
    let store = open_store(&config);

    match store.clear_all() {
        Ok(()) => println!("All counters cleared."),
        Err(e) => {
            eprintln!("Error clearing counters: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_set_db_path(path: PathBuf) {
    let mut config = Config::load().unwrap_or_default();
    config.database_path = path.clone();
    if let Err(e) = config.save() {
        eprintln!("Error saving config: {e}");
        std::process::exit(1);
    }
    println!("Counter database path set to {path:?}.");
    println!("A running agent will switch over within a second.");
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

/// End-of-session summary printed after a stop.
fn print_summary(store: &CountStore, session_start: Option<chrono::DateTime<chrono::Utc>>) {
    println!();
    println!("Session Summary");
    println!("===============");
    if let Some(start) = session_start {
        let duration = chrono::Utc::now().signed_duration_since(start);
        println!(
            "Session started: {} ({} seconds ago)",
            start.format("%Y-%m-%d %H:%M:%S UTC"),
            duration.num_seconds().max(0)
        );
    }
    println!(
        "Total characters counted: {}",
        store.total_count(NgramTable::Characters)
    );
    for table in NgramTable::ALL {
        let rows = store.top_n(table, 5);
        if rows.is_empty() {
            continue;
        }
        println!();
        println!("Top {}:", table.table_name());
        for (key, count) in rows {
            println!("  {key:<6} {count}");
        }
    }
}
