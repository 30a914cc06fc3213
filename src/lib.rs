//! keygram - privacy-bounded keystroke n-gram frequency counter.
//!
//! This library captures system-wide key-down events, normalizes them into
//! symbols, and maintains durable frequency counts of characters, bigrams,
//! and trigrams in a local SQLite database.
//!
//! # Privacy Guarantees
//!
//! - **No keystroke history**: at most the last 3 symbols exist in memory,
//!   only long enough to derive the current n-grams
//! - **Aggregate counts only**: the database holds frequency tables, never
//!   sequences of what was typed
//! - **Cleared on stop**: the rolling window is emptied whenever monitoring
//!   stops
//! - **Local only**: nothing is ever transmitted off the machine
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           keygram                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐    ┌─────────────┐    ┌──────────────┐       │
//! │  │  Capture   │──▶│   N-gram    │──▶│   Counting   │       │
//! │  │ (OS taps)  │    │  Recorder   │    │    Store     │       │
//! │  └────────────┘    │ (3-symbol   │    │  (SQLite,    │       │
//! │        │           │   window)   │    │ one writer)  │       │
//! │        ▼           └─────────────┘    └──────────────┘       │
//! │  ┌────────────┐                                              │
//! │  │   Engine   │  lifecycle, permission state, status         │
//! │  └────────────┘                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use keygram::{config::default_database_path, CountStore, Engine};
//! use std::sync::Arc;
//!
//! let store = Arc::new(CountStore::open(&default_database_path()).expect("open store"));
//! let mut engine = Engine::new(store);
//!
//! // Requires input-monitoring permission on macOS.
//! engine.start().expect("failed to start monitoring");
//! ```

pub mod capture;
pub mod config;
pub mod engine;
pub mod ngram;
pub mod store;

// Re-export key types at crate root for convenience
pub use capture::{CaptureError, ControlKey, Symbol};
pub use config::Config;
pub use engine::{Engine, EngineError, EngineStatus, StatusSnapshot};
pub use ngram::{NgramRecorder, NgramWindow};
pub use store::{CountStore, NgramTable, StoreError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Privacy declaration that can be displayed to users.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║                 KEYGRAM - PRIVACY DECLARATION                    ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This agent counts how often characters and short character      ║
║  sequences are typed. It is a frequency counter, not a logger.   ║
║                                                                  ║
║  ✓ WHAT WE KEEP:                                                 ║
║    • Running counts per character, bigram, and trigram           ║
║    • A rolling window of at most the last 3 keystrokes,          ║
║      in memory only, cleared whenever monitoring stops           ║
║                                                                  ║
║  ✗ WHAT WE NEVER KEEP:                                           ║
║    • Any sequence of what you typed beyond 3 symbols             ║
║    • Timestamps or ordering of individual keystrokes             ║
║    • Which application received the input                        ║
║                                                                  ║
║  All counts are stored locally and never transmitted.            ║
║  You can inspect or erase them anytime with:                     ║
║    keygram stats / keygram clear                                 ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
