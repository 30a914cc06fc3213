//! Demonstration of keygram's capture-and-aggregation engine.
//!
//! Captures for 30 seconds into a throwaway database and prints the running
//! frequency tables every few seconds.
//!
//! Run with: cargo run --example capture_demo
//!
//! Note: Requires Input Monitoring permission on macOS.

use keygram::{
    capture::check_permission,
    store::{CountStore, NgramTable},
    Engine, PRIVACY_DECLARATION,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn main() {
    println!("keygram - Capture Demo");
    println!("======================");
    println!("{PRIVACY_DECLARATION}");

    print!("Checking input monitoring permission... ");
    if check_permission() {
        println!("OK ✓");
    } else {
        println!("FAILED ✗");
        println!();
        println!("Please grant Input Monitoring permission:");
        println!("1. Open System Settings > Privacy & Security > Input Monitoring");
        println!("2. Add this application");
        println!("3. Restart this demo");
        return;
    }
    println!();

    // Throwaway database so the demo never touches real counts.
    let db_path = std::env::temp_dir().join("keygram-demo.db");
    let store = Arc::new(CountStore::open(&db_path).expect("open demo store"));
    let _ = store.clear_all();

    let mut engine = Engine::new(store.clone());
    if let Err(e) = engine.start() {
        eprintln!("Error starting capture: {e}");
        return;
    }

    println!("Capturing for 30 seconds... try typing!");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    let start = std::time::Instant::now();
    let mut last_report = std::time::Instant::now();

    while running.load(Ordering::SeqCst) && start.elapsed() < Duration::from_secs(30) {
        std::thread::sleep(Duration::from_millis(200));

        if last_report.elapsed() >= Duration::from_secs(5) {
            let _ = store.flush();
            println!(
                "[{}s] {} characters counted",
                start.elapsed().as_secs(),
                store.total_count(NgramTable::Characters)
            );
            last_report = std::time::Instant::now();
        }
    }

    println!();
    println!("Stopping capture...");
    engine.stop();

    for table in NgramTable::ALL {
        let rows = store.top_n(table, 5);
        println!();
        println!("Top {}:", table.table_name());
        if rows.is_empty() {
            println!("  (empty)");
        }
        for (key, count) in rows {
            println!("  {key:<6} {count}");
        }
    }

    println!();
    println!("Demo database: {db_path:?}");
    println!("Demo complete!");
}
