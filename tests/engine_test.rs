//! Integration tests for the recorder pipeline and engine lifecycle.
//!
//! These run against the in-memory store and, where the platform has no real
//! capture backend, drive the engine through its injection hook.

use keygram::capture::{normalize_key_event, ControlKey, Symbol};
use keygram::ngram::NgramRecorder;
use keygram::store::{CountStore, NgramTable};
use std::sync::Arc;

fn sym(s: &str) -> Symbol {
    Symbol::Printable(s.to_string())
}

#[test]
fn test_observe_the_records_expected_ngrams() {
    let store = Arc::new(CountStore::open_in_memory().unwrap());
    let mut recorder = NgramRecorder::new(store.clone());

    for s in ["t", "h", "e"] {
        recorder.observe(sym(s));
    }
    store.flush().unwrap();

    // Unigrams: t, h, e each once.
    let chars = store.top_n(NgramTable::Characters, 10);
    assert_eq!(chars.len(), 3);
    assert!(chars.iter().all(|(_, count)| *count == 1));

    // Bigrams: th, he.
    let bigrams = store.top_n(NgramTable::Bigrams, 10);
    assert_eq!(
        bigrams,
        vec![("he".to_string(), 1), ("th".to_string(), 1)]
    );

    // Trigram: the.
    assert_eq!(
        store.top_n(NgramTable::Trigrams, 10),
        vec![("the".to_string(), 1)]
    );
}

#[test]
fn test_characters_total_equals_accepted_symbols() {
    let store = Arc::new(CountStore::open_in_memory().unwrap());
    let mut recorder = NgramRecorder::new(store.clone());

    let inputs = ["h", "e", "l", "l", "o", "␣", "h", "i"];
    for s in &inputs {
        recorder.observe(sym(s));
    }
    store.flush().unwrap();

    assert_eq!(
        store.total_count(NgramTable::Characters),
        inputs.len() as u64
    );
}

#[test]
fn test_ngrams_ramp_up_from_empty_window() {
    let store = Arc::new(CountStore::open_in_memory().unwrap());
    let mut recorder = NgramRecorder::new(store.clone());

    recorder.observe(sym("a"));
    store.flush().unwrap();
    assert_eq!(store.total_count(NgramTable::Characters), 1);
    assert_eq!(store.total_count(NgramTable::Bigrams), 0);
    assert_eq!(store.total_count(NgramTable::Trigrams), 0);

    recorder.observe(sym("b"));
    store.flush().unwrap();
    assert_eq!(store.total_count(NgramTable::Characters), 2);
    assert_eq!(store.total_count(NgramTable::Bigrams), 1);
    assert_eq!(store.total_count(NgramTable::Trigrams), 0);

    recorder.observe(sym("c"));
    store.flush().unwrap();
    assert_eq!(store.total_count(NgramTable::Characters), 3);
    assert_eq!(store.total_count(NgramTable::Bigrams), 2);
    assert_eq!(store.total_count(NgramTable::Trigrams), 1);
}

#[test]
fn test_reset_prevents_leakage_across_sessions() {
    let store = Arc::new(CountStore::open_in_memory().unwrap());
    let mut recorder = NgramRecorder::new(store.clone());

    recorder.observe(sym("x"));
    recorder.observe(sym("y"));
    recorder.reset();
    assert_eq!(recorder.window_len(), 0);

    // After a reset the next observation behaves like a fresh window: no
    // bigram bridging the old session.
    recorder.observe(sym("z"));
    store.flush().unwrap();

    let bigrams = store.top_n(NgramTable::Bigrams, 10);
    assert_eq!(bigrams, vec![("xy".to_string(), 1)]);
    assert_eq!(store.total_count(NgramTable::Trigrams), 0);
}

#[test]
fn test_dropped_events_touch_nothing() {
    let store = Arc::new(CountStore::open_in_memory().unwrap());
    let mut recorder = NgramRecorder::new(store.clone());

    // Empty decode and unnamed control characters never become symbols,
    // so they never reach the recorder.
    for decoded in ["", "\u{1b}", "\u{07}"] {
        if let Some(symbol) = normalize_key_event(None, decoded) {
            recorder.observe(symbol);
        }
    }
    store.flush().unwrap();

    for table in NgramTable::ALL {
        assert_eq!(store.total_count(table), 0);
    }
}

#[test]
fn test_control_symbols_count_like_characters() {
    let store = Arc::new(CountStore::open_in_memory().unwrap());
    let mut recorder = NgramRecorder::new(store.clone());

    recorder.observe(sym("a"));
    recorder.observe(Symbol::Control(ControlKey::Space));
    recorder.observe(sym("b"));
    store.flush().unwrap();

    assert_eq!(
        store.top_n(NgramTable::Trigrams, 1),
        vec![("a␣b".to_string(), 1)]
    );
    let chars = store.top_n(NgramTable::Characters, 10);
    assert!(chars.iter().any(|(key, _)| key == "␣"));
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
mod lifecycle {
    use super::*;
    use keygram::Engine;
    use std::time::{Duration, Instant};

    fn wait_for_total(store: &CountStore, table: NgramTable, expected: u64) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            store.flush().unwrap();
            if store.total_count(table) == expected {
                return;
            }
            assert!(
                Instant::now() < deadline,
                "timed out waiting for {} total {expected}",
                table.table_name()
            );
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_start_stop_updates_status() {
        let store = Arc::new(CountStore::open_in_memory().unwrap());
        let mut engine = Engine::new(store);
        let status = engine.status();

        assert!(status.has_permission());
        assert!(!status.is_monitoring());

        engine.start().unwrap();
        assert!(status.is_monitoring());

        // Idempotent start.
        engine.start().unwrap();
        assert!(status.is_monitoring());

        engine.stop();
        assert!(!status.is_monitoring());
        engine.stop();
        assert!(!status.is_monitoring());
    }

    #[test]
    fn test_started_at_tracks_session() {
        let store = Arc::new(CountStore::open_in_memory().unwrap());
        let mut engine = Engine::new(store);

        assert!(engine.started_at().is_none());

        let before = chrono::Utc::now();
        engine.start().unwrap();
        let started = engine.started_at().expect("active session has a start time");
        assert!(started >= before);
        assert!(started <= chrono::Utc::now());

        engine.stop();
        assert!(engine.started_at().is_none());
    }

    #[test]
    fn test_injected_symbols_flow_to_store() {
        let store = Arc::new(CountStore::open_in_memory().unwrap());
        let mut engine = Engine::new(store.clone());
        engine.start().unwrap();

        for s in ["t", "h", "e"] {
            engine.inject_symbol(sym(s));
        }
        wait_for_total(&store, NgramTable::Characters, 3);

        engine.stop();
        assert_eq!(
            store.top_n(NgramTable::Trigrams, 1),
            vec![("the".to_string(), 1)]
        );
    }

    #[test]
    fn test_window_does_not_leak_across_stop_start() {
        let store = Arc::new(CountStore::open_in_memory().unwrap());
        let mut engine = Engine::new(store.clone());

        engine.start().unwrap();
        engine.inject_symbol(sym("a"));
        engine.inject_symbol(sym("b"));
        wait_for_total(&store, NgramTable::Characters, 2);
        engine.stop();

        engine.start().unwrap();
        engine.inject_symbol(sym("c"));
        wait_for_total(&store, NgramTable::Characters, 3);
        engine.stop();

        // "bc" would require the window to survive the stop.
        let bigrams = store.top_n(NgramTable::Bigrams, 10);
        assert_eq!(bigrams, vec![("ab".to_string(), 1)]);
    }

    #[test]
    fn test_no_symbols_observed_after_stop() {
        let store = Arc::new(CountStore::open_in_memory().unwrap());
        let mut engine = Engine::new(store.clone());

        engine.start().unwrap();
        engine.inject_symbol(sym("a"));
        wait_for_total(&store, NgramTable::Characters, 1);
        engine.stop();

        // Injection while stopped queues nothing the engine will observe;
        // the queue is drained on stop and the worker is gone.
        engine.inject_symbol(sym("z"));
        std::thread::sleep(Duration::from_millis(50));
        store.flush().unwrap();
        assert_eq!(store.total_count(NgramTable::Characters), 1);
    }
}
