//! N-gram extraction from the live symbol stream.
//!
//! A fixed-capacity trailing window holds the last three captured symbols;
//! each new symbol yields the unigram, bigram, and trigram counter keys to
//! record. The window is the only keystroke state the engine retains, and it
//! is cleared whenever monitoring stops.

use crate::capture::Symbol;
use crate::store::{CountStore, NgramTable};
use std::collections::VecDeque;
use std::sync::Arc;

/// Trailing window of the most recently captured symbols.
///
/// Length never exceeds [`NgramWindow::CAPACITY`]; insertion appends and then
/// trims from the front.
#[derive(Debug, Default)]
pub struct NgramWindow {
    symbols: VecDeque<Symbol>,
}

impl NgramWindow {
    /// Maximum number of retained symbols. Bounds both memory and privacy
    /// exposure: nothing older than a trigram ever exists.
    pub const CAPACITY: usize = 3;

    pub fn new() -> Self {
        Self {
            symbols: VecDeque::with_capacity(Self::CAPACITY + 1),
        }
    }

    /// Append a symbol, dropping the oldest entry when over capacity.
    pub fn push(&mut self, symbol: Symbol) {
        self.symbols.push_back(symbol);
        if self.symbols.len() > Self::CAPACITY {
            self.symbols.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Empty the window.
    pub fn clear(&mut self) {
        self.symbols.clear();
    }

    /// Key for the most recent symbol, if any.
    pub fn unigram(&self) -> Option<String> {
        self.symbols.back().map(|s| s.as_str().to_owned())
    }

    /// Key concatenating the last two symbols, if the window holds at least two.
    pub fn bigram(&self) -> Option<String> {
        self.suffix_key(2)
    }

    /// Key concatenating all three symbols, if the window is full.
    pub fn trigram(&self) -> Option<String> {
        self.suffix_key(3)
    }

    fn suffix_key(&self, n: usize) -> Option<String> {
        if self.symbols.len() < n {
            return None;
        }
        Some(
            self.symbols
                .iter()
                .skip(self.symbols.len() - n)
                .map(Symbol::as_str)
                .collect(),
        )
    }
}

/// Binds the window to the counting store: one `observe` call per captured
/// symbol, enqueueing increments for each derived n-gram.
pub struct NgramRecorder {
    window: NgramWindow,
    store: Arc<CountStore>,
}

impl NgramRecorder {
    pub fn new(store: Arc<CountStore>) -> Self {
        Self {
            window: NgramWindow::new(),
            store,
        }
    }

    /// Record a captured symbol.
    ///
    /// Enqueues the unigram increment, then the bigram (window length >= 2),
    /// then the trigram (window full), in that order, before returning.
    /// Increments are fire-and-forget; this never waits on storage I/O.
    pub fn observe(&mut self, symbol: Symbol) {
        self.window.push(symbol);

        if let Some(key) = self.window.unigram() {
            self.store.increment(NgramTable::Characters, &key);
        }
        if let Some(key) = self.window.bigram() {
            self.store.increment(NgramTable::Bigrams, &key);
        }
        if let Some(key) = self.window.trigram() {
            self.store.increment(NgramTable::Trigrams, &key);
        }
    }

    /// Empty the window. Called once per monitoring stop, never during
    /// active capture.
    pub fn reset(&mut self) {
        self.window.clear();
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{ControlKey, Symbol};

    fn sym(s: &str) -> Symbol {
        Symbol::Printable(s.to_string())
    }

    #[test]
    fn test_window_capacity_bounded() {
        let mut window = NgramWindow::new();
        for s in ["a", "b", "c", "d", "e"] {
            window.push(sym(s));
            assert!(window.len() <= NgramWindow::CAPACITY);
        }
        assert_eq!(window.trigram().unwrap(), "cde");
    }

    #[test]
    fn test_ngram_derivation_by_length() {
        let mut window = NgramWindow::new();
        assert_eq!(window.unigram(), None);

        window.push(sym("t"));
        assert_eq!(window.unigram().unwrap(), "t");
        assert_eq!(window.bigram(), None);
        assert_eq!(window.trigram(), None);

        window.push(sym("h"));
        assert_eq!(window.unigram().unwrap(), "h");
        assert_eq!(window.bigram().unwrap(), "th");
        assert_eq!(window.trigram(), None);

        window.push(sym("e"));
        assert_eq!(window.unigram().unwrap(), "e");
        assert_eq!(window.bigram().unwrap(), "he");
        assert_eq!(window.trigram().unwrap(), "the");
    }

    #[test]
    fn test_control_glyphs_in_keys() {
        let mut window = NgramWindow::new();
        window.push(sym("a"));
        window.push(Symbol::Control(ControlKey::Space));
        window.push(sym("b"));
        assert_eq!(window.trigram().unwrap(), "a␣b");
    }

    #[test]
    fn test_clear_empties_window() {
        let mut window = NgramWindow::new();
        window.push(sym("x"));
        window.push(sym("y"));
        window.clear();
        assert!(window.is_empty());
        assert_eq!(window.unigram(), None);
        assert_eq!(window.bigram(), None);
    }
}
