//! Per-symbol strategy instances keyed by (symbol, kind).

use super::{Strategy, StrategyKind, StrategySettings};
use crate::domain::ohlcv::SymbolSeries;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StrategyKey {
    pub symbol: String,
    pub kind: StrategyKind,
}

impl StrategyKey {
    pub fn new(symbol: impl Into<String>, kind: StrategyKind) -> Self {
        Self {
            symbol: symbol.into(),
            kind,
        }
    }
}

/// Owns every strategy instance and the daily history they were opened with.
/// Iteration order is symbol order, then the order kinds were registered in.
pub struct StrategyBook {
    slots: Vec<(StrategyKey, Box<dyn Strategy>)>,
    index: HashMap<StrategyKey, usize>,
    symbols: Vec<String>,
    histories: HashMap<String, SymbolSeries>,
}

impl StrategyBook {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
            symbols: Vec::new(),
            histories: HashMap::new(),
        }
    }

    /// One instance of every kind in `kinds` for every symbol.
    pub fn build(symbols: &[String], kinds: &[StrategyKind], settings: &StrategySettings) -> Self {
        let mut book = Self::new();
        for symbol in symbols {
            for kind in kinds {
                book.insert(kind.build(symbol, settings));
            }
        }
        book
    }

    /// Registers `strategy`, replacing any instance with the same key.
    pub fn insert(&mut self, strategy: Box<dyn Strategy>) {
        let key = StrategyKey::new(strategy.symbol(), strategy.kind());
        if !self.symbols.iter().any(|s| s == &key.symbol) {
            self.symbols.push(key.symbol.clone());
        }
        match self.index.get(&key) {
            Some(&i) => self.slots[i].1 = strategy,
            None => {
                self.index.insert(key.clone(), self.slots.len());
                self.slots.push((key, strategy));
            }
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn keys(&self) -> Vec<StrategyKey> {
        self.slots.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, key: &StrategyKey) -> Option<&dyn Strategy> {
        self.index.get(key).map(|&i| self.slots[i].1.as_ref())
    }

    pub fn get_mut(&mut self, key: &StrategyKey) -> Option<&mut (dyn Strategy + 'static)> {
        match self.index.get(key) {
            Some(&i) => Some(self.slots[i].1.as_mut()),
            None => None,
        }
    }

    pub fn for_symbol(&self, symbol: &str) -> impl Iterator<Item = &dyn Strategy> + '_ {
        let symbol = symbol.to_string();
        self.slots
            .iter()
            .filter(move |(k, _)| k.symbol == symbol)
            .map(|(_, s)| s.as_ref() as &dyn Strategy)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Strategy> + '_ {
        self.slots.iter().map(|(_, s)| s.as_ref() as &dyn Strategy)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Strategy>> + '_ {
        self.slots.iter_mut().map(|(_, s)| s)
    }

    pub fn set_history(&mut self, history: SymbolSeries) {
        self.histories.insert(history.symbol().to_string(), history);
    }

    pub fn history(&self, symbol: &str) -> Option<&SymbolSeries> {
        self.histories.get(symbol)
    }

    pub fn clear_histories(&mut self) {
        self.histories.clear();
    }
}

impl Default for StrategyBook {
    fn default() -> Self {
        Self::new()
    }
}
