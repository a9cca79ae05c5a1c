use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::Ticker;
use crate::source::{DirectoryEntry, DirectorySource};

/// Used when the directory cannot be loaded, or lacks a symbol.
const STATIC_IDENTIFIERS: &[(&str, &str)] = &[
    ("btc", "bitcoin"),
    ("eth", "ethereum"),
    ("somi", "somi"),
    ("avnt", "avant"),
    ("aster", "aster"),
    ("tree", "tree"),
];

type IdentifierMap = HashMap<String, String>;

/// Process-wide ticker -> Secondary identifier lookup.
///
/// The directory is fetched once, on first use or via [`warm`](Self::warm),
/// and never expires. Loads run outside the lock and publish a finished map
/// with a single swap, so concurrent first callers may each load but readers
/// only ever see no map or a complete one (last writer wins).
///
/// Symbols are not unique upstream. When two entries share a symbol the one
/// listed last wins, which is effectively arbitrary.
pub struct IdentifierCache {
    directory: Arc<dyn DirectorySource>,
    map: RwLock<Option<Arc<IdentifierMap>>>,
}

impl IdentifierCache {
    pub fn new(directory: Arc<dyn DirectorySource>) -> Self {
        Self {
            directory,
            map: RwLock::new(None),
        }
    }

    /// Secondary identifier for `ticker`, or `None` if nobody knows it.
    pub async fn resolve(&self, ticker: &Ticker) -> Option<String> {
        let key = ticker.lower();

        let map = match self.snapshot().await {
            Some(map) => Some(map),
            None => self.load().await,
        };

        if let Some(id) = map.as_ref().and_then(|m| m.get(&key)) {
            return Some(id.clone());
        }

        let id = static_identifier(&key);
        if id.is_some() {
            debug!(symbol = %ticker, "identifier served from static table");
        }
        id
    }

    /// Eager load at startup. Returns the number of cached symbols.
    pub async fn warm(&self) -> usize {
        match self.load().await {
            Some(map) => map.len(),
            None => 0,
        }
    }

    /// Number of symbols in the published map.
    pub async fn len(&self) -> usize {
        self.snapshot().await.map_or(0, |m| m.len())
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn snapshot(&self) -> Option<Arc<IdentifierMap>> {
        self.map.read().await.clone()
    }

    async fn load(&self) -> Option<Arc<IdentifierMap>> {
        let entries = match self.directory.load_directory().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "identifier directory load failed, using static table");
                return None;
            }
        };

        let map = build_map(entries);
        if map.is_empty() {
            warn!("identifier directory was empty, using static table");
            return None;
        }

        let map = Arc::new(map);
        *self.map.write().await = Some(Arc::clone(&map));

        info!(symbols = map.len(), "identifier directory loaded");
        Some(map)
    }
}

fn build_map(entries: Vec<DirectoryEntry>) -> IdentifierMap {
    let mut map = HashMap::with_capacity(entries.len());

    for entry in entries {
        let symbol = entry.symbol.trim().to_lowercase();
        if symbol.is_empty() || entry.id.is_empty() {
            continue;
        }
        map.insert(symbol, entry.id);
    }

    map
}

fn static_identifier(key: &str) -> Option<String> {
    STATIC_IDENTIFIERS
        .iter()
        .find(|(symbol, _)| *symbol == key)
        .map(|(_, id)| (*id).to_string())
}
