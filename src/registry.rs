//! Registry of renderable game units keyed by component path
//!
//! Each entry pairs the stable string key stored in the catalog with a
//! factory that builds the unit. Units are constructed the first time a
//! resolved handle is loaded and shared afterwards.

use crate::db::GameRecord;
use crate::error::RegistryError;
use crate::games;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, warn};

/// A self-contained game UI. It owns its own state and needs nothing from
/// the page that mounts it.
pub trait GameUnit: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Markup for the game, inserted into the page content area
    fn render(&self) -> String;
}

/// Factory function type for creating game units.
pub type UnitFactory = fn() -> Box<dyn GameUnit>;

struct RegistryEntry {
    factory: UnitFactory,
    unit: OnceCell<Arc<dyn GameUnit>>,
}

/// A resolved registry entry. Loading it materialises the unit.
#[derive(Clone)]
pub struct UnitHandle {
    key: String,
    entry: Arc<RegistryEntry>,
}

impl UnitHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Build the unit on first use, then hand out the shared instance
    pub async fn load(&self) -> Arc<dyn GameUnit> {
        let factory = self.entry.factory;
        let unit = self
            .entry
            .unit
            .get_or_init(|| async move { Arc::from(factory()) })
            .await;
        Arc::clone(unit)
    }

    pub fn is_loaded(&self) -> bool {
        self.entry.unit.initialized()
    }
}

impl std::fmt::Debug for UnitHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitHandle")
            .field("key", &self.key)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// Registry mapping component paths to unit factories.
#[derive(Default)]
pub struct GameRegistry {
    entries: BTreeMap<String, Arc<RegistryEntry>>,
}

impl GameRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every game shipped with the portal
    pub fn with_builtin_games() -> Self {
        let mut registry = Self::new();
        registry.register(games::NumberGuess::KEY, || Box::new(games::NumberGuess::new()));
        registry
    }

    /// Add or replace an entry
    pub fn register(&mut self, key: impl Into<String>, factory: UnitFactory) -> &mut Self {
        self.entries.insert(
            key.into(),
            Arc::new(RegistryEntry {
                factory,
                unit: OnceCell::new(),
            }),
        );
        self
    }

    /// Remove an entry; returns whether it existed
    pub fn unregister(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Look up the unit for a component path
    pub fn resolve(&self, path: &str) -> Option<UnitHandle> {
        self.entries.get(path).map(|entry| UnitHandle {
            key: path.to_string(),
            entry: Arc::clone(entry),
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check that every catalog record has a registered unit
    pub fn validate(&self, records: &[GameRecord]) -> Result<(), RegistryError> {
        let mut paths: Vec<String> = records
            .iter()
            .filter(|r| !self.entries.contains_key(&r.game_component_path))
            .map(|r| r.game_component_path.clone())
            .collect();

        if paths.is_empty() {
            return Ok(());
        }

        paths.sort();
        paths.dedup();
        Err(RegistryError::Unregistered { paths })
    }

    /// Startup check of the catalog. Logs every unregistered path; in
    /// strict mode any miss is an error, otherwise the misses are returned
    /// and those games render as unavailable.
    pub fn check_catalog(&self, records: &[GameRecord], strict: bool) -> Result<Vec<String>, RegistryError> {
        let Err(e) = self.validate(records) else {
            return Ok(Vec::new());
        };

        let RegistryError::Unregistered { paths } = &e;
        for path in paths {
            warn!(path = %path, "Catalog entry has no registered game unit");
        }

        if strict {
            error!("Refusing to start with unregistered games (set registry.strict = false to allow)");
            return Err(e);
        }

        let RegistryError::Unregistered { paths } = e;
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NUMBER_GUESS_PATH;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static BUILDS: AtomicUsize = AtomicUsize::new(0);

    struct Counting;

    impl GameUnit for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn render(&self) -> String {
            "<p>counting</p>".to_string()
        }
    }

    fn counting_factory() -> Box<dyn GameUnit> {
        BUILDS.fetch_add(1, Ordering::SeqCst);
        Box::new(Counting)
    }

    fn record(id: i64, path: &str) -> GameRecord {
        GameRecord {
            id,
            title: format!("Game {}", id),
            description: None,
            icon_url: String::new(),
            game_component_path: path.to_string(),
        }
    }

    #[test]
    fn test_builtin_games_registered() {
        let registry = GameRegistry::with_builtin_games();
        assert_eq!(registry.len(), 1);
        assert!(registry.resolve(NUMBER_GUESS_PATH).is_some());
    }

    #[test]
    fn test_resolve_unknown_is_none() {
        let registry = GameRegistry::with_builtin_games();
        assert!(registry.resolve("MemoryMatch/MemoryMatchGame.js").is_none());
        assert!(registry.resolve("").is_none());
    }

    #[tokio::test]
    async fn test_units_are_built_lazily_once() {
        let mut registry = GameRegistry::new();
        registry.register("Counting/Counting.js", counting_factory);
        let before = BUILDS.load(Ordering::SeqCst);

        let handle = registry.resolve("Counting/Counting.js").unwrap();
        assert!(!handle.is_loaded());
        assert_eq!(BUILDS.load(Ordering::SeqCst), before);

        let unit = handle.load().await;
        assert_eq!(unit.name(), "counting");
        assert!(handle.is_loaded());

        // A second resolution shares the already built unit
        let again = registry.resolve("Counting/Counting.js").unwrap();
        assert!(again.is_loaded());
        again.load().await;
        assert_eq!(BUILDS.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn test_unregister() {
        let mut registry = GameRegistry::with_builtin_games();
        assert!(registry.unregister(NUMBER_GUESS_PATH));
        assert!(!registry.unregister(NUMBER_GUESS_PATH));
        assert!(registry.is_empty());
        assert!(registry.resolve(NUMBER_GUESS_PATH).is_none());
    }

    #[test]
    fn test_validate() {
        let registry = GameRegistry::with_builtin_games();
        assert!(registry.validate(&[record(1, NUMBER_GUESS_PATH)]).is_ok());
        assert!(registry.validate(&[]).is_ok());

        let err = registry
            .validate(&[
                record(1, NUMBER_GUESS_PATH),
                record(2, "Shapes/ShapesGame.js"),
                record(3, "Colors/ColorsGame.js"),
            ])
            .unwrap_err();
        let RegistryError::Unregistered { paths } = err;
        assert_eq!(paths, vec!["Colors/ColorsGame.js", "Shapes/ShapesGame.js"]);
    }

    #[test]
    fn test_check_catalog_strict_refuses_missing_units() {
        let registry = GameRegistry::with_builtin_games();
        let records = [record(1, NUMBER_GUESS_PATH), record(2, "Shapes/ShapesGame.js")];

        let err = registry.check_catalog(&records, true).unwrap_err();
        assert_eq!(
            err.to_string(),
            "catalog references unregistered game components: Shapes/ShapesGame.js"
        );

        assert!(registry.check_catalog(&records[..1], true).unwrap().is_empty());
    }

    #[test]
    fn test_check_catalog_lenient_reports_missing_units() {
        let registry = GameRegistry::with_builtin_games();
        let records = [record(1, NUMBER_GUESS_PATH), record(2, "Shapes/ShapesGame.js")];

        let missing = registry.check_catalog(&records, false).unwrap();
        assert_eq!(missing, vec!["Shapes/ShapesGame.js"]);
    }

    #[test]
    fn test_keys_sorted() {
        let mut registry = GameRegistry::with_builtin_games();
        registry.register("Alpha/Alpha.js", counting_factory);
        let keys: Vec<&str> = registry.keys().collect();
        assert_eq!(keys, vec!["Alpha/Alpha.js", NUMBER_GUESS_PATH]);
    }
}
