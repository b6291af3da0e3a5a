use crate::catalog::{Catalog, CatalogEntry, Slug, CATALOG_FILE};
use crate::table::GameData;
use lru::LruCache;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::OnceCell;

/// Default number of rank tables kept in memory
pub(crate) const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(20) {
    Some(n) => n,
    None => unreachable!(),
};

/// Loads games from a data directory and keeps recently used ones in memory.
///
/// The catalog is read once, on first use, and kept for the life of the
/// store.  Rank tables are read lazily per slug and cached, evicting the
/// least recently accessed table when the cache is full.  Both caches only
/// ever hold immutable data, so losing them (e.g., on process restart) costs
/// nothing but a reload.
#[derive(Debug)]
pub(crate) struct RankingStore {
    data_dir: PathBuf,
    catalog: OnceCell<Arc<Catalog>>,
    tables: Mutex<LruCache<Slug, Arc<GameData>>>,
}

impl RankingStore {
    pub(crate) fn new<P: Into<PathBuf>>(data_dir: P, capacity: NonZeroUsize) -> RankingStore {
        RankingStore {
            data_dir: data_dir.into(),
            catalog: OnceCell::new(),
            tables: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the catalog used for game lookups, reading it on first call.
    /// A failed read is not remembered, so the next call tries again.
    async fn catalog(&self) -> Result<Arc<Catalog>, StoreError> {
        self.catalog
            .get_or_try_init(|| async {
                let catalog = self.read_catalog().await?;
                tracing::info!(games = catalog.len(), "Loaded game catalog");
                Ok::<_, StoreError>(Arc::new(catalog))
            })
            .await
            .cloned()
    }

    /// Read the catalog file as it is now.  Unlike game lookups, this sees
    /// games indexed since the store was created.
    pub(crate) async fn read_catalog(&self) -> Result<Catalog, StoreError> {
        read_json(&self.data_dir.join(CATALOG_FILE)).await
    }

    /// Look up a game by ID
    pub(crate) async fn resolve_game(&self, id: u32) -> Result<CatalogEntry, StoreError> {
        self.catalog()
            .await?
            .get(id)
            .cloned()
            .ok_or(StoreError::UnknownGame(id))
    }

    /// Returns the rank table and hints for the game with the given slug,
    /// loading them if they are not cached
    pub(crate) async fn game_data(&self, slug: &Slug) -> Result<Arc<GameData>, StoreError> {
        let cached = self.lock_tables().get(slug).cloned();
        if let Some(data) = cached {
            return Ok(data);
        }
        let path = self.data_dir.join(slug.file_name());
        let data = match read_json::<GameData>(&path).await {
            Ok(data) => Arc::new(data),
            Err(StoreError::Read { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::MissingArtifact(slug.clone()))
            }
            Err(e) => return Err(e),
        };
        let mut tables = self.lock_tables();
        if let Some((evicted, _)) = tables.push(slug.clone(), Arc::clone(&data)) {
            if &evicted != slug {
                tracing::info!(%evicted, loaded = %slug, "Evicted rank table from cache");
            }
        }
        tracing::info!(
            %slug,
            words = data.table.len(),
            cached = tables.len(),
            capacity = tables.cap().get(),
            "Loaded rank table",
        );
        Ok(data)
    }

    /// Returns true iff the rank table for `slug` is in memory.  Does not
    /// count as an access.
    #[cfg(test)]
    pub(crate) fn is_cached(&self, slug: &Slug) -> bool {
        self.lock_tables().contains(slug)
    }

    fn lock_tables(&self) -> std::sync::MutexGuard<'_, LruCache<Slug, Arc<GameData>>> {
        // The cache holds no invariants a panicking holder could break.
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let src = tokio::fs::read(path).await.map_err(|source| StoreError::Read {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_slice(&src).map_err(|source| StoreError::Parse {
        path: path.to_owned(),
        source,
    })
}

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("no game with ID {0}")]
    UnknownGame(u32),
    #[error("no artifact for game {0}")]
    MissingArtifact(Slug),
    #[error("failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Returns true if the error means the requested game does not exist, as
    /// opposed to the data directory being broken
    pub(crate) fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::UnknownGame(_) | StoreError::MissingArtifact(_)
        )
    }
}
