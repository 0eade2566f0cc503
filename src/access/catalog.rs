use std::collections::HashSet;

use tracing::{debug, instrument};
use uuid::Uuid;

use super::Capabilities;
use crate::{
    db::{SongExt, SongQuery},
    error::{AccessError, StoreStage},
    models::Song,
};

/// Which part of the catalog a query may touch.
#[derive(Debug, Clone, PartialEq)]
pub enum SongScope {
    /// The unrestricted catalog. Only reachable by admins.
    Catalog,
    /// Exactly these song ids. An empty set means no songs at all.
    Restricted(HashSet<Uuid>),
}

impl SongScope {
    /// An explicit id set always wins. Without one, admins get the catalog
    /// and everyone else gets the empty restriction, never the catalog.
    pub fn for_caller(capabilities: Capabilities, song_ids: Option<HashSet<Uuid>>) -> Self {
        match song_ids {
            Some(ids) => SongScope::Restricted(ids),
            None if capabilities.is_admin => SongScope::Catalog,
            None => SongScope::Restricted(HashSet::new()),
        }
    }
}

/// One page of results plus the number of matches across all pages.
#[derive(Debug, Clone, PartialEq)]
pub struct SongPage<T> {
    pub songs: Vec<T>,
    pub total: i64,
}

impl<T> SongPage<T> {
    pub fn empty() -> Self {
        SongPage {
            songs: Vec::new(),
            total: 0,
        }
    }
}

/// Load the song records visible under `capabilities`, narrowed by the
/// query's filters and paginated.
#[instrument(skip(store, song_ids), fields(restricted = song_ids.is_some()))]
pub async fn resolve_songs<S: SongExt>(
    store: &S,
    capabilities: Capabilities,
    song_ids: Option<HashSet<Uuid>>,
    query: &SongQuery,
) -> Result<SongPage<Song>, AccessError> {
    let (songs, total) = match SongScope::for_caller(capabilities, song_ids) {
        SongScope::Catalog => store.list_songs(None, query).await,
        SongScope::Restricted(ids) if ids.is_empty() => {
            debug!("Empty song scope, skipping catalog query");
            return Ok(SongPage::empty());
        }
        SongScope::Restricted(ids) => {
            let mut ids: Vec<Uuid> = ids.into_iter().collect();
            ids.sort();
            store.list_songs(Some(&ids), query).await
        }
    }
    .map_err(AccessError::data_access(StoreStage::Songs))?;

    debug!(count = songs.len(), total, "Resolved songs");
    Ok(SongPage { songs, total })
}
