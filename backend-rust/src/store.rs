//! # store
//!
//! Collaborator ports consumed by the roster and repertoire services, plus
//! [`LocalStore`], a JSON-file implementation of all of them.
//!
//! Every `LocalStore` mutation is applied to a copy of the data, written to
//! disk (temp file + rename) and only then swapped in, all under the write
//! lock. Concurrent readers see either the previous batch or the new one.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use louvor_types::{RepertoireSlot, RosterEntry, SlotPosition, Song, SongId};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::StoreError;

// ── Ports ─────────────────────────────────────────────────────────────────────

/// Read side of the song catalog.
#[async_trait]
pub trait SongCatalog: Send + Sync {
    async fn list_songs(&self) -> Result<Vec<Song>, StoreError>;

    async fn find_song(&self, id: SongId) -> Result<Option<Song>, StoreError> {
        Ok(self.list_songs().await?.into_iter().find(|s| s.id == id))
    }

    /// The featured song, if any. More than one is an integrity error.
    async fn find_featured_song(&self) -> Result<Option<Song>, StoreError> {
        let mut featured: Vec<Song> = self.list_songs().await?.into_iter().filter(|s| s.is_featured).collect();
        match featured.len() {
            0 => Ok(None),
            1 => Ok(featured.pop()),
            n => Err(StoreError::Integrity(format!("{n} songs are flagged as featured"))),
        }
    }
}

/// Write side of the song catalog (admin tooling).
#[async_trait]
pub trait SongLibrary: SongCatalog {
    /// Inserts or replaces by id.
    async fn save_song(&self, song: Song) -> Result<(), StoreError>;

    /// Returns whether a song was removed. Slots referencing it are left alone.
    async fn delete_song(&self, id: SongId) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait RepertoireStore: Send + Sync {
    /// Atomically replaces every slot of the week starting at `week_start`.
    async fn replace_week_slots(&self, week_start: DateTime<Utc>, slots: Vec<RepertoireSlot>) -> Result<(), StoreError>;

    async fn week_slots(&self, week_start: DateTime<Utc>) -> Result<Vec<RepertoireSlot>, StoreError>;

    /// Replaces the slot with the same id.
    async fn update_slot(&self, slot: RepertoireSlot) -> Result<(), StoreError>;

    /// Returns whether a slot was removed.
    async fn delete_slot(&self, week_start: DateTime<Utc>, position: SlotPosition) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait RosterStore: Send + Sync {
    async fn year_has_entries(&self, year: i32) -> Result<bool, StoreError>;

    /// Stores a whole year in one write. Fails with [`StoreError::YearNotEmpty`]
    /// if `year` already has entries; nothing is written in that case.
    async fn insert_year(&self, year: i32, entries: &[RosterEntry]) -> Result<(), StoreError>;

    /// Swaps every entry of `year` for `entries` in one write. Returns the
    /// number of entries replaced.
    async fn replace_year(&self, year: i32, entries: &[RosterEntry]) -> Result<usize, StoreError>;

    async fn entries_for_year(&self, year: i32) -> Result<Vec<RosterEntry>, StoreError>;

    /// Returns the number of entries removed.
    async fn delete_year(&self, year: i32) -> Result<usize, StoreError>;
}

// ── Local Store ───────────────────────────────────────────────────────────────

/// Everything the local store persists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreData {
    #[serde(default)]
    pub songs: Vec<Song>,
    #[serde(default)]
    pub repertoire: Vec<RepertoireSlot>,
    #[serde(default)]
    pub roster: Vec<RosterEntry>,
}

/// In-memory store, optionally backed by a JSON file. Cheap to clone.
#[derive(Clone, Default)]
pub struct LocalStore {
    data: Arc<RwLock<StoreData>>,
    path: Option<Arc<PathBuf>>,
}

impl LocalStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens the store file at `path`. A missing file starts an empty store.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = load_data(&path).await?;
        Ok(Self {
            data: Arc::new(RwLock::new(data)),
            path: Some(Arc::new(path)),
        })
    }

    pub async fn snapshot(&self) -> StoreData {
        self.data.read().await.clone()
    }

    async fn mutate<T, F>(&self, apply: F) -> Result<T, StoreError>
    where
        T: Send,
        F: FnOnce(&mut StoreData) -> Result<T, StoreError> + Send,
    {
        let mut guard = self.data.write().await;
        let mut next = guard.clone();
        let out = apply(&mut next)?;
        if let Some(path) = &self.path {
            save_data(path, &next).await?;
        }
        *guard = next;
        Ok(out)
    }
}

async fn load_data(path: &Path) -> Result<StoreData, StoreError> {
    if !fs::try_exists(path).await? {
        info!("No store file at {}, starting empty", path.display());
        return Ok(StoreData::default());
    }

    let raw = fs::read_to_string(path).await?;
    let data: StoreData = serde_json::from_str(&raw)?;
    info!(
        "Loaded store from {} ({} songs, {} slots, {} roster entries)",
        path.display(),
        data.songs.len(),
        data.repertoire.len(),
        data.roster.len()
    );
    Ok(data)
}

async fn save_data(path: &Path, data: &StoreData) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_string_pretty(data)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).await?;
    fs::rename(&tmp, path).await?;
    debug!("Store saved to {}", path.display());
    Ok(())
}

#[async_trait]
impl SongCatalog for LocalStore {
    async fn list_songs(&self) -> Result<Vec<Song>, StoreError> {
        let mut songs = self.data.read().await.songs.clone();
        songs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(songs)
    }

    async fn find_song(&self, id: SongId) -> Result<Option<Song>, StoreError> {
        Ok(self.data.read().await.songs.iter().find(|s| s.id == id).cloned())
    }
}

#[async_trait]
impl SongLibrary for LocalStore {
    async fn save_song(&self, song: Song) -> Result<(), StoreError> {
        self.mutate(move |data| {
            if song.is_featured {
                if let Some(existing) = data.songs.iter().find(|s| s.is_featured && s.id != song.id) {
                    return Err(StoreError::FeaturedConflict { existing: existing.id });
                }
            }
            match data.songs.iter_mut().find(|s| s.id == song.id) {
                Some(slot) => *slot = song,
                None => data.songs.push(song),
            }
            Ok(())
        })
        .await
    }

    async fn delete_song(&self, id: SongId) -> Result<bool, StoreError> {
        self.mutate(move |data| {
            let before = data.songs.len();
            data.songs.retain(|s| s.id != id);
            Ok(data.songs.len() != before)
        })
        .await
    }
}

#[async_trait]
impl RepertoireStore for LocalStore {
    async fn replace_week_slots(&self, week_start: DateTime<Utc>, slots: Vec<RepertoireSlot>) -> Result<(), StoreError> {
        self.mutate(move |data| {
            data.repertoire.retain(|s| s.week_start != week_start);
            data.repertoire.extend(slots);
            Ok(())
        })
        .await
    }

    async fn week_slots(&self, week_start: DateTime<Utc>) -> Result<Vec<RepertoireSlot>, StoreError> {
        let data = self.data.read().await;
        let mut slots: Vec<RepertoireSlot> = data.repertoire.iter().filter(|s| s.week_start == week_start).cloned().collect();
        slots.sort_by_key(|s| s.position);
        Ok(slots)
    }

    async fn update_slot(&self, slot: RepertoireSlot) -> Result<(), StoreError> {
        self.mutate(move |data| match data.repertoire.iter_mut().find(|s| s.id == slot.id) {
            Some(existing) => {
                *existing = slot;
                Ok(())
            }
            None => Err(StoreError::SlotNotFound(slot.id)),
        })
        .await
    }

    async fn delete_slot(&self, week_start: DateTime<Utc>, position: SlotPosition) -> Result<bool, StoreError> {
        self.mutate(move |data| {
            let before = data.repertoire.len();
            data.repertoire.retain(|s| !(s.week_start == week_start && s.position == position));
            Ok(data.repertoire.len() != before)
        })
        .await
    }
}

#[async_trait]
impl RosterStore for LocalStore {
    async fn year_has_entries(&self, year: i32) -> Result<bool, StoreError> {
        Ok(self.data.read().await.roster.iter().any(|e| e.year == year))
    }

    async fn insert_year(&self, year: i32, entries: &[RosterEntry]) -> Result<(), StoreError> {
        let entries = entries.to_vec();
        self.mutate(move |data| {
            if data.roster.iter().any(|e| e.year == year) {
                return Err(StoreError::YearNotEmpty { year });
            }
            data.roster.extend(entries);
            Ok(())
        })
        .await
    }

    async fn replace_year(&self, year: i32, entries: &[RosterEntry]) -> Result<usize, StoreError> {
        let entries = entries.to_vec();
        self.mutate(move |data| {
            let before = data.roster.len();
            data.roster.retain(|e| e.year != year);
            let replaced = before - data.roster.len();
            data.roster.extend(entries);
            Ok(replaced)
        })
        .await
    }

    async fn entries_for_year(&self, year: i32) -> Result<Vec<RosterEntry>, StoreError> {
        let data = self.data.read().await;
        Ok(data.roster.iter().filter(|e| e.year == year).cloned().collect())
    }

    async fn delete_year(&self, year: i32) -> Result<usize, StoreError> {
        self.mutate(move |data| {
            let before = data.roster.len();
            data.roster.retain(|e| e.year != year);
            Ok(before - data.roster.len())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn second_featured_song_is_rejected() {
        let store = LocalStore::in_memory();
        let first = Song::new("Primeira", "...").featured();
        store.save_song(first.clone()).await.unwrap();

        let second = Song::new("Segunda", "...").featured();
        let err = store.save_song(second).await.unwrap_err();
        assert!(matches!(err, StoreError::FeaturedConflict { existing } if existing == first.id));

        // Re-saving the featured song itself is fine.
        store.save_song(first.clone().with_artist("Ministério")).await.unwrap();
        assert_eq!(store.find_featured_song().await.unwrap().map(|s| s.id), Some(first.id));
    }

    fn entry(y: i32, m: u32, d: u32, member: &str) -> RosterEntry {
        RosterEntry::new(NaiveDate::from_ymd_opt(y, m, d).unwrap(), vec!["X".into(), member.into()])
    }

    #[tokio::test]
    async fn insert_year_refuses_an_occupied_year() {
        let store = LocalStore::in_memory();
        store.insert_year(2027, &[entry(2027, 1, 3, "A")]).await.unwrap();

        let err = store.insert_year(2027, &[entry(2027, 1, 10, "B")]).await.unwrap_err();
        assert!(matches!(err, StoreError::YearNotEmpty { year: 2027 }));
        assert_eq!(store.entries_for_year(2027).await.unwrap(), vec![entry(2027, 1, 3, "A")]);

        assert!(store.year_has_entries(2027).await.unwrap());
        assert!(!store.year_has_entries(2028).await.unwrap());
        assert_eq!(store.delete_year(2027).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn replace_year_swaps_only_that_year() {
        let store = LocalStore::in_memory();
        store.insert_year(2027, &[entry(2027, 1, 3, "A"), entry(2027, 1, 10, "B")]).await.unwrap();
        store.insert_year(2028, &[entry(2028, 1, 2, "C")]).await.unwrap();

        let replaced = store.replace_year(2027, &[entry(2027, 1, 3, "D")]).await.unwrap();
        assert_eq!(replaced, 2);
        assert_eq!(store.entries_for_year(2027).await.unwrap(), vec![entry(2027, 1, 3, "D")]);
        assert_eq!(store.entries_for_year(2028).await.unwrap(), vec![entry(2028, 1, 2, "C")]);
    }

    #[tokio::test]
    async fn find_song_by_id() {
        let store = LocalStore::in_memory();
        let song = Song::new("Santo", "...");
        store.save_song(song.clone()).await.unwrap();

        assert_eq!(store.find_song(song.id).await.unwrap(), Some(song));
        assert_eq!(store.find_song(SongId::new()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_of_unknown_slot_fails() {
        let store = LocalStore::in_memory();
        let slot = RepertoireSlot::new(Utc::now(), SlotPosition::FIRST, SongId::new(), true);
        assert!(matches!(store.update_slot(slot).await, Err(StoreError::SlotNotFound(_))));
    }
}
