//! # repertoire
//!
//! Weekly repertoire: six songs per business week. A featured song
//! ("new song of the week") always takes position 1; the remaining positions
//! are filled at random from the rest of the catalog.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, TimeZone, Utc};
use louvor_types::{RepertoireSlot, SlotPosition, Song, SongId, SLOTS_PER_WEEK};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::calendar::WeekWindow;
use crate::error::RepertoireError;
use crate::store::{RepertoireStore, SongCatalog};

/// The single featured song of the catalog, if any.
pub fn featured_song(songs: &[Song]) -> Result<Option<&Song>, RepertoireError> {
    let featured: Vec<&Song> = songs.iter().filter(|s| s.is_featured).collect();
    match featured.as_slice() {
        [] => Ok(None),
        [song] => Ok(Some(*song)),
        many => Err(RepertoireError::MultipleFeatured {
            ids: many.iter().map(|s| s.id).collect(),
        }),
    }
}

pub struct RepertoireAssembler;

impl RepertoireAssembler {
    /// Builds the six automatic slots for the week starting at `week_start`.
    pub fn assemble<R: Rng + ?Sized>(
        songs: &[Song],
        week_start: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<Vec<RepertoireSlot>, RepertoireError> {
        let featured = featured_song(songs)?;
        let others_needed = if featured.is_some() { SLOTS_PER_WEEK - 1 } else { SLOTS_PER_WEEK };

        let mut candidates: Vec<&Song> = songs.iter().filter(|s| !s.is_featured).collect();
        if candidates.len() < others_needed {
            return Err(RepertoireError::InsufficientCatalog {
                required: SLOTS_PER_WEEK,
                available: candidates.len() + usize::from(featured.is_some()),
            });
        }

        candidates.shuffle(rng);
        candidates.truncate(others_needed);

        let slots: Vec<RepertoireSlot> = featured
            .into_iter()
            .chain(candidates)
            .zip(SlotPosition::all())
            .map(|(song, position)| RepertoireSlot::new(week_start, position, song.id, false))
            .collect();

        validate_batch(&slots, featured.map(|s| s.id))?;
        Ok(slots)
    }
}

/// Checks a complete week: six slots, positions 1..=6 once each, no song
/// twice, and the featured song (if any) at position 1.
pub fn validate_batch(slots: &[RepertoireSlot], featured: Option<SongId>) -> Result<(), RepertoireError> {
    if slots.len() != SLOTS_PER_WEEK {
        return Err(RepertoireError::MalformedBatch(format!(
            "expected {SLOTS_PER_WEEK} slots, got {}",
            slots.len()
        )));
    }
    check_week(slots, featured)?;

    if let Some(featured) = featured {
        if !slots.iter().any(|s| s.song_id == featured) {
            return Err(RepertoireError::MalformedBatch(format!(
                "featured song {featured} must occupy position 1"
            )));
        }
    }
    Ok(())
}

/// Rules that hold for complete and partial weeks alike.
fn check_week(slots: &[RepertoireSlot], featured: Option<SongId>) -> Result<(), RepertoireError> {
    let mut positions = HashSet::with_capacity(slots.len());
    let mut songs = HashSet::with_capacity(slots.len());
    for slot in slots {
        if !positions.insert(slot.position) {
            return Err(RepertoireError::MalformedBatch(format!("position {} used twice", slot.position)));
        }
        if !songs.insert(slot.song_id) {
            return Err(RepertoireError::MalformedBatch(format!("song {} used twice", slot.song_id)));
        }
        if Some(slot.song_id) == featured && slot.position != SlotPosition::FIRST {
            return Err(RepertoireError::MalformedBatch(format!(
                "featured song {} must occupy position 1",
                slot.song_id
            )));
        }
    }
    Ok(())
}

// ── Integrity Audit ───────────────────────────────────────────────────────────

/// Problems found in a stored week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepertoireIssue {
    DuplicateSong { song_id: SongId, count: usize },
    DuplicatePosition { position: SlotPosition, count: usize },
    MissingSong { song_id: SongId, position: SlotPosition },
    FeaturedNotFirst { song_id: SongId, position: SlotPosition },
    Incomplete { slots: usize },
}

/// Audits stored slots against the current catalog.
pub fn audit_slots(slots: &[RepertoireSlot], songs: &[Song]) -> Vec<RepertoireIssue> {
    let mut issues = Vec::new();

    let mut by_song: HashMap<SongId, usize> = HashMap::new();
    let mut by_position: HashMap<SlotPosition, usize> = HashMap::new();
    for slot in slots {
        *by_song.entry(slot.song_id).or_default() += 1;
        *by_position.entry(slot.position).or_default() += 1;
    }

    let mut duplicate_songs: Vec<_> = by_song.into_iter().filter(|(_, n)| *n > 1).collect();
    duplicate_songs.sort();
    issues.extend(duplicate_songs.into_iter().map(|(song_id, count)| RepertoireIssue::DuplicateSong { song_id, count }));

    let mut duplicate_positions: Vec<_> = by_position.into_iter().filter(|(_, n)| *n > 1).collect();
    duplicate_positions.sort();
    issues.extend(
        duplicate_positions
            .into_iter()
            .map(|(position, count)| RepertoireIssue::DuplicatePosition { position, count }),
    );

    let known: HashMap<SongId, &Song> = songs.iter().map(|s| (s.id, s)).collect();
    for slot in slots {
        match known.get(&slot.song_id) {
            None => issues.push(RepertoireIssue::MissingSong {
                song_id: slot.song_id,
                position: slot.position,
            }),
            Some(song) if song.is_featured && slot.position != SlotPosition::FIRST => {
                issues.push(RepertoireIssue::FeaturedNotFirst {
                    song_id: slot.song_id,
                    position: slot.position,
                })
            }
            Some(_) => {}
        }
    }

    if slots.len() != SLOTS_PER_WEEK {
        issues.push(RepertoireIssue::Incomplete { slots: slots.len() });
    }
    issues
}

// ── Repertoire Service ────────────────────────────────────────────────────────

/// Week-scoped repertoire operations. `tz` decides where the Monday 03:00
/// rollover falls.
pub struct RepertoireService<C, S, Tz: TimeZone> {
    catalog: C,
    store: S,
    tz: Tz,
}

impl<C, S, Tz> RepertoireService<C, S, Tz>
where
    C: SongCatalog,
    S: RepertoireStore,
    Tz: TimeZone + Send + Sync,
    Tz::Offset: Send + Sync,
{
    pub fn new(catalog: C, store: S, tz: Tz) -> Self {
        Self { catalog, store, tz }
    }

    /// Window of the business week containing `now`.
    pub fn window(&self, now: DateTime<Utc>) -> WeekWindow<Tz> {
        WeekWindow::containing(&now.with_timezone(&self.tz))
    }

    /// Assembles a fresh automatic repertoire and replaces the current week's.
    pub async fn generate_current_week<R: Rng + Send + ?Sized>(
        &self,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<Vec<RepertoireSlot>, RepertoireError> {
        let week_start = self.window(now).start_utc();
        let songs = self.catalog.list_songs().await?;
        let slots = RepertoireAssembler::assemble(&songs, week_start, rng)?;

        self.store.replace_week_slots(week_start, slots.clone()).await?;
        info!("🎵 Repertoire generated for week of {week_start} ({} songs in catalog)", songs.len());
        Ok(slots)
    }

    /// Current week's slots ordered by position.
    pub async fn current_week(&self, now: DateTime<Utc>) -> Result<Vec<RepertoireSlot>, RepertoireError> {
        let mut slots = self.store.week_slots(self.window(now).start_utc()).await?;
        slots.sort_by_key(|s| s.position);
        Ok(slots)
    }

    /// Curator-chosen repertoire: `song_ids[i]` goes to position `i + 1`.
    pub async fn set_manual(&self, now: DateTime<Utc>, song_ids: &[SongId]) -> Result<Vec<RepertoireSlot>, RepertoireError> {
        if song_ids.len() != SLOTS_PER_WEEK {
            return Err(RepertoireError::WrongSongCount {
                expected: SLOTS_PER_WEEK,
                actual: song_ids.len(),
            });
        }

        let songs = self.catalog.list_songs().await?;
        if let Some(missing) = song_ids.iter().find(|id| !songs.iter().any(|s| s.id == **id)) {
            return Err(RepertoireError::SongNotFound(*missing));
        }

        let week_start = self.window(now).start_utc();
        let slots: Vec<RepertoireSlot> = song_ids
            .iter()
            .zip(SlotPosition::all())
            .map(|(id, position)| RepertoireSlot::new(week_start, position, *id, true))
            .collect();
        validate_batch(&slots, featured_song(&songs)?.map(|s| s.id))?;

        self.store.replace_week_slots(week_start, slots.clone()).await?;
        info!("Repertoire for week of {week_start} set manually");
        Ok(slots)
    }

    /// Puts `song_id` at `position`, keeping the slot's week and position.
    pub async fn swap_slot(
        &self,
        now: DateTime<Utc>,
        position: SlotPosition,
        song_id: SongId,
    ) -> Result<RepertoireSlot, RepertoireError> {
        let songs = self.catalog.list_songs().await?;
        if !songs.iter().any(|s| s.id == song_id) {
            return Err(RepertoireError::SongNotFound(song_id));
        }

        let mut week = self.current_week(now).await?;
        let Some(index) = week.iter().position(|s| s.position == position) else {
            return Err(RepertoireError::SlotNotFound(position));
        };
        week[index].song_id = song_id;
        week[index].is_manual = true;

        let featured = featured_song(&songs)?.map(|s| s.id);
        if week.len() == SLOTS_PER_WEEK {
            validate_batch(&week, featured)?;
        } else {
            check_week(&week, featured)?;
        }

        let slot = week[index].clone();
        self.store.update_slot(slot.clone()).await?;
        info!("Repertoire position {position} now holds song {song_id}");
        Ok(slot)
    }

    pub async fn remove_slot(&self, now: DateTime<Utc>, position: SlotPosition) -> Result<(), RepertoireError> {
        let week_start = self.window(now).start_utc();
        if self.store.delete_slot(week_start, position).await? {
            info!("Repertoire position {position} removed from week of {week_start}");
            Ok(())
        } else {
            Err(RepertoireError::SlotNotFound(position))
        }
    }

    /// Integrity report for the current week.
    pub async fn audit_week(&self, now: DateTime<Utc>) -> Result<Vec<RepertoireIssue>, RepertoireError> {
        let slots = self.current_week(now).await?;
        let songs = self.catalog.list_songs().await?;
        Ok(audit_slots(&slots, &songs))
    }

    /// Regenerates the current week when the audit finds problems. Returns the
    /// issues that triggered the repair (empty when the week was fine).
    pub async fn repair_week<R: Rng + Send + ?Sized>(
        &self,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<Vec<RepertoireIssue>, RepertoireError> {
        let issues = self.audit_week(now).await?;
        if issues.is_empty() {
            return Ok(issues);
        }
        warn!("Repertoire audit found {} issues, regenerating week", issues.len());
        self.generate_current_week(now, rng).await?;
        Ok(issues)
    }
}
