//! # louvor-types
//!
//! Shared records for the worship-team repertoire suite.
//!
//! These types are used by:
//! - `backend-rust`: roster generation, weekly repertoire assembly, local store
//! - the admin tooling, which reads and writes the same JSON store file
//!
//! ## Conventions
//!
//! - Instants are stored in UTC; the business week is computed in the
//!   congregation's local offset by the backend and stored as its UTC start.
//! - Roster dates are plain calendar dates (no time of day).
//! - JSON field names are camelCase.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of songs in one weekly repertoire.
pub const SLOTS_PER_WEEK: usize = 6;

// ── Song ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SongId(pub Uuid);

impl SongId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SongId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SongId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A catalog entry. At most one song in the whole catalog is featured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: SongId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub artist: Option<String>,
    pub lyrics: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub chords: Option<String>,
    /// External media link (video, streaming page)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub media_url: Option<String>,
    /// "New song of the week", pinned to position 1 when present
    #[serde(rename = "isFeaturedThisWeek", default)]
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
}

impl Song {
    pub fn new(title: impl Into<String>, lyrics: impl Into<String>) -> Self {
        Self {
            id: SongId::new(),
            title: title.into(),
            artist: None,
            lyrics: lyrics.into(),
            chords: None,
            media_url: None,
            is_featured: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_chords(mut self, chords: impl Into<String>) -> Self {
        self.chords = Some(chords.into());
        self
    }

    pub fn with_media_url(mut self, url: impl Into<String>) -> Self {
        self.media_url = Some(url.into());
        self
    }

    pub fn featured(mut self) -> Self {
        self.is_featured = true;
        self
    }
}

// ── Weekly Repertoire ─────────────────────────────────────────────────────────

/// Position of a song inside the weekly repertoire, always in `1..=6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SlotPosition(u8);

impl SlotPosition {
    pub const FIRST: SlotPosition = SlotPosition(1);

    pub fn new(position: u8) -> Option<Self> {
        if (1..=SLOTS_PER_WEEK as u8).contains(&position) {
            Some(Self(position))
        } else {
            None
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Positions 1 through 6 in order.
    pub fn all() -> impl Iterator<Item = SlotPosition> {
        (1..=SLOTS_PER_WEEK as u8).map(SlotPosition)
    }
}

impl TryFrom<u8> for SlotPosition {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("slot position {value} outside 1..={SLOTS_PER_WEEK}"))
    }
}

impl From<SlotPosition> for u8 {
    fn from(position: SlotPosition) -> Self {
        position.0
    }
}

impl fmt::Display for SlotPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One (week, position, song) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepertoireSlot {
    pub id: Uuid,
    /// UTC instant of the business week start (Monday 03:00 local)
    pub week_start: DateTime<Utc>,
    pub position: SlotPosition,
    pub song_id: SongId,
    /// true when a curator placed the song, false for automatic generation
    pub is_manual: bool,
}

impl RepertoireSlot {
    pub fn new(week_start: DateTime<Utc>, position: SlotPosition, song_id: SongId, is_manual: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            week_start,
            position,
            song_id,
            is_manual,
        }
    }
}

// ── Duty Roster ───────────────────────────────────────────────────────────────

/// Members on duty for one date. `members[0]` is the fixed member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub date: NaiveDate,
    pub year: i32,
    pub members: Vec<String>,
}

impl RosterEntry {
    pub fn new(date: NaiveDate, members: Vec<String>) -> Self {
        Self {
            date,
            year: date.year(),
            members,
        }
    }

    /// Members chosen by rotation (everyone after the fixed member).
    pub fn rotating_members(&self) -> &[String] {
        self.members.get(1..).unwrap_or(&[])
    }
}
