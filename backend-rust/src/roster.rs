//! # roster
//!
//! Yearly duty-roster generation for the worship team.
//!
//! Every date gets the fixed member plus a group of `group_size` rotating
//! members. Groups are drawn from all `C(pool, group_size)` combinations,
//! cycled when there are more dates than combinations, shuffled, and then
//! walked with a recency filter so the same group does not come back within
//! `recency_window` consecutive dates.

use std::collections::{HashSet, VecDeque};

use chrono::NaiveDate;
use louvor_types::RosterEntry;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::calendar::sundays_of_year;
use crate::combinations::{combinations, ComboKey};
use crate::error::RosterError;
use crate::store::RosterStore;

/// Probes per date are bounded by `PROBE_FACTOR * sequence.len()`.
const PROBE_FACTOR: usize = 2;

/// Who rotates, who is always on duty, and how groups are sized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterConfig {
    pub rotating_pool: Vec<String>,
    pub fixed_member: String,
    pub group_size: usize,
    pub recency_window: usize,
}

pub struct RosterScheduler {
    config: RosterConfig,
    combos: Vec<ComboKey>,
}

impl RosterScheduler {
    /// Validates the configuration and precomputes the combination pool.
    pub fn new(config: RosterConfig) -> Result<Self, RosterError> {
        if config.group_size == 0 {
            return Err(RosterError::InvalidGroupSize);
        }
        if config.rotating_pool.len() < config.group_size {
            return Err(RosterError::InsufficientPool {
                required: config.group_size,
                available: config.rotating_pool.len(),
            });
        }

        let mut seen = HashSet::new();
        for name in config.rotating_pool.iter().chain(std::iter::once(&config.fixed_member)) {
            if !seen.insert(name.as_str()) {
                return Err(RosterError::DuplicateMember(name.clone()));
            }
        }

        let combos: Vec<ComboKey> = combinations(&config.rotating_pool, config.group_size)
            .into_iter()
            .map(ComboKey::new)
            .collect();

        debug!(
            "Roster pool: {} members, groups of {}, {} combinations",
            config.rotating_pool.len(),
            config.group_size,
            combos.len()
        );

        Ok(Self { config, combos })
    }

    pub fn config(&self) -> &RosterConfig {
        &self.config
    }

    /// Number of distinct rotating groups.
    pub fn combination_count(&self) -> usize {
        self.combos.len()
    }

    /// One entry per date, in the order the dates were given.
    pub fn schedule<R: Rng + ?Sized>(&self, dates: &[NaiveDate], rng: &mut R) -> Result<Vec<RosterEntry>, RosterError> {
        if dates.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen_dates = HashSet::with_capacity(dates.len());
        for date in dates {
            if !seen_dates.insert(*date) {
                return Err(RosterError::DuplicateDate(*date));
            }
        }

        // Cycle the combinations until every date has one, then shuffle so the
        // cycle is not visible across the year.
        let mut sequence: Vec<&ComboKey> = (0..dates.len()).map(|i| &self.combos[i % self.combos.len()]).collect();
        sequence.shuffle(rng);

        let window = self.config.recency_window;
        let mut recent: VecDeque<&ComboKey> = VecDeque::with_capacity(window + 1);
        let mut forced_repeats = 0usize;
        let mut entries = Vec::with_capacity(dates.len());

        for (index, date) in dates.iter().enumerate() {
            let selected = match self.probe(&sequence, index, &recent) {
                Some(combo) => combo,
                None => {
                    forced_repeats += 1;
                    sequence[index]
                }
            };

            if window > 0 {
                recent.push_back(selected);
                if recent.len() > window {
                    recent.pop_front();
                }
            }

            let mut members = Vec::with_capacity(self.config.group_size + 1);
            members.push(self.config.fixed_member.clone());
            members.extend(selected.members().iter().cloned());
            entries.push(RosterEntry::new(*date, members));
        }

        if forced_repeats > 0 {
            warn!(
                "Roster: {forced_repeats} forced repeats (recency window {window} >= {} combinations)",
                self.combos.len()
            );
        }

        Ok(entries)
    }

    /// First combination at or after `index` (wrapping) that is not recent.
    fn probe<'a>(&self, sequence: &[&'a ComboKey], index: usize, recent: &VecDeque<&ComboKey>) -> Option<&'a ComboKey> {
        let len = sequence.len();
        (0..PROBE_FACTOR * len)
            .map(|offset| sequence[(index + offset) % len])
            .find(|candidate| !recent.contains(candidate))
    }
}

/// Checks the structural invariants of a generated batch.
pub fn validate_entries(entries: &[RosterEntry], config: &RosterConfig) -> Result<(), RosterError> {
    let mut dates = HashSet::with_capacity(entries.len());
    for entry in entries {
        if !dates.insert(entry.date) {
            return Err(RosterError::DuplicateDate(entry.date));
        }
        if entry.members.len() != config.group_size + 1 {
            return Err(RosterError::MalformedEntry {
                date: entry.date,
                reason: format!("expected {} members, got {}", config.group_size + 1, entry.members.len()),
            });
        }
        if entry.members.first() != Some(&config.fixed_member) {
            return Err(RosterError::MalformedEntry {
                date: entry.date,
                reason: format!("first member must be '{}'", config.fixed_member),
            });
        }
    }
    Ok(())
}

// ── Roster Service ────────────────────────────────────────────────────────────

/// Year-level operations on top of a [`RosterStore`]. Each operation touches
/// the store with a single write, so a failed run leaves the stored year as it was.
pub struct RosterService<S> {
    store: S,
    scheduler: RosterScheduler,
    min_year: i32,
}

impl<S: RosterStore> RosterService<S> {
    pub fn new(store: S, scheduler: RosterScheduler, min_year: i32) -> Self {
        Self {
            store,
            scheduler,
            min_year,
        }
    }

    /// Generates and stores one entry per Sunday of `year`.
    ///
    /// Fails if the year already has entries; use [`Self::regenerate_year`] to
    /// replace them.
    pub async fn generate_year<R: Rng + Send + ?Sized>(&self, year: i32, rng: &mut R) -> Result<Vec<RosterEntry>, RosterError> {
        self.check_year(year)?;
        if self.store.year_has_entries(year).await? {
            return Err(RosterError::YearAlreadyGenerated { year });
        }

        let entries = self.build_year(year, rng)?;
        // The store re-checks the year inside the write; a concurrent run that
        // got there first turns into YearAlreadyGenerated here.
        self.store.insert_year(year, &entries).await?;

        info!("🗓  Roster generated for {year}: {} Sundays", entries.len());
        Ok(entries)
    }

    pub async fn entries_for_year(&self, year: i32) -> Result<Vec<RosterEntry>, RosterError> {
        let mut entries = self.store.entries_for_year(year).await?;
        entries.sort_by_key(|e| e.date);
        Ok(entries)
    }

    /// Deletes every entry of `year`, returning how many were removed.
    pub async fn clear_year(&self, year: i32) -> Result<usize, RosterError> {
        let deleted = self.store.delete_year(year).await?;
        info!("Roster entries for {year} removed: {deleted}");
        Ok(deleted)
    }

    /// Builds a new roster for `year` and swaps it in place of the stored one.
    pub async fn regenerate_year<R: Rng + Send + ?Sized>(&self, year: i32, rng: &mut R) -> Result<Vec<RosterEntry>, RosterError> {
        self.check_year(year)?;
        let entries = self.build_year(year, rng)?;
        let replaced = self.store.replace_year(year, &entries).await?;

        info!("🗓  Roster regenerated for {year}: {} Sundays ({replaced} replaced)", entries.len());
        Ok(entries)
    }

    fn check_year(&self, year: i32) -> Result<(), RosterError> {
        if year < self.min_year {
            return Err(RosterError::InvalidYear { year, min: self.min_year });
        }
        Ok(())
    }

    fn build_year<R: Rng + ?Sized>(&self, year: i32, rng: &mut R) -> Result<Vec<RosterEntry>, RosterError> {
        let sundays = sundays_of_year(year);
        if sundays.is_empty() {
            return Err(RosterError::NoSundays { year });
        }

        let entries = self.scheduler.schedule(&sundays, rng)?;
        validate_entries(&entries, self.scheduler.config())?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config(pool: &[&str], group_size: usize, recency_window: usize) -> RosterConfig {
        RosterConfig {
            rotating_pool: pool.iter().map(|s| s.to_string()).collect(),
            fixed_member: "X".into(),
            group_size,
            recency_window,
        }
    }

    fn dates(n: usize) -> Vec<NaiveDate> {
        let first = NaiveDate::from_ymd_opt(2027, 1, 3).unwrap();
        (0..n).map(|i| first + chrono::Duration::days(7 * i as i64)).collect()
    }

    const POOL: [&str; 8] = ["A", "B", "C", "D", "E", "F", "G", "H"];

    #[test]
    fn pool_smaller_than_group_fails_fast() {
        let err = RosterScheduler::new(config(&["A", "B"], 3, 4)).err().unwrap();
        assert!(matches!(err, RosterError::InsufficientPool { required: 3, available: 2 }));
    }

    #[test]
    fn zero_group_size_is_rejected() {
        assert!(matches!(
            RosterScheduler::new(config(&POOL, 0, 4)),
            Err(RosterError::InvalidGroupSize)
        ));
    }

    #[test]
    fn fixed_member_inside_pool_is_rejected() {
        let mut cfg = config(&POOL, 3, 4);
        cfg.fixed_member = "C".into();
        assert!(matches!(RosterScheduler::new(cfg), Err(RosterError::DuplicateMember(name)) if name == "C"));
    }

    #[test]
    fn empty_dates_give_empty_roster() {
        let scheduler = RosterScheduler::new(config(&POOL, 3, 4)).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(scheduler.schedule(&[], &mut rng).unwrap().is_empty());
    }

    #[test]
    fn duplicate_dates_are_rejected() {
        let scheduler = RosterScheduler::new(config(&POOL, 3, 4)).unwrap();
        let mut input = dates(3);
        input.push(input[1]);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(scheduler.schedule(&input, &mut rng), Err(RosterError::DuplicateDate(_))));
    }

    #[test]
    fn fifty_two_sundays_from_eight_singers() {
        let scheduler = RosterScheduler::new(config(&POOL, 3, 4)).unwrap();
        assert_eq!(scheduler.combination_count(), 56);

        let input = dates(52);
        let mut rng = StdRng::seed_from_u64(2026);
        let entries = scheduler.schedule(&input, &mut rng).unwrap();

        assert_eq!(entries.len(), 52);
        validate_entries(&entries, scheduler.config()).unwrap();
        for (entry, date) in entries.iter().zip(&input) {
            assert_eq!(entry.date, *date);
            assert_eq!(entry.members[0], "X");
            let mut rotating = entry.rotating_members().to_vec();
            rotating.sort();
            assert_eq!(rotating, entry.rotating_members());
        }

        let keys: Vec<ComboKey> = entries.iter().map(|e| ComboKey::new(e.rotating_members().iter().cloned())).collect();
        for window in keys.windows(4) {
            let unique: HashSet<&ComboKey> = window.iter().collect();
            assert_eq!(unique.len(), 4);
        }
    }

    #[test]
    fn more_dates_than_combinations_still_avoid_recent_repeats() {
        // C(4, 2) = 6 groups for 20 dates
        let scheduler = RosterScheduler::new(config(&["A", "B", "C", "D"], 2, 3)).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let entries = scheduler.schedule(&dates(20), &mut rng).unwrap();
        assert_eq!(entries.len(), 20);

        let keys: Vec<ComboKey> = entries.iter().map(|e| ComboKey::new(e.rotating_members().iter().cloned())).collect();
        for window in keys.windows(3) {
            let unique: HashSet<&ComboKey> = window.iter().collect();
            assert_eq!(unique.len(), 3);
        }
    }

    #[test]
    fn window_larger_than_combinations_accepts_forced_repeats() {
        // Only C(3, 3) = 1 group exists.
        let scheduler = RosterScheduler::new(config(&["A", "B", "C"], 3, 4)).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let entries = scheduler.schedule(&dates(5), &mut rng).unwrap();
        assert_eq!(entries.len(), 5);
        assert!(entries.iter().all(|e| e.members == ["X", "A", "B", "C"]));
    }

    #[test]
    fn same_seed_same_roster() {
        let scheduler = RosterScheduler::new(config(&POOL, 3, 4)).unwrap();
        let a = scheduler.schedule(&dates(10), &mut StdRng::seed_from_u64(11)).unwrap();
        let b = scheduler.schedule(&dates(10), &mut StdRng::seed_from_u64(11)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn validate_entries_catches_wrong_member_count() {
        let cfg = config(&POOL, 3, 4);
        let entry = RosterEntry::new(dates(1)[0], vec!["X".into(), "A".into()]);
        assert!(matches!(
            validate_entries(&[entry], &cfg),
            Err(RosterError::MalformedEntry { .. })
        ));
    }

    fn service(min_year: i32) -> RosterService<crate::store::LocalStore> {
        let scheduler = RosterScheduler::new(config(&POOL, 3, 4)).unwrap();
        RosterService::new(crate::store::LocalStore::in_memory(), scheduler, min_year)
    }

    #[tokio::test]
    async fn unrepresentable_year_is_an_error() {
        let roster = service(2024);
        let err = roster.generate_year(i32::MAX, &mut StdRng::seed_from_u64(1)).await.unwrap_err();
        assert!(matches!(err, RosterError::NoSundays { year: i32::MAX }));
        assert!(roster.entries_for_year(i32::MAX).await.unwrap().is_empty());
    }
}
