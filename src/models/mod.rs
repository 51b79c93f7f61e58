use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt::Display};
use uuid::Uuid;

pub mod steam;

/// Steam application id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u32);

impl Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 64-bit Steam id of one friend in the primary user's friend list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub String);

impl MemberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A game as seen from one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    #[serde(default)]
    pub name: Option<String>,
    /// Lifetime playtime for the account, in minutes
    #[serde(default)]
    pub playtime_minutes: u64,
}

impl Item {
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => format!("Game {}", self.id),
        }
    }
}

/// Owned and recently played games for one friend, as fetched
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MemberSnapshot {
    pub owned: Vec<Item>,
    pub recent: Vec<Item>,
}

/// Persisted state of a run
///
/// Once a member is a key in `members` its snapshot is authoritative for the
/// rest of the run. Iteration order of `members` is never relied upon; the
/// friend list order drives processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub created_at: DateTime<Utc>,
    /// Steam id the snapshot was collected for
    pub owner: String,
    pub owned_items: Vec<Item>,
    pub members: HashMap<MemberId, MemberSnapshot>,
}

impl CacheSnapshot {
    pub fn new(owner: impl Into<String>, owned_items: Vec<Item>) -> Self {
        Self {
            created_at: Utc::now(),
            owner: owner.into(),
            owned_items,
            members: HashMap::new(),
        }
    }

    /// True when the snapshot is older than `max_age` relative to `now`
    pub fn is_expired(&self, max_age: std::time::Duration, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(max_age) {
            Ok(max_age) => now - self.created_at > max_age,
            Err(_) => false,
        }
    }
}

/// Running aggregate for one game not owned by the primary user
#[derive(Debug, Clone, PartialEq)]
pub struct Tally {
    pub item: Item,
    pub owners: Vec<MemberId>,
    pub recent_players: Vec<MemberId>,
    /// Sum of owners' lifetime playtime, in minutes
    pub total_playtime: u64,
}

impl Tally {
    pub fn new(item: Item) -> Self {
        Self {
            item,
            owners: Vec::new(),
            recent_players: Vec::new(),
            total_playtime: 0,
        }
    }
}

/// Tallies keyed by game, iterated in discovery order
#[derive(Debug, Clone, Default)]
pub struct TallyMap {
    entries: Vec<Tally>,
    index: HashMap<ItemId, usize>,
}

impl TallyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the tally for `item`, creating it on first sight
    pub fn entry(&mut self, item: &Item) -> &mut Tally {
        let idx = match self.index.get(&item.id) {
            Some(idx) => *idx,
            None => {
                self.entries.push(Tally::new(item.clone()));
                let idx = self.entries.len() - 1;
                self.index.insert(item.id, idx);
                idx
            }
        };
        &mut self.entries[idx]
    }

    pub fn get(&self, id: ItemId) -> Option<&Tally> {
        self.index.get(&id).map(|idx| &self.entries[*idx])
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tally> {
        self.entries.iter()
    }
}

impl FromIterator<Tally> for TallyMap {
    fn from_iter<I: IntoIterator<Item = Tally>>(iter: I) -> Self {
        let mut map = TallyMap::new();
        for tally in iter {
            match map.index.get(&tally.item.id) {
                Some(idx) => map.entries[*idx] = tally,
                None => {
                    map.index.insert(tally.item.id, map.entries.len());
                    map.entries.push(tally);
                }
            }
        }
        map
    }
}

/// A ranked game suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: ItemId,
    pub name: String,
    pub score: f64,
    pub friends_who_own: Vec<MemberId>,
    pub friends_who_played_recently: Vec<MemberId>,
    /// Average owner playtime, rounded to whole hours
    pub average_playtime_hours: u64,
}

/// Why a run produced no recommendations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum EmptyReason {
    /// The friend list is empty
    NoMembers,
    /// The friend list could not be fetched (private profile, network)
    MembersUnavailable(String),
    /// The primary user's library could not be fetched
    PrimaryUnavailable(String),
    /// Every game owned by processed friends is already owned
    NoCandidates,
}

/// Counters describing what a run did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Friends returned by Steam
    pub total_members: usize,
    /// Friends considered after truncation
    pub considered_members: usize,
    pub truncated: bool,
    /// Friends whose data was folded into the tallies
    pub succeeded: usize,
    pub from_cache: usize,
    pub fetched: usize,
    pub failed: usize,
    /// Processing stopped because too many friends failed
    pub stopped_early: bool,
    pub checkpoint_failures: usize,
    pub primary_items: usize,
    pub candidate_items: usize,
}

/// Outcome of one recommendation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub recommendations: Vec<Recommendation>,
    pub summary: RunSummary,
    pub empty_reason: Option<EmptyReason>,
}
