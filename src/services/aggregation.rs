use std::collections::HashSet;

use chrono::Utc;

use crate::{
    db::CacheStore,
    error::AppResult,
    models::{CacheSnapshot, ItemId, MemberId, MemberSnapshot, TallyMap},
    services::providers::DataSource,
};

/// Successful members between two checkpoints
pub const CHECKPOINT_INTERVAL: usize = 5;

/// Bounds applied to one aggregation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationLimits {
    /// Friends considered, taken from the front of the friend list
    pub max_members: usize,
    /// Failures tolerated; one more stops the run
    pub max_failures: usize,
    pub checkpoint_every: usize,
}

impl Default for AggregationLimits {
    fn default() -> Self {
        Self {
            max_members: 20,
            max_failures: 5,
            checkpoint_every: CHECKPOINT_INTERVAL,
        }
    }
}

/// Counters collected while aggregating
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationStats {
    pub total_members: usize,
    pub considered_members: usize,
    pub truncated: bool,
    pub succeeded: usize,
    pub from_cache: usize,
    pub fetched: usize,
    pub failed: usize,
    pub stopped_early: bool,
    pub checkpoint_failures: usize,
}

/// Result of an aggregation run
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub tallies: TallyMap,
    /// Games owned by the primary user
    pub primary_items: usize,
    pub stats: AggregationStats,
}

/// Walks the friend list, gathering each friend's library into per-game tallies
///
/// Friends are processed one at a time in friend-list order; this is what
/// keeps the request rate within the limit enforced by the data source.
pub struct AggregationEngine<'a> {
    source: &'a dyn DataSource,
    store: &'a dyn CacheStore,
    limits: AggregationLimits,
    /// Steam id of the primary user
    owner: &'a str,
}

impl<'a> AggregationEngine<'a> {
    pub fn new(
        source: &'a dyn DataSource,
        store: &'a dyn CacheStore,
        limits: AggregationLimits,
        owner: &'a str,
    ) -> Self {
        Self {
            source,
            store,
            limits,
            owner,
        }
    }

    /// Aggregates friends' libraries, resuming from `prior` when given
    ///
    /// Only a failure to fetch the primary user's library is returned as an
    /// error. Per-friend failures are counted, and once more than
    /// `max_failures` have occurred the remaining friends are skipped; the
    /// partial tallies are still returned.
    pub async fn aggregate(
        &self,
        members: &[MemberId],
        prior: Option<CacheSnapshot>,
    ) -> AppResult<Aggregation> {
        let mut snapshot = match prior {
            Some(snapshot) => {
                tracing::info!(
                    cached_members = snapshot.members.len(),
                    "Using cached data"
                );
                snapshot
            }
            None => {
                let owned = self.source.list_owned_items(None).await?;
                CacheSnapshot::new(self.owner, owned)
            }
        };

        let owned_ids: HashSet<ItemId> = snapshot.owned_items.iter().map(|i| i.id).collect();
        tracing::info!(owned = owned_ids.len(), "Primary library loaded");

        let mut stats = AggregationStats {
            total_members: members.len(),
            ..AggregationStats::default()
        };

        let considered = if members.len() > self.limits.max_members {
            tracing::info!(
                total = members.len(),
                processing = self.limits.max_members,
                "Friend list truncated to stay within rate limits"
            );
            stats.truncated = true;
            &members[..self.limits.max_members]
        } else {
            members
        };
        stats.considered_members = considered.len();

        let mut tallies = TallyMap::new();

        for (position, member) in considered.iter().enumerate() {
            if snapshot.members.contains_key(member) {
                tracing::debug!(
                    member = %member,
                    position = position + 1,
                    of = considered.len(),
                    "Using cached friend data"
                );
                stats.from_cache += 1;
            } else {
                tracing::info!(
                    member = %member,
                    position = position + 1,
                    of = considered.len(),
                    "Processing friend"
                );
                match self.fetch_member(member).await {
                    Ok(data) => {
                        snapshot.members.insert(member.clone(), data);
                        stats.fetched += 1;
                    }
                    Err(e) => {
                        stats.failed += 1;
                        tracing::warn!(member = %member, error = %e, "Could not get data for friend");

                        if stats.failed > self.limits.max_failures {
                            tracing::warn!(
                                failed = stats.failed,
                                remaining = considered.len() - position - 1,
                                "Too many failed requests, stopping early"
                            );
                            stats.stopped_early = true;
                            break;
                        }
                        continue;
                    }
                }
            }

            if let Some(data) = snapshot.members.get(member) {
                fold_member(&mut tallies, &owned_ids, member, data);
            }

            stats.succeeded += 1;
            if self.limits.checkpoint_every > 0
                && stats.succeeded % self.limits.checkpoint_every == 0
            {
                self.checkpoint(&mut snapshot, &mut stats).await;
            }
        }

        self.checkpoint(&mut snapshot, &mut stats).await;

        tracing::info!(
            succeeded = stats.succeeded,
            from_cache = stats.from_cache,
            failed = stats.failed,
            candidates = tallies.len(),
            "Friend processing finished"
        );

        Ok(Aggregation {
            tallies,
            primary_items: owned_ids.len(),
            stats,
        })
    }

    /// Both lookups must succeed for the friend to count
    async fn fetch_member(&self, member: &MemberId) -> AppResult<MemberSnapshot> {
        let owned = self.source.list_owned_items(Some(member.clone())).await?;
        let recent = self.source.list_recent_items(Some(member.clone())).await?;
        Ok(MemberSnapshot { owned, recent })
    }

    /// A failed save is logged and counted, never fatal
    async fn checkpoint(&self, snapshot: &mut CacheSnapshot, stats: &mut AggregationStats) {
        snapshot.created_at = Utc::now();
        match self.store.save(snapshot).await {
            Ok(()) => tracing::debug!(members = snapshot.members.len(), "Checkpoint saved"),
            Err(e) => {
                stats.checkpoint_failures += 1;
                tracing::warn!(error = %e, "Checkpoint failed, continuing without it");
            }
        }
    }
}

/// Adds one friend's library to the tallies, skipping games the primary user owns
pub fn fold_member(
    tallies: &mut TallyMap,
    owned_ids: &HashSet<ItemId>,
    member: &MemberId,
    data: &MemberSnapshot,
) {
    let recent_ids: HashSet<ItemId> = data.recent.iter().map(|i| i.id).collect();

    for item in &data.owned {
        if owned_ids.contains(&item.id) {
            continue;
        }

        let tally = tallies.entry(item);
        tally.owners.push(member.clone());
        tally.total_playtime += item.playtime_minutes;

        if recent_ids.contains(&item.id) {
            tally.recent_players.push(member.clone());
        }
    }
}
