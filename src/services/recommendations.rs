use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    db::CacheStore,
    models::{CacheSnapshot, EmptyReason, RecommendationReport, RunSummary},
    services::{
        aggregation::{AggregationEngine, AggregationLimits},
        providers::DataSource,
        scoring,
    },
};

/// Per-run switches
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Resume from the stored snapshot when one is usable
    pub use_cache: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { use_cache: true }
    }
}

/// Generates game recommendations from friends' libraries
///
/// Fetches the friend list, resumes from the cache when possible, aggregates
/// friends' libraries and ranks the games the primary user does not own.
pub struct RecommendationService {
    source: Arc<dyn DataSource>,
    store: Arc<dyn CacheStore>,
    limits: AggregationLimits,
    steam_id: String,
    cache_max_age: Duration,
}

impl RecommendationService {
    pub fn new(
        source: Arc<dyn DataSource>,
        store: Arc<dyn CacheStore>,
        limits: AggregationLimits,
        steam_id: String,
        cache_max_age: Duration,
    ) -> Self {
        Self {
            source,
            store,
            limits,
            steam_id,
            cache_max_age,
        }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Runs the whole pipeline
    ///
    /// Never fails: network trouble ends in a report with fewer (or no)
    /// recommendations and an `empty_reason` when the list is empty.
    pub async fn run(&self, options: RunOptions) -> RecommendationReport {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("recommendation_run", run_id = %run_id);
        self.run_inner(run_id, options).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, options: RunOptions) -> RecommendationReport {
        let mut report = RecommendationReport {
            run_id,
            generated_at: Utc::now(),
            recommendations: Vec::new(),
            summary: RunSummary::default(),
            empty_reason: None,
        };

        tracing::info!("Getting friend list");
        let members = match self.source.list_members().await {
            Ok(members) => members,
            Err(e) => {
                tracing::warn!(error = %e, "Friend list unavailable");
                report.empty_reason = Some(EmptyReason::MembersUnavailable(e.to_string()));
                return report;
            }
        };

        if members.is_empty() {
            tracing::info!("No friends found or friend list is private");
            report.empty_reason = Some(EmptyReason::NoMembers);
            return report;
        }
        tracing::info!(friends = members.len(), "Friend list loaded");

        let prior = if options.use_cache {
            self.load_prior().await
        } else {
            None
        };

        let engine = AggregationEngine::new(
            self.source.as_ref(),
            self.store.as_ref(),
            self.limits,
            &self.steam_id,
        );
        let aggregation = match engine.aggregate(&members, prior).await {
            Ok(aggregation) => aggregation,
            Err(e) => {
                tracing::warn!(error = %e, "Could not load the primary library");
                report.summary.total_members = members.len();
                report.empty_reason = Some(EmptyReason::PrimaryUnavailable(e.to_string()));
                return report;
            }
        };

        let stats = &aggregation.stats;
        report.summary = RunSummary {
            total_members: stats.total_members,
            considered_members: stats.considered_members,
            truncated: stats.truncated,
            succeeded: stats.succeeded,
            from_cache: stats.from_cache,
            fetched: stats.fetched,
            failed: stats.failed,
            stopped_early: stats.stopped_early,
            checkpoint_failures: stats.checkpoint_failures,
            primary_items: aggregation.primary_items,
            candidate_items: aggregation.tallies.len(),
        };

        tracing::info!(
            succeeded = stats.succeeded,
            skipped = stats.failed,
            "Calculating recommendation scores"
        );
        report.recommendations = scoring::rank(&aggregation.tallies);

        if report.recommendations.is_empty() {
            report.empty_reason = Some(EmptyReason::NoCandidates);
        }

        report
    }

    /// Loads the stored snapshot if it is usable for this run
    ///
    /// Load errors, expired snapshots and snapshots for another user are
    /// all treated as "no cache".
    async fn load_prior(&self) -> Option<CacheSnapshot> {
        let snapshot = match self.store.load().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable cache");
                return None;
            }
        };

        if snapshot.owner != self.steam_id {
            tracing::info!(
                cached_owner = %snapshot.owner,
                "Ignoring cache recorded for another user"
            );
            return None;
        }

        if snapshot.is_expired(self.cache_max_age, Utc::now()) {
            tracing::info!(created_at = %snapshot.created_at, "Ignoring expired cache");
            return None;
        }

        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::cache::MockCacheStore,
        error::AppError,
        models::{Item, ItemId, MemberId, MemberSnapshot},
        services::providers::MockDataSource,
    };

    const OWNER: &str = "1000";

    fn game(id: u32, minutes: u64) -> Item {
        Item {
            id: ItemId(id),
            name: Some(format!("Game #{}", id)),
            playtime_minutes: minutes,
        }
    }

    fn service(source: MockDataSource, store: MockCacheStore) -> RecommendationService {
        RecommendationService::new(
            Arc::new(source),
            Arc::new(store),
            AggregationLimits::default(),
            OWNER.to_string(),
            Duration::from_secs(3600),
        )
    }

    fn accepting_store(prior: Option<CacheSnapshot>) -> MockCacheStore {
        let mut store = MockCacheStore::new();
        store.expect_load().returning(move || Ok(prior.clone()));
        store.expect_save().returning(|_| Ok(()));
        store
    }

    #[tokio::test]
    async fn test_friend_list_failure_yields_empty_report() {
        let mut source = MockDataSource::new();
        source
            .expect_list_members()
            .returning(|| Err(AppError::Authorization("private".to_string())));
        let mut store = MockCacheStore::new();
        store.expect_load().never();
        store.expect_save().never();

        let report = service(source, store).run(RunOptions::default()).await;

        assert!(report.recommendations.is_empty());
        assert!(matches!(
            report.empty_reason,
            Some(EmptyReason::MembersUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_no_friends() {
        let mut source = MockDataSource::new();
        source.expect_list_members().returning(|| Ok(vec![]));
        source.expect_list_owned_items().never();

        let report = service(source, MockCacheStore::new())
            .run(RunOptions::default())
            .await;

        assert_eq!(report.empty_reason, Some(EmptyReason::NoMembers));
    }

    #[tokio::test]
    async fn test_primary_failure_yields_empty_report() {
        let mut source = MockDataSource::new();
        source
            .expect_list_members()
            .returning(|| Ok(vec![MemberId::new("a")]));
        source
            .expect_list_owned_items()
            .returning(|_| Err(AppError::Network("timed out".to_string())));

        let report = service(source, accepting_store(None))
            .run(RunOptions::default())
            .await;

        assert!(matches!(
            report.empty_reason,
            Some(EmptyReason::PrimaryUnavailable(_))
        ));
        assert_eq!(report.summary.total_members, 1);
    }

    #[tokio::test]
    async fn test_full_run_ranks_unowned_games() {
        let mut source = MockDataSource::new();
        source
            .expect_list_members()
            .returning(|| Ok(vec![MemberId::new("a"), MemberId::new("b")]));
        source.expect_list_owned_items().returning(|m| {
            Ok(match m.as_ref().map(MemberId::as_str) {
                None => vec![game(10, 0)],
                Some("a") => vec![game(10, 600), game(20, 600), game(30, 60)],
                _ => vec![game(20, 1200)],
            })
        });
        source.expect_list_recent_items().returning(|m| {
            Ok(match m.as_ref().map(MemberId::as_str) {
                Some("b") => vec![game(20, 1200)],
                _ => vec![],
            })
        });

        let report = service(source, accepting_store(None))
            .run(RunOptions::default())
            .await;

        assert_eq!(report.empty_reason, None);
        let ids: Vec<u32> = report.recommendations.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![20, 30]);
        // 2 owners, 1 recent, 15h average
        assert_eq!(report.recommendations[0].score, 20.0 + 20.0 + 15.0);
        assert_eq!(report.summary.succeeded, 2);
        assert_eq!(report.summary.primary_items, 1);
        assert_eq!(report.summary.candidate_items, 2);
    }

    #[tokio::test]
    async fn test_full_overlap_reports_no_candidates() {
        let mut source = MockDataSource::new();
        source
            .expect_list_members()
            .returning(|| Ok(vec![MemberId::new("a")]));
        source
            .expect_list_owned_items()
            .returning(|_| Ok(vec![game(10, 60)]));
        source.expect_list_recent_items().returning(|_| Ok(vec![]));

        let report = service(source, accepting_store(None))
            .run(RunOptions::default())
            .await;

        assert!(report.recommendations.is_empty());
        assert_eq!(report.empty_reason, Some(EmptyReason::NoCandidates));
    }

    #[tokio::test]
    async fn test_usable_cache_is_resumed() {
        let mut prior = CacheSnapshot::new(OWNER, vec![game(10, 0)]);
        prior.members.insert(
            MemberId::new("a"),
            MemberSnapshot {
                owned: vec![game(20, 60)],
                recent: vec![],
            },
        );

        let mut source = MockDataSource::new();
        source
            .expect_list_members()
            .returning(|| Ok(vec![MemberId::new("a")]));
        source.expect_list_owned_items().never();
        source.expect_list_recent_items().never();

        let report = service(source, accepting_store(Some(prior)))
            .run(RunOptions::default())
            .await;

        assert_eq!(report.summary.from_cache, 1);
        assert_eq!(report.recommendations.len(), 1);
    }

    #[tokio::test]
    async fn test_cache_for_other_user_is_ignored() {
        let prior = CacheSnapshot::new("someone-else", vec![game(20, 0)]);

        let mut source = MockDataSource::new();
        source
            .expect_list_members()
            .returning(|| Ok(vec![MemberId::new("a")]));
        source
            .expect_list_owned_items()
            .returning(|m| Ok(if m.is_none() { vec![] } else { vec![game(20, 60)] }));
        source.expect_list_recent_items().returning(|_| Ok(vec![]));

        let report = service(source, accepting_store(Some(prior)))
            .run(RunOptions::default())
            .await;

        assert_eq!(report.summary.fetched, 1);
        assert_eq!(report.recommendations.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_cache_is_ignored() {
        let mut prior = CacheSnapshot::new(OWNER, vec![]);
        prior.created_at = Utc::now() - chrono::Duration::hours(2);
        prior
            .members
            .insert(MemberId::new("a"), MemberSnapshot::default());

        let mut source = MockDataSource::new();
        source
            .expect_list_members()
            .returning(|| Ok(vec![MemberId::new("a")]));
        source.expect_list_owned_items().returning(|_| Ok(vec![]));
        source.expect_list_recent_items().returning(|_| Ok(vec![]));

        let report = service(source, accepting_store(Some(prior)))
            .run(RunOptions::default())
            .await;

        assert_eq!(report.summary.from_cache, 0);
        assert_eq!(report.summary.fetched, 1);
    }

    #[tokio::test]
    async fn test_unreadable_cache_is_ignored() {
        let mut store = MockCacheStore::new();
        store
            .expect_load()
            .returning(|| Err(AppError::Storage("corrupt".to_string())));
        store.expect_save().returning(|_| Ok(()));

        let mut source = MockDataSource::new();
        source
            .expect_list_members()
            .returning(|| Ok(vec![MemberId::new("a")]));
        source.expect_list_owned_items().returning(|_| Ok(vec![]));
        source.expect_list_recent_items().returning(|_| Ok(vec![]));

        let report = service(source, store).run(RunOptions::default()).await;
        assert_eq!(report.summary.fetched, 1);
    }

    #[tokio::test]
    async fn test_fresh_run_skips_cache_load() {
        let mut store = MockCacheStore::new();
        store.expect_load().never();
        store.expect_save().times(1).returning(|_| Ok(()));

        let mut source = MockDataSource::new();
        source
            .expect_list_members()
            .returning(|| Ok(vec![MemberId::new("a")]));
        source.expect_list_owned_items().returning(|_| Ok(vec![]));
        source.expect_list_recent_items().returning(|_| Ok(vec![]));

        let report = service(source, store)
            .run(RunOptions { use_cache: false })
            .await;
        assert_eq!(report.summary.fetched, 1);
    }
}
