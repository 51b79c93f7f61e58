use std::cmp::Ordering;

use crate::models::{Recommendation, Tally, TallyMap};

/// Points per friend owning the game
pub const OWNER_WEIGHT: f64 = 10.0;
/// Points per friend who played the game in the last two weeks
pub const RECENT_WEIGHT: f64 = 20.0;
/// Ceiling for the playtime bonus, in hours
pub const PLAYTIME_BONUS_CAP: f64 = 50.0;
/// Length of the ranked list
pub const TOP_N: usize = 20;

/// Scores one tally
///
/// score = owners × 10 + recent players × 20 + min(average hours, 50)
///
/// The displayed average is rounded to whole hours; the uncapped, unrounded
/// value feeds the bonus.
pub fn score_tally(tally: &Tally) -> Recommendation {
    let owner_count = tally.owners.len();
    let recent_count = tally.recent_players.len();
    let average_minutes = if owner_count == 0 {
        0.0
    } else {
        tally.total_playtime as f64 / owner_count as f64
    };
    let average_hours = average_minutes / 60.0;

    let score = owner_count as f64 * OWNER_WEIGHT
        + recent_count as f64 * RECENT_WEIGHT
        + average_hours.min(PLAYTIME_BONUS_CAP);

    Recommendation {
        id: tally.item.id,
        name: tally.item.display_name(),
        score,
        friends_who_own: tally.owners.clone(),
        friends_who_played_recently: tally.recent_players.clone(),
        average_playtime_hours: average_hours.round() as u64,
    }
}

/// Scores every tally and returns the top entries, highest score first
///
/// The sort is stable, so equal scores keep the order in which the games
/// were first seen while walking the friend list.
pub fn rank(tallies: &TallyMap) -> Vec<Recommendation> {
    let mut recommendations: Vec<Recommendation> = tallies.iter().map(score_tally).collect();

    recommendations.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    recommendations.truncate(TOP_N);

    tracing::debug!(
        candidates = tallies.len(),
        returned = recommendations.len(),
        "Recommendations ranked"
    );

    recommendations
}
