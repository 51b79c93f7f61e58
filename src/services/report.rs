use std::fmt::Write;

use crate::models::{EmptyReason, Recommendation, RecommendationReport, RunSummary};

/// Renders a report as human-readable text
pub fn render_report(report: &RecommendationReport, store_url: &str) -> String {
    let mut out = String::new();

    if report.recommendations.is_empty() {
        render_empty(&mut out, report.empty_reason.as_ref());
    } else {
        render_recommendations(&mut out, &report.recommendations, store_url);
    }

    render_summary(&mut out, &report.summary);
    out
}

/// Storefront page for a game
pub fn store_link(store_url: &str, id: impl std::fmt::Display) -> String {
    format!("{}/app/{}", store_url.trim_end_matches('/'), id)
}

fn render_empty(out: &mut String, reason: Option<&EmptyReason>) {
    let _ = writeln!(out, "No recommendations found. This could be because:");
    let _ = writeln!(out, "   - Your friends' profiles are private");
    let _ = writeln!(out, "   - You already own all popular games among your friends");
    let _ = writeln!(out, "   - You have no friends added");

    match reason {
        Some(EmptyReason::MembersUnavailable(detail)) => {
            let _ = writeln!(out, "\nThe friend list could not be loaded: {}", detail);
        }
        Some(EmptyReason::PrimaryUnavailable(detail)) => {
            let _ = writeln!(out, "\nYour game library could not be loaded: {}", detail);
        }
        _ => {}
    }
}

fn render_recommendations(out: &mut String, recommendations: &[Recommendation], store_url: &str) {
    let _ = writeln!(out, "\nTop {} Game Recommendations:\n", recommendations.len());

    for (index, rec) in recommendations.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", index + 1, rec.name);
        let _ = writeln!(out, "   Score: {:.1}", rec.score);
        let _ = writeln!(out, "   Owned by {} friend(s)", rec.friends_who_own.len());
        let _ = writeln!(
            out,
            "   Recently played by {} friend(s)",
            rec.friends_who_played_recently.len()
        );
        let _ = writeln!(out, "   Average playtime: {} hours", rec.average_playtime_hours);
        let _ = writeln!(out, "   Steam ID: {}", rec.id);
        let _ = writeln!(out, "   Store: {}", store_link(store_url, rec.id));
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "Higher scores indicate games that are:");
    let _ = writeln!(out, "   - Owned by more of your friends");
    let _ = writeln!(out, "   - Currently being played by your friends");
    let _ = writeln!(out, "   - Have high average playtime (indicating quality)");
}

fn render_summary(out: &mut String, summary: &RunSummary) {
    if summary.total_members == 0 {
        return;
    }

    let _ = writeln!(out);
    if summary.truncated {
        let _ = writeln!(
            out,
            "Processed the first {} of {} friends to avoid rate limits",
            summary.considered_members, summary.total_members
        );
    }
    let _ = writeln!(
        out,
        "Successfully processed {} friends ({} cached), skipped {}",
        summary.succeeded, summary.from_cache, summary.failed
    );
    if summary.stopped_early {
        let _ = writeln!(out, "Stopped early after too many failed requests");
    }
    if summary.checkpoint_failures > 0 {
        let _ = writeln!(
            out,
            "Warning: {} cache checkpoint(s) could not be saved",
            summary.checkpoint_failures
        );
    }
}
