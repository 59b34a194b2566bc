//! Plain-text rendering of the view model for the terminal

use chrono::{DateTime, Utc};
use std::fmt::Write;

use scrumble_common::models::{HistoryItem, Side};
use scrumble_common::reconcile::{next_unvoted, EntryView, MatchupView, SideState, VoteStatus};

const BAR_WIDTH: usize = 30;

/// Render every matchup plus a pointer to the next one still open
pub fn render_matchups(views: &[MatchupView], now: DateTime<Utc>) -> String {
    let mut out = String::new();
    if views.is_empty() {
        out.push_str("No matchups right now.\n");
        return out;
    }

    for view in views {
        render_matchup(&mut out, view, now);
        out.push('\n');
    }

    match next_unvoted(views) {
        Some(next) => {
            let _ = writeln!(out, "Next up: #{} ({})", next.anchor, next.id);
        }
        None => out.push_str("You have voted on every matchup.\n"),
    }
    out
}

fn render_matchup(out: &mut String, view: &MatchupView, now: DateTime<Utc>) {
    let cadence = view.cadence_label();
    let _ = write!(out, "#{}  {}", view.anchor, view.headline());
    if !cadence.is_empty() {
        let _ = write!(out, "  [{}]", cadence);
    }
    if let Some(countdown) = view.countdown(now) {
        let _ = write!(out, "  {}", countdown);
    }
    out.push('\n');

    let _ = writeln!(out, "  {}", entry_line(&view.left, "L"));
    let _ = writeln!(out, "  {}", entry_line(&view.right, "R"));

    if view.results_visible() {
        let _ = writeln!(
            out,
            "  {:>3}% {} {:<3}%  ({} - {}){}",
            view.left_pct,
            bar(view.left_pct),
            view.right_pct,
            view.tally.left,
            view.tally.right,
            if view.seeded { " *" } else { "" }
        );
    }

    let status = match view.status {
        VoteStatus::Open => format!("{}: scrumble vote {} left|right", view.vote_label(), view.id),
        VoteStatus::Pending => "Sending vote...".to_string(),
        VoteStatus::Voted(side) => format!("You voted {}", side),
        VoteStatus::Resolved => "Voting closed for you".to_string(),
    };
    let _ = writeln!(out, "  {}", status);
}

fn entry_line(entry: &EntryView, label: &str) -> String {
    let marker = match entry.state {
        SideState::Selected => ">",
        SideState::Dimmed => " ",
        SideState::Neutral => "-",
    };
    let mut line = format!("{} {} {} [{}]", marker, label, entry.name, entry.tag);
    if !entry.subtitle.is_empty() {
        let _ = write!(line, " {}", entry.subtitle);
    }
    line
}

fn bar(left_pct: u8) -> String {
    let left = (left_pct as usize * BAR_WIDTH + 50) / 100;
    format!("{}{}", "#".repeat(left), ".".repeat(BAR_WIDTH - left.min(BAR_WIDTH)))
}

/// Render a history or future listing
pub fn render_listing(title: &str, items: &[HistoryItem], show_results: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", title);
    if items.is_empty() {
        out.push_str("  (none)\n");
        return out;
    }

    for item in items {
        let left = item.left.name.as_deref().unwrap_or("TBD");
        let right = item.right.name.as_deref().unwrap_or("TBD");
        let when = if show_results { item.ends_at } else { item.starts_at }
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_default();

        let _ = write!(out, "  {:<10} {} ({}): {} vs {}", when, item.title, item.category, left, right);
        if show_results {
            let (lp, rp) = item.votes.percentages();
            let winner = match item.winner() {
                Side::Left => left,
                Side::Right => right,
            };
            let _ = write!(out, "  {}% / {}%  winner: {}", lp, rp, winner);
        }
        out.push('\n');
    }
    out
}
