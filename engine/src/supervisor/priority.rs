//! Priority formula for the per-cycle decision pass: a plain integer
//! seeded at 5 and adjusted by the item's labels and current state.

use crate::domain::{PriorityLabel, State, WorkItem};

pub fn compute_priority(item: &WorkItem) -> i32 {
    let mut priority = 5;

    priority += match item.priority_label() {
        Some(PriorityLabel::P0Critical) => 5,
        Some(PriorityLabel::P1High) => 3,
        _ if item.has_label("critical") => 5,
        _ if item.has_label("high") => 3,
        _ => 0,
    };
    if item.has_label("security") || item.has_label("vulnerability") {
        priority += 4;
    }
    if item.has_label("size:small") {
        priority += 2;
    }
    priority += match item.state() {
        State::Pending => 2,
        State::Analyzing => 1,
        State::Implementing => 0,
        State::Reviewing => -1,
        State::Done | State::Blocked | State::Paused => 0,
    };

    priority
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Label;

    fn item(labels: &[&str]) -> WorkItem {
        WorkItem {
            owner: "acme".into(),
            repo: "widgets".into(),
            number: 7,
            title: "t".into(),
            body: String::new(),
            open: true,
            labels: labels.iter().map(|s| Label(s.to_string())).collect(),
            assignee: None,
            created_at: 0,
            updated_at: 0,
            url: "https://example.test/7".into(),
        }
    }

    #[test]
    fn baseline_pending_item_scores_seven() {
        assert_eq!(compute_priority(&item(&[])), 7);
    }

    #[test]
    fn critical_security_item_stacks_both_bonuses() {
        assert_eq!(compute_priority(&item(&["P0-Critical", "security"])), 5 + 5 + 4 + 2);
    }

    #[test]
    fn reviewing_state_lowers_priority_below_baseline() {
        assert_eq!(compute_priority(&item(&["state:reviewing"])), 5 - 1);
    }

    #[test]
    fn bare_critical_and_high_labels_score_like_their_p0_p1_counterparts() {
        assert_eq!(compute_priority(&item(&["critical"])), 5 + 5);
        assert_eq!(compute_priority(&item(&["high"])), 5 + 3);
    }

    #[test]
    fn parsed_priority_label_takes_precedence_over_a_bare_label() {
        assert_eq!(compute_priority(&item(&["P0-Critical", "high"])), 5 + 5);
    }
}
