//! Label State Machine: the pure function mapping a work item's current
//! `State` facet and the agent kind that just finished to its next state.
//! Holds no state of its own; callers persist the result as a label patch.

use crate::domain::{AgentKind, State};

/// Outcome of one agent's run, used to pick the next transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    Failure,
    NeedsReview,
}

/// Table-driven transition: `(current_state, finished_agent, outcome) ->
/// next_state`. Progression follows the agent's fixed pipeline rank
/// (`Issue -> CodeGen -> Review -> PR -> Deploy`), so a kind finishing
/// advances the work item to the state named after the next rank.
/// Transitions out of `Done` are never produced; `Blocked` and `Paused`
/// are sticky until externally cleared.
pub fn next_state(current: State, finished_agent: AgentKind, outcome: RunOutcome) -> State {
    if current.is_terminal() || matches!(current, State::Blocked | State::Paused) {
        return current;
    }

    if outcome == RunOutcome::Failure {
        return State::Blocked;
    }

    match finished_agent {
        AgentKind::Coordinator => current,
        AgentKind::Issue => State::Analyzing,
        AgentKind::CodeGen | AgentKind::Test => State::Implementing,
        // A review that requests changes sends the item back for rework
        // rather than advancing it.
        AgentKind::Review if outcome == RunOutcome::NeedsReview => State::Implementing,
        AgentKind::Review => State::Reviewing,
        AgentKind::Pr | AgentKind::Deploy => State::Done,
    }
}

/// Whether `from -> to` is one of the edges spec.md §4.7 draws: the
/// forward pipeline, `blocked` reachable from any non-terminal state, and
/// `paused` reachable from (and returning to) any non-terminal state.
/// Every other pair, including anything out of `Done`, is rejected.
pub fn validate_transition(from: State, to: State) -> bool {
    if from == to {
        return false;
    }
    if from.is_terminal() || from == State::Blocked {
        return false;
    }

    match (from, to) {
        (State::Pending, State::Analyzing)
        | (State::Analyzing, State::Implementing)
        | (State::Implementing, State::Reviewing)
        | (State::Reviewing, State::Done) => true,
        (State::Pending | State::Analyzing | State::Implementing | State::Reviewing, State::Blocked) => true,
        (State::Pending | State::Analyzing | State::Implementing | State::Reviewing, State::Paused) => true,
        (State::Paused, previous) => previous != State::Blocked && previous != State::Paused,
        _ => false,
    }
}

/// The agent kind that should pick up a work item currently in `state`,
/// absent an explicit `agent:` owner label.
pub fn next_agent_for(state: State) -> Option<AgentKind> {
    match state {
        State::Pending => Some(AgentKind::Issue),
        State::Analyzing => Some(AgentKind::CodeGen),
        State::Implementing => Some(AgentKind::Review),
        State::Reviewing => Some(AgentKind::Pr),
        State::Done | State::Blocked | State::Paused => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_always_blocks_regardless_of_agent() {
        assert_eq!(next_state(State::Implementing, AgentKind::CodeGen, RunOutcome::Failure), State::Blocked);
        assert_eq!(next_state(State::Analyzing, AgentKind::Issue, RunOutcome::Failure), State::Blocked);
    }

    #[test]
    fn terminal_and_sticky_states_never_transition() {
        assert_eq!(next_state(State::Done, AgentKind::Pr, RunOutcome::Success), State::Done);
        assert_eq!(next_state(State::Blocked, AgentKind::CodeGen, RunOutcome::Success), State::Blocked);
        assert_eq!(next_state(State::Paused, AgentKind::CodeGen, RunOutcome::Success), State::Paused);
    }

    #[test]
    fn happy_path_walks_pending_to_done() {
        let mut state = State::Pending;
        state = next_state(state, AgentKind::Issue, RunOutcome::Success);
        assert_eq!(state, State::Analyzing);
        state = next_state(state, AgentKind::CodeGen, RunOutcome::Success);
        assert_eq!(state, State::Implementing);
        state = next_state(state, AgentKind::Review, RunOutcome::Success);
        assert_eq!(state, State::Reviewing);
        state = next_state(state, AgentKind::Pr, RunOutcome::Success);
        assert_eq!(state, State::Done);
    }

    #[test]
    fn review_requesting_changes_sends_work_back_to_implementing() {
        assert_eq!(
            next_state(State::Reviewing, AgentKind::Review, RunOutcome::NeedsReview),
            State::Implementing
        );
    }

    #[test]
    fn next_agent_matches_the_pending_and_review_stages() {
        assert_eq!(next_agent_for(State::Pending), Some(AgentKind::Issue));
        assert_eq!(next_agent_for(State::Implementing), Some(AgentKind::Review));
        assert_eq!(next_agent_for(State::Reviewing), Some(AgentKind::Pr));
        assert_eq!(next_agent_for(State::Done), None);
    }

    const ALL_STATES: [State; 7] =
        [State::Pending, State::Analyzing, State::Implementing, State::Reviewing, State::Done, State::Blocked, State::Paused];

    /// The closed set of edges spec.md §4.7 draws; every other `(from, to)`
    /// pair must be rejected.
    const LEGAL_EDGES: &[(State, State)] = &[
        (State::Pending, State::Analyzing),
        (State::Analyzing, State::Implementing),
        (State::Implementing, State::Reviewing),
        (State::Reviewing, State::Done),
        (State::Pending, State::Blocked),
        (State::Analyzing, State::Blocked),
        (State::Implementing, State::Blocked),
        (State::Reviewing, State::Blocked),
        (State::Pending, State::Paused),
        (State::Analyzing, State::Paused),
        (State::Implementing, State::Paused),
        (State::Reviewing, State::Paused),
        (State::Paused, State::Pending),
        (State::Paused, State::Analyzing),
        (State::Paused, State::Implementing),
        (State::Paused, State::Reviewing),
    ];

    #[test]
    fn validate_transition_accepts_exactly_the_listed_edges() {
        for &from in &ALL_STATES {
            for &to in &ALL_STATES {
                let expected = LEGAL_EDGES.contains(&(from, to));
                assert_eq!(validate_transition(from, to), expected, "transition {from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn done_and_blocked_have_no_outgoing_transitions() {
        for &to in &ALL_STATES {
            assert!(!validate_transition(State::Done, to));
            assert!(!validate_transition(State::Blocked, to));
        }
    }
}
