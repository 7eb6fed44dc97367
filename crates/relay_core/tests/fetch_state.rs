use std::time::Duration;

use relay_core::{step, AttemptOutcome, FetchEvent, FetchState, RetryPolicy};

fn run(outcomes: &[AttemptOutcome], policy: RetryPolicy) -> (FetchState, Vec<Duration>) {
    let mut state = step(FetchState::Idle, FetchEvent::Begin, &policy);
    let mut delays = Vec::new();
    let mut outcomes = outcomes.iter().copied();
    while !state.is_terminal() {
        state = match state {
            FetchState::Attempting(_) => {
                let outcome = outcomes.next().expect("ran out of scripted outcomes");
                step(state, FetchEvent::Completed(outcome), &policy)
            }
            FetchState::Retrying { delay, .. } => {
                delays.push(delay);
                step(state, FetchEvent::BackoffElapsed, &policy)
            }
            other => panic!("unexpected state {other:?}"),
        };
    }
    (state, delays)
}

#[test]
fn begin_starts_the_first_attempt() {
    let state = step(FetchState::Idle, FetchEvent::Begin, &RetryPolicy::default());
    assert_eq!(state, FetchState::Attempting(1));
}

#[test]
fn first_success_is_terminal_without_delay() {
    let (state, delays) = run(&[AttemptOutcome::Success], RetryPolicy::default());
    assert_eq!(state, FetchState::Success);
    assert!(delays.is_empty());
}

#[test]
fn three_transients_then_success_waits_two_four_eight() {
    let outcomes = [
        AttemptOutcome::Transient,
        AttemptOutcome::Transient,
        AttemptOutcome::Transient,
        AttemptOutcome::Success,
    ];
    let (state, delays) = run(&outcomes, RetryPolicy::default());

    assert_eq!(state, FetchState::Success);
    assert_eq!(
        delays,
        vec![
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(8)
        ]
    );
}

#[test]
fn fatal_outcome_stops_immediately() {
    let (state, delays) = run(
        &[AttemptOutcome::Transient, AttemptOutcome::Fatal],
        RetryPolicy::default(),
    );
    assert_eq!(state, FetchState::Failed);
    assert_eq!(delays, vec![Duration::from_secs(2)]);
}

#[test]
fn transient_failures_exhaust_at_max_attempts() {
    let policy = RetryPolicy { max_attempts: 5 };
    let (state, delays) = run(&[AttemptOutcome::Transient; 5], policy);

    assert_eq!(state, FetchState::Exhausted);
    let secs: Vec<u64> = delays.iter().map(Duration::as_secs).collect();
    assert_eq!(secs, vec![2, 4, 8, 16]);
}

#[test]
fn zero_attempts_exhausts_without_trying() {
    let state = step(
        FetchState::Idle,
        FetchEvent::Begin,
        &RetryPolicy { max_attempts: 0 },
    );
    assert_eq!(state, FetchState::Exhausted);
}

#[test]
fn unrelated_events_are_ignored() {
    let policy = RetryPolicy::default();
    assert_eq!(
        step(FetchState::Attempting(2), FetchEvent::BackoffElapsed, &policy),
        FetchState::Attempting(2)
    );
    assert_eq!(
        step(FetchState::Success, FetchEvent::Begin, &policy),
        FetchState::Success
    );
}
