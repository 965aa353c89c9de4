mod mocks;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tracing_test::traced_test;

use reserver::browser::SessionHandle;
use reserver::config::ProbeMode;
use reserver::controller::RetrySettings;
use reserver::error::RunError;
use reserver::execution::ExecutorSettings;
use reserver::model::{AttemptOutcome, CourtId, ReservationResult, ReservationStrategy};
use reserver::portal::BasketOutcome;
use reserver::run::{EngineSettings, reserve};

use mocks::{MockPortal, MockSession, MockSolver, rejected, slot};

fn settings(probe_mode: ProbeMode, max_attempts: u32) -> EngineSettings {
    EngineSettings {
        probe_mode,
        retry: RetrySettings { max_attempts },
        executor: ExecutorSettings {
            captcha_attempts: 3,
            captcha_timeout: Duration::from_secs(1),
        },
    }
}

struct Outcome {
    run: Result<(), RunError>,
    result: ReservationResult,
    handle: SessionHandle<MockSession>,
}

async fn drive(
    session: MockSession,
    portal: &Arc<MockPortal>,
    solver: &Arc<MockSolver>,
    strategies: &[ReservationStrategy],
    settings: EngineSettings,
) -> Outcome {
    let mut handle = SessionHandle::new(session);
    let mut result = ReservationResult::default();

    let run = reserve(
        &mut handle,
        Arc::clone(portal),
        Arc::clone(solver),
        strategies,
        &settings,
        "20261019",
        &mut result,
    )
    .await;

    Outcome {
        run,
        result,
        handle,
    }
}

/// 17:00 through 21:00, every hour open.
fn evening() -> Vec<reserver::model::SlotState> {
    (17..=21).map(|h| slot(h, 2)).collect()
}

#[tokio::test]
async fn latest_date_is_selected_before_searching() {
    let portal = Arc::new(MockPortal::new(evening()));
    let solver = Arc::new(MockSolver::reading("4821"));
    let strategies = [ReservationStrategy::fixed("indoor", 19, 2, &[5, 6])];

    let out = drive(
        MockSession::default(),
        &portal,
        &solver,
        &strategies,
        settings(ProbeMode::Speculative, 30),
    )
    .await;

    assert!(out.run.is_ok());
    assert_eq!(out.result.date.as_deref(), Some("2026-10-26"));
    assert_eq!(out.handle.session().date_selections.load(Ordering::SeqCst), 1);
    assert_eq!(portal.calendar_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_calendar_ends_without_touching_the_session() {
    let mut portal = MockPortal::new(evening());
    portal.dates.clear();
    let portal = Arc::new(portal);
    let solver = Arc::new(MockSolver::reading("4821"));
    let strategies = [ReservationStrategy::fixed("indoor", 19, 2, &[5])];

    let out = drive(
        MockSession::default(),
        &portal,
        &solver,
        &strategies,
        settings(ProbeMode::Speculative, 30),
    )
    .await;

    assert!(matches!(out.run, Err(RunError::NoSlots(_))));
    assert!(out.result.date.is_none());
    assert_eq!(out.handle.session().date_selections.load(Ordering::SeqCst), 0);
    assert_eq!(portal.basket_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn short_run_of_open_hours_falls_through_to_next_strategy() {
    // 19 and 20 open, 21 closed.
    let slots = vec![slot(18, 0), slot(19, 1), slot(20, 1), slot(21, 0)];
    let portal = Arc::new(MockPortal::new(slots));
    let solver = Arc::new(MockSolver::reading("4821"));
    let strategies = [
        ReservationStrategy::fixed("three hours", 19, 3, &[5, 6]),
        ReservationStrategy::fixed("two hours", 19, 2, &[5, 6]),
    ];

    let out = drive(
        MockSession::default(),
        &portal,
        &solver,
        &strategies,
        settings(ProbeMode::Speculative, 30),
    )
    .await;

    assert!(out.run.is_ok());
    assert!(out.result.success);
    assert_eq!(out.result.strategy_name.as_deref(), Some("two hours"));
    assert_eq!(out.result.tried_strategies, vec!["three hours", "two hours"]);
    assert_eq!(out.result.time_slot.as_deref(), Some("19:00~21:00"));
    // The three-hour strategy never reached a submission.
    assert_eq!(out.result.attempts.len(), 1);
    assert_eq!(portal.submissions(), vec![(5, "19:00".into(), "4821".into())]);
}

#[tokio::test]
async fn direct_probe_offers_only_courts_free_for_every_hour() {
    let portal = MockPortal::new(vec![slot(19, 2), slot(20, 2)])
        .with_court(5, vec![slot(19, 1), slot(20, 1)])
        .with_court(6, vec![slot(19, 1), slot(20, 0)])
        .with_court(7, vec![slot(19, 0), slot(20, 0)])
        .with_court(8, vec![slot(19, 0), slot(20, 0)])
        .answering(vec![], rejected(5));
    let portal = Arc::new(portal);
    let solver = Arc::new(MockSolver::reading("4821"));
    let strategies = [ReservationStrategy::fixed("indoor", 19, 2, &[5, 6, 7, 8])];

    let out = drive(
        MockSession::default(),
        &portal,
        &solver,
        &strategies,
        settings(ProbeMode::Direct, 30),
    )
    .await;

    // Court 6 is free at 19 only, so court 5 is the sole candidate.
    let courts: Vec<u32> = portal.submissions().iter().map(|s| s.0).collect();
    assert_eq!(courts, vec![5]);
    assert!(matches!(out.run, Err(RunError::NoSlots(_))));
    // The direct probe never selects a window to look at availability.
    assert_eq!(out.handle.session().windows, vec![(19, 2)]);
}

#[tokio::test]
#[traced_test]
async fn contention_on_first_court_books_the_second() {
    let portal = Arc::new(
        MockPortal::new(evening()).answering(vec![rejected(5)], BasketOutcome::Inserted),
    );
    let solver = Arc::new(MockSolver::reading("4821"));
    let strategies = [ReservationStrategy::fixed("indoor", 19, 2, &[5, 6, 7, 8])];

    let out = drive(
        MockSession::default(),
        &portal,
        &solver,
        &strategies,
        settings(ProbeMode::Speculative, 30),
    )
    .await;

    assert!(out.run.is_ok());
    assert!(out.result.success);
    assert_eq!(out.result.court, Some(CourtId(6)));
    assert_eq!(out.result.retries(), 1);
    assert_eq!(
        out.result.attempts.iter().map(|a| a.outcome).collect::<Vec<_>>(),
        vec![AttemptOutcome::Conflict, AttemptOutcome::Success]
    );

    assert!(logs_contain("reservation placed in basket"));
    logs_assert(|lines: &[&str]| {
        let retries = lines
            .iter()
            .filter(|l| l.contains("contention on court, retrying with next candidate"))
            .count();
        match retries {
            1 => Ok(()),
            n => Err(format!("expected one retry line, got {n}")),
        }
    });
}

#[tokio::test]
async fn endless_contention_stops_at_the_attempt_ceiling() {
    let all: Vec<u32> = (2..=19).collect();
    let portal = Arc::new(
        MockPortal::new((6..=21).map(|h| slot(h, 3)).collect()).answering(vec![], rejected(9)),
    );
    let solver = Arc::new(MockSolver::reading("4821"));
    let strategies = [ReservationStrategy::latest("anything", 2, &all)];

    let out = drive(
        MockSession::default(),
        &portal,
        &solver,
        &strategies,
        settings(ProbeMode::Speculative, 30),
    )
    .await;

    match out.run {
        Err(RunError::Terminal(msg)) => assert_eq!(msg, "attempt ceiling reached (30 attempts)"),
        other => panic!("expected ceiling, got {other:?}"),
    }
    assert_eq!(portal.basket_calls.load(Ordering::SeqCst), 30);
    assert_eq!(out.result.attempts.len(), 30);
    assert!(out.result.attempts.iter().all(|a| a.outcome == AttemptOutcome::Conflict));
}

#[tokio::test]
async fn conflicts_walk_courts_then_windows_then_strategies() {
    let portal = Arc::new(
        MockPortal::new(vec![slot(18, 0), slot(19, 1), slot(20, 1), slot(21, 1)])
            .answering(vec![], rejected(6)),
    );
    let solver = Arc::new(MockSolver::reading("4821"));
    let strategies = [
        ReservationStrategy::latest("late", 1, &[5, 6]),
        ReservationStrategy::fixed("backup", 19, 1, &[7]),
    ];

    let out = drive(
        MockSession::default(),
        &portal,
        &solver,
        &strategies,
        settings(ProbeMode::Speculative, 30),
    )
    .await;

    let order: Vec<(u32, String)> = portal
        .submissions()
        .into_iter()
        .map(|(court, start, _)| (court, start))
        .collect();
    assert_eq!(
        order,
        vec![
            (5, "21:00".to_string()),
            (6, "21:00".to_string()),
            (5, "20:00".to_string()),
            (6, "20:00".to_string()),
            (5, "19:00".to_string()),
            (6, "19:00".to_string()),
            (7, "19:00".to_string()),
        ]
    );
    assert!(matches!(out.run, Err(RunError::NoSlots(_))));
    assert_eq!(out.result.tried_strategies, vec!["late", "backup"]);
}

#[tokio::test]
#[traced_test]
async fn expired_portal_session_during_search_is_a_gate_failure() {
    for mode in [ProbeMode::Speculative, ProbeMode::Direct] {
        let mut portal = MockPortal::new(evening());
        portal.reject_session = true;
        let portal = Arc::new(portal);
        let solver = Arc::new(MockSolver::reading("4821"));
        let strategies = [
            ReservationStrategy::fixed("indoor", 19, 2, &[5, 6]),
            ReservationStrategy::latest("any", 1, &[7]),
        ];

        let out = drive(
            MockSession::default(),
            &portal,
            &solver,
            &strategies,
            settings(mode, 30),
        )
        .await;

        match out.run {
            Err(RunError::Gate(msg)) => assert!(msg.contains("tennis_mtime_list.do"), "{msg}"),
            other => panic!("expected gate failure in {mode:?}, got {other:?}"),
        }
        assert_eq!(out.result.tried_strategies, vec!["indoor"]);
        assert_eq!(portal.time_list_calls.load(Ordering::SeqCst), 1);
        assert_eq!(portal.basket_calls.load(Ordering::SeqCst), 0);
    }
    assert!(logs_contain("portal session lost"));
}

#[tokio::test]
async fn fixed_strategy_lists_slots_once() {
    let portal = Arc::new(MockPortal::new(evening()).answering(vec![], rejected(5)));
    let solver = Arc::new(MockSolver::reading("4821"));
    let strategies = [ReservationStrategy::fixed("indoor", 19, 2, &[5, 6])];

    let out = drive(
        MockSession::default(),
        &portal,
        &solver,
        &strategies,
        settings(ProbeMode::Speculative, 30),
    )
    .await;

    assert!(matches!(out.run, Err(RunError::NoSlots(_))));
    assert_eq!(portal.basket_calls.load(Ordering::SeqCst), 2);
    assert_eq!(portal.time_list_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn terminal_rejection_ends_the_run_with_server_message() {
    let portal = Arc::new(
        MockPortal::new(evening()).answering(vec![rejected(1)], BasketOutcome::Inserted),
    );
    let solver = Arc::new(MockSolver::reading("4821"));
    let strategies = [ReservationStrategy::fixed("indoor", 19, 2, &[5, 6])];

    let out = drive(
        MockSession::default(),
        &portal,
        &solver,
        &strategies,
        settings(ProbeMode::Speculative, 30),
    )
    .await;

    match out.run {
        Err(RunError::Terminal(msg)) => assert_eq!(msg, "already in the pending-payment basket"),
        other => panic!("expected terminal failure, got {other:?}"),
    }
    assert_eq!(portal.basket_calls.load(Ordering::SeqCst), 1);
    assert!(!out.result.success);
}

#[tokio::test]
async fn refused_court_is_skipped_and_its_prompt_dismissed() {
    let portal = Arc::new(MockPortal::new(evening()));
    let solver = Arc::new(MockSolver::reading("4821"));
    let strategies = [ReservationStrategy::fixed("indoor", 19, 2, &[5, 6])];
    let session = MockSession {
        refused: HashSet::from([CourtId(5)]),
        ..Default::default()
    };

    let out = drive(
        session,
        &portal,
        &solver,
        &strategies,
        settings(ProbeMode::Speculative, 30),
    )
    .await;

    assert!(out.result.success);
    assert_eq!(out.result.court, Some(CourtId(6)));
    assert_eq!(out.result.attempts[0].outcome, AttemptOutcome::CourtUnavailable);
    assert_eq!(portal.submissions().iter().map(|s| s.0).collect::<Vec<_>>(), vec![6]);
    assert_eq!(out.handle.session().dismissed.load(Ordering::SeqCst), 1);
    assert!(!out.handle.session().prompt_open);
}

#[tokio::test]
async fn three_digit_reading_is_padded_before_submission() {
    let portal = Arc::new(MockPortal::new(evening()));
    let solver = Arc::new(MockSolver::reading("123"));
    let strategies = [ReservationStrategy::fixed("indoor", 19, 2, &[5])];

    let out = drive(
        MockSession::default(),
        &portal,
        &solver,
        &strategies,
        settings(ProbeMode::Speculative, 30),
    )
    .await;

    assert!(out.result.success);
    assert_eq!(portal.submissions()[0].2, "0123");
}

#[tokio::test]
async fn unreadable_codes_refresh_the_challenge() {
    let portal = Arc::new(MockPortal::new(evening()));
    let solver = Arc::new(MockSolver::scripted(vec![Some("12"), None], "4821"));
    let strategies = [ReservationStrategy::fixed("indoor", 19, 2, &[5])];

    let out = drive(
        MockSession::default(),
        &portal,
        &solver,
        &strategies,
        settings(ProbeMode::Speculative, 30),
    )
    .await;

    assert!(out.result.success);
    assert_eq!(solver.calls.load(Ordering::SeqCst), 3);
    assert_eq!(out.handle.session().captcha_refreshes.load(Ordering::SeqCst), 2);
    assert_eq!(portal.basket_calls.load(Ordering::SeqCst), 1);
    assert_eq!(portal.submissions()[0].2, "4821");
}

#[tokio::test]
async fn rejected_code_is_retried_within_the_same_candidate() {
    let portal = Arc::new(MockPortal::new(evening()).answering(
        vec![BasketOutcome::VerificationRejected("자동입력 방지문자가 일치하지 않습니다".into())],
        BasketOutcome::Inserted,
    ));
    let solver = Arc::new(MockSolver::reading("4821"));
    let strategies = [ReservationStrategy::fixed("indoor", 19, 2, &[5, 6])];

    let out = drive(
        MockSession::default(),
        &portal,
        &solver,
        &strategies,
        settings(ProbeMode::Speculative, 30),
    )
    .await;

    assert!(out.result.success);
    assert_eq!(out.result.court, Some(CourtId(5)));
    assert_eq!(out.result.attempts.len(), 1);
    assert_eq!(portal.basket_calls.load(Ordering::SeqCst), 2);
    assert_eq!(out.handle.session().captcha_refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn exhausted_verification_moves_to_next_court_without_submitting() {
    let portal = Arc::new(MockPortal::new(evening()));
    let solver = Arc::new(MockSolver::reading("ab"));
    let strategies = [ReservationStrategy::fixed("indoor", 19, 2, &[5, 6])];

    let out = drive(
        MockSession::default(),
        &portal,
        &solver,
        &strategies,
        settings(ProbeMode::Speculative, 30),
    )
    .await;

    assert!(matches!(out.run, Err(RunError::NoSlots(_))));
    assert_eq!(portal.basket_calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        out.result.attempts.iter().map(|a| (a.court, a.outcome)).collect::<Vec<_>>(),
        vec![
            (CourtId(5), AttemptOutcome::VerificationFailed),
            (CourtId(6), AttemptOutcome::VerificationFailed),
        ]
    );
    // Two refreshes per candidate: none after the last try.
    assert_eq!(out.handle.session().captcha_refreshes.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn live_selection_is_cleared_after_every_attempt() {
    let portal = Arc::new(
        MockPortal::new(evening()).answering(vec![rejected(5), rejected(5)], rejected(1)),
    );
    let solver = Arc::new(MockSolver::reading("4821"));
    let strategies = [ReservationStrategy::fixed("indoor", 19, 2, &[5, 6, 7])];

    let out = drive(
        MockSession::default(),
        &portal,
        &solver,
        &strategies,
        settings(ProbeMode::Speculative, 30),
    )
    .await;

    assert!(matches!(out.run, Err(RunError::Terminal(_))));
    assert_eq!(out.result.attempts.len(), 3);
    assert_eq!(out.handle.selected(), None);
    assert!(out.handle.session().clear_calls.load(Ordering::SeqCst) >= 3);
}
