use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use tracing::Level;

use super::*;
use crate::logging::capture_logs;
use crate::sink::test_support::{channel_sink, drain};

fn scores_of(pairs: &[(&str, u64)]) -> HashMap<String, u64> {
    pairs.iter().map(|(n, s)| ((*n).to_owned(), *s)).collect()
}

fn last_scores(messages: &[OutboundMessage]) -> Option<HashMap<String, u64>> {
    messages.iter().rev().find_map(|m| match m {
        OutboundMessage::Scores { scores } => Some(scores.clone()),
        _ => None,
    })
}

// ── Registry ────────────────────────────────────────────────────────────

#[test]
fn join_initializes_score_to_zero() {
    let coord = SessionCoordinator::new();
    let (sink, _rx) = channel_sink("c1", 8);
    coord.join("alice", &sink);
    assert_eq!(coord.score_of("alice"), Ok(0));
    assert_eq!(coord.participant_count(), 1);
}

#[test]
fn score_of_unknown_participant_fails() {
    let coord = SessionCoordinator::new();
    assert_eq!(
        coord.score_of("ghost"),
        Err(CoordinatorError::UnknownParticipant("ghost".into()))
    );
}

#[test]
fn leave_unknown_is_noop() {
    let coord = SessionCoordinator::new();
    coord.leave("ghost");
    assert_eq!(coord.participant_count(), 0);
    assert!(coord.score_of("ghost").is_err());
}

#[tokio::test(start_paused = true)]
async fn score_survives_leave_and_rejoin() {
    let coord = SessionCoordinator::new();
    let (sink, _rx) = channel_sink("c1", 8);
    coord.join("alice", &sink);
    coord.start_round("q1", "2+2?", "4");
    let _ = coord.submit_answer("alice", "4");
    let _ = coord.end_round();
    assert_eq!(coord.score_of("alice"), Ok(110));

    coord.leave("alice");
    assert_eq!(coord.score_of("alice"), Ok(110));
    assert_eq!(coord.participant_count(), 0);

    let (sink2, _rx2) = channel_sink("c2", 8);
    coord.join("alice", &sink2);
    assert_eq!(coord.score_of("alice"), Ok(110));
}

#[test]
fn rejoin_replaces_sink() {
    let coord = SessionCoordinator::new();
    let (old, mut old_rx) = channel_sink("c1", 8);
    let (new, mut new_rx) = channel_sink("c2", 8);
    coord.join("alice", &old);
    coord.join("alice", &new);
    assert_eq!(coord.participant_count(), 1);

    let delivered = coord.broadcast(&OutboundMessage::NewQuestion { question: "?".into() });
    assert_eq!(delivered, 1);
    assert!(drain(&mut old_rx).is_empty());
    assert_eq!(drain(&mut new_rx).len(), 1);
}

#[test]
fn stale_connection_does_not_evict_rejoined_participant() {
    let coord = SessionCoordinator::new();
    let (old, _old_rx) = channel_sink("c1", 8);
    let (new, _new_rx) = channel_sink("c2", 8);
    coord.join("alice", &old);
    coord.join("alice", &new);

    assert!(!coord.leave_connection("alice", "c1"));
    assert_eq!(coord.participant_count(), 1);
    assert!(coord.leave_connection("alice", "c2"));
    assert_eq!(coord.participant_count(), 0);
}

#[test]
fn leaderboard_ranks_by_score_then_name() {
    let coord = SessionCoordinator::new();
    for name in ["carol", "bob", "alice"] {
        let (sink, _rx) = channel_sink(name, 8);
        coord.join(name, &sink);
    }
    let board = coord.leaderboard();
    let names: Vec<&str> = board.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["alice", "bob", "carol"]);
    assert_eq!(board[0].rank, 1);
    assert_eq!(board[2].rank, 3);
}

// ── Round lifecycle ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn start_round_broadcasts_new_question_to_everyone() {
    let coord = SessionCoordinator::new();
    let (a, mut a_rx) = channel_sink("a", 8);
    let (b, mut b_rx) = channel_sink("b", 8);
    coord.join("A", &a);
    coord.join("B", &b);

    coord.start_round("q1", "2+2?", "4");

    let expected = OutboundMessage::NewQuestion { question: "2+2?".into() };
    assert_eq!(drain(&mut a_rx), vec![expected.clone()]);
    assert_eq!(drain(&mut b_rx), vec![expected]);
    let info = coord.active_round().unwrap();
    assert_eq!(info.question_id, "q1");
    assert_eq!(info.question, "2+2?");
    assert_eq!(info.submissions, 0);
}

#[tokio::test(start_paused = true)]
async fn scenario_speed_bonus_and_late_answer() {
    let coord = SessionCoordinator::new();
    let (a, mut a_rx) = channel_sink("a", 8);
    let (b, mut b_rx) = channel_sink("b", 8);
    coord.join("A", &a);
    coord.join("B", &b);

    coord.start_round("q1", "2+2?", "4");
    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(
        coord.submit_answer("A", "4"),
        SubmissionOutcome::Accepted { elapsed: Duration::from_secs(2) }
    );
    tokio::time::advance(Duration::from_secs(9)).await;
    let _ = coord.submit_answer("B", " 4 ");

    let summary = coord.end_round().unwrap();
    assert_eq!(summary.awards, scores_of(&[("A", 108), ("B", 100)]));
    assert_eq!(summary.correct_count(), 2);
    assert_eq!(coord.score_of("A"), Ok(108));
    assert_eq!(coord.score_of("B"), Ok(100));

    let expected = scores_of(&[("A", 108), ("B", 100)]);
    assert_eq!(last_scores(&drain(&mut a_rx)), Some(expected.clone()));
    assert_eq!(last_scores(&drain(&mut b_rx)), Some(expected));
    assert!(coord.active_round().is_none());
}

#[tokio::test(start_paused = true)]
async fn fractional_elapsed_bonus_truncates() {
    let coord = SessionCoordinator::new();
    let (a, _rx) = channel_sink("a", 8);
    coord.join("A", &a);
    coord.start_round("q1", "Capital of France?", "Paris");
    tokio::time::advance(Duration::from_millis(2_700)).await;
    let _ = coord.submit_answer("A", "PARIS");
    let _ = coord.end_round();
    assert_eq!(coord.score_of("A"), Ok(107));
}

#[tokio::test(start_paused = true)]
async fn wrong_answer_scores_nothing() {
    let coord = SessionCoordinator::new();
    let (a, _rx) = channel_sink("a", 8);
    coord.join("A", &a);
    coord.start_round("q1", "2+2?", "4");
    let _ = coord.submit_answer("A", "5");
    let summary = coord.end_round().unwrap();
    assert_eq!(summary.awards.get("A"), Some(&0));
    assert_eq!(coord.score_of("A"), Ok(0));
}

#[tokio::test(start_paused = true)]
async fn only_first_submission_counts() {
    let coord = SessionCoordinator::new();
    let (a, _rx) = channel_sink("a", 8);
    coord.join("A", &a);
    coord.start_round("q1", "2+2?", "4");

    assert_matches!(coord.submit_answer("A", "5"), SubmissionOutcome::Accepted { .. });
    assert_eq!(coord.submit_answer("A", "4"), SubmissionOutcome::AlreadySubmitted);
    assert_eq!(coord.active_round().unwrap().submissions, 1);

    let summary = coord.end_round().unwrap();
    assert_eq!(summary.submissions, 1);
    assert_eq!(coord.score_of("A"), Ok(0));
}

#[tokio::test(start_paused = true)]
async fn first_submission_keeps_its_elapsed_time() {
    let coord = SessionCoordinator::new();
    let (a, _rx) = channel_sink("a", 8);
    coord.join("A", &a);
    coord.start_round("q1", "2+2?", "4");
    tokio::time::advance(Duration::from_secs(1)).await;
    let _ = coord.submit_answer("A", "4");
    tokio::time::advance(Duration::from_secs(5)).await;
    let _ = coord.submit_answer("A", "4");
    let _ = coord.end_round();
    assert_eq!(coord.score_of("A"), Ok(109));
}

#[tokio::test(start_paused = true)]
async fn new_round_clears_previous_submissions() {
    let coord = SessionCoordinator::new();
    let (a, _rx) = channel_sink("a", 8);
    coord.join("A", &a);

    coord.start_round("q1", "2+2?", "4");
    let _ = coord.submit_answer("A", "4");
    coord.start_round("q2", "3+3?", "6");
    assert_eq!(coord.active_round().unwrap().submissions, 0);

    // The answer to q1 must not leak into q2, and A may answer again.
    assert_matches!(coord.submit_answer("A", "6"), SubmissionOutcome::Accepted { .. });
    let summary = coord.end_round().unwrap();
    assert_eq!(summary.question_id, "q2");
    assert_eq!(coord.score_of("A"), Ok(110));
}

#[tokio::test(start_paused = true)]
async fn replaced_round_is_not_scored() {
    let coord = SessionCoordinator::new();
    let (a, mut rx) = channel_sink("a", 8);
    coord.join("A", &a);

    coord.start_round("q1", "2+2?", "4");
    let _ = coord.submit_answer("A", "4");
    coord.start_round("q2", "3+3?", "6");
    assert_eq!(coord.score_of("A"), Ok(0));

    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 2);
    assert!(last_scores(&messages).is_none());
}

#[test]
fn submit_without_active_round_is_ignored() {
    let coord = SessionCoordinator::new();
    let (a, _rx) = channel_sink("a", 8);
    coord.join("A", &a);
    assert_eq!(coord.submit_answer("A", "4"), SubmissionOutcome::NoActiveRound);
}

#[tokio::test(start_paused = true)]
async fn submit_from_unregistered_is_ignored() {
    let coord = SessionCoordinator::new();
    let (a, _rx) = channel_sink("a", 8);
    coord.join("A", &a);
    coord.start_round("q1", "2+2?", "4");

    assert_eq!(coord.submit_answer("ghost", "4"), SubmissionOutcome::NotRegistered);
    coord.leave("A");
    assert_eq!(coord.submit_answer("A", "4"), SubmissionOutcome::NotRegistered);
    assert_eq!(coord.end_round().unwrap().submissions, 0);
}

#[test]
fn end_round_when_idle_is_noop() {
    let coord = SessionCoordinator::new();
    let (a, mut rx) = channel_sink("a", 8);
    coord.join("A", &a);
    assert!(coord.end_round().is_none());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn scores_include_non_answerers() {
    let coord = SessionCoordinator::new();
    let (a, _a_rx) = channel_sink("a", 8);
    let (b, mut b_rx) = channel_sink("b", 8);
    coord.join("A", &a);
    coord.join("B", &b);

    coord.start_round("q1", "2+2?", "4");
    let _ = coord.submit_answer("A", "4");
    let _ = coord.end_round();

    assert_eq!(last_scores(&drain(&mut b_rx)), Some(scores_of(&[("A", 110), ("B", 0)])));
}

#[tokio::test(start_paused = true)]
async fn disconnected_participant_still_in_scores() {
    let coord = SessionCoordinator::new();
    let (a, _a_rx) = channel_sink("a", 8);
    let (b, mut b_rx) = channel_sink("b", 8);
    coord.join("A", &a);
    coord.join("B", &b);

    coord.start_round("q1", "2+2?", "4");
    let _ = coord.submit_answer("A", "4");
    let _ = coord.end_round();
    coord.leave("A");

    coord.start_round("q2", "3+3?", "6");
    let _ = coord.end_round();

    let scores = last_scores(&drain(&mut b_rx)).unwrap();
    assert_eq!(scores.get("A"), Some(&110));
    assert_eq!(scores.get("B"), Some(&0));
}

// ── Message handling ────────────────────────────────────────────────────

#[test]
fn get_score_replies_only_to_requester() {
    let coord = SessionCoordinator::new();
    let (a, mut a_rx) = channel_sink("a", 8);
    let (b, mut b_rx) = channel_sink("b", 8);
    coord.join("A", &a);
    coord.join("B", &b);

    coord.handle_message("A", a.as_ref(), r#"{"type":"get_score"}"#);

    assert_eq!(drain(&mut a_rx), vec![OutboundMessage::Score { score: 0 }]);
    assert!(drain(&mut b_rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn submit_answer_message_is_routed() {
    let coord = SessionCoordinator::new();
    let (a, _rx) = channel_sink("a", 8);
    coord.join("A", &a);
    coord.start_round("q1", "2+2?", "4");
    tokio::time::advance(Duration::from_secs(3)).await;

    coord.handle_message("A", a.as_ref(), r#"{"type":"submit_answer","answer":"4"}"#);
    let _ = coord.end_round();
    assert_eq!(coord.score_of("A"), Ok(107));
}

#[test]
fn unknown_and_malformed_messages_are_ignored() {
    let coord = SessionCoordinator::new();
    let (a, mut rx) = channel_sink("a", 8);
    coord.join("A", &a);

    coord.handle_message("A", a.as_ref(), r#"{"type":"dance"}"#);
    coord.handle_message("A", a.as_ref(), "not json");
    coord.handle_message("A", a.as_ref(), r#"{"type":"submit_answer"}"#);
    coord.handle_message("A", a.as_ref(), "[1,2,3]");

    assert!(drain(&mut rx).is_empty());
    assert_eq!(coord.participant_count(), 1);
}

#[test]
fn get_score_for_unknown_name_is_ignored() {
    let coord = SessionCoordinator::new();
    let (a, mut rx) = channel_sink("a", 8);
    coord.handle_inbound("nobody", a.as_ref(), InboundMessage::GetScore);
    assert!(drain(&mut rx).is_empty());
}

// ── Broadcaster ─────────────────────────────────────────────────────────

#[test]
fn broadcast_survives_failed_sinks() {
    let (logs, _guard) = capture_logs();
    let coord = SessionCoordinator::new();

    let (closed, closed_rx) = channel_sink("closed", 8);
    drop(closed_rx);
    let (full, _full_rx) = channel_sink("full", 1);
    let _ = full.send(Arc::new("filler".into()));
    let (dropped, _dropped_rx) = channel_sink("dropped", 8);
    let (healthy, mut healthy_rx) = channel_sink("healthy", 8);

    coord.join("closed", &closed);
    coord.join("full", &full);
    coord.join("dropped", &dropped);
    coord.join("healthy", &healthy);
    drop(dropped);

    let delivered = coord.broadcast(&OutboundMessage::NewQuestion { question: "?".into() });

    assert_eq!(delivered, 1);
    assert_eq!(drain(&mut healthy_rx).len(), 1);
    assert_eq!(logs.count_at_level(Level::WARN), 3);
    // Failed sinks stay registered; eviction belongs to the transport.
    assert_eq!(coord.participant_count(), 4);
}

#[test]
fn broadcast_with_no_participants() {
    let coord = SessionCoordinator::new();
    assert_eq!(coord.broadcast(&OutboundMessage::Score { score: 1 }), 0);
}

#[test]
fn round_start_logs_participant_count() {
    let (logs, _guard) = capture_logs();
    let coord = SessionCoordinator::new();
    let (a, _rx) = channel_sink("a", 8);
    coord.join("A", &a);
    coord.start_round("q7", "?", "x");

    let event = logs
        .events()
        .into_iter()
        .find(|e| e.message == "round started")
        .unwrap();
    assert_eq!(event.field("question_id"), Some("q7"));
    assert_eq!(event.field("participants"), Some("1"));
}

// ── Concurrency ─────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_record_one_per_participant() {
    let coord = Arc::new(SessionCoordinator::new());
    let mut sinks = Vec::new();
    for i in 0..32 {
        let (sink, rx) = channel_sink(&format!("c{i}"), 64);
        coord.join(&format!("p{i}"), &sink);
        sinks.push((sink, rx));
    }
    coord.start_round("q1", "2+2?", "4");

    let mut handles = Vec::new();
    for i in 0..32 {
        for attempt in 0..8 {
            let coord = Arc::clone(&coord);
            handles.push(tokio::spawn(async move {
                let answer = if attempt % 2 == 0 { "4" } else { "wrong" };
                coord.submit_answer(&format!("p{i}"), answer)
            }));
        }
    }
    let mut accepted = 0;
    for handle in handles {
        if let SubmissionOutcome::Accepted { .. } = handle.await.unwrap() {
            accepted += 1;
        }
    }

    assert_eq!(accepted, 32);
    let summary = coord.end_round().unwrap();
    assert_eq!(summary.submissions, 32);
    assert_eq!(summary.awards.len(), 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn submissions_racing_round_replacement_land_in_one_round() {
    let coord = Arc::new(SessionCoordinator::new());
    let mut sinks = Vec::new();
    for i in 0..16 {
        let name = format!("p{i}");
        let (sink, rx) = channel_sink(&name, 64);
        coord.join(&name, &sink);
        sinks.push((sink, rx));
    }
    coord.start_round("q1", "First?", "alpha");

    // Even racers answer q2's answer, odd racers q1's.
    let barrier = Arc::new(tokio::sync::Barrier::new(9));
    let mut racers = Vec::new();
    for i in 0..8 {
        let coord = Arc::clone(&coord);
        let barrier = Arc::clone(&barrier);
        racers.push(tokio::spawn(async move {
            let _ = barrier.wait().await;
            let answer = if i % 2 == 0 { "beta" } else { "alpha" };
            coord.submit_answer(&format!("p{i}"), answer)
        }));
    }
    let restart = {
        let coord = Arc::clone(&coord);
        let barrier = Arc::clone(&barrier);
        tokio::spawn(async move {
            let _ = barrier.wait().await;
            coord.start_round("q2", "Second?", "beta");
        })
    };
    for racer in racers {
        assert_matches!(racer.await.unwrap(), SubmissionOutcome::Accepted { .. });
    }
    restart.await.unwrap();

    for i in 8..16 {
        assert_matches!(
            coord.submit_answer(&format!("p{i}"), "beta"),
            SubmissionOutcome::Accepted { .. }
        );
    }
    let summary = coord.end_round().unwrap();
    assert_eq!(summary.question_id, "q2");
    assert!((8..=16).contains(&summary.submissions), "{}", summary.submissions);
    assert_eq!(summary.awards.len(), summary.submissions);

    let scores = coord.scores();
    for i in 0..16 {
        let name = format!("p{i}");
        let score = scores[&name];
        if i >= 8 {
            assert!((100..=110).contains(&score), "{name} got {score}");
        } else if i % 2 == 1 {
            assert_eq!(score, 0, "{name} was scored with the replaced round's answer");
        } else {
            assert!(score == 0 || (100..=110).contains(&score), "{name} got {score}");
        }
        let awarded = summary.awards.get(&name).copied().unwrap_or(0);
        assert_eq!(score, awarded, "{name}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn joins_and_leaves_race_with_round_end() {
    let coord = Arc::new(SessionCoordinator::new());
    coord.start_round("q1", "?", "x");

    let mut handles = Vec::new();
    for i in 0..64 {
        let coord = Arc::clone(&coord);
        handles.push(tokio::spawn(async move {
            let name = format!("p{i}");
            let (sink, _rx) = channel_sink(&name, 8);
            coord.join(&name, &sink);
            let _ = coord.submit_answer(&name, "x");
            coord.leave(&name);
        }));
    }
    let ender = {
        let coord = Arc::clone(&coord);
        tokio::spawn(async move { coord.end_round() })
    };
    for handle in handles {
        handle.await.unwrap();
    }
    let _ = ender.await.unwrap();

    assert_eq!(coord.participant_count(), 0);
    assert_eq!(coord.scores().len(), 64);
    assert!(coord.active_round().is_none());
}
