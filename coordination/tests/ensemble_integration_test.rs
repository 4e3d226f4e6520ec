//! Integration tests for the ensemble pipeline
//!
//! These tests drive EnsembleCoordinator end to end against the in-process
//! ScriptedClient, with tokio's clock paused so timeouts elapse instantly.

use std::sync::Arc;
use std::time::Duration;

use coordination::session::scripted::ScriptedOperation;
use coordination::{
    CandidateStatus, EnsembleConfig, EnsembleCoordinator, ScriptedClient, ScriptedRun,
    SharedSessionClient, TimeoutPolicy, Variant, Verifier, VerifierWeighted,
};

/// Three variants with instructions of equal length, so reply length alone
/// decides the winner.
fn three_variants() -> Vec<Variant> {
    vec![
        Variant::new("low_temp", "instruction-a"),
        Variant::new("medium", "instruction-b"),
        Variant::new("creative", "instruction-c"),
    ]
}

fn config() -> EnsembleConfig {
    EnsembleConfig::new("asst-1")
        .with_max_concurrency(3)
        .with_run_timeout(Duration::from_secs(5))
}

#[tokio::test(start_paused = true)]
async fn test_longest_successful_reply_wins() {
    let client = ScriptedClient::new()
        .with_run_for("instruction-a", ScriptedRun::reply("x".repeat(10)))
        .with_run_for("instruction-b", ScriptedRun::reply("y".repeat(50)))
        .with_run_for("instruction-c", ScriptedRun::stuck());

    let coordinator = EnsembleCoordinator::new(Arc::new(client), config());
    let result = coordinator
        .generate("fix test foo", &three_variants())
        .await;

    assert_eq!(result.candidates.len(), 3);
    let chosen = result.chosen.expect("a winner should be chosen");
    assert_eq!(chosen.variant_name, "medium");
    assert_eq!(chosen.messages.last().map(|m| m.text.len()), Some(50));

    let timed_out: Vec<_> = result
        .candidates
        .iter()
        .filter(|c| c.status == CandidateStatus::TimedOut)
        .collect();
    assert_eq!(timed_out.len(), 1);
    assert_eq!(timed_out[0].variant_name, "creative");
    assert!(timed_out[0].messages.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_no_winner_is_a_normal_outcome() {
    let client = ScriptedClient::new()
        .with_run_for("instruction-a", ScriptedRun::failure("rate_limited"))
        .with_run_for("instruction-b", ScriptedRun::stuck())
        .with_run_for(
            "instruction-c",
            ScriptedRun::reply("never seen").with_transport_failure(ScriptedOperation::StartRun),
        );

    let coordinator = EnsembleCoordinator::new(Arc::new(client), config());
    let result = coordinator.generate("go", &three_variants()).await;

    assert!(!result.has_winner());
    assert_eq!(result.candidates.len(), 3);
    let statuses: Vec<_> = result
        .candidates_by_variant()
        .iter()
        .map(|c| c.status)
        .collect();
    assert_eq!(
        statuses,
        vec![
            CandidateStatus::Error,
            CandidateStatus::Failed,
            CandidateStatus::TimedOut,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_policy_cancels_only_timed_out_runs() {
    let client = Arc::new(
        ScriptedClient::new()
            .with_run_for("instruction-a", ScriptedRun::reply("done"))
            .with_run_for("instruction-b", ScriptedRun::stuck())
            .with_run_for("instruction-c", ScriptedRun::stuck()),
    );
    let coordinator = EnsembleCoordinator::new(
        Arc::clone(&client) as SharedSessionClient,
        config().with_timeout_policy(TimeoutPolicy::Cancel),
    );

    let result = coordinator.generate("go", &three_variants()).await;

    assert_eq!(result.chosen.map(|c| c.variant_name).as_deref(), Some("low_temp"));
    assert_eq!(client.cancelled_runs().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_verifier_weighted_reranking_prefers_clean_reply() {
    let client = ScriptedClient::new()
        .with_run_for(
            "instruction-a",
            ScriptedRun::reply("set password=hunter2 in the config and restart everything"),
        )
        .with_run_for("instruction-b", ScriptedRun::reply("restart the service after the fix"))
        .with_run_for("instruction-c", ScriptedRun::failure("boom"));

    let coordinator = EnsembleCoordinator::new(Arc::new(client), config())
        .with_reranker(Arc::new(VerifierWeighted::new(Verifier::new())));
    let result = coordinator.generate("go", &three_variants()).await;

    assert_eq!(
        result.chosen.map(|c| c.variant_name).as_deref(),
        Some("medium")
    );
}

#[tokio::test(start_paused = true)]
async fn test_records_serialize_at_the_boundary() {
    let client = ScriptedClient::dry_run();
    let coordinator = EnsembleCoordinator::new(Arc::new(client), config());
    let result = coordinator
        .generate("Hello Agent", &three_variants())
        .await;

    let record = result.chosen.expect("dry run always answers").to_record();
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["status"], "succeeded");
    assert_eq!(json["messages"][0]["role"], "system");
    assert_eq!(json["messages"][1]["text"], "Hello Agent");
    assert_eq!(json["messages"][2]["text"], "<simulated reply>");
}
