use std::sync::Arc;

use serde_json::json;

use flowpulse::{
    ExecutionEvent, FileStore, KeyValueStore, MemoryStore, NodeExecutionStatus, NodeRunStatus,
    NodeTokenCost, TelemetryConfig, TelemetrySession, TokenCostMap,
};

fn completed(label: &str, total: u64) -> ExecutionEvent {
    ExecutionEvent::new("node_completed").with_data(json!({
        "agent_label": label,
        "tokenCost": {"promptTokens": total, "completionTokens": 0, "totalTokens": total, "costString": "$0.02"}
    }))
}

#[tokio::test]
async fn token_costs_survive_remount() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());

    let mut session = TelemetrySession::new(store.clone());
    session.mount_workflow("wf-1").await;
    session.start_run(None);
    session.ingest(completed("Research", 150)).await;
    session.ingest(completed("Writer", 80)).await;

    let raw = store.get("workflow-wf-1-token-costs").await?.expect("persisted");
    let persisted: TokenCostMap = serde_json::from_str(&raw)?;
    assert_eq!(persisted.len(), 2);

    let mut remounted = TelemetrySession::new(store.clone());
    remounted.mount_workflow("wf-1").await;
    assert_eq!(remounted.token_costs()["Writer"].total_tokens, 80);

    remounted.mount_workflow("wf-2").await;
    assert!(remounted.token_costs().is_empty());
    Ok(())
}

#[tokio::test]
async fn costs_carry_over_between_runs_of_one_workflow() -> anyhow::Result<()> {
    let mut session = TelemetrySession::new(Arc::new(MemoryStore::new()));
    session.mount_workflow("wf-1").await;
    session.start_run(None);
    session.ingest(completed("Research", 150)).await;

    session.start_run(None);
    assert_eq!(session.token_costs()["Research"].total_tokens, 150);
    assert!(session.node_statuses().is_empty());

    session.ingest(completed("Research", 320)).await;
    assert_eq!(session.token_costs()["Research"].total_tokens, 320);
    Ok(())
}

#[tokio::test]
async fn corrupt_persisted_costs_fall_back_to_empty() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    store
        .set("workflow-wf-9-token-costs", "{\"Research\": 12".into())
        .await?;

    let mut session = TelemetrySession::new(store);
    session.mount_workflow("wf-9").await;
    assert!(session.token_costs().is_empty());
    Ok(())
}

#[tokio::test]
async fn node_status_updates_feed_token_costs() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let mut session = TelemetrySession::new(store.clone());
    session.mount_workflow("wf-1").await;
    session.start_run(None);

    let update = NodeExecutionStatus::new("Planner", NodeRunStatus::Completed)
        .with_token_cost(NodeTokenCost::new(30, 12, "$0.001"));
    assert!(session.apply_node_status(update.clone()).await);
    assert!(!session.apply_node_status(update).await);
    assert!(
        !session
            .apply_node_status(NodeExecutionStatus::new("Writer", NodeRunStatus::Running))
            .await
    );

    assert_eq!(session.token_costs()["Planner"].total_tokens, 42);
    assert_eq!(session.node_statuses()["Writer"], NodeRunStatus::Running);
    assert!(store.get("workflow-wf-1-token-costs").await?.is_some());
    Ok(())
}

#[tokio::test]
async fn custom_prefix_and_file_store() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = TelemetryConfig::from_json_str(r#"{"persistence_prefix": "studio"}"#)?;

    let mut session =
        TelemetrySession::new(Arc::new(FileStore::new(dir.path()))).with_config(config.clone());
    session.mount_workflow("7").await;
    session.start_run(None);
    session.ingest(completed("Research", 10)).await;
    assert!(dir.path().join("studio-7-token-costs.json").exists());

    let mut remounted =
        TelemetrySession::new(Arc::new(FileStore::new(dir.path()))).with_config(config);
    remounted.mount_workflow("7").await;
    assert_eq!(remounted.token_costs()["Research"].total_tokens, 10);
    Ok(())
}

#[tokio::test]
async fn snapshot_serializes_every_view() -> anyhow::Result<()> {
    let mut session = TelemetrySession::new(Arc::new(MemoryStore::new()));
    session.mount_workflow("wf-1").await;
    session.start_run(Some("task-3".into()));
    session.ingest(completed("Research", 150)).await;
    session
        .ingest(ExecutionEvent::new("complete").with_data(json!({"status": "completed"})))
        .await;

    let value = serde_json::to_value(session.snapshot())?;
    assert_eq!(value["workflowId"], "wf-1");
    assert_eq!(value["taskId"], "task-3");
    assert_eq!(value["status"]["state"], "completed");
    assert_eq!(value["metrics"]["totalEvents"], 2);
    assert_eq!(value["tokenCosts"]["Research"]["totalTokens"], 150);
    assert_eq!(value["nodeStatuses"]["Research"], "completed");
    Ok(())
}
