use std::sync::Arc;

use futures::{pin_mut, Stream, StreamExt};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use super::completion::CompletionDetector;
use super::hooks::{CompletionHooks, NoopHooks};
use super::types::{IngestReport, RunId, TelemetrySnapshot, TerminalOutcome};
use crate::config::TelemetryConfig;
use crate::diagnostics::{DiagnosticsAnalyzer, WarningMap};
use crate::event::{EventLog, ExecutionEvent};
use crate::metrics::{self, WorkflowMetrics};
use crate::state::{
    ExecutionStatus, KeyValueStore, NodeExecutionStatus, NodeStatusMap, NodeStatusTracker,
    RunStatusStore,
};
use crate::tokens::{SharedTokenCosts, TokenCostAggregator, TokenCostPersistence};

/// 遥测会话：当前挂载工作流的唯一状态容器和事件分发点
///
/// 每个事件按固定顺序同步地经过：事件日志 → 诊断 → 节点成本 → 节点状态 → 终态检测 → 指标，
/// 之后才等待终态副作用和持久化。
pub struct TelemetrySession {
    config: TelemetryConfig,
    workflow_id: Option<String>,
    task_id: Option<String>,
    run: Option<RunId>,
    next_run: u64,
    log: EventLog,
    analyzer: DiagnosticsAnalyzer,
    warnings: Arc<WarningMap>,
    tokens: TokenCostAggregator,
    nodes: NodeStatusTracker,
    detector: CompletionDetector,
    metrics: WorkflowMetrics,
    status: RunStatusStore,
    persistence: TokenCostPersistence,
    hooks: Arc<dyn CompletionHooks>,
}

impl TelemetrySession {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let config = TelemetryConfig::default();
        Self {
            workflow_id: None,
            task_id: None,
            run: None,
            next_run: 0,
            log: EventLog::new().with_dedupe(config.dedupe_event_ids),
            analyzer: DiagnosticsAnalyzer::new(config.diagnostics.clone()),
            warnings: Arc::new(WarningMap::new()),
            tokens: TokenCostAggregator::new(),
            nodes: NodeStatusTracker::new(),
            detector: CompletionDetector::new(),
            metrics: WorkflowMetrics::default(),
            status: RunStatusStore::new(),
            persistence: TokenCostPersistence::new(store, config.persistence_prefix.clone()),
            hooks: Arc::new(NoopHooks),
            config,
        }
    }

    pub fn with_config(mut self, config: TelemetryConfig) -> Self {
        self.log = EventLog::new().with_dedupe(config.dedupe_event_ids);
        self.analyzer = DiagnosticsAnalyzer::new(config.diagnostics.clone());
        self.persistence =
            TokenCostPersistence::new(self.persistence.store(), config.persistence_prefix.clone());
        self.config = config;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn CompletionHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// 挂载（或切换到）一个工作流：拆除运行级状态并恢复该工作流的节点成本
    #[instrument(skip(self, workflow_id))]
    pub async fn mount_workflow(&mut self, workflow_id: impl Into<String>) {
        let workflow_id = workflow_id.into();
        self.reset_run_views();
        self.run = None;
        self.task_id = None;
        self.status.reset();

        let costs = self.persistence.load(&workflow_id).await;
        info!(workflow = %workflow_id, nodes = costs.len(), "workflow mounted");
        self.tokens.reset(costs);
        self.workflow_id = Some(workflow_id);
    }

    /// 开始新的运行：清空事件日志，分配新的运行标识，状态进入 `running`
    ///
    /// 节点成本跨运行保留，由后续快照逐个覆盖。
    pub fn start_run(&mut self, task_id: Option<String>) -> RunId {
        self.next_run += 1;
        let run = RunId(self.next_run);
        self.reset_run_views();
        self.run = Some(run);
        self.task_id = task_id;
        self.status.start();
        info!(%run, task = ?self.task_id, "run registered");
        run
    }

    /// 用户停止：状态回到 `idle`，事件日志保留以便排查
    pub fn stop(&mut self) -> bool {
        self.status.stop()
    }

    pub fn set_current_node(&self, node: Option<String>) -> bool {
        self.status.set_current_node(node)
    }

    /// 处理一个传输层事件
    #[instrument(level = "debug", skip_all, fields(kind = %event.kind))]
    pub async fn ingest(&mut self, event: ExecutionEvent) -> IngestReport {
        if !self.log.append(event) {
            return IngestReport::default();
        }

        let mut report = IngestReport {
            appended: true,
            ..IngestReport::default()
        };

        self.warnings = Arc::new(self.analyzer.analyze(self.log.events()));
        if let Some(latest) = self.log.latest() {
            report.token_costs_changed = self.tokens.observe(latest);
            self.nodes.observe(latest);
        }
        if let Some(run) = self.run {
            report.terminal = self.detector.observe(run, self.log.events());
        }
        self.metrics = metrics::compute(self.log.events());
        debug!(total = self.metrics.total_events, "event ingested");

        if report.token_costs_changed {
            self.persist_token_costs().await;
        }
        if let Some(outcome) = &report.terminal {
            self.handle_completion(outcome).await;
        }
        report
    }

    /// 处理节点状态通道推送的更新，返回成本表是否变化
    pub async fn apply_node_status(&mut self, update: NodeExecutionStatus) -> bool {
        self.nodes.apply(&update);
        let Some(cost) = update.token_cost else {
            return false;
        };
        let changed = self.tokens.observe_update(&update.label, cost);
        if changed {
            self.persist_token_costs().await;
        }
        changed
    }

    /// 消费事件流，直到流结束或当前运行到达终态
    pub async fn consume<S>(&mut self, events: S) -> Option<TerminalOutcome>
    where
        S: Stream<Item = ExecutionEvent>,
    {
        pin_mut!(events);
        while let Some(event) = events.next().await {
            if let Some(outcome) = self.ingest(event).await.terminal {
                return Some(outcome);
            }
        }
        None
    }

    pub fn workflow_id(&self) -> Option<&str> {
        self.workflow_id.as_deref()
    }

    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    pub fn run_id(&self) -> Option<RunId> {
        self.run
    }

    pub fn events(&self) -> &[ExecutionEvent] {
        self.log.events()
    }

    pub fn latest_event(&self) -> Option<&ExecutionEvent> {
        self.log.latest()
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status.current()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ExecutionStatus> {
        self.status.subscribe()
    }

    pub fn warnings(&self) -> Arc<WarningMap> {
        Arc::clone(&self.warnings)
    }

    pub fn token_costs(&self) -> SharedTokenCosts {
        Arc::clone(self.tokens.costs())
    }

    pub fn metrics(&self) -> &WorkflowMetrics {
        &self.metrics
    }

    pub fn node_statuses(&self) -> &NodeStatusMap {
        self.nodes.statuses()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            workflow_id: self.workflow_id.clone(),
            task_id: self.task_id.clone(),
            run_id: self.run,
            status: self.status.current(),
            metrics: self.metrics.clone(),
            warnings: (*self.warnings).clone(),
            token_costs: (**self.tokens.costs()).clone(),
            node_statuses: self.nodes.statuses().clone(),
        }
    }

    fn reset_run_views(&mut self) {
        self.log.clear();
        self.nodes.reset();
        self.warnings = Arc::new(WarningMap::new());
        self.metrics = WorkflowMetrics::default();
    }

    async fn persist_token_costs(&self) {
        let Some(workflow_id) = self.workflow_id.as_deref() else {
            debug!("no workflow mounted, token costs kept in memory only");
            return;
        };
        if let Err(error) = self.persistence.save(workflow_id, self.tokens.costs()).await {
            warn!(workflow = %workflow_id, %error, "failed to persist token costs");
        }
    }

    async fn handle_completion(&self, outcome: &TerminalOutcome) {
        let transitioned = match outcome {
            TerminalOutcome::Completed => self.status.complete(),
            TerminalOutcome::Failed { error } => self.status.fail(error.clone()),
        };
        if !transitioned {
            debug!(state = %self.status.state(), "terminal event outside an active run");
            return;
        }

        self.hooks.clear_selected_task();
        if let Err(error) = self.hooks.refresh_history().await {
            warn!(%error, "history refresh failed after completion");
        }
        self.hooks.on_complete(outcome);
    }
}
