use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use flowpulse::{
    compute, parse_json_lines, CompletionHooks, DiagnosticsAnalyzer, ExecutionEvent, FileStore,
    KeyValueStore, MemoryStore, TelemetryConfig, TelemetrySession, TerminalOutcome,
};
use flowpulse::utils::LoggingConfig;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "flowpulse", version, about = "Workflow execution telemetry", author)]
struct Cli {
    /// JSON 配置文件，缺省使用内置默认值
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 回放 JSON Lines 事件日志并输出全部视图
    Replay {
        file: PathBuf,
        #[arg(long, default_value = "local")]
        workflow_id: String,
        #[arg(long)]
        task_id: Option<String>,
        /// 节点成本持久化目录，缺省只保存在内存中
        #[arg(long)]
        state_dir: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },
    /// 输出按节点分组的诊断告警
    Diagnose { file: PathBuf },
    /// 输出聚合指标
    Metrics { file: PathBuf },
}

struct ReplayHooks;

impl CompletionHooks for ReplayHooks {
    fn on_complete(&self, outcome: &TerminalOutcome) {
        info!(outcome = ?outcome, "replayed run reached a terminal event");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    LoggingConfig::init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Replay {
            file,
            workflow_id,
            task_id,
            state_dir,
            pretty,
        } => handle_replay(config, file, workflow_id, task_id, state_dir, pretty).await?,
        Command::Diagnose { file } => handle_diagnose(config, file).await?,
        Command::Metrics { file } => handle_metrics(file).await?,
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<TelemetryConfig> {
    let config = match path {
        Some(path) => TelemetryConfig::from_path(path)?,
        None => TelemetryConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}

async fn read_events(file: &Path) -> anyhow::Result<Vec<ExecutionEvent>> {
    let raw = tokio::fs::read_to_string(file).await?;
    Ok(parse_json_lines(&raw)?)
}

async fn handle_replay(
    config: TelemetryConfig,
    file: PathBuf,
    workflow_id: String,
    task_id: Option<String>,
    state_dir: Option<PathBuf>,
    pretty: bool,
) -> anyhow::Result<()> {
    let events = read_events(&file).await?;
    let total = events.len();
    let store: Arc<dyn KeyValueStore> = match state_dir {
        Some(dir) => Arc::new(FileStore::new(dir)),
        None => Arc::new(MemoryStore::new()),
    };

    let mut session = TelemetrySession::new(store)
        .with_config(config)
        .with_hooks(Arc::new(ReplayHooks));
    session.mount_workflow(workflow_id).await;
    session.start_run(task_id);
    session.consume(futures::stream::iter(events)).await;

    let consumed = session.events().len();
    if consumed < total {
        warn!(
            skipped = total - consumed,
            "events after the terminal event or re-delivered events were not applied"
        );
    }

    let snapshot = session.snapshot();
    let content = if pretty {
        serde_json::to_string_pretty(&snapshot)?
    } else {
        serde_json::to_string(&snapshot)?
    };
    println!("{content}");
    Ok(())
}

async fn handle_diagnose(config: TelemetryConfig, file: PathBuf) -> anyhow::Result<()> {
    let events = read_events(&file).await?;
    let warnings = DiagnosticsAnalyzer::new(config.diagnostics).analyze(&events);
    if warnings.is_empty() {
        println!("No warnings detected in `{}`", file.display());
        return Ok(());
    }

    println!("{:<24} {:<8} {:<22} {}", "Node", "Severity", "Type", "Message");
    for (node, items) in &warnings {
        for warning in items {
            println!(
                "{:<24} {:<8} {:<22} {}",
                node,
                render_json_str(&warning.severity),
                render_json_str(&warning.kind),
                warning.message
            );
        }
    }
    Ok(())
}

async fn handle_metrics(file: PathBuf) -> anyhow::Result<()> {
    let metrics = compute(&read_events(&file).await?);
    println!("{:<14} {}", "events", metrics.total_events);
    println!("{:<14} {}", "chain ends", metrics.chain_ends);
    println!("{:<14} {}", "tool calls", metrics.tool_calls);
    println!("{:<14} {}", "agent actions", metrics.agent_actions);
    println!("{:<14} {}", "llm calls", metrics.llm_calls);
    println!("{:<14} {}", "tokens", metrics.total_tokens);
    println!("{:<14} {}", "errors", metrics.errors);
    println!("{:<14} {}", "duration", metrics.duration);
    Ok(())
}

fn render_json_str<T: serde::Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(text)) => text,
        _ => String::from("?"),
    }
}
