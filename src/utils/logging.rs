use std::env;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEBUG_ENV: &str = "FLOWPULSE_DEBUG";
const DEFAULT_DIRECTIVES: &str = "flowpulse=info,warn";
const DEBUG_DIRECTIVES: &str = "flowpulse=debug,info";

/// 日志配置
///
/// 日志一律写到 stderr，stdout 留给 CLI 的 JSON 输出。`RUST_LOG` 优先于内置过滤规则，
/// `FLOWPULSE_DEBUG` 打开目标、文件和行号。
///
/// ```no_run
/// use flowpulse::utils::LoggingConfig;
///
/// LoggingConfig::init();
/// ```
pub struct LoggingConfig;

impl LoggingConfig {
    /// 安装全局订阅者；已安装时静默跳过，返回是否由本次安装
    pub fn init() -> bool {
        let verbose = Self::is_debug();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(Self::default_directives(verbose)));
        let installed = Self::install(filter, verbose);
        if installed && verbose {
            tracing::debug!(env = DEBUG_ENV, "verbose telemetry logging enabled");
        }
        installed
    }

    /// 使用显式过滤规则安装，忽略 `RUST_LOG`
    pub fn init_with_filter(filter: &str) -> bool {
        Self::install(EnvFilter::new(filter), Self::is_debug())
    }

    pub fn is_debug() -> bool {
        env::var(DEBUG_ENV).is_ok()
    }

    fn default_directives(verbose: bool) -> &'static str {
        if verbose {
            DEBUG_DIRECTIVES
        } else {
            DEFAULT_DIRECTIVES
        }
    }

    fn install(filter: EnvFilter, verbose: bool) -> bool {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(verbose)
            .with_file(verbose)
            .with_line_number(verbose);
        tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()
            .is_ok()
    }
}
