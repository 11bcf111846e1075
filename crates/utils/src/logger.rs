use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::CargoEnv;

const DEFAULT_FILTER: &str = "fastagcab=debug,server=debug,database=debug,tower_http=debug";
const LOG_FILE_PREFIX: &str = "fastagcab.log";

pub struct Logger;
impl Logger {
    /// 初始化全局订阅者，返回的守卫需要在进程生命周期内保持
    pub fn new(cargo_env: CargoEnv) -> WorkerGuard {
        let (writer, guard) = Self::writer(cargo_env);

        // env var: `RUST_LOG`
        let env_filter =
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_file(true)
                    .with_line_number(true)
                    .with_target(false),
            )
            .init();

        guard
    }

    fn writer(cargo_env: CargoEnv) -> (NonBlocking, WorkerGuard) {
        if cargo_env == CargoEnv::Development {
            return tracing_appender::non_blocking(std::io::stdout());
        }

        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        let directory = resolve_log_directory(std::env::var("LOG_DIR").ok(), exe_dir);

        match std::fs::create_dir_all(&directory) {
            Ok(()) => {
                println!("✅ 日志将按天滚动写入: {:?}", directory);
                tracing_appender::non_blocking(tracing_appender::rolling::daily(&directory, LOG_FILE_PREFIX))
            }
            Err(e) => {
                // 目录不可写时宁可输出到终端，也不丢日志
                eprintln!("⚠️ 无法创建日志目录 {:?}: {}，改为输出到 stdout", directory, e);
                tracing_appender::non_blocking(std::io::stdout())
            }
        }
    }
}

/// `LOG_DIR` 优先，其次是可执行文件旁的 logs 目录，最后是工作目录下的 logs
fn resolve_log_directory(log_dir_env: Option<String>, exe_dir: Option<PathBuf>) -> PathBuf {
    match (log_dir_env.filter(|dir| !dir.trim().is_empty()), exe_dir) {
        (Some(dir), _) => PathBuf::from(dir),
        (None, Some(exe_dir)) => exe_dir.join("logs"),
        (None, None) => PathBuf::from("logs"),
    }
}
