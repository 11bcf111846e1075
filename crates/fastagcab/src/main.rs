use anyhow::{Context, Result};
use clap::Parser;
use server::app::ApplicationServer;
use std::sync::Arc;
use tracing::info;
use utils::{AppConfig, Logger};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let fastagcab = Fastagcab::new();
    fastagcab.run().await
}

pub struct Fastagcab {
    config: Arc<AppConfig>,
}

impl Fastagcab {
    pub fn new() -> Self {
        Self {
            config: Fastagcab::with_config(),
        }
    }

    pub async fn run(self) -> Result<(), anyhow::Error> {
        // guard 需要存活到进程结束，否则非阻塞日志会丢失
        let _guard = Logger::new(self.config.cargo_env);

        info!(
            "🔧 starting fastagcab ({:?}) with database {}",
            self.config.cargo_env, self.config.mongo_db
        );

        // 1. 连接数据库并初始化索引
        // 2. 启动api & services，收到退出信号后优雅关闭
        ApplicationServer::serve(self.config.clone())
            .await
            .context("🔴 Failed to start server")?;

        info!("👋 fastagcab stopped");

        Ok(())
    }

    fn with_config() -> Arc<AppConfig> {
        // 根据 CARGO_ENV 加载对应的环境配置文件
        utils::EnvLoader::load_env_file().ok();
        Arc::new(AppConfig::parse())
    }
}

impl Default for Fastagcab {
    fn default() -> Self {
        Self::new()
    }
}
