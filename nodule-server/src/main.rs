//! 肺结节工作列表服务器主程序

use anyhow::Context;
use clap::Parser;
use nodule_admin::{init_logging, ConfigValidator, NoduleConfig};
use nodule_database::{create_tables, seed_default_users, DatabasePool};
use nodule_storage::UploadStore;
use nodule_web::{AppState, WebServer, WebSettings};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{error, info};

/// 服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "nodule-server")]
#[command(about = "肺结节CT工作列表后端服务")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 监听地址，覆盖配置文件
    #[arg(long)]
    host: Option<String>,

    /// 监听端口，覆盖配置文件
    #[arg(short, long)]
    port: Option<u16>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long)]
    log_level: Option<String>,
}

impl Args {
    fn apply(self, config: &mut NoduleConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = NoduleConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    ConfigValidator::new().validate(&config)?;

    init_logging(&config.logging)?;

    info!("启动肺结节工作列表服务器...");
    info!("服务器配置:");
    info!("  监听地址: {}", config.bind_address());
    info!("  数据库: {}", config.database.url);
    info!("  上传目录: {}", config.storage.uploads_dir);

    let db = DatabasePool::connect(&config.database.url, config.database.max_connections).await?;
    create_tables(&db).await?;
    if config.seed_default_users {
        seed_default_users(&db).await?;
    }

    let store = UploadStore::new(&config.storage.uploads_dir);
    store.init().await?;

    let settings = WebSettings {
        max_upload_files: config.web.max_upload_files,
        max_upload_bytes: config.web.max_upload_bytes,
        seed_prefix: config.storage.seed_prefix.clone(),
    };

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("Invalid listen address: {}", config.bind_address()))?;

    let server = WebServer::new(addr, AppState::new(db.clone(), store, settings));
    let result = server.run().await;

    db.close().await;
    if let Err(e) = result {
        error!("服务器运行失败: {}", e);
        return Err(e.into());
    }

    info!("服务器已关闭");
    Ok(())
}
