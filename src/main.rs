//! lightpub 认证服务主入口

use lightpub_auth::{
    auth::{KeyStore, TokenService},
    config::AppConfig,
    db,
    handlers::health,
    middleware::AppState,
    models::user_id,
    routes,
    store::{MemorySecretStore, PgSecretStore, SecretStore},
    telemetry,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

enum Command {
    Serve,
    Issue(String),
    RegenerateKeys,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ===== CLI 参数处理 =====
    let args: Vec<String> = std::env::args().collect();

    let command = match args.get(1).map(String::as_str) {
        None => Command::Serve,
        Some("--version") => {
            println!("lightpub-auth {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some("--help") => {
            print_help();
            return Ok(());
        }
        Some("issue") => match args.get(2) {
            Some(id) => Command::Issue(id.clone()),
            None => {
                eprintln!("issue 需要用户 ID 参数");
                print_help();
                std::process::exit(1);
            }
        },
        Some("regenerate-keys") => Command::RegenerateKeys,
        Some(other) => {
            eprintln!("未知参数: {}", other);
            print_help();
            std::process::exit(1);
        }
    };

    // 加载 .env 文件（开发环境）
    // 按优先级加载：.env.local > .env.development > .env
    if let Ok(path) = std::env::var("LIGHTPUB_ENV") {
        dotenv::from_filename(format!(".env.{}", path)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::from_filename(".env.development").ok();
        dotenv::dotenv().ok();
    }

    health::set_start_time();

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 初始化日志
    telemetry::init_telemetry(&config.logging);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "lightpub-auth starting...");

    // 3. 密钥存储
    let secret_store: Arc<dyn SecretStore> = if config.secret_store.is_postgres() {
        let db_pool = db::create_pool(&config.database).await?;
        db::run_migrations(&db_pool).await?;
        tracing::info!("Database initialized");
        Arc::new(PgSecretStore::new(db_pool))
    } else {
        tracing::warn!("Using in-memory secret store; signing keys will not survive a restart");
        Arc::new(MemorySecretStore::new())
    };

    let key_store = Arc::new(
        KeyStore::new(secret_store, config.secret_store.timeout())
            .with_revalidate_interval(config.secret_store.revalidate_interval()),
    );

    if let Command::RegenerateKeys = command {
        if !config.secret_store.is_postgres() {
            anyhow::bail!("regenerate-keys requires secret_store.backend = postgres");
        }
        key_store
            .regenerate()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to regenerate signing key pair: {}", e))?;
        tracing::warn!("Signing key pair regenerated; previously issued tokens no longer verify");
        println!("signing key pair regenerated");
        return Ok(());
    }

    // 启动时即加载或创建密钥对，失败属于进程级错误
    key_store
        .get_or_create()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize signing key pair: {}", e))?;
    tracing::info!("Signing key pair ready");

    let token_service = Arc::new(TokenService::new(key_store.clone()));

    if let Command::Issue(raw_id) = command {
        let user_id = user_id::normalize(&raw_id)?;
        let token = token_service.issue(&user_id).await?;
        println!("{}", token);
        return Ok(());
    }

    // 4. 构建应用状态
    let app_state = Arc::new(AppState {
        key_store,
        token_service,
    });

    // 5. 构建路由
    let app = routes::create_router(app_state);

    // 6. 启动服务器
    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Server listening");

    // 7. 优雅关闭
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.graceful_shutdown_timeout_secs))
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// 优雅关闭信号处理
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, starting graceful shutdown");
        },
    }

    // 超时后强制关闭
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(timeout_secs)).await;
        tracing::warn!("Graceful shutdown timeout reached, forcing exit");
        std::process::exit(1);
    });
}

/// 打印帮助信息
fn print_help() {
    println!("lightpub-auth {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: lightpub-auth [选项 | 命令]");
    println!();
    println!("选项:");
    println!("  --version          打印版本信息并退出");
    println!("  --help             打印此帮助信息并退出");
    println!();
    println!("命令:");
    println!("  issue <user-id>    为指定用户签发令牌并打印");
    println!("  regenerate-keys    重新生成签名密钥对，已签发的令牌全部失效");
    println!();
    println!("环境变量:");
    println!("  所有配置通过 LIGHTPUB_ 前缀的环境变量完成");
    println!("  例如 LIGHTPUB_DATABASE__URL、LIGHTPUB_SECRET_STORE__BACKEND");
    println!("  LIGHTPUB_SECRET_STORE__REVALIDATE_INTERVAL_MS 控制其他实例重新生成密钥后的生效延迟");
}
