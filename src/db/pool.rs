use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;
use std::time::Duration;

use crate::config::DatabaseConfig;

/// 创建数据库连接池
pub async fn create_pool(database: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    // 慢查询日志阈值 5秒
    let connect_options = PgConnectOptions::from_str(&database.url)?
        .log_slow_statements(tracing::log::LevelFilter::Warn, Duration::from_secs(5));

    PgPoolOptions::new()
        .max_connections(database.max_connections)
        .acquire_timeout(Duration::from_secs(database.acquire_timeout_secs))
        .connect_with(connect_options)
        .await
}
