use axum::{routing::{get, post}, Router};
use carrier_cost_recon::{
    api, create_pool, AppConfig, BillingService, CostRepository, DocumentExtractor,
    IngestionService, PgRepository, ReconciliationService,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 使用本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::load()?;
    info!(
        "Starting server with config: server={:?} policy={:?}",
        config.server, config.policy
    );

    // 创建数据库连接池
    let pool = create_pool(&config.database).await?;
    info!("Database pool created");

    let repo: Arc<dyn CostRepository> = Arc::new(PgRepository::new(pool));
    let billing = Arc::new(BillingService::new(repo.clone(), config.policy.clone()));
    let reconciliation = Arc::new(ReconciliationService::new(
        repo.clone(),
        config.policy.clone(),
    ));
    let ingestion = Arc::new(IngestionService::new(
        repo,
        DocumentExtractor::from_policy(&config.policy),
    ));

    // 构建路由
    let billing_routes = Router::new()
        .route(
            "/api/carriers/:carrier_id/billing/:year/:month",
            get(api::get_billing),
        )
        .route(
            "/api/carriers/:carrier_id/billing/:year/:month/daily.csv",
            get(api::get_billing_csv),
        )
        .with_state(billing);

    let reconciliation_routes = Router::new()
        .route(
            "/api/carriers/:carrier_id/reconciliation/:year/:month",
            get(api::get_reconciliation),
        )
        .with_state(reconciliation);

    let invoice_routes = Router::new()
        .route(
            "/api/carriers/:carrier_id/invoices/extract",
            post(api::extract_invoices),
        )
        .route(
            "/api/invoices/:invoice_id/proof/:proof_id",
            post(api::link_invoice_proof),
        )
        .route(
            "/api/invoices/:invoice_id/dispute",
            post(api::dispute_invoice),
        )
        .with_state(ingestion);

    // 合并路由
    let app = Router::new()
        .route("/health", get(api::health_check))
        .merge(billing_routes)
        .merge(reconciliation_routes)
        .merge(invoice_routes)
        .layer(ServiceBuilder::new());

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  GET  /api/carriers/:id/billing/:year/:month[/daily.csv]");
    info!("  GET  /api/carriers/:id/reconciliation/:year/:month");
    info!("  POST /api/carriers/:id/invoices/extract");
    info!("  POST /api/invoices/:id/proof/:proof_id");
    info!("  POST /api/invoices/:id/dispute");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
