use crate::error::{EngineError, RepositoryError};
use crate::service::{
    export_daily_csv, BillingService, FileOutcome, IngestOutcome, IngestionService,
    ReconciliationService, UploadedDocument,
};
use axum::{
    extract::{Json, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 未指定时的服务类型
pub const DEFAULT_SERVICE_TYPE: &str = "AlzaBox";

fn default_service_type() -> String {
    DEFAULT_SERVICE_TYPE.to_string()
}

/// 查询参数: 服务类型
#[derive(Debug, Deserialize)]
pub struct ServiceTypeQuery {
    #[serde(default = "default_service_type")]
    pub service_type: String,
}

/// 请求体: 已解析为文本的发票文件
#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub documents: Vec<UploadedDocument>,
}

/// 发票导入响应
#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub success: bool,
    pub message: String,
    pub outcomes: Vec<FileOutcome>,
}

/// 错误响应
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub code: String,
    pub message: String,
}

fn error_response(err: EngineError) -> Response {
    let (status, code, message) = match &err {
        EngineError::InsufficientData(reason) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            reason.code(),
            reason.message().to_string(),
        ),
        EngineError::InvalidPeriod { .. } | EngineError::InvalidDateRange { .. } => {
            (StatusCode::BAD_REQUEST, "invalid_request", err.to_string())
        }
        EngineError::InvalidTransition { .. } => {
            (StatusCode::CONFLICT, "invalid_transition", err.to_string())
        }
        EngineError::Repository(RepositoryError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        EngineError::Repository(RepositoryError::DuplicateInvoice { .. }) => {
            (StatusCode::CONFLICT, "duplicate_invoice", err.to_string())
        }
        EngineError::Repository(_) => {
            tracing::error!("请求处理失败: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                format!("Error: {}", err),
            )
        }
    };

    let response = ErrorResponse {
        success: false,
        code: code.to_string(),
        message,
    };
    (status, Json(response)).into_response()
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 预期账单
pub async fn get_billing(
    State(service): State<Arc<BillingService>>,
    Path((carrier_id, year, month)): Path<(i64, i32, u32)>,
    Query(query): Query<ServiceTypeQuery>,
) -> Response {
    match service
        .calculate(carrier_id, &query.service_type, year, month)
        .await
    {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => error_response(e),
    }
}

/// 逐日明细 CSV
pub async fn get_billing_csv(
    State(service): State<Arc<BillingService>>,
    Path((carrier_id, year, month)): Path<(i64, i32, u32)>,
    Query(query): Query<ServiceTypeQuery>,
) -> Response {
    let result = match service
        .calculate(carrier_id, &query.service_type, year, month)
        .await
    {
        Ok(result) => result,
        Err(e) => return error_response(e),
    };

    match export_daily_csv(&result) {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
            bytes,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("CSV 导出失败: {}", e);
            let response = ErrorResponse {
                success: false,
                code: "export_failed".to_string(),
                message: format!("Error: {}", e),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
        }
    }
}

/// 对账结果
pub async fn get_reconciliation(
    State(service): State<Arc<ReconciliationService>>,
    Path((carrier_id, year, month)): Path<(i64, i32, u32)>,
    Query(query): Query<ServiceTypeQuery>,
) -> Response {
    match service
        .reconcile(carrier_id, &query.service_type, year, month)
        .await
    {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => error_response(e),
    }
}

/// 批量导入发票文本
pub async fn extract_invoices(
    State(service): State<Arc<IngestionService>>,
    Path(carrier_id): Path<i64>,
    Json(req): Json<ExtractRequest>,
) -> Response {
    let total = req.documents.len();
    let outcomes = service.ingest_batch(carrier_id, req.documents).await;
    let failed = outcomes
        .iter()
        .filter(|o| matches!(o.outcome, IngestOutcome::Failed { .. }))
        .count();

    let response = ExtractResponse {
        success: failed == 0,
        message: format!("Processed {} files, {} failed", total, failed),
        outcomes,
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// 发票关联 Proof
pub async fn link_invoice_proof(
    State(service): State<Arc<IngestionService>>,
    Path((invoice_id, proof_id)): Path<(i64, i64)>,
) -> Response {
    match service.link_invoice_to_proof(invoice_id, proof_id).await {
        Ok(invoice) => (StatusCode::OK, Json(invoice)).into_response(),
        Err(e) => error_response(e),
    }
}

/// 标记发票争议
pub async fn dispute_invoice(
    State(service): State<Arc<IngestionService>>,
    Path(invoice_id): Path<i64>,
) -> Response {
    match service.mark_disputed(invoice_id).await {
        Ok(invoice) => (StatusCode::OK, Json(invoice)).into_response(),
        Err(e) => error_response(e),
    }
}
