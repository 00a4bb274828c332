//! HTTP处理器

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use boneage_clinical::{
    calculate_age, format_age_kr, format_date_kr, session::MAX_BONE_AGE_YEARS, GrowthReport,
};
use boneage_core::{
    utils::generate_patient_id, AnalysisResult, BoneAgeError, ChronAge, PatientInfo,
};
use boneage_integration::ImagePayload;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::server::AppState;

/// API根路径处理器
pub async fn api_root() -> impl IntoResponse {
    Json(json!({
        "service": "BoneAge Growth API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "/health",
            "analyze": "/api/analyze",
            "age": "/api/age",
            "report": "/api/report",
            "report_text": "/api/report/text"
        }
    }))
}

/// 健康检查处理器
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "gateway": state.gateway.name(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// 影像分析请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub image_data_url: Option<String>,
    pub file_name: Option<String>,
    pub patient_id: Option<String>,
}

/// 影像分析：本地校验后代理到推理网关
pub async fn analyze(
    State(state): State<AppState>,
    request: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let Json(request) = request?;
    let data_url = request.image_data_url.unwrap_or_default();
    let payload = ImagePayload::from_data_url(
        &state.upload_policy,
        &data_url,
        request.file_name.as_deref(),
    )?;

    let patient_id = request
        .patient_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(generate_patient_id);

    info!(
        "Analyze request for patient {} ({})",
        patient_id,
        payload.descriptor().file_name
    );

    let result = state.gateway.analyze(&payload, &patient_id).await?;
    Ok(Json(result))
}

/// 年龄计算请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeRequest {
    pub birth_date: Option<String>,
    pub reference_date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeResponse {
    pub age: ChronAge,
    pub formatted: String,
    pub birth_date_text: String,
    pub reference_date_text: String,
}

/// 实足年龄计算
pub async fn age(
    request: Result<Json<AgeRequest>, JsonRejection>,
) -> Result<Json<AgeResponse>, ApiError> {
    let Json(request) = request?;
    let age = calculate_age(
        request.birth_date.as_deref(),
        request.reference_date.as_deref(),
    );

    Ok(Json(AgeResponse {
        age,
        formatted: format_age_kr(&age),
        birth_date_text: format_date_kr(request.birth_date.as_deref()),
        reference_date_text: format_date_kr(request.reference_date.as_deref()),
    }))
}

/// 报告请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub patient: PatientInfo,
    pub result: AnalysisResult,
    pub bone_age: Option<ChronAge>,
}

impl ReportRequest {
    fn into_report(self) -> Result<GrowthReport, BoneAgeError> {
        if let Some(bone_age) = self.bone_age {
            if bone_age.years > MAX_BONE_AGE_YEARS || bone_age.months > 11 {
                return Err(BoneAgeError::Validation(format!(
                    "骨龄超出范围: {}岁{}个月",
                    bone_age.years, bone_age.months
                )));
            }
        }
        Ok(GrowthReport::build(&self.patient, &self.result, self.bone_age))
    }
}

/// 结果视图模型
pub async fn report(
    request: Result<Json<ReportRequest>, JsonRejection>,
) -> Result<Json<GrowthReport>, ApiError> {
    let Json(request) = request?;
    Ok(Json(request.into_report()?))
}

/// 纯文本打印报告
pub async fn report_text(
    request: Result<Json<ReportRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = request?;
    let text = request.into_report()?.render_text();
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text).into_response())
}

/// API错误响应
#[derive(Debug)]
pub struct ApiError(pub BoneAgeError);

impl From<BoneAgeError> for ApiError {
    fn from(err: BoneAgeError) -> Self {
        Self(err)
    }
}

/// 请求体解析失败同样按统一错误格式返回
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = rejection.body_text();
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self(BoneAgeError::RequestTooLarge(message))
        } else {
            Self(BoneAgeError::Validation(message))
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            BoneAgeError::Validation(_) | BoneAgeError::UnsupportedFileType(_) => {
                StatusCode::BAD_REQUEST
            }
            BoneAgeError::FileTooLarge { .. } | BoneAgeError::RequestTooLarge(_) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            BoneAgeError::MissingCredentials(_) => StatusCode::SERVICE_UNAVAILABLE,
            BoneAgeError::Gateway(_) | BoneAgeError::MalformedResponse(_) => {
                StatusCode::BAD_GATEWAY
            }
            BoneAgeError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
            BoneAgeError::Config(_)
            | BoneAgeError::Network(_)
            | BoneAgeError::Serialization(_)
            | BoneAgeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// 错误处理
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.0.to_string();

        if self.0.is_input_error() {
            warn!("Input rejected: {}", message);
        } else if status.is_server_error() {
            error!("Request failed: {}", message);
        } else {
            warn!("Request rejected: {}", message);
        }

        let body = Json(json!({
            "error": true,
            "message": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}
