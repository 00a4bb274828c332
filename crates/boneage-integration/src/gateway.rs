//! 推理网关模块
//!
//! 把手部X光影像发送给外部视觉语言模型，并把受 JSON Schema 约束的返回值
//! 规整为 [`AnalysisResult`]：
//! - 概率钳制到 [0,1]
//! - 无法识别的风险等级回退为 Low
//! - 边界框坐标钳制到 [0,1]
//!
//! 不做重试；任何失败都以一条可读的错误信息返回给调用方。

use async_trait::async_trait;
use boneage_core::{
    utils::{clamp_unit, generate_analysis_id},
    AnalysisResult, BoneAgeError, BoundingBox, Result, Severity,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::upload::ImagePayload;

/// 发给模型的判读指令
pub const ANALYSIS_PROMPT: &str = "You are assisting with a pediatric hand and wrist X-ray review. \
Describe the single most relevant finding, estimate the probability (0 to 1) that the finding \
indicates advanced skeletal maturity, grade the severity as Low, Medium or High, and return \
normalized bounding boxes (x, y, width, height in 0..1, origin at the top-left) with a short \
label for each region of interest. Respond with JSON only.";

/// 推理网关接口
#[async_trait]
pub trait InferenceGateway: Send + Sync {
    /// 分析一张影像
    async fn analyze(&self, image: &ImagePayload, patient_id: &str) -> Result<AnalysisResult>;

    /// 网关名称
    fn name(&self) -> &str;
}

/// 推理网关配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// API 根地址
    pub endpoint: String,
    /// 模型名称
    pub model: String,
    /// API 密钥，未配置时拒绝调用
    pub api_key: Option<String>,
    /// 请求超时（秒）
    pub timeout_secs: u64,
    /// 写入结果的检查模态
    pub modality: String,
    /// 离线模式：不访问外部服务，返回固定结果
    pub offline: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_key: None,
            timeout_secs: 60,
            modality: "X-ray".to_string(),
            offline: false,
        }
    }
}

/// 返回值的 JSON Schema
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "finding": { "type": "STRING" },
            "probability": { "type": "NUMBER" },
            "severity": { "type": "STRING", "enum": ["Low", "Medium", "High"] },
            "boundingBoxes": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "x": { "type": "NUMBER" },
                        "y": { "type": "NUMBER" },
                        "width": { "type": "NUMBER" },
                        "height": { "type": "NUMBER" },
                        "label": { "type": "STRING" }
                    },
                    "required": ["x", "y", "width", "height", "label"]
                }
            }
        },
        "required": ["finding", "probability", "severity", "boundingBoxes"]
    })
}

/// 构造 generateContent 请求体
pub fn build_request_body(image: &ImagePayload) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [
                { "text": ANALYSIS_PROMPT },
                {
                    "inline_data": {
                        "mime_type": image.descriptor().mime_type,
                        "data": image.to_base64()
                    }
                }
            ]
        }],
        "generationConfig": {
            "response_mime_type": "application/json",
            "response_schema": response_schema(),
            "temperature": 0.2
        }
    })
}

/// 模型返回的原始判读，字段与 [`response_schema`] 一致且均为必填
#[derive(Debug, Clone, Deserialize)]
pub struct RawFinding {
    pub finding: String,
    pub probability: f64,
    pub severity: String,
    #[serde(rename = "boundingBoxes", alias = "bounding_boxes")]
    pub bounding_boxes: Vec<RawBox>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub label: Option<String>,
}

/// 解析模型输出文本；兼容 ```json 代码块包裹
pub fn parse_model_text(text: &str) -> Result<RawFinding> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(unfenced.trim())
        .map_err(|e| BoneAgeError::MalformedResponse(format!("无法解析模型输出: {}", e)))
}

/// 把原始判读规整为分析结果
pub fn normalize_finding(raw: RawFinding, patient_id: &str, modality: &str) -> AnalysisResult {
    let probability = clamp_unit(raw.probability);
    if probability != raw.probability {
        warn!("Upstream probability {} clamped to {}", raw.probability, probability);
    }

    let severity = Severity::parse_lenient(&raw.severity);
    if severity.as_str() != raw.severity.trim() {
        warn!("Upstream severity {:?} mapped to {}", raw.severity, severity.as_str());
    }

    let bounding_boxes = raw
        .bounding_boxes
        .into_iter()
        .map(|b| BoundingBox {
            x: clamp_unit(b.x),
            y: clamp_unit(b.y),
            width: clamp_unit(b.width),
            height: clamp_unit(b.height),
            label: b.label.unwrap_or_default(),
        })
        .collect();

    AnalysisResult {
        id: generate_analysis_id(),
        finding: raw.finding.trim().to_string(),
        probability,
        severity,
        bounding_boxes,
        analysis_date: Utc::now(),
        modality: modality.to_string(),
        patient_id: patient_id.to_string(),
    }
}

/// 取出第一个候选结果的文本
fn extract_candidate_text(body: &Value) -> Result<&str> {
    if let Some(reason) = body["promptFeedback"]["blockReason"].as_str() {
        return Err(BoneAgeError::Gateway(format!("推理服务拒绝了请求: {}", reason)));
    }

    body["candidates"][0]["content"]["parts"]
        .as_array()
        .and_then(|parts| parts.iter().find_map(|p| p["text"].as_str()))
        .ok_or_else(|| BoneAgeError::MalformedResponse("响应中没有候选文本".to_string()))
}

/// 从上游错误响应中提取可读信息
fn upstream_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

/// 基于 HTTP 的视觉模型网关
pub struct HttpVisionGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl HttpVisionGateway {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BoneAgeError::Config(format!("无法创建HTTP客户端: {}", e)))?;

        Ok(Self { client, config })
    }

    fn request_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }

    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| BoneAgeError::MissingCredentials("未配置推理服务 API 密钥".to_string()))
    }
}

#[async_trait]
impl InferenceGateway for HttpVisionGateway {
    async fn analyze(&self, image: &ImagePayload, patient_id: &str) -> Result<AnalysisResult> {
        let api_key = self.api_key()?;
        let url = self.request_url();

        info!(
            "Sending {} ({} bytes) to vision model {}",
            image.descriptor().file_name,
            image.descriptor().size_bytes,
            self.config.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&build_request_body(image))
            .send()
            .await
            .map_err(|e| {
                error!("Vision model request failed: {}", e);
                BoneAgeError::Gateway(format!("请求推理服务失败: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = upstream_error_message(&body);
            error!("Vision model returned {}: {}", status, message);
            return Err(BoneAgeError::Gateway(format!(
                "推理服务返回 {}: {}",
                status.as_u16(),
                message
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| BoneAgeError::MalformedResponse(format!("响应不是有效的JSON: {}", e)))?;

        let text = extract_candidate_text(&body)?;
        debug!("Vision model output: {}", text);

        let raw = parse_model_text(text)?;
        let result = normalize_finding(raw, patient_id, &self.config.modality);

        info!(
            "Analysis {} finished: severity={} probability={:.2}",
            result.id,
            result.severity.as_str(),
            result.probability
        );
        Ok(result)
    }

    fn name(&self) -> &str {
        "http-vision"
    }
}

/// 离线网关，返回固定判读结果，用于演示与无凭据环境
pub struct OfflineGateway {
    finding: RawFinding,
    modality: String,
}

impl OfflineGateway {
    pub fn new(modality: impl Into<String>) -> Self {
        Self {
            finding: RawFinding {
                finding: "Growth plates open; skeletal maturity consistent with chronological age"
                    .to_string(),
                probability: 0.62,
                severity: "Low".to_string(),
                bounding_boxes: vec![
                    RawBox {
                        x: 0.32,
                        y: 0.68,
                        width: 0.22,
                        height: 0.14,
                        label: Some("distal radius physis".to_string()),
                    },
                    RawBox {
                        x: 0.38,
                        y: 0.18,
                        width: 0.18,
                        height: 0.12,
                        label: Some("3rd metacarpal".to_string()),
                    },
                ],
            },
            modality: modality.into(),
        }
    }

    pub fn with_finding(mut self, finding: RawFinding) -> Self {
        self.finding = finding;
        self
    }
}

#[async_trait]
impl InferenceGateway for OfflineGateway {
    async fn analyze(&self, image: &ImagePayload, patient_id: &str) -> Result<AnalysisResult> {
        info!("Offline analysis of {}", image.descriptor().file_name);
        Ok(normalize_finding(self.finding.clone(), patient_id, &self.modality))
    }

    fn name(&self) -> &str {
        "offline"
    }
}

/// 根据配置创建网关
pub fn create_gateway(config: GatewayConfig) -> Result<Box<dyn InferenceGateway>> {
    if config.offline {
        warn!("Inference gateway running in offline mode");
        return Ok(Box::new(OfflineGateway::new(config.modality)));
    }
    Ok(Box::new(HttpVisionGateway::new(config)?))
}
