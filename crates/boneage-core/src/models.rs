//! 核心数据模型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 患者基本信息（问诊表单）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatientInfo {
    pub name: Option<String>,
    pub sex: Sex,
    pub birth_date: Option<String>, // ISO-8601 日期
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub exam_date: Option<String>, // ISO-8601 日期
}

impl PatientInfo {
    /// 有效身高；未填写或非正数视为未设置
    pub fn height(&self) -> Option<f64> {
        self.height_cm.filter(|h| h.is_finite() && *h > 0.0)
    }

    /// 表单是否完整（允许上传影像的前提）
    pub fn is_complete(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        filled(&self.birth_date) && filled(&self.exam_date) && self.height().is_some()
    }
}

/// 性别枚举
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    #[default]
    Male,
    Female,
}

/// 实足年龄（年 + 月）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChronAge {
    pub years: u32,
    pub months: u32, // 0..=11
}

impl ChronAge {
    pub fn new(years: u32, months: u32) -> Self {
        Self { years, months }
    }

    /// 以年为单位的小数年龄
    pub fn as_fractional_years(&self) -> f64 {
        self.years as f64 + self.months as f64 / 12.0
    }
}

/// 风险等级
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
}

impl Severity {
    /// 宽松解析上游返回值，无法识别时回退为 Low
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "medium" => Self::Medium,
            "high" => Self::High,
            _ => Self::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

/// 归一化边界框，坐标与尺寸均在 [0,1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub label: String,
}

/// 单次推理结果，创建后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub id: String,
    pub finding: String,
    pub probability: f64,
    pub severity: Severity,
    pub bounding_boxes: Vec<BoundingBox>,
    pub analysis_date: DateTime<Utc>,
    pub modality: String,
    pub patient_id: String,
}

/// 已通过校验的上传影像元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDescriptor {
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

/// 生长曲线上的一个采样点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthPoint {
    pub age: f64,
    pub height: f64,
}
