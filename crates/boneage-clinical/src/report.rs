//! 结果报告汇总
//!
//! 汇总结果页面与打印报告所需的全部派生值。

use boneage_core::{
    AnalysisResult, BoundingBox, ChronAge, GrowthPoint, PatientInfo, Severity, Sex,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::age::{calculate_age, format_age_kr, format_date_kr};
use crate::chart::{chart_geometry, ChartGeometry};
use crate::growth::{GrowthFactors, GrowthProjection, HeightRange};

/// 结果页面视图模型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthReport {
    pub analysis_id: String,
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub sex: Sex,
    pub birth_date_text: String,
    pub exam_date_text: String,
    pub chronological_age: ChronAge,
    pub chronological_age_text: String,
    pub bone_age: ChronAge,
    pub bone_age_text: String,
    /// 骨龄是否由医生手动调整
    pub bone_age_adjusted: bool,
    pub finding: String,
    pub probability: f64,
    pub severity: Severity,
    pub bounding_boxes: Vec<BoundingBox>,
    pub modality: String,
    pub analysis_date: DateTime<Utc>,
    pub predicted_height: f64,
    pub predicted_range: HeightRange,
    pub factors: GrowthFactors,
    pub curve: Vec<GrowthPoint>,
    pub chart: ChartGeometry,
    pub osteo_age_score: u32,
}

impl GrowthReport {
    /// 由患者信息、推理结果与可选的骨龄调整值生成报告
    pub fn build(
        patient: &PatientInfo,
        result: &AnalysisResult,
        bone_age_override: Option<ChronAge>,
    ) -> Self {
        let age = calculate_age(patient.birth_date.as_deref(), patient.exam_date.as_deref());
        let projection = GrowthProjection::with_age(patient, result.probability, age);
        Self::assemble(patient, result, projection, bone_age_override)
    }

    /// 使用已计算好的生长预测生成报告
    pub fn assemble(
        patient: &PatientInfo,
        result: &AnalysisResult,
        projection: GrowthProjection,
        bone_age_override: Option<ChronAge>,
    ) -> Self {
        let age = projection.chronological_age;
        let bone_age = bone_age_override.unwrap_or(age);
        let chart = chart_geometry(&projection.curve, &age);

        Self {
            analysis_id: result.id.clone(),
            patient_id: result.patient_id.clone(),
            patient_name: patient.name.clone(),
            sex: patient.sex,
            birth_date_text: format_date_kr(patient.birth_date.as_deref()),
            exam_date_text: format_date_kr(patient.exam_date.as_deref()),
            chronological_age: age,
            chronological_age_text: format_age_kr(&age),
            bone_age,
            bone_age_text: format_age_kr(&bone_age),
            bone_age_adjusted: bone_age_override.is_some(),
            finding: result.finding.clone(),
            probability: result.probability,
            severity: result.severity,
            bounding_boxes: result.bounding_boxes.clone(),
            modality: result.modality.clone(),
            analysis_date: result.analysis_date,
            predicted_height: projection.predicted_height,
            predicted_range: projection.predicted_range,
            factors: projection.factors,
            curve: projection.curve,
            chart,
            osteo_age_score: projection.osteo_age_score,
        }
    }

    /// 纯文本打印报告
    pub fn render_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GrowthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sex = match self.sex {
            Sex::Male => "남",
            Sex::Female => "여",
        };

        writeln!(f, "=== 골연령 분석 보고서 ===")?;
        writeln!(f, "분석 ID: {}", self.analysis_id)?;
        writeln!(f, "환자 ID: {}", self.patient_id)?;
        writeln!(f, "이름: {}", self.patient_name.as_deref().unwrap_or("-"))?;
        writeln!(f, "성별: {}", sex)?;
        writeln!(f, "생년월일: {}", self.birth_date_text)?;
        writeln!(f, "검사일: {}", self.exam_date_text)?;
        writeln!(f, "역연령: {}", self.chronological_age_text)?;
        writeln!(
            f,
            "골연령: {}{}",
            self.bone_age_text,
            if self.bone_age_adjusted { " (수동 조정)" } else { "" }
        )?;
        writeln!(f)?;
        writeln!(f, "=== 판독 결과 ===")?;
        writeln!(f, "소견: {}", self.finding)?;
        writeln!(f, "확률: {:.1}%", self.probability * 100.0)?;
        writeln!(f, "위험도: {}", self.severity.as_str())?;
        writeln!(f, "검출 영역: {}개", self.bounding_boxes.len())?;
        writeln!(f, "골연령 점수: {}", self.osteo_age_score)?;
        writeln!(f)?;
        writeln!(f, "=== 성장 예측 ===")?;
        writeln!(f, "예상 성인 키: {:.0} cm", self.predicted_height)?;
        writeln!(
            f,
            "예상 범위: {:.0} – {:.0} cm",
            self.predicted_range.min, self.predicted_range.max
        )?;
        writeln!(
            f,
            "영양 {:.0} / 호르몬 {:.0} / 활동 {:.0}",
            self.factors.nutrition, self.factors.hormone, self.factors.activity
        )?;
        for point in &self.curve {
            writeln!(f, "  {:>4.0}세  {:>6.1} cm", point.age, point.height)?;
        }
        writeln!(f)?;
        writeln!(f, "※ 본 결과는 참고용이며 의학적 진단을 대체하지 않습니다.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn patient() -> PatientInfo {
        PatientInfo {
            name: Some("김민준".to_string()),
            sex: Sex::Male,
            birth_date: Some("2010-06-15".to_string()),
            height_cm: Some(150.0),
            weight_kg: Some(42.0),
            exam_date: Some("2024-06-10".to_string()),
        }
    }

    fn result() -> AnalysisResult {
        AnalysisResult {
            id: "a-1".to_string(),
            finding: "Normal growth plate".to_string(),
            probability: 0.8,
            severity: Severity::Medium,
            bounding_boxes: vec![BoundingBox {
                x: 0.1,
                y: 0.2,
                width: 0.3,
                height: 0.4,
                label: "distal radius".to_string(),
            }],
            analysis_date: Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap(),
            modality: "X-ray".to_string(),
            patient_id: "PAT-1".to_string(),
        }
    }

    #[test]
    fn test_build_report() {
        let report = GrowthReport::build(&patient(), &result(), None);

        assert_eq!(report.chronological_age, ChronAge::new(13, 11));
        assert_eq!(report.chronological_age_text, "13세 11개월");
        assert_eq!(report.bone_age, report.chronological_age);
        assert!(!report.bone_age_adjusted);
        assert_eq!(report.exam_date_text, "2024년 6월 10일");
        assert_eq!(report.predicted_height, 164.0);
        assert_eq!(report.osteo_age_score, 85);
        assert_eq!(report.curve.len(), 8);
        assert_eq!(report.chart.current_index, Some(3));
    }

    #[test]
    fn test_bone_age_override() {
        let report = GrowthReport::build(&patient(), &result(), Some(ChronAge::new(15, 2)));

        assert_eq!(report.bone_age, ChronAge::new(15, 2));
        assert_eq!(report.bone_age_text, "15세 2개월");
        assert!(report.bone_age_adjusted);
        // 曲线仍以实足年龄为准
        assert_eq!(report.chart.current_index, Some(3));
    }

    #[test]
    fn test_render_text() {
        let text = GrowthReport::build(&patient(), &result(), None).render_text();

        assert!(text.contains("역연령: 13세 11개월"));
        assert!(text.contains("확률: 80.0%"));
        assert!(text.contains("위험도: Medium"));
        assert!(text.contains("예상 성인 키: 164 cm"));
        assert!(text.contains("예상 범위: 160 – 167 cm"));
    }

    #[test]
    fn test_display_matches_text() {
        let report = GrowthReport::build(&patient(), &result(), None);
        let text = report.render_text();

        assert_eq!(format!("{}", report), text);
        assert!(text.starts_with("=== 골연령 분석 보고서 ===\n"));
        assert!(text.ends_with("대체하지 않습니다.\n"));
        assert_eq!(text.lines().filter(|l| l.ends_with(" cm")).count(), 2 + 8);
    }
}
