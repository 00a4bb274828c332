//! 生长预测
//!
//! 基于当前身高与模型返回的概率值推导成年身高、身高区间、辅助因子和合成生长曲线。
//! 这些都是展示用的线性启发式，不是医学模型，也不对应任何生长标准百分位。

use boneage_core::{utils::clamp_unit, AnalysisResult, ChronAge, GrowthPoint, PatientInfo};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::age::calculate_age;

/// 未填写身高时使用的基准身高 (cm)
pub const DEFAULT_HEIGHT_CM: f64 = 140.0;
/// 成年身高相对当前身高的固定增量 (cm)
pub const ADULT_HEIGHT_OFFSET_CM: f64 = 10.0;
/// 概率偏离中点时的斜率 (cm)
pub const PROBABILITY_SLOPE_CM: f64 = 12.0;
pub const PROBABILITY_MIDPOINT: f64 = 0.5;
/// 预测区间下限 (cm)
pub const RANGE_FLOOR_CM: f64 = 120.0;
pub const RANGE_BELOW_CM: f64 = 4.0;
pub const RANGE_ABOVE_CM: f64 = 3.0;
/// 生长曲线采样点数
pub const CURVE_POINTS: usize = 8;
/// 生长曲线最小起始年龄
pub const CURVE_MIN_START_AGE: u32 = 4;

/// 预测身高区间
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeightRange {
    pub min: f64,
    pub max: f64,
}

/// 营养、激素、运动三个展示因子（0–100）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthFactors {
    pub nutrition: f64,
    pub hormone: f64,
    pub activity: f64,
}

/// 单个因子的偏移量与下限
struct FactorRule {
    offset: f64,
    floor: f64,
}

const NUTRITION: FactorRule = FactorRule { offset: 5.0, floor: 40.0 };
const HORMONE: FactorRule = FactorRule { offset: -6.0, floor: 30.0 };
const ACTIVITY: FactorRule = FactorRule { offset: 2.0, floor: 20.0 };
const FACTOR_CEILING: f64 = 100.0;

impl FactorRule {
    fn apply(&self, base: f64) -> f64 {
        (base + self.offset).clamp(self.floor, FACTOR_CEILING)
    }
}

/// 计算基准身高
pub fn base_height(patient: &PatientInfo) -> f64 {
    patient.height().unwrap_or(DEFAULT_HEIGHT_CM)
}

/// 预测成年身高：`round(base + 10 + (p - 0.5) * 12)`
pub fn predicted_adult_height(patient: &PatientInfo, probability: f64) -> f64 {
    let delta = (clamp_unit(probability) - PROBABILITY_MIDPOINT) * PROBABILITY_SLOPE_CM;
    (base_height(patient) + ADULT_HEIGHT_OFFSET_CM + delta).round()
}

/// 预测区间，下限不低于 120cm
pub fn predicted_range(predicted: f64) -> HeightRange {
    HeightRange {
        min: (predicted - RANGE_BELOW_CM).max(RANGE_FLOOR_CM),
        max: predicted + RANGE_ABOVE_CM,
    }
}

pub fn growth_factors(probability: f64) -> GrowthFactors {
    let base = 60.0 + clamp_unit(probability) * 25.0;
    GrowthFactors {
        nutrition: NUTRITION.apply(base),
        hormone: HORMONE.apply(base),
        activity: ACTIVITY.apply(base),
    }
}

/// 合成生长曲线
///
/// 共 8 个点，起始年龄为 `max(4, years - 2)`，逐年递增；
/// 身高从当前身高线性插值到预测成年身高。
pub fn growth_curve(patient: &PatientInfo, age: &ChronAge, predicted: f64) -> Vec<GrowthPoint> {
    let start_age = age.years.saturating_sub(2).max(CURVE_MIN_START_AGE);
    let current = base_height(patient);
    let step = (predicted - current) / (CURVE_POINTS - 1) as f64;

    (0..CURVE_POINTS)
        .map(|i| GrowthPoint {
            age: (start_age as usize + i) as f64,
            height: current + step * i as f64,
        })
        .collect()
}

/// 骨龄综合评分，结果始终位于 [55, 100]
pub fn osteo_age_score(probability: f64) -> u32 {
    (45.0 + clamp_unit(probability) * 50.0).clamp(55.0, 100.0).round() as u32
}

/// 一次完整的生长预测
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthProjection {
    pub chronological_age: ChronAge,
    pub predicted_height: f64,
    pub predicted_range: HeightRange,
    pub factors: GrowthFactors,
    pub curve: Vec<GrowthPoint>,
    pub osteo_age_score: u32,
}

impl GrowthProjection {
    /// 以检查日期为参考计算实足年龄后生成预测
    pub fn from_inputs(patient: &PatientInfo, result: &AnalysisResult) -> Self {
        let age = calculate_age(patient.birth_date.as_deref(), patient.exam_date.as_deref());
        Self::with_age(patient, result.probability, age)
    }

    pub fn with_age(patient: &PatientInfo, probability: f64, age: ChronAge) -> Self {
        let predicted_height = predicted_adult_height(patient, probability);
        let projection = Self {
            chronological_age: age,
            predicted_height,
            predicted_range: predicted_range(predicted_height),
            factors: growth_factors(probability),
            curve: growth_curve(patient, &age, predicted_height),
            osteo_age_score: osteo_age_score(probability),
        };

        debug!(
            "Growth projection: age={}y{}m predicted={} score={}",
            age.years, age.months, projection.predicted_height, projection.osteo_age_score
        );
        projection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient_with_height(height: Option<f64>) -> PatientInfo {
        PatientInfo {
            height_cm: height,
            ..Default::default()
        }
    }

    #[test]
    fn test_predicted_adult_height() {
        let patient = patient_with_height(Some(150.0));
        assert_eq!(predicted_adult_height(&patient, 0.5), 160.0);
        assert_eq!(predicted_adult_height(&patient, 1.0), 166.0);
        assert_eq!(predicted_adult_height(&patient, 0.0), 154.0);
        assert_eq!(predicted_adult_height(&patient, 0.8), 164.0); // 163.6
    }

    #[test]
    fn test_default_base_height() {
        assert_eq!(predicted_adult_height(&patient_with_height(None), 0.5), 150.0);
        assert_eq!(predicted_adult_height(&patient_with_height(Some(-3.0)), 0.5), 150.0);
    }

    #[test]
    fn test_predicted_height_monotonic_in_probability() {
        let patient = patient_with_height(Some(137.3));
        let mut previous = f64::MIN;
        for i in 0..=100 {
            let predicted = predicted_adult_height(&patient, i as f64 / 100.0);
            assert!(predicted >= previous);
            previous = predicted;
        }
    }

    #[test]
    fn test_predicted_range() {
        assert_eq!(predicted_range(160.0), HeightRange { min: 156.0, max: 163.0 });
        assert_eq!(predicted_range(122.0), HeightRange { min: 120.0, max: 125.0 });
    }

    #[test]
    fn test_growth_factors() {
        let f = growth_factors(0.5);
        assert_eq!(f.nutrition, 77.5);
        assert_eq!(f.hormone, 66.5);
        assert_eq!(f.activity, 74.5);

        let high = growth_factors(1.0);
        assert_eq!(high.nutrition, 90.0);
        assert_eq!(high.hormone, 79.0);
        assert_eq!(high.activity, 87.0);
    }

    #[test]
    fn test_growth_factors_within_bounds() {
        for p in [-1.0, 0.0, 0.5, 1.0, 2.0] {
            let f = growth_factors(p);
            assert!((40.0..=100.0).contains(&f.nutrition));
            assert!((30.0..=100.0).contains(&f.hormone));
            assert!((20.0..=100.0).contains(&f.activity));
        }
    }

    #[test]
    fn test_growth_curve_shape() {
        let patient = patient_with_height(Some(150.0));
        let curve = growth_curve(&patient, &ChronAge::new(13, 11), 164.0);

        assert_eq!(curve.len(), CURVE_POINTS);
        assert_eq!(curve[0], GrowthPoint { age: 11.0, height: 150.0 });
        assert_eq!(curve[7], GrowthPoint { age: 18.0, height: 164.0 });
        assert_eq!(curve[1].height, 152.0);
        for pair in curve.windows(2) {
            assert_eq!(pair[1].age - pair[0].age, 1.0);
        }
    }

    #[test]
    fn test_growth_curve_min_start_age() {
        let patient = patient_with_height(None);
        let young = growth_curve(&patient, &ChronAge::new(1, 3), 150.0);
        assert_eq!(young[0].age, 4.0);
        assert_eq!(young[0].height, DEFAULT_HEIGHT_CM);

        let six = growth_curve(&patient, &ChronAge::new(6, 0), 150.0);
        assert_eq!(six[0].age, 4.0);
    }

    #[test]
    fn test_osteo_age_score_bounds() {
        assert_eq!(osteo_age_score(0.0), 55);
        assert_eq!(osteo_age_score(1.0), 95);
        assert_eq!(osteo_age_score(0.5), 70);
        assert_eq!(osteo_age_score(5.0), 95);
        for i in 0..=100 {
            let score = osteo_age_score(i as f64 / 100.0);
            assert!((55..=100).contains(&score));
        }
    }

    #[test]
    fn test_projection_with_age() {
        let patient = patient_with_height(Some(150.0));
        let projection = GrowthProjection::with_age(&patient, 0.8, ChronAge::new(13, 11));

        assert_eq!(projection.predicted_height, 164.0);
        assert_eq!(projection.predicted_range, HeightRange { min: 160.0, max: 167.0 });
        assert_eq!(projection.osteo_age_score, 85);
        assert_eq!(projection.curve.len(), 8);
        assert_eq!(projection.curve[7].height, 164.0);
    }

    #[test]
    fn test_projection_from_inputs() {
        let patient = PatientInfo {
            birth_date: Some("2010-06-15".to_string()),
            exam_date: Some("2024-06-20".to_string()),
            height_cm: Some(150.0),
            ..Default::default()
        };
        let result = AnalysisResult {
            id: "r".to_string(),
            finding: String::new(),
            probability: 0.5,
            severity: Default::default(),
            bounding_boxes: Vec::new(),
            analysis_date: chrono::Utc::now(),
            modality: "X-ray".to_string(),
            patient_id: "p".to_string(),
        };

        let projection = GrowthProjection::from_inputs(&patient, &result);
        assert_eq!(projection.chronological_age, ChronAge::new(14, 0));
        assert_eq!(projection.curve[0].age, 12.0);
        assert_eq!(projection.predicted_height, 160.0);
    }
}
