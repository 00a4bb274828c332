//! 生长曲线图表几何
//!
//! 把生长曲线映射到固定像素视口（320×160，内边距 28），y 轴向下为正。

use boneage_core::{ChronAge, GrowthPoint};
use serde::{Deserialize, Serialize};

pub const CHART_WIDTH: f64 = 320.0;
pub const CHART_HEIGHT: f64 = 160.0;
pub const CHART_PADDING: f64 = 28.0;
/// 纵轴上限相对最大身高的留白 (cm)
pub const HEIGHT_HEADROOM_CM: f64 = 6.0;

/// 视口中的一个点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub age: f64,
    pub height: f64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartGeometry {
    pub width: f64,
    pub height: f64,
    pub padding: f64,
    pub min_height: f64,
    pub max_height: f64,
    pub points: Vec<ChartPoint>,
    /// 与当前年龄最接近的采样点下标
    pub current_index: Option<usize>,
}

impl ChartGeometry {
    pub fn current_point(&self) -> Option<&ChartPoint> {
        self.current_index.and_then(|i| self.points.get(i))
    }

    /// SVG polyline 的 `points` 属性
    pub fn polyline(&self) -> String {
        self.points
            .iter()
            .map(|p| format!("{:.1},{:.1}", p.x, p.y))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// 计算曲线在视口中的坐标与当前年龄标记
pub fn chart_geometry(curve: &[GrowthPoint], current_age: &ChronAge) -> ChartGeometry {
    let min_height = curve.iter().map(|p| p.height).fold(f64::INFINITY, f64::min);
    let max_height = curve.iter().map(|p| p.height).fold(f64::NEG_INFINITY, f64::max)
        + HEIGHT_HEADROOM_CM;

    let inner_width = CHART_WIDTH - CHART_PADDING * 2.0;
    let inner_height = CHART_HEIGHT - CHART_PADDING * 2.0;
    let x_step = if curve.len() > 1 {
        inner_width / (curve.len() - 1) as f64
    } else {
        0.0
    };
    let span = max_height - min_height;

    let points = curve
        .iter()
        .enumerate()
        .map(|(i, p)| ChartPoint {
            age: p.age,
            height: p.height,
            x: CHART_PADDING + x_step * i as f64,
            y: CHART_HEIGHT - CHART_PADDING - (p.height - min_height) / span * inner_height,
        })
        .collect();

    ChartGeometry {
        width: CHART_WIDTH,
        height: CHART_HEIGHT,
        padding: CHART_PADDING,
        min_height: if curve.is_empty() { 0.0 } else { min_height },
        max_height: if curve.is_empty() { 0.0 } else { max_height },
        points,
        current_index: closest_to_age(curve, current_age.as_fractional_years()),
    }
}

/// 距离目标年龄最近的点；距离相同时保留先出现的点
fn closest_to_age(curve: &[GrowthPoint], target: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, point) in curve.iter().enumerate() {
        let distance = (point.age - target).abs();
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((i, distance)),
        }
    }
    best.map(|(i, _)| i)
}
