//! 生长预测演示程序
//!
//! 展示实足年龄计算、生长预测、图表几何与打印报告

use anyhow::Result;
use boneage_clinical::{
    calculate_age, chart_geometry, format_age_kr, format_date_kr, GrowthProjection, GrowthReport,
};
use boneage_core::{utils::generate_patient_id, AnalysisResult, PatientInfo, Severity, Sex};
use tracing::info;

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("🚀 启动生长预测演示");

    let patient = PatientInfo {
        name: Some("김하늘".to_string()),
        sex: Sex::Female,
        birth_date: Some("2011-09-20".to_string()),
        height_cm: Some(148.5),
        weight_kg: Some(39.2),
        exam_date: Some("2024-06-10".to_string()),
    };

    // 1. 实足年龄
    let age = calculate_age(patient.birth_date.as_deref(), patient.exam_date.as_deref());
    println!("📅 检查日期: {}", format_date_kr(patient.exam_date.as_deref()));
    println!("👶 实足年龄: {}", format_age_kr(&age));

    // 2. 不同概率下的预测成年身高
    println!("\n📈 预测成年身高:");
    for probability in [0.0, 0.25, 0.5, 0.75, 1.0] {
        let projection = GrowthProjection::with_age(&patient, probability, age);
        println!(
            "   p={:.2} → {:.0} cm ({:.0}–{:.0}), 评分 {}",
            probability,
            projection.predicted_height,
            projection.predicted_range.min,
            projection.predicted_range.max,
            projection.osteo_age_score
        );
    }

    // 3. 图表几何
    let projection = GrowthProjection::with_age(&patient, 0.7, age);
    let chart = chart_geometry(&projection.curve, &age);
    println!("\n🖼️  SVG polyline: {}", chart.polyline());
    if let Some(point) = chart.current_point() {
        println!("   当前标记: {}岁 ({:.1}, {:.1})", point.age, point.x, point.y);
    }

    // 4. 打印报告
    let result = AnalysisResult {
        id: "demo-analysis".to_string(),
        finding: "Growth plates open".to_string(),
        probability: 0.7,
        severity: Severity::Low,
        bounding_boxes: Vec::new(),
        analysis_date: chrono::Utc::now(),
        modality: "X-ray".to_string(),
        patient_id: generate_patient_id(),
    };
    let report = GrowthReport::build(&patient, &result, None);
    println!("\n{}", report.render_text());

    info!("✅ 生长预测演示完成");
    Ok(())
}
