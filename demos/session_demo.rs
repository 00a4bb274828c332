//! 分析会话演示程序
//!
//! 使用离线网关走完一次完整会话：填写表单、上传影像、推理、调整骨龄、重置

use anyhow::Result;
use boneage_clinical::{format_age_kr, AnalysisSession};
use boneage_core::{ChronAge, PatientInfo, Sex};
use boneage_integration::{create_gateway, GatewayConfig, ImagePayload, UploadPolicy};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("🚀 启动分析会话演示");

    let policy = UploadPolicy::default();
    let gateway = create_gateway(GatewayConfig {
        offline: true,
        ..Default::default()
    })?;
    let mut session = AnalysisSession::new();

    // 1. 不支持的文件在本地即被拒绝
    match ImagePayload::from_upload(&policy, "hand.tiff", vec![0u8; 16]) {
        Ok(_) => warn!("❌ 本应拒绝 tiff 文件"),
        Err(e) => info!("✅ 上传被拒绝: {}", e),
    }

    // 2. 填写表单并上传影像
    session.update_patient(PatientInfo {
        name: Some("최도윤".to_string()),
        sex: Sex::Male,
        birth_date: Some("2013-02-11".to_string()),
        height_cm: Some(141.0),
        weight_kg: Some(35.0),
        exam_date: Some("2024-06-10".to_string()),
    })?;
    let image = ImagePayload::from_upload(&policy, "left-hand.png", vec![0x89, b'P', b'N', b'G'])?;
    session.attach_image(image.descriptor().clone())?;

    // 3. 推理
    session.begin_analysis()?;
    let patient_id = "PAT-DEMO";
    match gateway.analyze(&image, patient_id).await {
        Ok(result) => {
            let result = session.complete_analysis(result)?;
            info!("✅ 判读结果: {} ({:.0}%)", result.finding, result.probability * 100.0);
        }
        Err(e) => session.fail_analysis(e.to_string())?,
    }

    // 4. 医生手动调整骨龄
    println!("👶 实足年龄: {}", format_age_kr(&session.chronological_age()));
    session.set_adjusted_bone_age(ChronAge::new(12, 6))?;
    println!("🦴 调整后骨龄: {}", format_age_kr(&session.bone_age()));

    if let Some(report) = session.report() {
        println!("\n{}", report.render_text());
    }

    // 5. 重置会话
    session.reset()?;
    info!("✅ 会话已重置: {:?}", session.phase());

    Ok(())
}
