//! 通用工具函数

use uuid::Uuid;

/// 生成分析结果标识符
pub fn generate_analysis_id() -> String {
    Uuid::new_v4().to_string()
}

/// 生成临时患者标识符（无持久化，仅用于单次会话）
pub fn generate_patient_id() -> String {
    format!("PAT-{}", &Uuid::new_v4().simple().to_string()[..8].to_uppercase())
}

/// 将数值限制在 [0,1]，NaN 视为 0
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_analysis_id() {
        let id = generate_analysis_id();
        assert!(Uuid::parse_str(&id).is_ok());
        assert_ne!(id, generate_analysis_id());
    }

    #[test]
    fn test_generate_patient_id() {
        let id = generate_patient_id();
        assert!(id.starts_with("PAT-"));
        assert_eq!(id.len(), 12);
    }

    #[test]
    fn test_clamp_unit() {
        assert_eq!(clamp_unit(1.7), 1.0);
        assert_eq!(clamp_unit(-0.2), 0.0);
        assert_eq!(clamp_unit(0.42), 0.42);
        assert_eq!(clamp_unit(f64::NAN), 0.0);
    }
}
