//! 分析会话状态
//!
//! 一次浏览器会话内的患者信息、上传影像、推理结果与骨龄调整值，
//! 由上层控制器独占持有。阶段转换由状态表驱动。

use boneage_core::{
    AnalysisResult, BoneAgeError, ChronAge, ImageDescriptor, PatientInfo, Result,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::age::calculate_age;
use crate::report::GrowthReport;

/// 可选择的最大骨龄（岁）
pub const MAX_BONE_AGE_YEARS: u32 = 18;

/// 会话阶段
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionPhase {
    #[default]
    Idle,      // 等待输入
    Analyzing, // 推理中
    Completed, // 已出结果
}

/// 会话事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionEvent {
    Submit,
    Succeed,
    Fail,
    Reset,
}

/// 会话状态机
#[derive(Debug)]
pub struct SessionStateMachine {
    transitions: HashMap<(SessionPhase, SessionEvent), SessionPhase>,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        transitions.insert((SessionPhase::Idle, SessionEvent::Submit), SessionPhase::Analyzing);
        transitions.insert((SessionPhase::Completed, SessionEvent::Submit), SessionPhase::Analyzing);
        transitions.insert((SessionPhase::Analyzing, SessionEvent::Succeed), SessionPhase::Completed);
        transitions.insert((SessionPhase::Analyzing, SessionEvent::Fail), SessionPhase::Idle);
        transitions.insert((SessionPhase::Idle, SessionEvent::Reset), SessionPhase::Idle);
        transitions.insert((SessionPhase::Completed, SessionEvent::Reset), SessionPhase::Idle);

        Self { transitions }
    }

    pub fn can_transition(&self, from: SessionPhase, event: SessionEvent) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    pub fn transition(&self, from: SessionPhase, event: SessionEvent) -> Result<SessionPhase> {
        self.transitions
            .get(&(from, event))
            .copied()
            .ok_or_else(|| BoneAgeError::InvalidStateTransition {
                from: format!("{:?}", from),
                event: format!("{:?}", event),
            })
    }
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// 分析会话
#[derive(Debug, Default)]
pub struct AnalysisSession {
    phase: SessionPhase,
    patient: PatientInfo,
    image: Option<ImageDescriptor>,
    result: Option<AnalysisResult>,
    /// 医生手动选择的骨龄，不写回推理结果
    adjusted_bone_age: Option<ChronAge>,
    last_error: Option<String>,
    machine: SessionStateMachine,
}

impl AnalysisSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn patient(&self) -> &PatientInfo {
        &self.patient
    }

    pub fn image(&self) -> Option<&ImageDescriptor> {
        self.image.as_ref()
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    pub fn adjusted_bone_age(&self) -> Option<ChronAge> {
        self.adjusted_bone_age
    }

    /// 最近一次失败的提示信息
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// 更新患者信息，推理进行中不可修改
    pub fn update_patient(&mut self, patient: PatientInfo) -> Result<()> {
        self.ensure_not_analyzing("update_patient")?;
        self.patient = patient;
        Ok(())
    }

    /// 附加已校验的影像
    pub fn attach_image(&mut self, image: ImageDescriptor) -> Result<()> {
        self.ensure_not_analyzing("attach_image")?;
        info!("Image attached: {} ({} bytes)", image.file_name, image.size_bytes);
        self.image = Some(image);
        self.last_error = None;
        Ok(())
    }

    /// 开始推理；要求表单完整且已附加影像
    pub fn begin_analysis(&mut self) -> Result<&ImageDescriptor> {
        if !self.machine.can_transition(self.phase(), SessionEvent::Submit) {
            return Err(self.invalid(SessionEvent::Submit));
        }
        if !self.patient.is_complete() {
            return Err(BoneAgeError::Validation(
                "患者信息不完整: 需要出生日期、检查日期和身高".to_string(),
            ));
        }
        if self.image.is_none() {
            return Err(BoneAgeError::Validation("尚未上传影像".to_string()));
        }

        self.apply(SessionEvent::Submit)?;
        self.last_error = None;
        self.image
            .as_ref()
            .ok_or_else(|| BoneAgeError::Internal("影像丢失".to_string()))
    }

    /// 记录推理成功的结果，并清除之前的骨龄调整值
    pub fn complete_analysis(&mut self, result: AnalysisResult) -> Result<&AnalysisResult> {
        self.apply(SessionEvent::Succeed)?;
        info!("Analysis {} completed: {}", result.id, result.finding);
        self.adjusted_bone_age = None;
        Ok(&*self.result.insert(result))
    }

    /// 推理失败后回到空闲状态，保留错误信息供界面展示
    pub fn fail_analysis(&mut self, message: impl Into<String>) -> Result<()> {
        self.apply(SessionEvent::Fail)?;
        let message = message.into();
        warn!("Analysis failed: {}", message);
        self.last_error = Some(message);
        Ok(())
    }

    /// 清空会话中的全部数据
    pub fn reset(&mut self) -> Result<()> {
        self.apply(SessionEvent::Reset)?;
        self.patient = PatientInfo::default();
        self.image = None;
        self.result = None;
        self.adjusted_bone_age = None;
        self.last_error = None;
        Ok(())
    }

    /// 手动调整骨龄，仅在已有结果时可用
    pub fn set_adjusted_bone_age(&mut self, age: ChronAge) -> Result<()> {
        if self.result.is_none() {
            return Err(BoneAgeError::Validation("尚无分析结果，无法调整骨龄".to_string()));
        }
        if age.years > MAX_BONE_AGE_YEARS || age.months > 11 {
            return Err(BoneAgeError::Validation(format!(
                "骨龄超出范围: {}岁{}个月",
                age.years, age.months
            )));
        }
        self.adjusted_bone_age = Some(age);
        Ok(())
    }

    pub fn clear_adjusted_bone_age(&mut self) {
        self.adjusted_bone_age = None;
    }

    /// 以检查日期为参考的实足年龄
    pub fn chronological_age(&self) -> ChronAge {
        calculate_age(
            self.patient.birth_date.as_deref(),
            self.patient.exam_date.as_deref(),
        )
    }

    /// 当前显示的骨龄：调整值优先，否则为实足年龄
    pub fn bone_age(&self) -> ChronAge {
        self.adjusted_bone_age
            .unwrap_or_else(|| self.chronological_age())
    }

    /// 按当前输入重新生成结果报告
    pub fn report(&self) -> Option<GrowthReport> {
        self.result
            .as_ref()
            .map(|result| GrowthReport::build(&self.patient, result, self.adjusted_bone_age))
    }

    fn apply(&mut self, event: SessionEvent) -> Result<()> {
        let from = self.phase();
        let to = self.machine.transition(from, event)?;
        info!("Session phase: {:?} --{:?}--> {:?}", from, event, to);
        self.phase = to;
        Ok(())
    }

    fn ensure_not_analyzing(&self, action: &str) -> Result<()> {
        if self.phase() == SessionPhase::Analyzing {
            return Err(BoneAgeError::InvalidStateTransition {
                from: format!("{:?}", SessionPhase::Analyzing),
                event: action.to_string(),
            });
        }
        Ok(())
    }

    fn invalid(&self, event: SessionEvent) -> BoneAgeError {
        BoneAgeError::InvalidStateTransition {
            from: format!("{:?}", self.phase()),
            event: format!("{:?}", event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boneage_core::{Severity, Sex};
    use chrono::Utc;

    fn complete_patient() -> PatientInfo {
        PatientInfo {
            name: Some("이서연".to_string()),
            sex: Sex::Female,
            birth_date: Some("2012-03-01".to_string()),
            height_cm: Some(145.0),
            weight_kg: Some(38.0),
            exam_date: Some("2024-09-15".to_string()),
        }
    }

    fn image() -> ImageDescriptor {
        ImageDescriptor {
            file_name: "hand.png".to_string(),
            mime_type: "image/png".to_string(),
            size_bytes: 2048,
        }
    }

    fn result(id: &str) -> AnalysisResult {
        AnalysisResult {
            id: id.to_string(),
            finding: "Open growth plates".to_string(),
            probability: 0.6,
            severity: Severity::Low,
            bounding_boxes: Vec::new(),
            analysis_date: Utc::now(),
            modality: "X-ray".to_string(),
            patient_id: "PAT-2".to_string(),
        }
    }

    #[test]
    fn test_state_machine_transitions() {
        let sm = SessionStateMachine::new();

        assert!(sm.can_transition(SessionPhase::Idle, SessionEvent::Submit));
        assert!(sm.can_transition(SessionPhase::Analyzing, SessionEvent::Fail));
        assert!(!sm.can_transition(SessionPhase::Analyzing, SessionEvent::Submit));
        assert!(!sm.can_transition(SessionPhase::Analyzing, SessionEvent::Reset));
        assert!(sm.transition(SessionPhase::Idle, SessionEvent::Succeed).is_err());
    }

    #[test]
    fn test_full_lifecycle() {
        let mut session = AnalysisSession::new();
        session.update_patient(complete_patient()).unwrap();
        session.attach_image(image()).unwrap();

        session.begin_analysis().unwrap();
        assert_eq!(session.phase(), SessionPhase::Analyzing);

        session.complete_analysis(result("r-1")).unwrap();
        assert_eq!(session.phase(), SessionPhase::Completed);
        assert_eq!(session.chronological_age(), ChronAge::new(12, 6));
        assert_eq!(session.bone_age(), ChronAge::new(12, 6));

        let report = session.report().unwrap();
        assert_eq!(report.analysis_id, "r-1");
        assert_eq!(report.curve.len(), 8);

        session.reset().unwrap();
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(session.result().is_none());
        assert!(session.image().is_none());
        assert_eq!(session.patient(), &PatientInfo::default());
    }

    #[test]
    fn test_begin_requires_complete_form_and_image() {
        let mut session = AnalysisSession::new();
        session.attach_image(image()).unwrap();
        assert!(matches!(session.begin_analysis(), Err(BoneAgeError::Validation(_))));

        let mut session = AnalysisSession::new();
        session.update_patient(complete_patient()).unwrap();
        assert!(matches!(session.begin_analysis(), Err(BoneAgeError::Validation(_))));
        assert_eq!(session.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_single_request_in_flight() {
        let mut session = AnalysisSession::new();
        session.update_patient(complete_patient()).unwrap();
        session.attach_image(image()).unwrap();
        session.begin_analysis().unwrap();

        assert!(matches!(
            session.begin_analysis(),
            Err(BoneAgeError::InvalidStateTransition { .. })
        ));
        assert!(session.update_patient(PatientInfo::default()).is_err());
        assert!(session.reset().is_err());
    }

    #[test]
    fn test_failure_returns_to_idle() {
        let mut session = AnalysisSession::new();
        session.update_patient(complete_patient()).unwrap();
        session.attach_image(image()).unwrap();
        session.begin_analysis().unwrap();

        session.fail_analysis("upstream 500").unwrap();
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert_eq!(session.last_error(), Some("upstream 500"));

        // 可直接重试
        session.begin_analysis().unwrap();
        assert!(session.last_error().is_none());
    }

    #[test]
    fn test_bone_age_override() {
        let mut session = AnalysisSession::new();
        assert!(session.set_adjusted_bone_age(ChronAge::new(10, 0)).is_err());

        session.update_patient(complete_patient()).unwrap();
        session.attach_image(image()).unwrap();
        session.begin_analysis().unwrap();
        session.complete_analysis(result("r-1")).unwrap();

        assert!(session.set_adjusted_bone_age(ChronAge::new(19, 0)).is_err());
        assert!(session.set_adjusted_bone_age(ChronAge::new(10, 12)).is_err());

        session.set_adjusted_bone_age(ChronAge::new(14, 3)).unwrap();
        assert_eq!(session.bone_age(), ChronAge::new(14, 3));
        assert_eq!(session.result().map(|r| r.probability), Some(0.6));
        assert!(session.report().unwrap().bone_age_adjusted);

        // 新结果会清除调整值
        session.begin_analysis().unwrap();
        session.complete_analysis(result("r-2")).unwrap();
        assert_eq!(session.adjusted_bone_age(), None);
    }
}
