//! 就诊状态机
//!
//! 管理就诊从预约到完成的前进式状态转换。只允许逐级前进，没有回退和跳级；
//! 取消只能由外部服务完成。

use clinic_core::{ClinicError, EncounterStage, EncounterStatus, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 就诊状态转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EncounterEvent {
    CheckIn,
    StartConsultation,
    Complete,
}

impl EncounterEvent {
    /// 操作按钮文案
    pub fn action_label(&self) -> &'static str {
        match self {
            EncounterEvent::CheckIn => "Check In",
            EncounterEvent::StartConsultation => "Start Consult",
            EncounterEvent::Complete => "Complete",
        }
    }
}

/// 就诊状态机
#[derive(Debug)]
pub struct EncounterStateMachine {
    transitions: HashMap<(EncounterStage, EncounterEvent), EncounterStage>,
}

impl EncounterStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        transitions.insert(
            (EncounterStage::Scheduled, EncounterEvent::CheckIn),
            EncounterStage::CheckedIn,
        );
        transitions.insert(
            (EncounterStage::CheckedIn, EncounterEvent::StartConsultation),
            EncounterStage::InConsultation,
        );
        transitions.insert(
            (EncounterStage::InConsultation, EncounterEvent::Complete),
            EncounterStage::Completed,
        );

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: EncounterStage, event: EncounterEvent) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    /// 执行状态转换
    pub fn transition(&self, from: EncounterStage, event: EncounterEvent) -> Result<EncounterStage> {
        self.transitions
            .get(&(from, event))
            .copied()
            .ok_or_else(|| ClinicError::InvalidStateTransition {
                status: format!("{:?} + {:?}", from, event),
            })
    }

    /// 当前状态唯一可用的下一步；终态与无法识别的状态没有下一步
    pub fn next_step(&self, status: &EncounterStatus) -> Option<(EncounterEvent, EncounterStage)> {
        let stage = status.stage()?;
        self.transitions
            .iter()
            .find(|((from, _), _)| *from == stage)
            .map(|((_, event), to)| (*event, *to))
    }

    /// 前进一步后应请求的状态值
    pub fn advance_target(&self, status: &EncounterStatus) -> Result<EncounterStatus> {
        self.next_step(status)
            .map(|(_, to)| to.wire_status())
            .ok_or_else(|| ClinicError::InvalidStateTransition {
                status: status.as_str().to_string(),
            })
    }
}

impl Default for EncounterStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let sm = EncounterStateMachine::new();

        assert!(sm.can_transition(EncounterStage::Scheduled, EncounterEvent::CheckIn));
        assert!(sm.can_transition(EncounterStage::CheckedIn, EncounterEvent::StartConsultation));
        assert!(sm.can_transition(EncounterStage::InConsultation, EncounterEvent::Complete));
    }

    #[test]
    fn test_no_skip_or_backward_transitions() {
        let sm = EncounterStateMachine::new();

        assert!(!sm.can_transition(EncounterStage::Scheduled, EncounterEvent::Complete));
        assert!(!sm.can_transition(EncounterStage::InConsultation, EncounterEvent::CheckIn));
        for event in [
            EncounterEvent::CheckIn,
            EncounterEvent::StartConsultation,
            EncounterEvent::Complete,
        ] {
            assert!(!sm.can_transition(EncounterStage::Completed, event));
            assert!(!sm.can_transition(EncounterStage::Cancelled, event));
        }
    }

    #[test]
    fn test_advance_target_for_every_status() {
        let sm = EncounterStateMachine::new();

        assert_eq!(
            sm.advance_target(&EncounterStatus::Initiated).unwrap(),
            EncounterStatus::CheckedIn
        );
        assert_eq!(
            sm.advance_target(&EncounterStatus::Booked).unwrap(),
            EncounterStatus::CheckedIn
        );
        assert_eq!(
            sm.advance_target(&EncounterStatus::CheckedIn).unwrap(),
            EncounterStatus::InConsultation
        );
        assert_eq!(
            sm.advance_target(&EncounterStatus::InConsultation).unwrap(),
            EncounterStatus::Completed
        );

        for terminal in [
            EncounterStatus::Completed,
            EncounterStatus::Cancelled,
            EncounterStatus::Unknown("NoShow".to_string()),
        ] {
            assert!(matches!(
                sm.advance_target(&terminal),
                Err(ClinicError::InvalidStateTransition { .. })
            ));
        }
    }

    #[test]
    fn test_next_step_labels() {
        let sm = EncounterStateMachine::new();
        let (event, _) = sm.next_step(&EncounterStatus::CheckedIn).unwrap();
        assert_eq!(event.action_label(), "Start Consult");
    }
}
