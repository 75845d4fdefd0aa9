//! 随访时间线状态机
//!
//! 管理患者检查序列的访视状态转换：基线 → 随访k → … → 完成

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use synthrad_core::{Result, SynthError};

/// 访视状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum VisitState {
    Baseline,      // 第1次检查
    FollowUp(u32), // 第k次检查（k > 1）
    Complete,      // 已达到检查次数
}

impl VisitState {
    /// 当前访视序号，完成状态没有序号
    pub fn visit_number(&self) -> Option<u32> {
        match self {
            VisitState::Baseline => Some(1),
            VisitState::FollowUp(k) => Some(*k),
            VisitState::Complete => None,
        }
    }

    fn phase(&self) -> VisitPhase {
        match self {
            VisitState::Baseline => VisitPhase::Baseline,
            VisitState::FollowUp(_) => VisitPhase::FollowUp,
            VisitState::Complete => VisitPhase::Complete,
        }
    }
}

/// 时间线事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TimelineEvent {
    Advance, // 生成下一次随访
    Finish,  // 结束时间线
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum VisitPhase {
    Baseline,
    FollowUp,
    Complete,
}

/// 时间线状态机
#[derive(Debug)]
pub struct TimelineStateMachine {
    transitions: HashMap<(VisitPhase, TimelineEvent), VisitPhase>,
    total_studies: u32,
}

impl TimelineStateMachine {
    /// 创建状态机，`total_studies` 为该患者的检查总数（至少2次）
    pub fn new(total_studies: u32) -> Result<Self> {
        if total_studies < 2 {
            return Err(SynthError::Validation(format!(
                "每位患者至少需要2次检查，实际为 {}",
                total_studies
            )));
        }

        let mut transitions = HashMap::new();
        transitions.insert((VisitPhase::Baseline, TimelineEvent::Advance), VisitPhase::FollowUp);
        transitions.insert((VisitPhase::FollowUp, TimelineEvent::Advance), VisitPhase::FollowUp);
        transitions.insert((VisitPhase::FollowUp, TimelineEvent::Finish), VisitPhase::Complete);

        Ok(Self {
            transitions,
            total_studies,
        })
    }

    pub fn total_studies(&self) -> u32 {
        self.total_studies
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: &VisitState, event: &TimelineEvent) -> bool {
        self.transition(from, event).is_ok()
    }

    /// 执行状态转换
    pub fn transition(&self, from: &VisitState, event: &TimelineEvent) -> Result<VisitState> {
        let invalid = || SynthError::InvalidStateTransition {
            from: format!("{:?}", from),
            event: format!("{:?}", event),
        };

        let to = self
            .transitions
            .get(&(from.phase(), *event))
            .ok_or_else(invalid)?;
        let current = from.visit_number().unwrap_or(0);

        match to {
            VisitPhase::FollowUp if current < self.total_studies => Ok(VisitState::FollowUp(current + 1)),
            VisitPhase::Complete if current == self.total_studies => Ok(VisitState::Complete),
            _ => Err(invalid()),
        }
    }

    /// 当前状态下的下一个合法事件
    pub fn next_event(&self, current: &VisitState) -> Option<TimelineEvent> {
        [TimelineEvent::Advance, TimelineEvent::Finish]
            .into_iter()
            .find(|event| self.can_transition(current, event))
    }
}
