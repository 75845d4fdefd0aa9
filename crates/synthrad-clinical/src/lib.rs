//! # SynthRad 临床引擎
//!
//! 合成病例的核心生成逻辑，包括：
//! - 分期引擎：由病灶测量计算TNM与总体分期
//! - 病灶采样器：按分期提示生成原发灶、淋巴结与转移灶
//! - RECIST引擎：靶病灶选择、SLD计算与疗效评估
//! - 时间线生成：基线病例及随访演化，由状态机约束访视顺序

pub mod distribution;
pub mod engine;
pub mod recist;
pub mod sampler;
pub mod staging;
pub mod state_machine;
pub mod timeline;

// 重新导出主要类型
pub use distribution::{
    stage_hint_from_dist, Distribution, DistributionKey, ResponseDistribution, StageDistribution,
};
pub use engine::{CohortEngine, CohortMode, CohortOverview, CohortSettings, PatientTimeline};
pub use recist::{
    calculate_sld, case_inventory, classify_nontarget_lesions, determine_response_status,
    lesion_inventory, recist_overall_response, select_recist_targets, Lesion, LesionKind,
    MeasurementRule, NonTargetLesion, NonTargetReason, OverallResponse, RecistAssessment,
};
pub use sampler::{sample_mets, sample_nodes, sample_primary, SampledPrimary};
pub use staging::{m_category, n_category, stage_group, stage_lesions, t_category, StagingResult, TumorExtent};
pub use state_machine::{TimelineEvent, TimelineStateMachine, VisitState};
pub use timeline::{
    generate_case, generate_follow_up_case, generate_patient_timeline, validate_studies_per_patient,
    TimelineOptions,
};
