//! 队列生成引擎
//!
//! 协调采样、分期、RECIST与时间线生成，为整个患者队列产出病例序列

use crate::timeline::{
    generate_case, generate_follow_up_case, generate_patient_timeline, TimelineOptions,
    BASELINE_LOOKBACK_DAYS,
};
use chrono::Duration;
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use synthrad_core::utils::{derive_seed, seeded_rng, SynthRng};
use synthrad_core::{Case, ResponseCategory, Result, StageGroup, SynthError};
use tracing::{debug, info};

/// 队列生成模式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CohortMode {
    /// 每位患者 2..=max_studies 次检查
    Longitudinal,
    /// 每位患者一次基线，可选一次随访
    Legacy { follow_up: bool, follow_up_days: i64 },
}

/// 队列生成参数
#[derive(Debug, Clone)]
pub struct CohortSettings {
    pub patient_count: usize,
    pub seed: u64,
    pub mode: CohortMode,
    pub timeline: TimelineOptions,
}

/// 一位患者的检查序列
#[derive(Debug, Clone, PartialEq)]
pub struct PatientTimeline {
    pub patient_id: String,
    pub cases: Vec<Case>,
}

/// 队列统计概览
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CohortOverview {
    pub total_patients: usize,
    pub total_studies: usize,
    pub baseline_stages: BTreeMap<StageGroup, usize>,
    pub responses: BTreeMap<ResponseCategory, usize>,
}

/// 队列生成引擎
///
/// 每位患者的种子依次从队列随机源中抽取，患者之间互不影响
#[derive(Debug)]
pub struct CohortEngine {
    settings: CohortSettings,
    rng: SynthRng,
    next_index: usize,
}

impl CohortEngine {
    /// 创建新的队列引擎
    pub fn new(settings: CohortSettings) -> Result<Self> {
        if settings.patient_count == 0 {
            return Err(SynthError::Validation("患者数量必须至少为1".to_string()));
        }
        if let CohortMode::Legacy { follow_up_days, .. } = settings.mode {
            if follow_up_days <= 0 {
                return Err(SynthError::Validation(format!(
                    "随访间隔必须为正数，实际为 {}",
                    follow_up_days
                )));
            }
        }
        settings.timeline.validate()?;

        let rng = seeded_rng(settings.seed);
        Ok(Self {
            settings,
            rng,
            next_index: 0,
        })
    }

    pub fn settings(&self) -> &CohortSettings {
        &self.settings
    }

    /// 患者编号：P0000、P0001 …
    pub fn patient_id(index: usize) -> String {
        format!("P{:04}", index)
    }

    /// 生成下一位患者，队列完成后返回 `None`
    pub fn next_patient(&mut self) -> Option<Result<PatientTimeline>> {
        if self.next_index >= self.settings.patient_count {
            return None;
        }
        let patient_id = Self::patient_id(self.next_index);
        self.next_index += 1;
        let seed = derive_seed(&mut self.rng);
        Some(self.generate_patient(&patient_id, seed))
    }

    fn generate_patient(&self, patient_id: &str, seed: u64) -> Result<PatientTimeline> {
        let cases = match &self.settings.mode {
            CohortMode::Longitudinal => generate_patient_timeline(patient_id, seed, &self.settings.timeline)?,
            CohortMode::Legacy {
                follow_up,
                follow_up_days,
            } => self.generate_legacy(patient_id, seed, *follow_up, *follow_up_days),
        };
        debug!("Patient {} generated with {} studies", patient_id, cases.len());

        Ok(PatientTimeline {
            patient_id: patient_id.to_string(),
            cases,
        })
    }

    fn generate_legacy(&self, patient_id: &str, seed: u64, follow_up: bool, follow_up_days: i64) -> Vec<Case> {
        let options = &self.settings.timeline;
        let mut rng = seeded_rng(seed);
        let baseline_seed = derive_seed(&mut rng);
        let lookback = rng.gen_range(BASELINE_LOOKBACK_DAYS.0..=BASELINE_LOOKBACK_DAYS.1);
        let baseline_date = options.anchor_date - Duration::days(lookback);

        let baseline = generate_case(
            baseline_seed,
            &options.stage_dist,
            options.lobe,
            patient_id,
            baseline_date,
        );
        let mut cases = vec![baseline];

        if follow_up {
            let follow_seed = derive_seed(&mut rng);
            let follow_date = baseline_date + Duration::days(follow_up_days);
            let follow = generate_follow_up_case(&cases[0], follow_seed, follow_date, &options.response_dist);
            cases.push(follow);
        }
        cases
    }

    /// 生成整个队列
    pub fn run(&mut self) -> Result<Vec<PatientTimeline>> {
        info!(
            "Generating cohort of {} patients (seed {}, mode {:?})",
            self.settings.patient_count, self.settings.seed, self.settings.mode
        );
        let mut patients = Vec::with_capacity(self.settings.patient_count);
        while let Some(patient) = self.next_patient() {
            patients.push(patient?);
        }
        info!("Cohort generation complete: {} patients", patients.len());
        Ok(patients)
    }

    /// 统计队列概览
    pub fn overview(patients: &[PatientTimeline]) -> CohortOverview {
        let mut overview = CohortOverview {
            total_patients: patients.len(),
            ..Default::default()
        };
        for patient in patients {
            overview.total_studies += patient.cases.len();
            if let Some(baseline) = patient.cases.first() {
                *overview
                    .baseline_stages
                    .entry(baseline.tnm.stage_group)
                    .or_insert(0) += 1;
            }
            for status in patient.cases.iter().filter_map(|c| c.response_status) {
                *overview.responses.entry(status).or_insert(0) += 1;
            }
        }
        overview
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn settings(mode: CohortMode) -> CohortSettings {
        CohortSettings {
            patient_count: 6,
            seed: 42,
            mode,
            timeline: TimelineOptions::new(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()),
        }
    }

    #[test]
    fn test_patient_ids() {
        assert_eq!(CohortEngine::patient_id(0), "P0000");
        assert_eq!(CohortEngine::patient_id(17), "P0017");
    }

    #[test]
    fn test_longitudinal_cohort() {
        let mut engine = CohortEngine::new(settings(CohortMode::Longitudinal)).unwrap();
        let patients = engine.run().unwrap();
        assert_eq!(patients.len(), 6);
        for (i, patient) in patients.iter().enumerate() {
            assert_eq!(patient.patient_id, CohortEngine::patient_id(i));
            assert!(patient.cases.len() >= 2);
            assert!(patient.cases.iter().all(|c| c.meta.patient_id == patient.patient_id));
        }
        assert!(engine.next_patient().is_none());
    }

    #[test]
    fn test_cohort_is_reproducible() {
        let a = CohortEngine::new(settings(CohortMode::Longitudinal))
            .unwrap()
            .run()
            .unwrap();
        let b = CohortEngine::new(settings(CohortMode::Longitudinal))
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_legacy_mode() {
        let mode = CohortMode::Legacy {
            follow_up: true,
            follow_up_days: 90,
        };
        let patients = CohortEngine::new(settings(mode)).unwrap().run().unwrap();
        for patient in &patients {
            assert_eq!(patient.cases.len(), 2);
            let gap = patient.cases[1].meta.study_date - patient.cases[0].meta.study_date;
            assert_eq!(gap.num_days(), 90);
        }

        let mode = CohortMode::Legacy {
            follow_up: false,
            follow_up_days: 90,
        };
        let patients = CohortEngine::new(settings(mode)).unwrap().run().unwrap();
        assert!(patients.iter().all(|p| p.cases.len() == 1));
    }

    #[test]
    fn test_invalid_settings() {
        let mut s = settings(CohortMode::Longitudinal);
        s.patient_count = 0;
        assert!(CohortEngine::new(s).is_err());

        let mut s = settings(CohortMode::Longitudinal);
        s.timeline.max_studies = 11;
        assert!(CohortEngine::new(s).is_err());
    }

    #[test]
    fn test_overview_counts() {
        let patients = CohortEngine::new(settings(CohortMode::Longitudinal))
            .unwrap()
            .run()
            .unwrap();
        let overview = CohortEngine::overview(&patients);
        assert_eq!(overview.total_patients, 6);
        assert_eq!(overview.baseline_stages.values().sum::<usize>(), 6);
        let follow_ups: usize = patients.iter().map(|p| p.cases.len() - 1).sum();
        assert_eq!(overview.responses.values().sum::<usize>(), follow_ups);
        assert_eq!(overview.total_studies, follow_ups + 6);
    }
}
