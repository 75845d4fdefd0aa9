//! 病例与时间线生成
//!
//! 由采样器和分期引擎构建基线病例，再按采样的疗效类别逐次演化出随访病例。
//! 每位患者的所有随机性都来自同一个种子；子步骤的种子从该随机源中抽取。

use crate::distribution::{ResponseDistribution, StageDistribution};
use crate::recist::assess_response;
use crate::sampler::{
    draw_without_replacement, sample_mets, sample_nodes, sample_primary, MET_SIZE_RANGE,
    NODE_SIZE_RANGE,
};
use crate::staging::stage_lesions;
use crate::state_machine::{TimelineStateMachine, VisitState};
use chrono::{Duration, NaiveDate};
use rand::Rng;
use synthrad_core::utils::{derive_seed, generate_accession_number, generate_study_uid, seeded_rng};
use synthrad_core::{
    Case, Lobe, Met, MetSite, Meta, NarrativeStyle, Node, NodeStation, Primary, PrimaryFeature,
    ResponseCategory, Result, SynthError, DEFAULT_MODALITY,
};
use tracing::debug;

/// 每位患者检查次数的合法范围
pub const MIN_STUDIES_PER_PATIENT: u32 = 2;
pub const MAX_STUDIES_PER_PATIENT: u32 = 10;

/// 基线检查距锚定日期的天数范围
pub const BASELINE_LOOKBACK_DAYS: (i64, i64) = (365, 730);

/// 随访间隔天数范围
pub const FOLLOW_UP_INTERVAL_DAYS: (i64, i64) = (30, 180);

/// 原发灶缩小/抖动后的最小值（mm）
pub const MIN_PRIMARY_SIZE_MM: u32 = 5;

/// 时间线生成参数
#[derive(Debug, Clone)]
pub struct TimelineOptions {
    pub stage_dist: StageDistribution,
    pub response_dist: ResponseDistribution,
    pub lobe: Option<Lobe>,
    pub max_studies: u32,
    /// 基线日期从该日期向前回溯
    pub anchor_date: NaiveDate,
}

impl TimelineOptions {
    pub fn new(anchor_date: NaiveDate) -> Self {
        Self {
            stage_dist: StageDistribution::default(),
            response_dist: ResponseDistribution::default(),
            lobe: None,
            max_studies: 5,
            anchor_date,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_studies_per_patient(self.max_studies)
    }
}

/// 校验每位患者的最大检查次数
pub fn validate_studies_per_patient(max_studies: u32) -> Result<()> {
    if !(MIN_STUDIES_PER_PATIENT..=MAX_STUDIES_PER_PATIENT).contains(&max_studies) {
        return Err(SynthError::Validation(format!(
            "studies-per-patient must be between {} and {}, got {}",
            MIN_STUDIES_PER_PATIENT, MAX_STUDIES_PER_PATIENT, max_studies
        )));
    }
    Ok(())
}

fn sample_style<R: Rng + ?Sized>(rng: &mut R) -> NarrativeStyle {
    NarrativeStyle::ALL[rng.gen_range(0..NarrativeStyle::ALL.len())]
}

fn build_meta<R: Rng + ?Sized>(
    rng: &mut R,
    patient_id: &str,
    visit_number: u32,
    study_date: NaiveDate,
    comparison_date: Option<NaiveDate>,
) -> Meta {
    let accession_number = generate_accession_number(rng, study_date, visit_number);
    let study_uid = generate_study_uid(rng);
    let radiologist_style = sample_style(rng);
    Meta {
        modality: DEFAULT_MODALITY.to_string(),
        patient_id: patient_id.to_string(),
        visit_number,
        study_date,
        comparison_date,
        accession_number,
        study_uid,
        radiologist_style,
    }
}

/// 生成基线病例
pub fn generate_case(
    seed: u64,
    stage_dist: &StageDistribution,
    lobe: Option<Lobe>,
    patient_id: &str,
    study_date: NaiveDate,
) -> Case {
    let mut rng = seeded_rng(seed);
    let hint = stage_dist.sample_stage(&mut rng);
    let meta = build_meta(&mut rng, patient_id, 1, study_date, None);

    let sampled = sample_primary(lobe, hint, &mut rng);
    let (nodes, n_reasons) = sample_nodes(hint, &mut rng);
    let (mets, m_reasons) = sample_mets(hint, &mut rng);

    let staging = stage_lesions(Some(&sampled.primary), &nodes, &mets);
    let mut rationale = sampled.reasons;
    rationale.extend(n_reasons);
    rationale.extend(m_reasons);

    debug!(
        "Baseline {} hint {} -> stage {} ({}{}{})",
        patient_id,
        hint,
        staging.tnm.stage_group,
        staging.tnm.t,
        staging.tnm.n,
        staging.tnm.m
    );

    Case {
        meta,
        primary: Some(sampled.primary),
        nodes,
        mets,
        tnm: staging.tnm,
        rationale,
        response_status: None,
    }
}

fn scale_size(size_mm: u32, factor: f64) -> u32 {
    (f64::from(size_mm) * factor).floor().max(0.0) as u32
}

fn mutate_primary<R: Rng + ?Sized>(
    prior: Option<&Primary>,
    response: ResponseCategory,
    rng: &mut R,
) -> Option<Primary> {
    let prior = prior?;
    match response {
        ResponseCategory::CR => None,
        ResponseCategory::PR => {
            let reduction = rng.gen_range(0.3..0.7);
            let keep = rng.gen_range(0..=prior.features.len());
            Some(Primary {
                lobe: prior.lobe,
                size_mm: scale_size(prior.size_mm, 1.0 - reduction).max(MIN_PRIMARY_SIZE_MM),
                features: prior.features[..keep].to_vec(),
            })
        }
        ResponseCategory::PD => {
            let increase = rng.gen_range(0.2..0.5);
            let mut features = prior.features.clone();
            if rng.gen_bool(0.3) && !features.contains(&PrimaryFeature::Cavitation) {
                features.push(PrimaryFeature::Cavitation);
            }
            Some(Primary {
                lobe: prior.lobe,
                size_mm: scale_size(prior.size_mm, 1.0 + increase),
                features,
            })
        }
        ResponseCategory::SD => {
            let change = rng.gen_range(-0.1..0.1);
            Some(Primary {
                lobe: prior.lobe,
                size_mm: scale_size(prior.size_mm, 1.0 + change).max(MIN_PRIMARY_SIZE_MM),
                features: prior.features.clone(),
            })
        }
    }
}

/// 随机前缀长度：0 到 max(1, len/2)，且不超过 len
fn shrink_prefix_len<R: Rng + ?Sized>(len: usize, rng: &mut R) -> usize {
    let upper = (len / 2).max(1).min(len);
    rng.gen_range(0..=upper)
}

fn mutate_nodes<R: Rng + ?Sized>(prior: &[Node], response: ResponseCategory, rng: &mut R) -> Vec<Node> {
    match response {
        ResponseCategory::CR | ResponseCategory::PR => {
            let keep = shrink_prefix_len(prior.len(), rng);
            prior[..keep].to_vec()
        }
        ResponseCategory::PD => {
            let mut nodes = prior.to_vec();
            let used: Vec<NodeStation> = prior.iter().map(|n| n.station).collect();
            let count = rng.gen_range(0..=2);
            for station in draw_without_replacement(rng, &NodeStation::ALL, &used, count) {
                nodes.push(Node {
                    station,
                    short_axis_mm: rng.gen_range(NODE_SIZE_RANGE.0..=NODE_SIZE_RANGE.1),
                });
            }
            nodes
        }
        ResponseCategory::SD => prior.to_vec(),
    }
}

fn mutate_mets<R: Rng + ?Sized>(prior: &[Met], response: ResponseCategory, rng: &mut R) -> Vec<Met> {
    match response {
        ResponseCategory::CR | ResponseCategory::PR => {
            let keep = shrink_prefix_len(prior.len(), rng);
            prior[..keep].to_vec()
        }
        ResponseCategory::PD => {
            let mut mets = prior.to_vec();
            let used: Vec<MetSite> = prior.iter().map(|m| m.site).collect();
            let count = rng.gen_range(0..=1);
            for site in draw_without_replacement(rng, &MetSite::ALL, &used, count) {
                mets.push(Met {
                    site,
                    size_mm: rng.gen_range(MET_SIZE_RANGE.0..=MET_SIZE_RANGE.1),
                });
            }
            mets
        }
        ResponseCategory::SD => prior.to_vec(),
    }
}

/// 由前一次病例派生下一次随访病例
///
/// 采样的疗效类别只决定病灶如何变化，记录的 `response_status`
/// 始终是对前后两次检查独立重新评估的RECIST结果。
pub fn generate_follow_up_case(
    prior: &Case,
    seed: u64,
    study_date: NaiveDate,
    response_dist: &ResponseDistribution,
) -> Case {
    let mut rng = seeded_rng(seed);
    let meta = build_meta(
        &mut rng,
        &prior.meta.patient_id,
        prior.meta.visit_number + 1,
        study_date,
        Some(prior.meta.study_date),
    );
    let sampled_response = response_dist.sample(&mut rng);

    let primary = mutate_primary(prior.primary.as_ref(), sampled_response, &mut rng);
    let nodes = mutate_nodes(&prior.nodes, sampled_response, &mut rng);
    let mets = mutate_mets(&prior.mets, sampled_response, &mut rng);

    let staging = stage_lesions(primary.as_ref(), &nodes, &mets);
    let mut case = Case {
        meta,
        primary,
        nodes,
        mets,
        tnm: staging.tnm,
        rationale: staging.rationale(),
        response_status: None,
    };
    let assessed = assess_response(prior, &case);
    case.response_status = Some(assessed.category());

    debug!(
        "Follow-up {} visit {}: sampled {}, assessed {}",
        case.meta.patient_id,
        case.meta.visit_number,
        sampled_response,
        assessed
    );
    case
}

/// 生成一位患者的完整检查时间线
pub fn generate_patient_timeline(patient_id: &str, seed: u64, options: &TimelineOptions) -> Result<Vec<Case>> {
    options.validate()?;

    let mut rng = seeded_rng(seed);
    let total_studies = rng.gen_range(MIN_STUDIES_PER_PATIENT..=options.max_studies);
    let machine = TimelineStateMachine::new(total_studies)?;

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

    let mut cases = Vec::with_capacity(total_studies as usize);
    cases.push(baseline);
    let mut state = VisitState::Baseline;

    while let Some(event) = machine.next_event(&state) {
        state = machine.transition(&state, &event)?;
        let Some(visit_number) = state.visit_number() else {
            break;
        };

        let interval = rng.gen_range(FOLLOW_UP_INTERVAL_DAYS.0..=FOLLOW_UP_INTERVAL_DAYS.1);
        let follow_seed = derive_seed(&mut rng);
        let prior = cases
            .last()
            .ok_or_else(|| SynthError::Internal("时间线缺少基线病例".to_string()))?;
        let study_date = prior.meta.study_date + Duration::days(interval);
        let case = generate_follow_up_case(prior, follow_seed, study_date, &options.response_dist);

        if case.meta.visit_number != visit_number {
            return Err(SynthError::Internal(format!(
                "访视序号不一致: 期望 {}，实际 {}",
                visit_number, case.meta.visit_number
            )));
        }
        cases.push(case);
    }

    debug!("Generated {} studies for {}", cases.len(), patient_id);
    Ok(cases)
}
