//! 队列运行
//!
//! 逐个患者生成检查序列，渲染报告、构建解剖映射并写入输出目录。

use crate::config::RunPlan;
use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use synthrad_clinical::{CohortEngine, CohortOverview, PatientTimeline};
use synthrad_core::utils::seeded_rng;
use synthrad_core::Case;
use synthrad_export::{cohort_records, OutputWriter};
use synthrad_ontology::{AnatomicMap, AnatomicMapper, BioPortalResolver, OntologySettings};
use synthrad_report::{ReportRenderer, SeededPhraseProvider};
use tracing::{debug, info, warn};

/// 档位抽样随机源相对队列种子的偏移，避免与病例随机源重合
const PROFILE_SEED_OFFSET: u64 = 0x5241_444C_4558;

/// 运行结果摘要
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub overview: CohortOverview,
    pub jsonl_path: Option<PathBuf>,
}

/// 构建解剖映射器；本体服务不可用时退化为离线映射器
pub async fn build_mapper(plan: &RunPlan, ontology: &OntologySettings) -> Option<AnatomicMapper> {
    plan.profiles.as_ref()?;
    match BioPortalResolver::new(ontology.clone()).await {
        Ok(resolver) => {
            info!("RadLex enhancement enabled via BioPortal");
            Some(AnatomicMapper::new(Arc::new(resolver)))
        }
        Err(e) => {
            warn!("RadLex service unavailable, anatomic mapping without ontology ids: {}", e);
            Some(AnatomicMapper::offline())
        }
    }
}

/// 执行整个队列的生成与写出
pub async fn run_cohort(plan: &RunPlan, mapper: Option<&AnatomicMapper>) -> anyhow::Result<RunSummary> {
    let mut engine = CohortEngine::new(plan.cohort.clone()).context("invalid cohort settings")?;
    let writer = OutputWriter::new(&plan.out_dir);
    let renderer = ReportRenderer::new();
    let cohort_seed = plan.cohort.seed;
    let mut profile_rng = seeded_rng(cohort_seed.wrapping_add(PROFILE_SEED_OFFSET));

    info!(
        "Generating {} patients into {}",
        plan.cohort.patient_count,
        plan.out_dir.display()
    );

    let mut patients: Vec<PatientTimeline> = Vec::with_capacity(plan.cohort.patient_count);
    while let Some(patient) = engine.next_patient() {
        let patient = patient.context("case generation failed")?;

        let mut prior: Option<&Case> = None;
        for case in &patient.cases {
            let mut phrases = SeededPhraseProvider::for_study(cohort_seed, &case.meta.accession_number);
            let report = renderer.render(case, prior, &mut phrases);

            let mapping = match (mapper, plan.profiles.as_ref()) {
                (Some(mapper), Some(profiles)) => {
                    let profile = profiles.sample(&mut profile_rng);
                    mapper.map_case(case, profile).await
                }
                _ => AnatomicMap::skeleton(case.meta.patient_id.clone(), case.meta.study_date),
            };

            let stored = writer
                .write_case(case, &report, &mapping)
                .await
                .with_context(|| format!("failed to write {}", case.meta.accession_number))?;
            debug!("Wrote {}", stored.report_path.display());
            prior = Some(case);
        }

        info!(
            "Patient {}: {} studies, baseline stage {}",
            patient.patient_id,
            patient.cases.len(),
            patient
                .cases
                .first()
                .map(|c| c.tnm.stage_group.to_string())
                .unwrap_or_default()
        );
        patients.push(patient);
    }

    let jsonl_path = match &plan.jsonl {
        Some(name) => {
            let records = cohort_records(patients.iter().flat_map(|p| p.cases.iter()));
            Some(
                writer
                    .write_jsonl(name, &records)
                    .await
                    .context("failed to write JSONL")?,
            )
        }
        None => None,
    };

    let overview = CohortEngine::overview(&patients);
    info!(
        "Cohort complete: {} patients, {} studies",
        overview.total_patients, overview.total_studies
    );
    Ok(RunSummary {
        overview,
        jsonl_path,
    })
}
