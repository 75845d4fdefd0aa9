//! RECIST JSONL 记录
//!
//! 每次检查一行，供纵向数据看板读取。

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use synthrad_clinical::{Lesion, LesionKind, MeasurementRule, NonTargetReason, RecistAssessment};
use synthrad_core::{Case, PrimaryFeature, ResponseCategory};

/// 病灶记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LesionRecord {
    pub lesion_id: String,
    pub kind: LesionKind,
    pub organ: String,
    pub rule: MeasurementRule,
    pub baseline_mm: Option<u32>, // 仅基线
    pub follow_mm: Option<u32>,   // 仅随访
    pub size_mm_current: u32,
    pub target: bool,
    pub suspicious: bool,
    /// 肺叶或转移部位
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// 淋巴结站点
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
    pub margin: String,
    pub enhancement: String,
    pub necrosis: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<NonTargetReason>,
}

impl LesionRecord {
    fn new(case: &Case, lesion: &Lesion, target: bool, reason: Option<NonTargetReason>) -> Self {
        let baseline = case.is_baseline();
        let (location, station) = match lesion.kind {
            LesionKind::Node => (None, Some(lesion.location.clone())),
            _ => (Some(lesion.location.clone()), None),
        };

        let primary = case
            .primary
            .as_ref()
            .filter(|_| lesion.kind == LesionKind::Primary);
        let margin = match primary {
            Some(p) if p.has_feature(PrimaryFeature::Spiculation) => "spiculated",
            _ => "smooth",
        };
        let necrosis = primary
            .map(|p| p.has_feature(PrimaryFeature::Cavitation))
            .unwrap_or(false);

        Self {
            lesion_id: lesion.lesion_id.clone(),
            kind: lesion.kind,
            organ: lesion.organ.clone(),
            rule: lesion.rule,
            baseline_mm: baseline.then_some(lesion.size_mm),
            follow_mm: (!baseline).then_some(lesion.size_mm),
            size_mm_current: lesion.size_mm,
            target,
            suspicious: true,
            location,
            station,
            margin: margin.to_string(),
            enhancement: "enhancing".to_string(),
            necrosis,
            reason,
        }
    }
}

/// 单次检查的 RECIST 记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecistRecord {
    pub patient_id: String,
    /// 从0开始，等于访视序号减1
    pub timepoint: u32,
    pub study_date: NaiveDate,
    pub baseline_sld_mm: Option<u32>,
    pub current_sld_mm: u32,
    /// 保留字段，始终为空
    pub nadir_sld_mm: Option<u32>,
    pub overall_response: ResponseCategory,
    pub target_lesions: usize,
    pub nontarget_lesions: usize,
    pub lesions: Vec<LesionRecord>,
}

impl RecistRecord {
    /// 由病例构建记录；靶病灶在前，非靶病灶在后
    pub fn from_case(case: &Case) -> Self {
        let assessment = RecistAssessment::for_case(case);

        let mut lesions = Vec::with_capacity(assessment.targets.len() + assessment.nontargets.len());
        for target in &assessment.targets {
            lesions.push(LesionRecord::new(case, target, true, None));
        }
        for nontarget in &assessment.nontargets {
            lesions.push(LesionRecord::new(
                case,
                &nontarget.lesion,
                false,
                Some(nontarget.reason),
            ));
        }

        Self {
            patient_id: case.meta.patient_id.clone(),
            timepoint: case.meta.visit_number.saturating_sub(1),
            study_date: case.meta.study_date,
            baseline_sld_mm: case.is_baseline().then_some(assessment.sld_mm),
            current_sld_mm: assessment.sld_mm,
            nadir_sld_mm: None,
            overall_response: case.response_status.unwrap_or(ResponseCategory::SD),
            target_lesions: assessment.targets.len(),
            nontarget_lesions: assessment.nontargets.len(),
            lesions,
        }
    }
}

/// 多个病例的记录，保持输入顺序
pub fn cohort_records<'a, I>(cases: I) -> Vec<RecistRecord>
where
    I: IntoIterator<Item = &'a Case>,
{
    cases.into_iter().map(RecistRecord::from_case).collect()
}

/// 序列化为 JSONL 文本，每行一条记录
pub fn to_jsonl(records: &[RecistRecord]) -> synthrad_core::Result<String> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use synthrad_clinical::{generate_patient_timeline, TimelineOptions};
    use synthrad_core::{
        Lobe, MCategory, Met, MetSite, Meta, NCategory, NarrativeStyle, Node, NodeStation, Primary,
        StageGroup, TCategory, Tnm,
    };

    fn case(visit: u32, response: Option<ResponseCategory>) -> Case {
        Case {
            meta: Meta {
                modality: synthrad_core::DEFAULT_MODALITY.to_string(),
                patient_id: "P0003".to_string(),
                visit_number: visit,
                study_date: NaiveDate::from_ymd_opt(2024, 5, 20).unwrap(),
                comparison_date: None,
                accession_number: "2024052000000101".to_string(),
                study_uid: Default::default(),
                radiologist_style: NarrativeStyle::Detailed,
            },
            primary: Some(Primary {
                lobe: Lobe::Lll,
                size_mm: 35,
                features: vec![PrimaryFeature::Spiculation, PrimaryFeature::Cavitation],
            }),
            nodes: vec![Node {
                station: NodeStation::Station10L,
                short_axis_mm: 7,
            }],
            mets: vec![Met {
                site: MetSite::AdrenalLeft,
                size_mm: 18,
            }],
            tnm: Tnm {
                t: TCategory::T2b,
                n: NCategory::N1,
                m: MCategory::M1b,
                stage_group: StageGroup::IV,
            },
            rationale: Vec::new(),
            response_status: response,
        }
    }

    #[test]
    fn test_baseline_record() {
        let record = RecistRecord::from_case(&case(1, None));
        assert_eq!(record.timepoint, 0);
        assert_eq!(record.baseline_sld_mm, Some(53));
        assert_eq!(record.current_sld_mm, 53);
        assert_eq!(record.nadir_sld_mm, None);
        assert_eq!(record.overall_response, ResponseCategory::SD);
        assert_eq!(record.target_lesions, 2);
        assert_eq!(record.nontarget_lesions, 1);

        let primary = &record.lesions[0];
        assert_eq!(primary.lesion_id, "lung-LLL-longest-1");
        assert_eq!(primary.baseline_mm, Some(35));
        assert_eq!(primary.follow_mm, None);
        assert_eq!(primary.margin, "spiculated");
        assert!(primary.necrosis);
        assert_eq!(primary.location.as_deref(), Some("LLL"));

        let node = record.lesions.last().unwrap();
        assert!(!node.target);
        assert_eq!(node.station.as_deref(), Some("10L"));
        assert_eq!(node.reason, Some(NonTargetReason::TooSmall));
        assert_eq!(node.rule, MeasurementRule::ShortAxis);
    }

    #[test]
    fn test_follow_up_record() {
        let record = RecistRecord::from_case(&case(3, Some(ResponseCategory::PR)));
        assert_eq!(record.timepoint, 2);
        assert_eq!(record.baseline_sld_mm, None);
        assert_eq!(record.overall_response, ResponseCategory::PR);
        assert!(record.lesions.iter().all(|l| l.baseline_mm.is_none()));
        assert!(record.lesions.iter().all(|l| l.follow_mm == Some(l.size_mm_current)));
    }

    #[test]
    fn test_json_field_names() {
        let record = RecistRecord::from_case(&case(1, None));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["study_date"], "2024-05-20");
        assert_eq!(value["overall_response"], "SD");
        assert!(value["nadir_sld_mm"].is_null());
        let lesions = value["lesions"].as_array().unwrap();
        assert_eq!(lesions[0]["kind"], "primary");
        assert_eq!(lesions[0]["rule"], "longest");
        assert_eq!(lesions[1]["kind"], "metastasis");
        assert_eq!(lesions[1]["location"], "adrenal_left");
        assert_eq!(lesions[2]["rule"], "short_axis");
        assert_eq!(lesions[2]["reason"], "too_small");
        assert!(lesions[0].get("reason").is_none());
    }

    #[test]
    fn test_jsonl_lines_follow_timeline() {
        let options = TimelineOptions::new(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        let cases = generate_patient_timeline("P0000", 99, &options).unwrap();
        let records = cohort_records(&cases);
        let text = to_jsonl(&records).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), cases.len());
        for (i, line) in lines.iter().enumerate() {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["timepoint"], i as u64);
            assert_eq!(value["patient_id"], "P0000");
        }
        assert!(records[0].baseline_sld_mm.is_some());
        assert!(records[1..].iter().all(|r| r.baseline_sld_mm.is_none()));
    }
}
