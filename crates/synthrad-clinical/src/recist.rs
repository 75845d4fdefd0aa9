//! RECIST 1.1 引擎
//!
//! 靶病灶选择、最长径之和（SLD）计算、非靶病灶分类与总体疗效评估。

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use synthrad_core::{Case, Met, Node, Primary, ResponseCategory};

/// 靶病灶最小径（mm）
pub const MIN_TARGET_SIZE_MM: u32 = 10;

/// 淋巴结靶病灶最小短径（mm）
pub const MIN_NODE_TARGET_SIZE_MM: u32 = 10;

/// 靶病灶总数上限
pub const MAX_TOTAL_TARGETS: usize = 5;

/// 单一器官靶病灶上限
pub const MAX_TARGETS_PER_ORGAN: usize = 2;

/// PR阈值（百分比变化）
pub const PARTIAL_RESPONSE_PCT: f64 = -30.0;

/// PD阈值（百分比变化）
pub const PROGRESSION_PCT: f64 = 20.0;

/// 病灶类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LesionKind {
    Primary,
    Node,
    Metastasis,
}

/// 测量规则
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementRule {
    Longest,
    ShortAxis,
}

impl MeasurementRule {
    fn id_token(&self) -> &'static str {
        match self {
            MeasurementRule::Longest => "longest",
            MeasurementRule::ShortAxis => "shortaxis",
        }
    }

    /// 该测量规则下可作为靶病灶的最小值
    pub fn threshold_mm(&self) -> u32 {
        match self {
            MeasurementRule::Longest => MIN_TARGET_SIZE_MM,
            MeasurementRule::ShortAxis => MIN_NODE_TARGET_SIZE_MM,
        }
    }
}

/// 可测量病灶
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Lesion {
    pub lesion_id: String,
    pub kind: LesionKind,
    /// 器官键："lung"、"lymph_node" 或转移部位代码
    pub organ: String,
    /// 肺叶、站点或转移部位代码
    pub location: String,
    pub rule: MeasurementRule,
    pub size_mm: u32,
}

impl Lesion {
    pub fn is_measurable(&self) -> bool {
        self.size_mm >= self.rule.threshold_mm()
    }
}

/// 非靶病灶原因
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NonTargetReason {
    TooSmall,    // 低于测量阈值
    NotSelected, // 达到阈值但上限已满
}

impl NonTargetReason {
    pub fn code(&self) -> &'static str {
        match self {
            NonTargetReason::TooSmall => "too_small",
            NonTargetReason::NotSelected => "not_selected",
        }
    }
}

/// 非靶病灶
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NonTargetLesion {
    #[serde(flatten)]
    pub lesion: Lesion,
    pub reason: NonTargetReason,
}

/// 列出病例全部病灶及其确定性ID（原发灶、淋巴结、转移灶顺序）
pub fn lesion_inventory(primary: Option<&Primary>, nodes: &[Node], mets: &[Met]) -> Vec<Lesion> {
    let mut lesions = Vec::with_capacity(1 + nodes.len() + mets.len());

    if let Some(primary) = primary.filter(|p| p.size_mm > 0) {
        let rule = MeasurementRule::Longest;
        lesions.push(Lesion {
            lesion_id: format!("lung-{}-{}-1", primary.lobe, rule.id_token()),
            kind: LesionKind::Primary,
            organ: "lung".to_string(),
            location: primary.lobe.code().to_string(),
            rule,
            size_mm: primary.size_mm,
        });
    }

    for (i, node) in nodes.iter().enumerate() {
        let rule = MeasurementRule::ShortAxis;
        lesions.push(Lesion {
            lesion_id: format!("ln-{}-{}-{}", node.station, rule.id_token(), i + 1),
            kind: LesionKind::Node,
            organ: "lymph_node".to_string(),
            location: node.station.code().to_string(),
            rule,
            size_mm: node.short_axis_mm,
        });
    }

    for (i, met) in mets.iter().enumerate() {
        let rule = MeasurementRule::Longest;
        lesions.push(Lesion {
            lesion_id: format!(
                "{}-{}-{}",
                met.site.code().replace('_', "-"),
                rule.id_token(),
                i + 1
            ),
            kind: LesionKind::Metastasis,
            organ: met.site.code().to_string(),
            location: met.site.code().to_string(),
            rule,
            size_mm: met.size_mm,
        });
    }

    lesions
}

/// 病例的病灶清单
pub fn case_inventory(case: &Case) -> Vec<Lesion> {
    lesion_inventory(case.primary.as_ref(), &case.nodes, &case.mets)
}

/// 选择靶病灶：总数≤5，每器官≤2，达到测量阈值
pub fn select_recist_targets(primary: Option<&Primary>, nodes: &[Node], mets: &[Met]) -> Vec<Lesion> {
    let mut targets = Vec::new();
    let mut per_organ: HashMap<String, usize> = HashMap::new();

    for lesion in lesion_inventory(primary, nodes, mets) {
        if targets.len() >= MAX_TOTAL_TARGETS {
            break;
        }
        if !lesion.is_measurable() {
            continue;
        }
        let count = per_organ.entry(lesion.organ.clone()).or_insert(0);
        if *count >= MAX_TARGETS_PER_ORGAN {
            continue;
        }
        *count += 1;
        targets.push(lesion);
    }

    targets
}

/// 靶病灶最长径之和
pub fn calculate_sld(targets: &[Lesion]) -> u32 {
    targets.iter().map(|t| t.size_mm).sum()
}

/// 未被选为靶病灶的全部病灶及原因
pub fn classify_nontarget_lesions(
    primary: Option<&Primary>,
    nodes: &[Node],
    mets: &[Met],
    targets: &[Lesion],
) -> Vec<NonTargetLesion> {
    let target_ids: HashSet<&str> = targets.iter().map(|t| t.lesion_id.as_str()).collect();

    lesion_inventory(primary, nodes, mets)
        .into_iter()
        .filter(|lesion| !target_ids.contains(lesion.lesion_id.as_str()))
        .map(|lesion| {
            let reason = if lesion.is_measurable() {
                NonTargetReason::NotSelected
            } else {
                NonTargetReason::TooSmall
            };
            NonTargetLesion { lesion, reason }
        })
        .collect()
}

/// 单次检查的RECIST评估
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecistAssessment {
    pub targets: Vec<Lesion>,
    pub nontargets: Vec<NonTargetLesion>,
    pub sld_mm: u32,
}

impl RecistAssessment {
    pub fn for_case(case: &Case) -> Self {
        let targets = select_recist_targets(case.primary.as_ref(), &case.nodes, &case.mets);
        let nontargets =
            classify_nontarget_lesions(case.primary.as_ref(), &case.nodes, &case.mets, &targets);
        let sld_mm = calculate_sld(&targets);
        Self {
            targets,
            nontargets,
            sld_mm,
        }
    }

    pub fn target_ids(&self) -> HashSet<&str> {
        self.targets.iter().map(|t| t.lesion_id.as_str()).collect()
    }

    pub fn nontarget_ids(&self) -> HashSet<&str> {
        self.nontargets
            .iter()
            .map(|nt| nt.lesion.lesion_id.as_str())
            .collect()
    }
}

/// 总体疗效
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverallResponse {
    /// 无可测量病灶
    CompleteResponse,
    PartialResponse,
    StableDisease,
    ProgressionNewLesions,
    ProgressionNonTarget,
    /// 基线无可测量病灶，随访出现可测量病灶
    ProgressionNewMeasurableDisease,
    ProgressionSldIncrease,
}

impl OverallResponse {
    pub fn category(&self) -> ResponseCategory {
        match self {
            OverallResponse::CompleteResponse => ResponseCategory::CR,
            OverallResponse::PartialResponse => ResponseCategory::PR,
            OverallResponse::StableDisease => ResponseCategory::SD,
            OverallResponse::ProgressionNewLesions
            | OverallResponse::ProgressionNonTarget
            | OverallResponse::ProgressionNewMeasurableDisease
            | OverallResponse::ProgressionSldIncrease => ResponseCategory::PD,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            OverallResponse::CompleteResponse => "Complete response (no measurable disease)",
            OverallResponse::PartialResponse => "Partial response",
            OverallResponse::StableDisease => "Stable disease",
            OverallResponse::ProgressionNewLesions => "Progressive disease (new lesions)",
            OverallResponse::ProgressionNonTarget => "Progressive disease (non-target progression)",
            OverallResponse::ProgressionNewMeasurableDisease => {
                "Progressive disease (new measurable disease)"
            }
            OverallResponse::ProgressionSldIncrease => "Progressive disease (≥20% increase)",
        }
    }
}

impl fmt::Display for OverallResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// 由当前与既往SLD及新病灶/非靶进展标志判定总体疗效
pub fn recist_overall_response(
    sld_current: u32,
    sld_prior: Option<u32>,
    nontarget_progression: bool,
    new_lesions: bool,
) -> OverallResponse {
    if new_lesions {
        return OverallResponse::ProgressionNewLesions;
    }
    if nontarget_progression {
        return OverallResponse::ProgressionNonTarget;
    }

    let prior = match sld_prior {
        Some(prior) if prior > 0 => prior,
        _ => {
            return if sld_current == 0 {
                OverallResponse::CompleteResponse
            } else {
                OverallResponse::ProgressionNewMeasurableDisease
            };
        }
    };

    let pct = (f64::from(sld_current) - f64::from(prior)) / f64::from(prior) * 100.0;
    if pct <= PARTIAL_RESPONSE_PCT {
        OverallResponse::PartialResponse
    } else if pct >= PROGRESSION_PCT {
        OverallResponse::ProgressionSldIncrease
    } else {
        OverallResponse::StableDisease
    }
}

/// 独立地对前后两次检查做RECIST评估并给出疗效
///
/// 新病灶：随访靶病灶ID中不存在于既往靶病灶ID的部分。
/// 非靶进展：随访非靶病灶ID中不存在于既往非靶病灶ID的部分。
pub fn assess_response(prior: &Case, follow_up: &Case) -> OverallResponse {
    let before = RecistAssessment::for_case(prior);
    let after = RecistAssessment::for_case(follow_up);

    let before_targets = before.target_ids();
    let new_lesions = after
        .target_ids()
        .iter()
        .any(|id| !before_targets.contains(id));

    let before_nontargets = before.nontarget_ids();
    let nontarget_progression = after
        .nontarget_ids()
        .iter()
        .any(|id| !before_nontargets.contains(id));

    recist_overall_response(
        after.sld_mm,
        Some(before.sld_mm),
        nontarget_progression,
        new_lesions,
    )
}

/// 随访病例的疗效类别
pub fn determine_response_status(prior: &Case, follow_up: &Case) -> ResponseCategory {
    assess_response(prior, follow_up).category()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::StageDistribution;
    use crate::timeline::generate_case;
    use chrono::NaiveDate;
    use synthrad_core::{Lobe, MetSite, NodeStation, PrimaryFeature};

    fn primary(size_mm: u32) -> Primary {
        Primary {
            lobe: Lobe::Rul,
            size_mm,
            features: vec![PrimaryFeature::Spiculation],
        }
    }

    fn node(station: NodeStation, short_axis_mm: u32) -> Node {
        Node {
            station,
            short_axis_mm,
        }
    }

    fn met(site: MetSite, size_mm: u32) -> Met {
        Met { site, size_mm }
    }

    fn case_with(primary: Option<Primary>, nodes: Vec<Node>, mets: Vec<Met>) -> Case {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let mut case = generate_case(3, &StageDistribution::default(), None, "P0100", date);
        case.primary = primary;
        case.nodes = nodes;
        case.mets = mets;
        case
    }

    #[test]
    fn test_lesion_ids() {
        let inventory = lesion_inventory(
            Some(&primary(30)),
            &[node(NodeStation::Station4R, 12), node(NodeStation::Station10L, 8)],
            &[met(MetSite::AdrenalRight, 15)],
        );
        let ids: Vec<&str> = inventory.iter().map(|l| l.lesion_id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "lung-RUL-longest-1",
                "ln-4R-shortaxis-1",
                "ln-10L-shortaxis-2",
                "adrenal-right-longest-1"
            ]
        );
        assert_eq!(inventory[1].organ, "lymph_node");
        assert_eq!(inventory[3].organ, "adrenal_right");
    }

    #[test]
    fn test_target_caps() {
        let nodes = [
            node(NodeStation::Station2R, 15),
            node(NodeStation::Station4R, 12),
            node(NodeStation::Station7, 18),
            node(NodeStation::Station10L, 14),
        ];
        let mets = [
            met(MetSite::Liver, 20),
            met(MetSite::AdrenalRight, 15),
            met(MetSite::Bone, 25),
        ];
        let targets = select_recist_targets(Some(&primary(40)), &nodes, &mets);
        assert_eq!(targets.len(), MAX_TOTAL_TARGETS);

        let mut per_organ: HashMap<&str, usize> = HashMap::new();
        for target in &targets {
            *per_organ.entry(target.organ.as_str()).or_default() += 1;
        }
        assert!(per_organ.values().all(|c| *c <= MAX_TARGETS_PER_ORGAN));
        assert_eq!(per_organ["lymph_node"], 2);

        let nontargets = classify_nontarget_lesions(Some(&primary(40)), &nodes, &mets, &targets);
        assert_eq!(targets.len() + nontargets.len(), 8);
        assert!(nontargets
            .iter()
            .all(|nt| nt.reason == NonTargetReason::NotSelected));
    }

    #[test]
    fn test_small_lesions_are_nontargets() {
        let nodes = [node(NodeStation::Station7, 9)];
        let mets = [met(MetSite::Liver, 6)];
        let targets = select_recist_targets(Some(&primary(9)), &nodes, &mets);
        assert!(targets.is_empty());
        assert_eq!(calculate_sld(&targets), 0);

        let nontargets = classify_nontarget_lesions(Some(&primary(9)), &nodes, &mets, &targets);
        assert_eq!(nontargets.len(), 3);
        assert!(nontargets.iter().all(|nt| nt.reason == NonTargetReason::TooSmall));
    }

    #[test]
    fn test_sld_is_sum_of_targets() {
        let targets = select_recist_targets(
            Some(&primary(33)),
            &[node(NodeStation::Station7, 11)],
            &[met(MetSite::Brain, 12)],
        );
        assert_eq!(calculate_sld(&targets), 33 + 11 + 12);
    }

    #[test]
    fn test_overall_response_thresholds() {
        assert_eq!(
            recist_overall_response(65, Some(100), false, false),
            OverallResponse::PartialResponse
        );
        assert_eq!(
            recist_overall_response(65, Some(100), false, false).description(),
            "Partial response"
        );
        assert_eq!(
            recist_overall_response(125, Some(100), false, false).category(),
            ResponseCategory::PD
        );
        assert_eq!(
            recist_overall_response(70, Some(100), false, false),
            OverallResponse::PartialResponse
        );
        assert_eq!(
            recist_overall_response(120, Some(100), false, false),
            OverallResponse::ProgressionSldIncrease
        );
        assert_eq!(
            recist_overall_response(119, Some(100), false, false),
            OverallResponse::StableDisease
        );
    }

    #[test]
    fn test_overall_response_priorities() {
        assert_eq!(
            recist_overall_response(10, Some(100), true, true),
            OverallResponse::ProgressionNewLesions
        );
        assert_eq!(
            recist_overall_response(10, Some(100), true, false),
            OverallResponse::ProgressionNonTarget
        );
        assert_eq!(
            recist_overall_response(0, None, false, false),
            OverallResponse::CompleteResponse
        );
        assert_eq!(
            recist_overall_response(0, Some(0), false, false).category(),
            ResponseCategory::CR
        );
        assert_eq!(
            recist_overall_response(15, Some(0), false, false),
            OverallResponse::ProgressionNewMeasurableDisease
        );
    }

    #[test]
    fn test_nontarget_serializes_flat() {
        let targets = select_recist_targets(None, &[node(NodeStation::Station7, 8)], &[]);
        let nontargets = classify_nontarget_lesions(None, &[node(NodeStation::Station7, 8)], &[], &targets);
        let value = serde_json::to_value(&nontargets[0]).unwrap();
        assert_eq!(value["lesion_id"], "ln-7-shortaxis-1");
        assert_eq!(value["kind"], "node");
        assert_eq!(value["rule"], "short_axis");
        assert_eq!(value["reason"], "too_small");
    }

    #[test]
    fn test_new_target_is_progression() {
        let prior = case_with(Some(primary(30)), vec![], vec![met(MetSite::Liver, 20)]);
        let follow = case_with(
            Some(primary(15)),
            vec![node(NodeStation::Station4R, 14)],
            vec![met(MetSite::Liver, 10)],
        );
        assert_eq!(assess_response(&prior, &follow), OverallResponse::ProgressionNewLesions);
        assert_eq!(determine_response_status(&prior, &follow), ResponseCategory::PD);
    }

    #[test]
    fn test_new_nontarget_is_progression() {
        let prior = case_with(Some(primary(30)), vec![], vec![]);
        let follow = case_with(
            Some(primary(30)),
            vec![node(NodeStation::Station7, 8)],
            vec![],
        );
        assert_eq!(assess_response(&prior, &follow), OverallResponse::ProgressionNonTarget);
    }

    #[test]
    fn test_unchanged_lesions_use_sld_change() {
        let prior = case_with(
            Some(primary(40)),
            vec![node(NodeStation::Station7, 8)],
            vec![met(MetSite::Liver, 20)],
        );

        let shrunk = case_with(
            Some(primary(30)),
            vec![node(NodeStation::Station7, 8)],
            vec![met(MetSite::Liver, 10)],
        );
        assert_eq!(assess_response(&prior, &shrunk), OverallResponse::PartialResponse);

        let stable = case_with(
            Some(primary(44)),
            vec![node(NodeStation::Station7, 9)],
            vec![met(MetSite::Liver, 20)],
        );
        assert_eq!(assess_response(&prior, &stable), OverallResponse::StableDisease);

        let grown = case_with(
            Some(primary(50)),
            vec![node(NodeStation::Station7, 8)],
            vec![met(MetSite::Liver, 25)],
        );
        assert_eq!(assess_response(&prior, &grown), OverallResponse::ProgressionSldIncrease);
        assert_eq!(determine_response_status(&prior, &grown), ResponseCategory::PD);
    }

    #[test]
    fn test_resolved_target_without_new_lesions() {
        let prior = case_with(Some(primary(30)), vec![], vec![met(MetSite::Liver, 20)]);
        let follow = case_with(None, vec![], vec![met(MetSite::Liver, 20)]);
        assert_eq!(assess_response(&prior, &follow), OverallResponse::PartialResponse);
    }

    #[test]
    fn test_primary_below_threshold_moves_to_nontargets() {
        let prior = case_with(Some(primary(30)), vec![], vec![met(MetSite::Liver, 20)]);
        let follow = case_with(Some(primary(8)), vec![], vec![met(MetSite::Liver, 20)]);

        let before = RecistAssessment::for_case(&prior);
        let after = RecistAssessment::for_case(&follow);
        assert!(before.target_ids().contains("lung-RUL-longest-1"));
        assert!(!after.target_ids().contains("lung-RUL-longest-1"));
        assert!(after.nontarget_ids().contains("lung-RUL-longest-1"));
        assert_eq!(after.sld_mm, 20);

        // 原发灶ID首次出现在非靶集合中
        assert_eq!(assess_response(&prior, &follow), OverallResponse::ProgressionNonTarget);
    }
}
