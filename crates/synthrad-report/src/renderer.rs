//! 报告渲染器
//!
//! 将病例渲染为自由文本报告。渲染只读取病例，不改变任何临床状态。

use crate::phrases::PhraseProvider;
use crate::styles::{fill, phrases_for, StylePhrases};
use std::collections::HashMap;
use synthrad_clinical::recist::{case_inventory, determine_response_status, Lesion, LesionKind};
use synthrad_core::utils::mm_desc;
use synthrad_core::{Case, Met, MetSite, Node, PrimaryFeature, ResponseCategory};
use tracing::debug;

/// 间隔变化阈值（百分比）
pub const INTERVAL_CHANGE_PCT: f64 = 20.0;

/// 附加图像层面引用的概率
const IMAGE_REFERENCE_PROBABILITY: f64 = 0.3;

/// 伪影描述出现的概率
const ARTIFACT_PROBABILITY: f64 = 0.4;

/// 单个病灶相对既往检查的变化
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntervalChange {
    Baseline,
    New,
    Stable { prior_mm: u32 },
    Increased { prior_mm: u32, delta_mm: i64 },
    Decreased { prior_mm: u32, delta_mm: i64 },
    Resolved { prior_mm: u32 },
}

impl IntervalChange {
    /// 比较当前与既往测量
    pub fn between(current_mm: u32, prior_mm: u32) -> Self {
        if prior_mm == 0 {
            return IntervalChange::New;
        }
        let delta_mm = i64::from(current_mm) - i64::from(prior_mm);
        let pct = delta_mm as f64 / f64::from(prior_mm) * 100.0;
        if pct >= INTERVAL_CHANGE_PCT {
            IntervalChange::Increased { prior_mm, delta_mm }
        } else if pct <= -INTERVAL_CHANGE_PCT {
            IntervalChange::Decreased { prior_mm, delta_mm }
        } else {
            IntervalChange::Stable { prior_mm }
        }
    }

    /// 附在病灶描述后的括注
    pub fn annotation(&self) -> String {
        match self {
            IntervalChange::Baseline => "(baseline measurement).".to_string(),
            IntervalChange::New => "(new finding).".to_string(),
            IntervalChange::Stable { prior_mm } => format!("(stable, was {} mm).", prior_mm),
            IntervalChange::Increased { prior_mm, delta_mm } => {
                format!("(increased from {} mm, Δ {:+} mm).", prior_mm, delta_mm)
            }
            IntervalChange::Decreased { prior_mm, delta_mm } => {
                format!("(decreased from {} mm, Δ {:+} mm).", prior_mm, delta_mm)
            }
            IntervalChange::Resolved { prior_mm } => format!("(resolved, was {} mm).", prior_mm),
        }
    }
}

/// 当前检查各病灶ID对应的间隔变化，以及既往存在而本次消失的病灶
#[derive(Debug, Clone, Default)]
pub struct IntervalSummary {
    pub changes: HashMap<String, IntervalChange>,
    pub resolved: Vec<Lesion>,
    /// (病灶类型, 同类序号) -> 病灶ID，取自病灶清单
    lesion_ids: HashMap<(LesionKind, usize), String>,
}

impl IntervalSummary {
    pub fn compute(case: &Case, prior: Option<&Case>) -> Self {
        let current = case_inventory(case);
        let lesion_ids = index_lesion_ids(&current);
        let Some(prior) = prior else {
            let changes = current
                .into_iter()
                .map(|l| (l.lesion_id, IntervalChange::Baseline))
                .collect();
            return Self {
                changes,
                resolved: Vec::new(),
                lesion_ids,
            };
        };

        let before = case_inventory(prior);
        let prior_sizes: HashMap<&str, u32> = before
            .iter()
            .map(|l| (l.lesion_id.as_str(), l.size_mm))
            .collect();

        let changes = current
            .iter()
            .map(|lesion| {
                let change = match prior_sizes.get(lesion.lesion_id.as_str()) {
                    Some(prior_mm) => IntervalChange::between(lesion.size_mm, *prior_mm),
                    None => IntervalChange::New,
                };
                (lesion.lesion_id.clone(), change)
            })
            .collect::<HashMap<_, _>>();

        let resolved = before
            .into_iter()
            .filter(|l| !changes.contains_key(&l.lesion_id))
            .collect();

        Self {
            changes,
            resolved,
            lesion_ids,
        }
    }

    /// 按类型与同类序号查找当前检查的病灶ID
    pub fn lesion_id(&self, kind: LesionKind, index: usize) -> Option<&str> {
        self.lesion_ids.get(&(kind, index)).map(String::as_str)
    }

    /// 按类型与序号取间隔变化；不在清单中的病灶按基线处理
    pub fn change_for(&self, kind: LesionKind, index: usize) -> IntervalChange {
        self.lesion_id(kind, index)
            .and_then(|id| self.changes.get(id))
            .cloned()
            .unwrap_or(IntervalChange::Baseline)
    }

    fn annotate(&self, kind: LesionKind, index: usize, text: &str) -> String {
        let change = self.change_for(kind, index);
        format!("{} {}", text.trim_end_matches('.'), change.annotation())
    }
}

fn index_lesion_ids(inventory: &[Lesion]) -> HashMap<(LesionKind, usize), String> {
    let mut counts: HashMap<LesionKind, usize> = HashMap::new();
    inventory
        .iter()
        .map(|lesion| {
            let index = counts.entry(lesion.kind).or_default();
            let key = (lesion.kind, *index);
            *index += 1;
            (key, lesion.lesion_id.clone())
        })
        .collect()
}

fn feature_text(features: &[PrimaryFeature]) -> String {
    let mut seen: Vec<&'static str> = Vec::new();
    for feature in features {
        let text = feature.canonical_text();
        if !seen.contains(&text) {
            seen.push(text);
        }
    }
    if seen.is_empty() {
        "smooth margins".to_string()
    } else {
        seen.join(", ")
    }
}

/// 测量值格式：100 mm 以上换算为厘米
pub fn fmt_mm(size_mm: u32) -> String {
    if size_mm < 100 {
        format!("{} mm", size_mm)
    } else {
        format!("{:.1} cm", f64::from(size_mm) / 10.0)
    }
}

fn node_phrase(node: &Node, concise: bool) -> String {
    let station = node.station;
    let size = mm_desc(node.short_axis_mm);
    let pathologic = node.short_axis_mm >= 10;
    match (concise, pathologic) {
        (true, true) => format!("{} node {} short axis (pathologic).", station, size),
        (true, false) => format!("{} node {} short axis.", station, size),
        (false, true) => format!(
            "Enlarged {} ({}) lymph node measuring {} in short axis.",
            station.label(),
            station,
            size
        ),
        (false, false) => format!("{} ({}) lymph node {} in short axis.", station.label(), station, size),
    }
}

/// 报告渲染器
#[derive(Debug, Default)]
pub struct ReportRenderer;

impl ReportRenderer {
    pub fn new() -> Self {
        Self
    }

    /// 渲染完整报告；`prior` 为同一患者的上一次检查
    pub fn render(&self, case: &Case, prior: Option<&Case>, phrases: &mut dyn PhraseProvider) -> String {
        let style = phrases_for(case.meta.radiologist_style);
        let concise = matches!(case.meta.radiologist_style, synthrad_core::NarrativeStyle::Concise);
        let interval = IntervalSummary::compute(case, prior);

        let mut lines = Vec::new();
        lines.push(
            "TECHNIQUE: CT chest, abdomen, and pelvis with IV contrast. Axial images with multiplanar reconstructions."
                .to_string(),
        );
        match case.meta.comparison_date {
            Some(date) => lines.push(format!("COMPARISON: {}.", date.format("%Y-%m-%d"))),
            None => lines.push("COMPARISON: None.".to_string()),
        }
        lines.push(String::new());
        lines.push("FINDINGS:".to_string());

        self.render_lungs(case, style, &interval, phrases, &mut lines);
        self.render_nodes(case, style, concise, &interval, phrases, &mut lines);
        self.render_pleura(case, style, &interval, phrases, &mut lines);
        self.render_abdomen(case, style, &interval, phrases, &mut lines);
        self.render_bones(case, style, &interval, phrases, &mut lines);

        if !interval.resolved.is_empty() {
            lines.push("Resolved since comparison:".to_string());
            for lesion in &interval.resolved {
                lines.push(format!(
                    "  {} {} {}",
                    lesion_kind_text(lesion.kind),
                    lesion.location.replace('_', " "),
                    IntervalChange::Resolved {
                        prior_mm: lesion.size_mm
                    }
                    .annotation()
                ));
            }
        }

        if phrases.chance(ARTIFACT_PROBABILITY) {
            lines.push(format!("Artifacts: {}", phrases.pick(style.artifact_phrases)));
        }

        lines.push(String::new());
        lines.push("IMPRESSION:".to_string());
        self.render_impression(case, prior, style, &interval, phrases, &mut lines);

        debug!(
            "Rendered report for {} visit {} ({} lines)",
            case.meta.patient_id,
            case.meta.visit_number,
            lines.len()
        );
        lines.join("\n")
    }

    fn met_text(
        &self,
        index: usize,
        met: &Met,
        style: &StylePhrases,
        interval: &IntervalSummary,
        phrases: &mut dyn PhraseProvider,
    ) -> String {
        let size = met.size_mm.to_string();
        let site = met.site.display_name();
        let text = fill(
            phrases.pick(style.metastasis_phrases),
            &[("site", site.as_str()), ("size", size.as_str())],
        );
        interval.annotate(LesionKind::Metastasis, index, &text)
    }

    fn render_lungs(
        &self,
        case: &Case,
        style: &StylePhrases,
        interval: &IntervalSummary,
        phrases: &mut dyn PhraseProvider,
        lines: &mut Vec<String>,
    ) {
        match case.primary.as_ref().filter(|p| p.size_mm > 0) {
            Some(primary) => {
                let size = primary.size_mm.to_string();
                let features = feature_text(&primary.features);
                let text = fill(
                    phrases.pick(style.primary_lesion_phrases),
                    &[
                        ("side", primary.lobe.description()),
                        ("size", size.as_str()),
                        ("features", features.as_str()),
                    ],
                );
                let mut text = interval.annotate(LesionKind::Primary, 0, &text);
                if phrases.chance(IMAGE_REFERENCE_PROBABILITY) {
                    let series = phrases.number(1, 5);
                    let image = phrases.number(100, 300);
                    text.push_str(&format!(" (S{}/I{})", series, image));
                }
                lines.push(format!("Lungs/Primary: {}", text));
            }
            None => lines.push(
                "Lungs/Primary: Clear lungs without focal mass or suspicious nodules.".to_string(),
            ),
        }

        for (i, met) in case.mets.iter().enumerate() {
            if met.site == MetSite::ContralateralLung {
                let text = self.met_text(i, met, style, interval, phrases);
                lines.push(format!("  {}", text));
            }
        }
    }

    fn render_nodes(
        &self,
        case: &Case,
        style: &StylePhrases,
        concise: bool,
        interval: &IntervalSummary,
        phrases: &mut dyn PhraseProvider,
        lines: &mut Vec<String>,
    ) {
        if case.nodes.is_empty() {
            lines.push(format!(
                "Mediastinum/Lymph nodes: {}",
                phrases.pick(style.normal_mediastinum)
            ));
        } else {
            lines.push("Mediastinum/Lymph nodes:".to_string());
            for (i, node) in case.nodes.iter().enumerate() {
                let text = interval.annotate(LesionKind::Node, i, &node_phrase(node, concise));
                lines.push(format!("  {}", text));
            }
        }
        lines.push(format!(
            "Great vessels: {}",
            phrases.pick(style.normal_great_vessels)
        ));
    }

    fn render_pleura(
        &self,
        case: &Case,
        style: &StylePhrases,
        interval: &IntervalSummary,
        phrases: &mut dyn PhraseProvider,
        lines: &mut Vec<String>,
    ) {
        let pleural: Vec<(usize, &Met)> = case
            .mets
            .iter()
            .enumerate()
            .filter(|(_, m)| m.site == MetSite::Pleura)
            .collect();
        if pleural.is_empty() {
            lines.push(format!("Pleura: {}", phrases.pick(style.normal_pleura)));
            return;
        }
        lines.push("Pleura:".to_string());
        for (i, met) in pleural {
            let text = self.met_text(i, met, style, interval, phrases);
            lines.push(format!("  {}", text));
        }
    }

    fn render_abdomen(
        &self,
        case: &Case,
        style: &StylePhrases,
        interval: &IntervalSummary,
        phrases: &mut dyn PhraseProvider,
        lines: &mut Vec<String>,
    ) {
        lines.push("Abdomen/Pelvis:".to_string());
        let mut ap_lines = Vec::new();
        for (i, met) in case.mets.iter().enumerate() {
            if met.site.is_abdominal() {
                let text = self.met_text(i, met, style, interval, phrases);
                ap_lines.push(format!("  {}", text));
            }
        }

        let has_liver_met = case.mets.iter().any(|m| m.site == MetSite::Liver);
        let has_adrenal_met = case
            .mets
            .iter()
            .any(|m| matches!(m.site, MetSite::AdrenalLeft | MetSite::AdrenalRight));
        for normal in style.normal_abdomen {
            let contradicts = (has_liver_met && (normal.contains("Liver") || normal.contains("hepatic")))
                || (has_adrenal_met && normal.contains("Adrenal"));
            if !contradicts {
                ap_lines.push(format!("  {}", normal));
            }
        }

        if ap_lines.is_empty() {
            ap_lines.push("  No acute abnormality in the abdomen or pelvis.".to_string());
        }
        lines.extend(ap_lines);
    }

    fn render_bones(
        &self,
        case: &Case,
        style: &StylePhrases,
        interval: &IntervalSummary,
        phrases: &mut dyn PhraseProvider,
        lines: &mut Vec<String>,
    ) {
        let mut bone = Vec::new();
        let mut brain = Vec::new();
        for (i, met) in case.mets.iter().enumerate() {
            match met.site {
                MetSite::Bone => bone.push(self.met_text(i, met, style, interval, phrases)),
                MetSite::Brain => brain.push(self.met_text(i, met, style, interval, phrases)),
                _ => {}
            }
        }

        if bone.is_empty() {
            lines.push(format!("Bones: {}", phrases.pick(style.normal_bones)));
        } else {
            lines.push("Bones:".to_string());
            lines.extend(bone.into_iter().map(|text| format!("  {}", text)));
        }

        // 脑部不在常规扫描范围内，仅在有转移灶时列出
        if !brain.is_empty() {
            lines.push("Brain:".to_string());
            lines.extend(brain.into_iter().map(|text| format!("  {}", text)));
        }
    }

    fn render_impression(
        &self,
        case: &Case,
        prior: Option<&Case>,
        style: &StylePhrases,
        interval: &IntervalSummary,
        phrases: &mut dyn PhraseProvider,
        lines: &mut Vec<String>,
    ) {
        match case.primary.as_ref().filter(|p| p.size_mm > 0) {
            Some(primary) => {
                let change = interval.change_for(LesionKind::Primary, 0);
                lines.push(format!(
                    "- Primary {} pulmonary neoplasm {} with {}; {}",
                    primary.lobe.description(),
                    fmt_mm(primary.size_mm),
                    feature_text(&primary.features),
                    change
                        .annotation()
                        .trim_start_matches('(')
                        .replace(").", ".")
                ));
            }
            None if prior.map_or(false, |p| p.primary.is_some()) => {
                lines.push("- No residual primary pulmonary mass.".to_string());
            }
            None => {}
        }

        let pathologic: Vec<String> = case
            .nodes
            .iter()
            .filter(|n| n.short_axis_mm >= 10)
            .map(|n| n.station.code().to_string())
            .collect();
        if pathologic.is_empty() {
            lines.push(format!("- {}", phrases.pick(style.normal_mediastinum)));
        } else {
            lines.push(format!(
                "- Nodal disease involving stations {}.",
                pathologic.join(", ")
            ));
        }

        if case.mets.is_empty() {
            lines.push("- No definite distant metastases identified.".to_string());
        } else {
            let sites: Vec<String> = case
                .mets
                .iter()
                .map(|m| format!("{} ({} mm)", m.site.display_name(), m.size_mm))
                .collect();
            lines.push(format!(
                "- Distant metastatic disease involving {}.",
                sites.join(", ")
            ));
        }

        lines.push(format!(
            "- Clinical stage {} ({}{}{}).",
            case.tnm.stage_group, case.tnm.t, case.tnm.n, case.tnm.m
        ));

        if let Some(prior) = prior {
            let status = case
                .response_status
                .unwrap_or_else(|| determine_response_status(prior, case));
            lines.push(format!("- RECIST 1.1 overall response: {}.", response_text(status)));
        }
    }
}

fn lesion_kind_text(kind: LesionKind) -> &'static str {
    match kind {
        LesionKind::Primary => "Primary lung lesion",
        LesionKind::Node => "Lymph node station",
        LesionKind::Metastasis => "Metastatic lesion,",
    }
}

fn response_text(status: ResponseCategory) -> &'static str {
    match status {
        ResponseCategory::CR => "complete response (CR)",
        ResponseCategory::PR => "partial response (PR)",
        ResponseCategory::SD => "stable disease (SD)",
        ResponseCategory::PD => "progressive disease (PD)",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phrases::SeededPhraseProvider;
    use chrono::NaiveDate;
    use synthrad_clinical::distribution::{ResponseDistribution, StageDistribution};
    use synthrad_clinical::timeline::{generate_case, generate_follow_up_case};
    use synthrad_core::{Lobe, NarrativeStyle, NodeStation, Primary};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 20).unwrap()
    }

    fn baseline(seed: u64) -> Case {
        generate_case(seed, &StageDistribution::default(), None, "P0001", date())
    }

    #[test]
    fn test_interval_change_thresholds() {
        assert_eq!(IntervalChange::between(30, 25), IntervalChange::Increased { prior_mm: 25, delta_mm: 5 });
        assert_eq!(IntervalChange::between(20, 25), IntervalChange::Decreased { prior_mm: 25, delta_mm: -5 });
        assert_eq!(IntervalChange::between(24, 25), IntervalChange::Stable { prior_mm: 25 });
        assert_eq!(IntervalChange::between(12, 0), IntervalChange::New);
        assert_eq!(
            IntervalChange::between(30, 25).annotation(),
            "(increased from 25 mm, Δ +5 mm)."
        );
    }

    #[test]
    fn test_baseline_report_sections() {
        let case = baseline(3);
        let mut phrases = SeededPhraseProvider::new(1);
        let report = ReportRenderer::new().render(&case, None, &mut phrases);
        assert!(report.starts_with("TECHNIQUE:"));
        assert!(report.contains("COMPARISON: None."));
        assert!(report.contains("FINDINGS:"));
        assert!(report.contains("Lungs/Primary:"));
        assert!(report.contains("Mediastinum/Lymph nodes"));
        assert!(report.contains("Pleura"));
        assert!(report.contains("Abdomen/Pelvis:"));
        assert!(report.contains("Bones"));
        assert!(report.contains("IMPRESSION:"));
        assert!(report.contains("(baseline measurement)."));
        assert!(!report.contains("RECIST 1.1 overall response"));
    }

    #[test]
    fn test_follow_up_report_mentions_comparison() {
        let prior = baseline(9);
        let follow = generate_follow_up_case(&prior, 10, date() + chrono::Duration::days(60), &ResponseDistribution::default());
        let mut phrases = SeededPhraseProvider::new(2);
        let report = ReportRenderer::new().render(&follow, Some(&prior), &mut phrases);
        assert!(report.contains("COMPARISON: 2024-05-20."));
        assert!(report.contains("RECIST 1.1 overall response"));
        assert!(!report.contains("baseline measurement"));
    }

    #[test]
    fn test_rendering_is_reproducible_with_seeded_provider() {
        let case = baseline(21);
        let renderer = ReportRenderer::new();
        let a = renderer.render(&case, None, &mut SeededPhraseProvider::for_study(5, &case.meta.accession_number));
        let b = renderer.render(&case, None, &mut SeededPhraseProvider::for_study(5, &case.meta.accession_number));
        assert_eq!(a, b);
    }

    #[test]
    fn test_rendering_does_not_mutate_case() {
        let case = baseline(4);
        let snapshot = case.clone();
        let _ = ReportRenderer::new().render(&case, None, &mut SeededPhraseProvider::new(0));
        assert_eq!(case, snapshot);
    }

    #[test]
    fn test_node_phrases_by_style() {
        let node = Node {
            station: NodeStation::Station7,
            short_axis_mm: 14,
        };
        assert_eq!(node_phrase(&node, true), "7 node 14 mm short axis (pathologic).");
        assert_eq!(
            node_phrase(&node, false),
            "Enlarged subcarinal (7) lymph node measuring 14 mm in short axis."
        );
        let small = Node {
            station: NodeStation::Station4R,
            short_axis_mm: 8,
        };
        assert_eq!(node_phrase(&small, true), "4R node subcentimeter short axis.");
        assert_eq!(
            node_phrase(&small, false),
            "Right lower paratracheal (4R) lymph node subcentimeter in short axis."
        );
    }

    #[test]
    fn test_feature_text() {
        assert_eq!(feature_text(&[]), "smooth margins");
        assert_eq!(
            feature_text(&[PrimaryFeature::Spiculation, PrimaryFeature::Spiculation, PrimaryFeature::Cavitation]),
            "spiculated margins, internal cavitation"
        );
    }

    #[test]
    fn test_resolved_lesions_listed() {
        let mut prior = baseline(12);
        prior.primary = Some(Primary {
            lobe: Lobe::Lul,
            size_mm: 30,
            features: vec![],
        });
        let mut current = prior.clone();
        current.meta.visit_number = 2;
        current.meta.comparison_date = Some(prior.meta.study_date);
        current.meta.radiologist_style = NarrativeStyle::Concise;
        current.primary = None;
        let report = ReportRenderer::new().render(&current, Some(&prior), &mut SeededPhraseProvider::new(3));
        assert!(report.contains("Resolved since comparison:"));
        assert!(report.contains("(resolved, was 30 mm)."));
        assert!(report.contains("No residual primary pulmonary mass."));
    }

    #[test]
    fn test_interval_ids_follow_inventory() {
        let mut prior = baseline(14);
        prior.primary = Some(Primary {
            lobe: Lobe::Rml,
            size_mm: 40,
            features: vec![],
        });
        prior.nodes = vec![
            Node {
                station: NodeStation::Station2R,
                short_axis_mm: 12,
            },
            Node {
                station: NodeStation::Station7,
                short_axis_mm: 10,
            },
        ];
        prior.mets = vec![Met {
            site: MetSite::Liver,
            size_mm: 20,
        }];
        let mut current = prior.clone();
        current.nodes[1].short_axis_mm = 15;
        current.mets[0].size_mm = 12;

        let interval = IntervalSummary::compute(&current, Some(&prior));
        let inventory = case_inventory(&current);
        assert_eq!(interval.lesion_id(LesionKind::Primary, 0), Some(inventory[0].lesion_id.as_str()));
        assert_eq!(interval.lesion_id(LesionKind::Node, 1), Some(inventory[2].lesion_id.as_str()));
        assert_eq!(interval.lesion_id(LesionKind::Metastasis, 0), Some(inventory[3].lesion_id.as_str()));
        assert_eq!(interval.lesion_id(LesionKind::Node, 2), None);

        assert_eq!(interval.change_for(LesionKind::Primary, 0), IntervalChange::Stable { prior_mm: 40 });
        assert_eq!(
            interval.change_for(LesionKind::Node, 1),
            IntervalChange::Increased { prior_mm: 10, delta_mm: 5 }
        );
        assert_eq!(
            interval.change_for(LesionKind::Metastasis, 0),
            IntervalChange::Decreased { prior_mm: 20, delta_mm: -8 }
        );

        let report = ReportRenderer::new().render(&current, Some(&prior), &mut SeededPhraseProvider::new(8));
        assert!(report.contains("(increased from 10 mm, Δ +5 mm)."));
        assert!(report.contains("(decreased from 20 mm, Δ -8 mm)."));
        assert!(!report.contains("baseline measurement"));
    }

    #[test]
    fn test_brain_metastasis_has_own_section() {
        let mut case = baseline(15);
        case.mets = vec![Met {
            site: MetSite::Brain,
            size_mm: 14,
        }];
        let report = ReportRenderer::new().render(&case, None, &mut SeededPhraseProvider::new(4));
        let lines: Vec<&str> = report.lines().collect();
        let bones = lines.iter().position(|l| l.starts_with("Bones:")).unwrap();
        let brain = lines.iter().position(|l| *l == "Brain:").unwrap();
        assert!(lines[bones].len() > "Bones:".len());
        assert_eq!(brain, bones + 1);
        assert!(lines[brain + 1].starts_with("  "));
        assert!(lines[brain + 1].contains("14"));

        case.mets.clear();
        let report = ReportRenderer::new().render(&case, None, &mut SeededPhraseProvider::new(4));
        assert!(!report.contains("Brain:"));
    }

    #[test]
    fn test_fmt_mm() {
        assert_eq!(fmt_mm(45), "45 mm");
        assert_eq!(fmt_mm(105), "10.5 cm");
    }
}
