//! 解剖映射
//!
//! 为病例构建分层解剖图：胸部区域层级、原发灶、淋巴结与转移灶，
//! 每个条目带有解剖层级、侧别、上级结构、本体编号与靶病灶标记。
//! 本体查询按增强档位进行，失败时字段保持为空。

use crate::profile::EnhancementProfile;
use crate::resolver::{Concept, ConceptResolver, NullResolver, ResolveContext, TermCategory};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use synthrad_clinical::{case_inventory, LesionKind, RecistAssessment};
use synthrad_core::{Case, Laterality, Lobe, MetSite, NodeStation, PrimaryFeature};
use tracing::debug;

/// 带本体映射的解剖位置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnatomicLocation {
    pub name: String,
    pub radlex_id: Option<String>,
    pub radlex_label: Option<String>,
    pub parent_location: Option<String>,
    /// lobe、station、organ 或 system
    pub level: String,
    pub laterality: Option<Laterality>,
}

/// 所见类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingType {
    PrimaryTumor,
    LymphNode,
    Metastasis,
}

impl FindingType {
    /// 本体检索用的术语
    fn term(&self) -> &'static str {
        match self {
            FindingType::PrimaryTumor => "lung mass",
            FindingType::LymphNode => "enlarged lymph node",
            FindingType::Metastasis => "metastasis",
        }
    }
}

/// 带解剖映射的病灶
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LesionFinding {
    pub lesion_id: String,
    pub finding_type: FindingType,
    pub anatomic_location: AnatomicLocation,
    pub size_mm: u32,
    pub features: Vec<PrimaryFeature>,
    pub radlex_id: Option<String>,
    pub radlex_label: Option<String>,
    pub target_lesion: bool,
}

/// 区域内的所见摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionFinding {
    pub finding_type: FindingType,
    pub location: String,
    pub size_mm: u32,
    pub radlex_id: Option<String>,
}

/// 解剖区域
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub findings: Vec<RegionFinding>,
    pub subregions: BTreeMap<String, Region>,
}

impl Region {
    fn add(&mut self, finding: &LesionFinding) {
        self.findings.push(RegionFinding {
            finding_type: finding.finding_type,
            location: finding.anatomic_location.name.clone(),
            size_mm: finding.size_mm,
            radlex_id: finding.radlex_id.clone(),
        });
    }

    fn add_to_subregion(&mut self, name: &str, finding: &LesionFinding) {
        self.subregions.entry(name.to_string()).or_default().add(finding);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lungs {
    pub right_lung: Region,
    pub left_lung: Region,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mediastinum {
    pub lymph_nodes: Region,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thorax {
    pub lungs: Lungs,
    pub mediastinum: Mediastinum,
    pub pleura: Region,
}

/// 身体区域层级
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BodyRegions {
    pub thorax: Thorax,
}

/// 单次检查的解剖图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnatomicMap {
    pub patient_id: String,
    pub study_date: NaiveDate,
    pub profile: Option<EnhancementProfile>,
    pub body_regions: BodyRegions,
    pub lesions: Vec<LesionFinding>,
    pub lymph_nodes: Vec<LesionFinding>,
    pub metastases: Vec<LesionFinding>,
}

impl AnatomicMap {
    /// 空解剖图，用于未启用映射或映射失败的情况
    pub fn skeleton(patient_id: impl Into<String>, study_date: NaiveDate) -> Self {
        Self {
            patient_id: patient_id.into(),
            study_date,
            profile: None,
            body_regions: BodyRegions::default(),
            lesions: Vec::new(),
            lymph_nodes: Vec::new(),
            metastases: Vec::new(),
        }
    }

    pub fn finding_count(&self) -> usize {
        self.lesions.len() + self.lymph_nodes.len() + self.metastases.len()
    }

    /// 已获得本体编号的条目数（位置或所见）
    pub fn enhanced_count(&self) -> usize {
        self.lesions
            .iter()
            .chain(&self.lymph_nodes)
            .chain(&self.metastases)
            .filter(|f| f.radlex_id.is_some() || f.anatomic_location.radlex_id.is_some())
            .count()
    }
}

fn lobe_parent(lobe: Lobe) -> &'static str {
    if lobe.is_right() {
        "right_lung"
    } else {
        "left_lung"
    }
}

fn lobe_term(lobe: Lobe) -> String {
    format!("{} of lung", lobe.description())
}

fn station_term(station: NodeStation) -> String {
    format!("{} lymph node", station.label())
}

fn site_term(site: MetSite) -> String {
    match site {
        MetSite::AdrenalRight | MetSite::AdrenalLeft => "adrenal gland".to_string(),
        MetSite::ContralateralLung => "lung".to_string(),
        MetSite::RetroperitonealNodes => "retroperitoneal lymph node".to_string(),
        other => other.display_name(),
    }
}

/// 本次映射允许的查询次数
struct LookupBudget {
    remaining: usize,
}

impl LookupBudget {
    fn for_profile(profile: EnhancementProfile, findings: usize) -> Self {
        let settings = profile.settings();
        let per_finding =
            usize::from(settings.enhance_anatomy) + usize::from(settings.enhance_terminology);
        let candidates = findings * per_finding;
        let remaining = (settings.max_enhancement_ratio * candidates as f64 - 1e-9).ceil() as usize;
        Self {
            remaining: remaining.min(candidates),
        }
    }

    fn take(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

/// 解剖映射器
#[derive(Clone)]
pub struct AnatomicMapper {
    resolver: Arc<dyn ConceptResolver>,
}

impl AnatomicMapper {
    pub fn new(resolver: Arc<dyn ConceptResolver>) -> Self {
        Self { resolver }
    }

    /// 不进行任何本体查询的映射器
    pub fn offline() -> Self {
        Self::new(Arc::new(NullResolver))
    }

    pub fn resolver_name(&self) -> &str {
        self.resolver.name()
    }

    async fn lookup(
        &self,
        budget: &mut LookupBudget,
        enabled: bool,
        term: &str,
        context: ResolveContext,
    ) -> Option<Concept> {
        if !enabled || !budget.take() {
            return None;
        }
        self.resolver.resolve(term, &context).await
    }

    /// 按档位为病例构建解剖图
    pub async fn map_case(&self, case: &Case, profile: EnhancementProfile) -> AnatomicMap {
        let settings = profile.settings();
        let inventory = case_inventory(case);
        let assessment = RecistAssessment::for_case(case);
        let target_ids = assessment.target_ids();
        let mut budget = LookupBudget::for_profile(profile, inventory.len());

        let mut map = AnatomicMap::skeleton(case.meta.patient_id.clone(), case.meta.study_date);
        map.profile = Some(profile);

        // 标签：保留原始用词时使用原始术语
        let label_for = |concept: &Concept, original: &str| {
            if settings.preserve_original_terms {
                original.to_string()
            } else {
                concept.label.clone()
            }
        };

        let mut nodes = case.nodes.iter();
        let mut mets = case.mets.iter();

        for lesion in &inventory {
            let (finding_type, location, features) = match lesion.kind {
                LesionKind::Primary => {
                    let Some(primary) = case.primary.as_ref() else {
                        continue;
                    };
                    let term = lobe_term(primary.lobe);
                    let concept = self
                        .lookup(
                            &mut budget,
                            settings.enhance_anatomy,
                            &term,
                            ResolveContext::new(TermCategory::Anatomy).with_hint("lung"),
                        )
                        .await;
                    let location = AnatomicLocation {
                        name: primary.lobe.code().to_string(),
                        radlex_id: concept.as_ref().map(|c| c.identifier.clone()),
                        radlex_label: concept.as_ref().map(|c| label_for(c, &term)),
                        parent_location: Some(lobe_parent(primary.lobe).to_string()),
                        level: "lobe".to_string(),
                        laterality: Some(primary.lobe.laterality()),
                    };
                    (FindingType::PrimaryTumor, location, primary.features.clone())
                }
                LesionKind::Node => {
                    let Some(node) = nodes.next() else {
                        continue;
                    };
                    let term = station_term(node.station);
                    let concept = self
                        .lookup(
                            &mut budget,
                            settings.enhance_anatomy,
                            &term,
                            ResolveContext::new(TermCategory::Anatomy).with_hint("mediastinal"),
                        )
                        .await;
                    let location = AnatomicLocation {
                        name: node.station.code().to_string(),
                        radlex_id: concept.as_ref().map(|c| c.identifier.clone()),
                        radlex_label: concept.as_ref().map(|c| label_for(c, &term)),
                        parent_location: Some("mediastinal_lymph_nodes".to_string()),
                        level: "station".to_string(),
                        laterality: Some(node.station.laterality()),
                    };
                    (FindingType::LymphNode, location, Vec::new())
                }
                LesionKind::Metastasis => {
                    let Some(met) = mets.next() else {
                        continue;
                    };
                    let term = site_term(met.site);
                    let concept = self
                        .lookup(
                            &mut budget,
                            settings.enhance_anatomy,
                            &term,
                            ResolveContext::new(TermCategory::Anatomy),
                        )
                        .await;
                    let location = AnatomicLocation {
                        name: met.site.code().to_string(),
                        radlex_id: concept.as_ref().map(|c| c.identifier.clone()),
                        radlex_label: concept.as_ref().map(|c| label_for(c, &term)),
                        parent_location: Some(met.site.anatomic_parent().to_string()),
                        level: met.site.anatomic_level().to_string(),
                        laterality: met.site.laterality(),
                    };
                    (FindingType::Metastasis, location, Vec::new())
                }
            };

            let finding_term = finding_type.term();
            let finding_concept = self
                .lookup(
                    &mut budget,
                    settings.enhance_terminology,
                    finding_term,
                    ResolveContext::new(TermCategory::Finding),
                )
                .await;

            let finding = LesionFinding {
                lesion_id: lesion.lesion_id.clone(),
                finding_type,
                anatomic_location: location,
                size_mm: lesion.size_mm,
                features,
                radlex_id: finding_concept.as_ref().map(|c| c.identifier.clone()),
                radlex_label: finding_concept.as_ref().map(|c| label_for(c, finding_term)),
                target_lesion: target_ids.contains(lesion.lesion_id.as_str()),
            };

            match finding_type {
                FindingType::PrimaryTumor => map.lesions.push(finding),
                FindingType::LymphNode => map.lymph_nodes.push(finding),
                FindingType::Metastasis => map.metastases.push(finding),
            }
        }

        map.body_regions = build_body_regions(case, &map);
        debug!(
            "Mapped {} findings for {} visit {} ({} enhanced, profile {})",
            map.finding_count(),
            case.meta.patient_id,
            case.meta.visit_number,
            map.enhanced_count(),
            profile
        );
        map
    }
}

/// 将所见归入胸部区域层级
fn build_body_regions(case: &Case, map: &AnatomicMap) -> BodyRegions {
    let mut regions = BodyRegions::default();
    let thorax = &mut regions.thorax;

    for lesion in &map.lesions {
        let lung = match lesion.anatomic_location.parent_location.as_deref() {
            Some("right_lung") => &mut thorax.lungs.right_lung,
            _ => &mut thorax.lungs.left_lung,
        };
        lung.add(lesion);
        lung.add_to_subregion(&lesion.anatomic_location.name, lesion);
    }

    for node in &map.lymph_nodes {
        thorax.mediastinum.lymph_nodes.add(node);
    }

    // 对侧肺转移放入原发灶对侧；无原发灶时无法判定侧别，归入左肺
    let primary_is_right = case.primary.as_ref().map(|p| p.lobe.is_right());
    for met in &map.metastases {
        match met.anatomic_location.name.as_str() {
            "pleura" => thorax.pleura.add(met),
            "contralateral_lung" => {
                let lung = if primary_is_right == Some(false) {
                    &mut thorax.lungs.right_lung
                } else {
                    &mut thorax.lungs.left_lung
                };
                lung.add(met);
            }
            _ => {}
        }
    }

    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StaticResolver;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use synthrad_core::{
        MCategory, Met, Meta, NCategory, NarrativeStyle, Node, Primary, StageGroup, TCategory, Tnm,
    };

    fn sample_case() -> Case {
        Case {
            meta: Meta {
                modality: synthrad_core::DEFAULT_MODALITY.to_string(),
                patient_id: "P0007".to_string(),
                visit_number: 1,
                study_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                comparison_date: None,
                accession_number: "2024030112345601".to_string(),
                study_uid: Default::default(),
                radiologist_style: NarrativeStyle::Concise,
            },
            primary: Some(Primary {
                lobe: Lobe::Rul,
                size_mm: 42,
                features: vec![PrimaryFeature::Spiculation],
            }),
            nodes: vec![
                Node { station: NodeStation::Station7, short_axis_mm: 14 },
                Node { station: NodeStation::Station4R, short_axis_mm: 8 },
            ],
            mets: vec![
                Met { site: MetSite::Liver, size_mm: 22 },
                Met { site: MetSite::ContralateralLung, size_mm: 9 },
            ],
            tnm: Tnm {
                t: TCategory::T3,
                n: NCategory::N2,
                m: MCategory::M1c,
                stage_group: StageGroup::IV,
            },
            rationale: Vec::new(),
            response_status: None,
        }
    }

    /// 记录调用次数的解析器
    struct CountingResolver {
        calls: AtomicUsize,
        inner: StaticResolver,
    }

    #[async_trait]
    impl ConceptResolver for CountingResolver {
        fn name(&self) -> &str {
            "counting"
        }

        async fn resolve(&self, term: &str, context: &ResolveContext) -> Option<Concept> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.resolve(term, context).await
        }
    }

    fn counting() -> Arc<CountingResolver> {
        let mut inner = StaticResolver::with_seed();
        inner.insert("lung mass", Concept::new("pulmonary mass", "http://radlex.org/RID50149"));
        Arc::new(CountingResolver {
            calls: AtomicUsize::new(0),
            inner,
        })
    }

    #[tokio::test]
    async fn test_offline_map_structure() {
        let case = sample_case();
        let map = AnatomicMapper::offline()
            .map_case(&case, EnhancementProfile::Standard)
            .await;

        assert_eq!(map.lesions.len(), 1);
        assert_eq!(map.lymph_nodes.len(), 2);
        assert_eq!(map.metastases.len(), 2);
        assert_eq!(map.enhanced_count(), 0);

        let primary = &map.lesions[0];
        assert_eq!(primary.lesion_id, "lung-RUL-longest-1");
        assert_eq!(primary.anatomic_location.parent_location.as_deref(), Some("right_lung"));
        assert_eq!(primary.anatomic_location.laterality, Some(Laterality::Right));
        assert!(primary.target_lesion);

        // 8 mm 淋巴结未达阈值，9 mm 转移灶也不是靶病灶
        assert!(map.lymph_nodes[0].target_lesion);
        assert!(!map.lymph_nodes[1].target_lesion);
        assert!(map.metastases[0].target_lesion);
        assert!(!map.metastases[1].target_lesion);
        assert_eq!(map.metastases[0].anatomic_location.parent_location.as_deref(), Some("abdomen"));

        let thorax = &map.body_regions.thorax;
        assert_eq!(thorax.lungs.right_lung.findings.len(), 1);
        assert!(thorax.lungs.right_lung.subregions.contains_key("RUL"));
        assert_eq!(thorax.lungs.left_lung.findings.len(), 1);
        assert_eq!(thorax.mediastinum.lymph_nodes.findings.len(), 2);
    }

    #[tokio::test]
    async fn test_minimal_profile_never_queries() {
        let resolver = counting();
        let mapper = AnatomicMapper::new(resolver.clone());
        let map = mapper.map_case(&sample_case(), EnhancementProfile::Minimal).await;
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
        assert_eq!(map.profile, Some(EnhancementProfile::Minimal));
    }

    #[tokio::test]
    async fn test_lookup_budget_caps_queries() {
        let resolver = counting();
        let mapper = AnatomicMapper::new(resolver.clone());
        let map = mapper.map_case(&sample_case(), EnhancementProfile::Standard).await;

        // 5 个病灶、每个2次查询，30% 上限为3次
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 3);
        let primary = &map.lesions[0];
        assert_eq!(
            primary.anatomic_location.radlex_id.as_deref(),
            Some("http://radlex.org/RID13170")
        );
        assert_eq!(primary.radlex_label.as_deref(), Some("pulmonary mass"));
    }

    #[tokio::test]
    async fn test_conservative_preserves_terms() {
        let resolver = counting();
        let mapper = AnatomicMapper::new(resolver.clone());
        let map = mapper
            .map_case(&sample_case(), EnhancementProfile::Conservative)
            .await;

        // 仅术语查询，上限 ceil(0.1 * 5) = 1
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        let primary = &map.lesions[0];
        assert!(primary.anatomic_location.radlex_id.is_none());
        assert_eq!(primary.radlex_id.as_deref(), Some("http://radlex.org/RID50149"));
        assert_eq!(primary.radlex_label.as_deref(), Some("lung mass"));
    }

    #[tokio::test]
    async fn test_mapping_leaves_clinical_fields_untouched() {
        let case = sample_case();
        let before = case.clone();
        let _ = AnatomicMapper::new(counting())
            .map_case(&case, EnhancementProfile::Aggressive)
            .await;
        assert_eq!(case, before);
    }

    #[test]
    fn test_skeleton_is_empty() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let map = AnatomicMap::skeleton("P0001", date);
        assert_eq!(map.finding_count(), 0);
        assert!(map.profile.is_none());
        assert!(map.body_regions.thorax.pleura.findings.is_empty());
    }
}
