//! 分期引擎
//!
//! 根据病灶测量值计算T、N、M分类及总体分期（简化的AJCC/IASLC规则）。
//! 全部为纯函数，不使用随机数。

use synthrad_core::{
    MCategory, Met, NCategory, Node, NodeStation, Primary, PrimaryFeature, StageGroup,
    TCategory, Tnm,
};

/// 淋巴结短径阳性阈值（mm）
pub const NODE_POSITIVE_MM: u32 = 10;

/// 纵隔站点（N2）
pub const N2_STATIONS: [NodeStation; 5] = [
    NodeStation::Station2R,
    NodeStation::Station4R,
    NodeStation::Station2L,
    NodeStation::Station4L,
    NodeStation::Station7,
];

/// 肺门/叶间站点（N1）
pub const N1_STATIONS: [NodeStation; 4] = [
    NodeStation::Station10R,
    NodeStation::Station11R,
    NodeStation::Station10L,
    NodeStation::Station11L,
];

/// T分期输入：肿瘤大小与结构侵犯标志
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TumorExtent {
    pub size_mm: u32,
    pub chest_wall_invasion: bool,
    pub main_bronchus_involved: bool,
    pub carina_involved: bool,
    pub separate_nodule_same_lobe: bool,
    pub separate_nodule_other_ipsilateral_lobe: bool,
    pub diaphragm_invasion: bool,
}

impl TumorExtent {
    /// 仅含大小的肿瘤范围
    pub fn from_size(size_mm: u32) -> Self {
        Self {
            size_mm,
            ..Self::default()
        }
    }

    /// 由已记录的原发灶构建：只有大小与胸壁侵犯会被持久化
    pub fn from_primary(primary: &Primary) -> Self {
        Self {
            size_mm: primary.size_mm,
            chest_wall_invasion: primary.has_feature(PrimaryFeature::ChestWallInvasion),
            ..Self::default()
        }
    }
}

/// 计算T分类及依据
pub fn t_category(extent: &TumorExtent) -> (TCategory, Vec<String>) {
    let mut reasons = Vec::new();

    if extent.carina_involved {
        reasons.push("T4 due to carina involvement".to_string());
        return (TCategory::T4, reasons);
    }

    let mut t = if extent.diaphragm_invasion || extent.chest_wall_invasion {
        reasons.push("T3 due to chest wall/diaphragm invasion".to_string());
        TCategory::T3
    } else {
        let (t, reason) = match extent.size_mm {
            0..=10 => (TCategory::T1a, "T1a because ≤10 mm"),
            11..=20 => (TCategory::T1b, "T1b because >10–20 mm"),
            21..=30 => (TCategory::T1c, "T1c because >20–30 mm"),
            31..=50 => (TCategory::T2a, "T2a because >30–50 mm"),
            51..=70 => (TCategory::T2b, "T2b because >50–70 mm"),
            _ => (TCategory::T3, "T3 because >70 mm"),
        };
        reasons.push(reason.to_string());
        t
    };

    if extent.main_bronchus_involved && t.is_t1() {
        t = TCategory::T2a;
        reasons.push("Involves main bronchus → at least T2".to_string());
    }
    if extent.separate_nodule_same_lobe {
        t = TCategory::T3;
        reasons.push("Separate tumor nodule(s) in same lobe → T3".to_string());
    }
    if extent.separate_nodule_other_ipsilateral_lobe {
        t = TCategory::T4;
        reasons.push("Separate tumor nodule in different ipsilateral lobe → T4".to_string());
    }

    (t, reasons)
}

/// 计算N分类及依据；N2优先于N1
pub fn n_category(nodes: &[Node]) -> (NCategory, Vec<String>) {
    let mut reasons = Vec::new();
    let mut has_n2 = false;
    let mut has_n1 = false;
    let mut largest: Option<&Node> = None;

    for node in nodes {
        let size = node.short_axis_mm;
        if size >= NODE_POSITIVE_MM && N2_STATIONS.contains(&node.station) {
            has_n2 = true;
            reasons.push(format!(
                "N2: station {} short-axis ≥10 mm ({} mm)",
                node.station, size
            ));
        }
        if size >= NODE_POSITIVE_MM && N1_STATIONS.contains(&node.station) {
            has_n1 = true;
            reasons.push(format!(
                "N1: station {} short-axis ≥10 mm ({} mm)",
                node.station, size
            ));
        }
        if largest.map_or(true, |l| size > l.short_axis_mm) {
            largest = Some(node);
        }
    }

    if has_n2 {
        return (NCategory::N2, reasons);
    }
    if has_n1 {
        return (NCategory::N1, reasons);
    }

    let reason = match largest {
        Some(node) => format!(
            "No pathologically enlarged lymph nodes by size criteria (largest: station {} {} mm)",
            node.station, node.short_axis_mm
        ),
        None => "No pathologically enlarged lymph nodes by size criteria".to_string(),
    };
    (NCategory::N0, vec![reason])
}

/// 计算M分类及依据
pub fn m_category(mets: &[Met]) -> (MCategory, Vec<String>) {
    if mets.is_empty() {
        return (
            MCategory::M0,
            vec!["No definite distant metastases identified".to_string()],
        );
    }

    let extrathoracic = mets
        .iter()
        .filter(|met| !met.site.is_pleural_or_contralateral())
        .count();

    match extrathoracic {
        0 => (
            MCategory::M1a,
            vec!["M1a: pleural/contralateral lung disease".to_string()],
        ),
        1 => (
            MCategory::M1b,
            vec!["M1b: single extrathoracic metastasis".to_string()],
        ),
        _ => (
            MCategory::M1c,
            vec!["M1c: multiple extrathoracic metastases".to_string()],
        ),
    }
}

/// 由T/N/M推导总体分期
pub fn stage_group(t: TCategory, n: NCategory, m: MCategory) -> StageGroup {
    if m.is_metastatic() {
        return StageGroup::IV;
    }
    let t_major = t.major();
    match n {
        NCategory::N0 => match t_major {
            0 | 1 => StageGroup::I,
            2 => StageGroup::II,
            _ => StageGroup::III,
        },
        NCategory::N1 if t_major <= 2 => StageGroup::II,
        _ => StageGroup::III,
    }
}

/// 病例分期结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingResult {
    pub tnm: Tnm,
    pub t_reasons: Vec<String>,
    pub n_reasons: Vec<String>,
    pub m_reasons: Vec<String>,
}

impl StagingResult {
    /// 依次合并T/N/M依据
    pub fn rationale(&self) -> Vec<String> {
        self.t_reasons
            .iter()
            .chain(&self.n_reasons)
            .chain(&self.m_reasons)
            .cloned()
            .collect()
    }
}

/// 从病灶数据计算完整TNM；原发灶缺失或大小为0时记为T0
pub fn stage_lesions(primary: Option<&Primary>, nodes: &[Node], mets: &[Met]) -> StagingResult {
    let (t, t_reasons) = match primary.filter(|p| p.size_mm > 0) {
        Some(primary) => t_category(&TumorExtent::from_primary(primary)),
        None => (
            TCategory::T0,
            vec!["T0: no residual primary tumor identified".to_string()],
        ),
    };
    let (n, n_reasons) = n_category(nodes);
    let (m, m_reasons) = m_category(mets);

    StagingResult {
        tnm: Tnm {
            t,
            n,
            m,
            stage_group: stage_group(t, n, m),
        },
        t_reasons,
        n_reasons,
        m_reasons,
    }
}
