//! 病灶采样器
//!
//! 根据分期提示与确定性随机源生成原发灶、区域淋巴结与远处转移。
//! 采样结果只在统计上与分期提示一致，最终分期以分期引擎重新计算的结果为准。

use crate::staging::{m_category, n_category, t_category, TumorExtent};
use rand::Rng;
use synthrad_core::{Lobe, Met, MetSite, Node, NodeStation, Primary, PrimaryFeature, StageGroup};
use tracing::debug;

/// 淋巴结短径采样范围（mm）
pub const NODE_SIZE_RANGE: (u32, u32) = (8, 18);

/// 转移灶大小采样范围（mm）
pub const MET_SIZE_RANGE: (u32, u32) = (6, 28);

/// 原发灶采样结果
#[derive(Debug, Clone)]
pub struct SampledPrimary {
    pub primary: Primary,
    /// 采样得到的气道/结构标志，仅用于生成T分期依据，不持久化
    pub extent: TumorExtent,
    pub reasons: Vec<String>,
}

/// 采样原发肿瘤
pub fn sample_primary<R: Rng + ?Sized>(
    lobe: Option<Lobe>,
    stage_hint: StageGroup,
    rng: &mut R,
) -> SampledPrimary {
    let lobe = lobe.unwrap_or_else(|| Lobe::ALL[rng.gen_range(0..Lobe::ALL.len())]);
    let size_mm = match stage_hint {
        StageGroup::I | StageGroup::II => rng.gen_range(12..=48),
        StageGroup::III => rng.gen_range(25..=75),
        StageGroup::IV => rng.gen_range(15..=65),
    };

    let mut features = Vec::new();
    let feature_odds = [
        (PrimaryFeature::Spiculation, 0.55),
        (PrimaryFeature::Cavitation, 0.12),
        (PrimaryFeature::Atelectasis, 0.22),
        (PrimaryFeature::PleuralInvasionSuspected, 0.18),
    ];
    for (feature, p) in feature_odds {
        if rng.gen_bool(p) {
            features.push(feature);
        }
    }
    let chest_wall_invasion = rng.gen_bool(0.08) && lobe.is_lower();
    if chest_wall_invasion {
        features.push(PrimaryFeature::ChestWallInvasion);
    }

    let extent = TumorExtent {
        size_mm,
        chest_wall_invasion,
        main_bronchus_involved: rng.gen_bool(0.07) && lobe.is_right(),
        carina_involved: rng.gen_bool(0.02),
        separate_nodule_same_lobe: rng.gen_bool(0.06),
        separate_nodule_other_ipsilateral_lobe: rng.gen_bool(0.04),
        diaphragm_invasion: rng.gen_bool(0.03) && lobe.is_lower(),
    };
    let (t, reasons) = t_category(&extent);
    debug!("Sampled primary {} {} mm, sampler T {}", lobe, size_mm, t);

    SampledPrimary {
        primary: Primary {
            lobe,
            size_mm,
            features,
        },
        extent,
        reasons,
    }
}

/// 采样区域淋巴结，站点不重复
pub fn sample_nodes<R: Rng + ?Sized>(stage_hint: StageGroup, rng: &mut R) -> (Vec<Node>, Vec<String>) {
    let count = match stage_hint {
        StageGroup::I => {
            // I期不采样淋巴结，仍消耗一次抽样以保持随机序列
            let _node_negative = rng.gen_bool(0.85);
            0
        }
        StageGroup::II | StageGroup::III => rng.gen_range(1..=3),
        StageGroup::IV => rng.gen_range(0..=2),
    };

    let nodes: Vec<Node> = draw_without_replacement(rng, &NodeStation::ALL, &[], count)
        .into_iter()
        .map(|station| Node {
            station,
            short_axis_mm: rng.gen_range(NODE_SIZE_RANGE.0..=NODE_SIZE_RANGE.1),
        })
        .collect();
    let (_, reasons) = n_category(&nodes);
    (nodes, reasons)
}

/// 采样远处转移，部位不重复
pub fn sample_mets<R: Rng + ?Sized>(stage_hint: StageGroup, rng: &mut R) -> (Vec<Met>, Vec<String>) {
    let none_probability = match stage_hint {
        StageGroup::I | StageGroup::II => Some(0.93),
        StageGroup::III => Some(0.85),
        StageGroup::IV => None,
    };
    let empty = none_probability.map_or(false, |p| rng.gen_bool(p));

    let mets: Vec<Met> = if empty {
        Vec::new()
    } else {
        let count = rng.gen_range(1..=2);
        draw_without_replacement(rng, &MetSite::ALL, &[], count)
            .into_iter()
            .map(|site| Met {
                site,
                size_mm: rng.gen_range(MET_SIZE_RANGE.0..=MET_SIZE_RANGE.1),
            })
            .collect()
    };
    let (_, reasons) = m_category(&mets);
    (mets, reasons)
}

/// 从词表中不放回地抽取最多 `count` 个未被占用的值
pub fn draw_without_replacement<T, R>(rng: &mut R, pool: &[T], used: &[T], count: usize) -> Vec<T>
where
    T: Copy + PartialEq,
    R: Rng + ?Sized,
{
    let mut available: Vec<T> = pool.iter().copied().filter(|v| !used.contains(v)).collect();
    let mut drawn = Vec::with_capacity(count);
    for _ in 0..count {
        if available.is_empty() {
            break;
        }
        let idx = rng.gen_range(0..available.len());
        drawn.push(available.remove(idx));
    }
    drawn
}
