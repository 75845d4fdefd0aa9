//! 核心数据模型定义
//!
//! 病例（Case）及其组成部分：原发肿瘤、区域淋巴结、远处转移、TNM分期与随访反应。
//! 所有解剖学词表均为封闭枚举，序列化为临床代码（如 "RUL"、"4R"、"adrenal_right"）。

use crate::error::SynthError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 检查类型
pub const DEFAULT_MODALITY: &str = "CT chest with IV contrast";

/// 侧别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Laterality {
    Left,
    Right,
    Central,
}

/// 肺叶
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Lobe {
    #[serde(rename = "RUL")]
    Rul, // 右上叶
    #[serde(rename = "RML")]
    Rml, // 右中叶
    #[serde(rename = "RLL")]
    Rll, // 右下叶
    #[serde(rename = "LUL")]
    Lul, // 左上叶
    #[serde(rename = "LLL")]
    Lll, // 左下叶
}

impl Lobe {
    pub const ALL: [Lobe; 5] = [Lobe::Rul, Lobe::Rml, Lobe::Rll, Lobe::Lul, Lobe::Lll];

    pub fn code(&self) -> &'static str {
        match self {
            Lobe::Rul => "RUL",
            Lobe::Rml => "RML",
            Lobe::Rll => "RLL",
            Lobe::Lul => "LUL",
            Lobe::Lll => "LLL",
        }
    }

    /// 报告中使用的解剖描述
    pub fn description(&self) -> &'static str {
        match self {
            Lobe::Rul => "right upper lobe",
            Lobe::Rml => "right middle lobe",
            Lobe::Rll => "right lower lobe",
            Lobe::Lul => "left upper lobe",
            Lobe::Lll => "left lower lobe",
        }
    }

    pub fn is_right(&self) -> bool {
        matches!(self, Lobe::Rul | Lobe::Rml | Lobe::Rll)
    }

    /// 下叶（胸壁/膈肌侵犯只可能出现在下叶）
    pub fn is_lower(&self) -> bool {
        matches!(self, Lobe::Rll | Lobe::Lll)
    }

    pub fn laterality(&self) -> Laterality {
        if self.is_right() {
            Laterality::Right
        } else {
            Laterality::Left
        }
    }
}

impl fmt::Display for Lobe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Lobe {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        Lobe::ALL
            .iter()
            .copied()
            .find(|lobe| lobe.code() == code)
            .ok_or_else(|| SynthError::Validation(format!("未知肺叶代码: {}", s)))
    }
}

/// 淋巴结分区（IASLC 站点）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeStation {
    #[serde(rename = "1R")]
    Station1R,
    #[serde(rename = "1L")]
    Station1L,
    #[serde(rename = "2R")]
    Station2R,
    #[serde(rename = "2L")]
    Station2L,
    #[serde(rename = "3A")]
    Station3A,
    #[serde(rename = "3P")]
    Station3P,
    #[serde(rename = "4R")]
    Station4R,
    #[serde(rename = "4L")]
    Station4L,
    #[serde(rename = "5")]
    Station5,
    #[serde(rename = "6")]
    Station6,
    #[serde(rename = "7")]
    Station7,
    #[serde(rename = "8")]
    Station8,
    #[serde(rename = "9")]
    Station9,
    #[serde(rename = "10R")]
    Station10R,
    #[serde(rename = "10L")]
    Station10L,
    #[serde(rename = "11R")]
    Station11R,
    #[serde(rename = "11L")]
    Station11L,
    #[serde(rename = "12R")]
    Station12R,
    #[serde(rename = "12L")]
    Station12L,
}

impl NodeStation {
    pub const ALL: [NodeStation; 19] = [
        NodeStation::Station1R,
        NodeStation::Station1L,
        NodeStation::Station2R,
        NodeStation::Station2L,
        NodeStation::Station3A,
        NodeStation::Station3P,
        NodeStation::Station4R,
        NodeStation::Station4L,
        NodeStation::Station5,
        NodeStation::Station6,
        NodeStation::Station7,
        NodeStation::Station8,
        NodeStation::Station9,
        NodeStation::Station10R,
        NodeStation::Station10L,
        NodeStation::Station11R,
        NodeStation::Station11L,
        NodeStation::Station12R,
        NodeStation::Station12L,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            NodeStation::Station1R => "1R",
            NodeStation::Station1L => "1L",
            NodeStation::Station2R => "2R",
            NodeStation::Station2L => "2L",
            NodeStation::Station3A => "3A",
            NodeStation::Station3P => "3P",
            NodeStation::Station4R => "4R",
            NodeStation::Station4L => "4L",
            NodeStation::Station5 => "5",
            NodeStation::Station6 => "6",
            NodeStation::Station7 => "7",
            NodeStation::Station8 => "8",
            NodeStation::Station9 => "9",
            NodeStation::Station10R => "10R",
            NodeStation::Station10L => "10L",
            NodeStation::Station11R => "11R",
            NodeStation::Station11L => "11L",
            NodeStation::Station12R => "12R",
            NodeStation::Station12L => "12L",
        }
    }

    /// 站点的解剖名称
    pub fn label(&self) -> &'static str {
        match self {
            NodeStation::Station1R => "right low cervical",
            NodeStation::Station1L => "left low cervical",
            NodeStation::Station2R => "right upper paratracheal",
            NodeStation::Station2L => "left upper paratracheal",
            NodeStation::Station3A => "prevascular",
            NodeStation::Station3P => "retrotracheal",
            NodeStation::Station4R => "right lower paratracheal",
            NodeStation::Station4L => "left lower paratracheal",
            NodeStation::Station5 => "subaortic (aortopulmonary window)",
            NodeStation::Station6 => "para-aortic",
            NodeStation::Station7 => "subcarinal",
            NodeStation::Station8 => "para-esophageal",
            NodeStation::Station9 => "pulmonary ligament",
            NodeStation::Station10R => "right hilar",
            NodeStation::Station10L => "left hilar",
            NodeStation::Station11R => "right interlobar",
            NodeStation::Station11L => "left interlobar",
            NodeStation::Station12R => "right lobar",
            NodeStation::Station12L => "left lobar",
        }
    }

    pub fn laterality(&self) -> Laterality {
        let code = self.code();
        if code.ends_with('R') {
            Laterality::Right
        } else if code.ends_with('L') {
            Laterality::Left
        } else {
            Laterality::Central
        }
    }
}

impl fmt::Display for NodeStation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for NodeStation {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        NodeStation::ALL
            .iter()
            .copied()
            .find(|station| station.code() == code)
            .ok_or_else(|| SynthError::Validation(format!("未知淋巴结站点: {}", s)))
    }
}

/// 转移部位
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MetSite {
    AdrenalRight,
    AdrenalLeft,
    Liver,
    Bone,
    Brain,
    ContralateralLung,
    Pleura,
    Peritoneum,
    Omentum,
    RetroperitonealNodes,
}

impl MetSite {
    pub const ALL: [MetSite; 10] = [
        MetSite::AdrenalRight,
        MetSite::AdrenalLeft,
        MetSite::Liver,
        MetSite::Bone,
        MetSite::Brain,
        MetSite::ContralateralLung,
        MetSite::Pleura,
        MetSite::Peritoneum,
        MetSite::Omentum,
        MetSite::RetroperitonealNodes,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            MetSite::AdrenalRight => "adrenal_right",
            MetSite::AdrenalLeft => "adrenal_left",
            MetSite::Liver => "liver",
            MetSite::Bone => "bone",
            MetSite::Brain => "brain",
            MetSite::ContralateralLung => "contralateral_lung",
            MetSite::Pleura => "pleura",
            MetSite::Peritoneum => "peritoneum",
            MetSite::Omentum => "omentum",
            MetSite::RetroperitonealNodes => "retroperitoneal_nodes",
        }
    }

    /// 报告文本中使用的名称（下划线替换为空格）
    pub fn display_name(&self) -> String {
        self.code().replace('_', " ")
    }

    /// 胸膜/对侧肺病灶（M1a），其余为胸外转移
    pub fn is_pleural_or_contralateral(&self) -> bool {
        matches!(self, MetSite::Pleura | MetSite::ContralateralLung)
    }

    /// 在报告的腹部/盆腔段落中描述
    pub fn is_abdominal(&self) -> bool {
        matches!(
            self,
            MetSite::AdrenalRight
                | MetSite::AdrenalLeft
                | MetSite::Liver
                | MetSite::Peritoneum
                | MetSite::Omentum
                | MetSite::RetroperitonealNodes
        )
    }

    /// 解剖上级结构
    pub fn anatomic_parent(&self) -> &'static str {
        match self {
            MetSite::Brain => "central_nervous_system",
            MetSite::Bone => "musculoskeletal",
            MetSite::ContralateralLung | MetSite::Pleura => "thorax",
            _ => "abdomen",
        }
    }

    pub fn anatomic_level(&self) -> &'static str {
        match self {
            MetSite::Bone => "system",
            _ => "organ",
        }
    }

    pub fn laterality(&self) -> Option<Laterality> {
        match self {
            MetSite::AdrenalRight => Some(Laterality::Right),
            MetSite::AdrenalLeft => Some(Laterality::Left),
            _ => None,
        }
    }
}

impl fmt::Display for MetSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// 原发肿瘤形态学特征
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PrimaryFeature {
    #[serde(rename = "spiculation")]
    Spiculation,
    #[serde(rename = "cavitation")]
    Cavitation,
    #[serde(rename = "atelectasis")]
    Atelectasis,
    #[serde(rename = "pleural_inv_suspected")]
    PleuralInvasionSuspected,
    #[serde(rename = "chest_wall_invasion")]
    ChestWallInvasion,
}

impl PrimaryFeature {
    pub fn code(&self) -> &'static str {
        match self {
            PrimaryFeature::Spiculation => "spiculation",
            PrimaryFeature::Cavitation => "cavitation",
            PrimaryFeature::Atelectasis => "atelectasis",
            PrimaryFeature::PleuralInvasionSuspected => "pleural_inv_suspected",
            PrimaryFeature::ChestWallInvasion => "chest_wall_invasion",
        }
    }

    /// 规范化的报告措辞
    pub fn canonical_text(&self) -> &'static str {
        match self {
            PrimaryFeature::Spiculation => "spiculated margins",
            PrimaryFeature::Cavitation => "internal cavitation",
            PrimaryFeature::Atelectasis => "adjacent volume loss",
            PrimaryFeature::PleuralInvasionSuspected => "pleural abutment; invasion not excluded",
            PrimaryFeature::ChestWallInvasion => {
                "erosion of adjacent rib compatible with chest wall invasion"
            }
        }
    }
}

/// T分期
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TCategory {
    T0,
    T1a,
    T1b,
    T1c,
    T2a,
    T2b,
    T3,
    T4,
}

impl TCategory {
    pub fn code(&self) -> &'static str {
        match self {
            TCategory::T0 => "T0",
            TCategory::T1a => "T1a",
            TCategory::T1b => "T1b",
            TCategory::T1c => "T1c",
            TCategory::T2a => "T2a",
            TCategory::T2b => "T2b",
            TCategory::T3 => "T3",
            TCategory::T4 => "T4",
        }
    }

    /// "T"之后的主数字
    pub fn major(&self) -> u8 {
        parse_t_major(self.code())
    }

    pub fn is_t1(&self) -> bool {
        matches!(self, TCategory::T1a | TCategory::T1b | TCategory::T1c)
    }
}

/// 解析T分期代码中"T"后的数字；无法解析时按4处理（偏向更晚期）
pub fn parse_t_major(code: &str) -> u8 {
    code.chars()
        .nth(1)
        .and_then(|c| c.to_digit(10))
        .map(|d| d as u8)
        .unwrap_or(4)
}

/// N分期
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NCategory {
    N0,
    N1,
    N2,
}

impl NCategory {
    pub fn code(&self) -> &'static str {
        match self {
            NCategory::N0 => "N0",
            NCategory::N1 => "N1",
            NCategory::N2 => "N2",
        }
    }
}

/// M分期
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MCategory {
    M0,
    M1a,
    M1b,
    M1c,
}

impl MCategory {
    pub fn code(&self) -> &'static str {
        match self {
            MCategory::M0 => "M0",
            MCategory::M1a => "M1a",
            MCategory::M1b => "M1b",
            MCategory::M1c => "M1c",
        }
    }

    pub fn is_metastatic(&self) -> bool {
        !matches!(self, MCategory::M0)
    }
}

macro_rules! display_by_code {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.code())
                }
            }
        )*
    };
}

display_by_code!(TCategory, NCategory, MCategory, PrimaryFeature);

/// 总体分期
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageGroup {
    I,
    II,
    III,
    IV,
}

impl StageGroup {
    pub const ALL: [StageGroup; 4] = [StageGroup::I, StageGroup::II, StageGroup::III, StageGroup::IV];

    pub fn code(&self) -> &'static str {
        match self {
            StageGroup::I => "I",
            StageGroup::II => "II",
            StageGroup::III => "III",
            StageGroup::IV => "IV",
        }
    }
}

impl fmt::Display for StageGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for StageGroup {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "I" => Ok(StageGroup::I),
            "II" => Ok(StageGroup::II),
            "III" => Ok(StageGroup::III),
            "IV" => Ok(StageGroup::IV),
            other => Err(SynthError::Validation(format!("未知分期: {}", other))),
        }
    }
}

/// RECIST反应类别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResponseCategory {
    CR, // 完全缓解
    PR, // 部分缓解
    SD, // 疾病稳定
    PD, // 疾病进展
}

impl ResponseCategory {
    pub const ALL: [ResponseCategory; 4] = [
        ResponseCategory::CR,
        ResponseCategory::PR,
        ResponseCategory::SD,
        ResponseCategory::PD,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            ResponseCategory::CR => "CR",
            ResponseCategory::PR => "PR",
            ResponseCategory::SD => "SD",
            ResponseCategory::PD => "PD",
        }
    }
}

impl fmt::Display for ResponseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ResponseCategory {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CR" => Ok(ResponseCategory::CR),
            "PR" => Ok(ResponseCategory::PR),
            "SD" => Ok(ResponseCategory::SD),
            "PD" => Ok(ResponseCategory::PD),
            other => Err(SynthError::Validation(format!("未知反应类别: {}", other))),
        }
    }
}

/// 放射科医生书写风格
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NarrativeStyle {
    Concise,  // 简洁
    Detailed, // 详细
}

impl NarrativeStyle {
    pub const ALL: [NarrativeStyle; 2] = [NarrativeStyle::Concise, NarrativeStyle::Detailed];

    pub fn code(&self) -> &'static str {
        match self {
            NarrativeStyle::Concise => "concise",
            NarrativeStyle::Detailed => "detailed",
        }
    }
}

/// 检查元数据
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Meta {
    pub modality: String,
    pub patient_id: String,
    pub visit_number: u32,                 // 1 = 基线
    pub study_date: NaiveDate,
    pub comparison_date: Option<NaiveDate>, // 仅基线为空
    pub accession_number: String,
    pub study_uid: Uuid,
    pub radiologist_style: NarrativeStyle,
}

/// 原发肿瘤
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Primary {
    pub lobe: Lobe,
    pub size_mm: u32,
    pub features: Vec<PrimaryFeature>,
}

impl Primary {
    pub fn has_feature(&self, feature: PrimaryFeature) -> bool {
        self.features.contains(&feature)
    }
}

/// 区域淋巴结
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Node {
    pub station: NodeStation,
    pub short_axis_mm: u32,
}

/// 远处转移
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Met {
    pub site: MetSite,
    pub size_mm: u32,
}

/// TNM分期结果
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tnm {
    #[serde(rename = "T")]
    pub t: TCategory,
    #[serde(rename = "N")]
    pub n: NCategory,
    #[serde(rename = "M")]
    pub m: MCategory,
    pub stage_group: StageGroup,
}

/// 一次影像检查的临床真值
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Case {
    pub meta: Meta,
    pub primary: Option<Primary>,
    pub nodes: Vec<Node>,
    pub mets: Vec<Met>,
    pub tnm: Tnm,
    pub rationale: Vec<String>,
    pub response_status: Option<ResponseCategory>,
}

impl Case {
    pub fn is_baseline(&self) -> bool {
        self.meta.visit_number == 1
    }

    /// 同一病例内淋巴结站点与转移部位均不重复
    pub fn has_unique_sites(&self) -> bool {
        let mut stations = HashSet::new();
        let mut sites = HashSet::new();
        self.nodes.iter().all(|node| stations.insert(node.station))
            && self.mets.iter().all(|met| sites.insert(met.site))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_t_major() {
        assert_eq!(parse_t_major("T1a"), 1);
        assert_eq!(parse_t_major("T0"), 0);
        assert_eq!(parse_t_major("T3"), 3);
        assert_eq!(parse_t_major("Tx"), 4);
        assert_eq!(parse_t_major("T"), 4);
        assert_eq!(TCategory::T2b.major(), 2);
    }

    #[test]
    fn test_vocabulary_codes_round_trip() {
        for lobe in Lobe::ALL {
            assert_eq!(lobe.code().parse::<Lobe>().unwrap(), lobe);
        }
        for station in NodeStation::ALL {
            assert_eq!(station.code().parse::<NodeStation>().unwrap(), station);
        }
        assert!("RXL".parse::<Lobe>().is_err());
        assert_eq!("lll".parse::<Lobe>().unwrap(), Lobe::Lll);
    }

    #[test]
    fn test_serialized_codes() {
        let node = Node {
            station: NodeStation::Station10R,
            short_axis_mm: 12,
        };
        let json = serde_json::to_string(&node).unwrap();
        assert_eq!(json, r#"{"station":"10R","short_axis_mm":12}"#);

        let met = Met {
            site: MetSite::AdrenalRight,
            size_mm: 14,
        };
        let json = serde_json::to_string(&met).unwrap();
        assert!(json.contains("\"adrenal_right\""));

        let feature = serde_json::to_string(&PrimaryFeature::PleuralInvasionSuspected).unwrap();
        assert_eq!(feature, "\"pleural_inv_suspected\"");
    }

    #[test]
    fn test_lobe_geometry() {
        assert!(Lobe::Rll.is_lower());
        assert!(Lobe::Lll.is_lower());
        assert!(!Lobe::Rml.is_lower());
        assert_eq!(Lobe::Lul.laterality(), Laterality::Left);
        assert_eq!(NodeStation::Station7.laterality(), Laterality::Central);
        assert!(MetSite::Pleura.is_pleural_or_contralateral());
        assert!(!MetSite::Liver.is_pleural_or_contralateral());
    }
}
