//! 本体增强配置档
//!
//! 预设档位控制术语、解剖与伪影增强的开关以及增强比例上限。
//! 每个病例按档位分布抽取一个档位。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use synthrad_clinical::{Distribution, DistributionKey};
use synthrad_core::SynthError;

/// 默认档位分布
pub const DEFAULT_PROFILE_DIST: &str = "standard:1.0";

/// 增强档位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnhancementProfile {
    Minimal,      // 不做任何查询
    Standard,     // 全部增强
    Aggressive,   // 全部增强，比例上限更高
    Conservative, // 仅术语增强，保留原始用词
}

/// 档位对应的增强开关
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileSettings {
    pub enhance_terminology: bool,
    pub enhance_anatomy: bool,
    pub enhance_artifacts: bool,
    pub preserve_original_terms: bool,
    /// 可查询条目占全部所见的比例上限
    pub max_enhancement_ratio: f64,
}

impl EnhancementProfile {
    pub const ALL: [EnhancementProfile; 4] = [
        EnhancementProfile::Minimal,
        EnhancementProfile::Standard,
        EnhancementProfile::Aggressive,
        EnhancementProfile::Conservative,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EnhancementProfile::Minimal => "minimal",
            EnhancementProfile::Standard => "standard",
            EnhancementProfile::Aggressive => "aggressive",
            EnhancementProfile::Conservative => "conservative",
        }
    }

    pub fn settings(&self) -> ProfileSettings {
        match self {
            EnhancementProfile::Minimal => ProfileSettings {
                enhance_terminology: false,
                enhance_anatomy: false,
                enhance_artifacts: false,
                preserve_original_terms: false,
                max_enhancement_ratio: 0.3,
            },
            EnhancementProfile::Standard => ProfileSettings {
                enhance_terminology: true,
                enhance_anatomy: true,
                enhance_artifacts: true,
                preserve_original_terms: false,
                max_enhancement_ratio: 0.3,
            },
            EnhancementProfile::Aggressive => ProfileSettings {
                enhance_terminology: true,
                enhance_anatomy: true,
                enhance_artifacts: true,
                preserve_original_terms: false,
                max_enhancement_ratio: 0.5,
            },
            EnhancementProfile::Conservative => ProfileSettings {
                enhance_terminology: true,
                enhance_anatomy: false,
                enhance_artifacts: false,
                preserve_original_terms: true,
                max_enhancement_ratio: 0.1,
            },
        }
    }

    /// 是否会发起任何查询
    pub fn is_enabled(&self) -> bool {
        let s = self.settings();
        s.enhance_terminology || s.enhance_anatomy || s.enhance_artifacts
    }
}

impl fmt::Display for EnhancementProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EnhancementProfile {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        EnhancementProfile::ALL
            .into_iter()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| SynthError::Validation(format!("未知的RadLex配置档: '{}'", s.trim())))
    }
}

impl DistributionKey for EnhancementProfile {
    const LABEL: &'static str = "radlex";
}

/// 档位分布
pub type ProfileDistribution = Distribution<EnhancementProfile>;

/// 解析档位分布，未知档位名为验证错误
pub fn parse_profile_distribution(input: &str) -> synthrad_core::Result<ProfileDistribution> {
    ProfileDistribution::parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use synthrad_core::utils::seeded_rng;

    #[test]
    fn test_profile_settings() {
        assert!(!EnhancementProfile::Minimal.is_enabled());
        assert!(EnhancementProfile::Standard.settings().enhance_anatomy);
        assert_eq!(EnhancementProfile::Aggressive.settings().max_enhancement_ratio, 0.5);

        let conservative = EnhancementProfile::Conservative.settings();
        assert!(conservative.enhance_terminology);
        assert!(!conservative.enhance_anatomy);
        assert!(conservative.preserve_original_terms);
        assert_eq!(conservative.max_enhancement_ratio, 0.1);
    }

    #[test]
    fn test_profile_from_str() {
        assert_eq!("Standard".parse::<EnhancementProfile>().unwrap(), EnhancementProfile::Standard);
        assert!("turbo".parse::<EnhancementProfile>().is_err());
    }

    #[test]
    fn test_profile_distribution() {
        let dist = parse_profile_distribution("minimal:1,standard:3").unwrap();
        assert!((dist.probability(EnhancementProfile::Standard) - 0.75).abs() < 1e-9);
        assert_eq!(dist.probability(EnhancementProfile::Aggressive), 0.0);

        let only = parse_profile_distribution(DEFAULT_PROFILE_DIST).unwrap();
        let mut rng = seeded_rng(11);
        for _ in 0..20 {
            assert_eq!(only.sample(&mut rng), EnhancementProfile::Standard);
        }
    }

    #[test]
    fn test_unknown_profile_rejected() {
        let err = parse_profile_distribution("standard:0.5,fancy:0.5").unwrap_err();
        assert!(matches!(err, SynthError::InvalidDistribution { .. }));
        assert!(parse_profile_distribution("minimal:0").is_err());
    }
}
