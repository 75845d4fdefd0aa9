//! 概率分布解析
//!
//! 解析 `"I:0.25,II:0.25,III:0.30,IV:0.20"` 形式的分布字符串，
//! 在任何采样开始前完成校验与归一化。

use rand::Rng;
use std::fmt;
use std::str::FromStr;
use synthrad_core::{ResponseCategory, Result, StageGroup, SynthError};

/// 默认分期分布
pub const DEFAULT_STAGE_DIST: &str = "I:0.25,II:0.25,III:0.30,IV:0.20";

/// 默认随访反应分布
pub const DEFAULT_RESPONSE_DIST: &str = "CR:0.1,PR:0.3,SD:0.4,PD:0.2";

/// 可作为分布键的类型
pub trait DistributionKey: FromStr + Copy + PartialEq + fmt::Display {
    /// 错误信息中使用的分布名称
    const LABEL: &'static str;
}

impl DistributionKey for StageGroup {
    const LABEL: &'static str = "stage";
}

impl DistributionKey for ResponseCategory {
    const LABEL: &'static str = "response";
}

/// 归一化后的离散分布，保留输入顺序
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution<K> {
    entries: Vec<(K, f64)>,
}

/// 分期分布
pub type StageDistribution = Distribution<StageGroup>;

/// 反应分布
pub type ResponseDistribution = Distribution<ResponseCategory>;

/// 将分布字符串拆分为 (键, 权重) 对，不做归一化
pub fn parse_weights(input: &str, label: &str) -> Result<Vec<(String, f64)>> {
    let invalid = |reason: String| SynthError::InvalidDistribution {
        label: label.to_string(),
        reason,
    };

    let mut pairs = Vec::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = part
            .split_once(':')
            .ok_or_else(|| invalid(format!("条目缺少冒号: '{}'", part)))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(invalid(format!("条目缺少键: '{}'", part)));
        }
        let weight: f64 = value
            .trim()
            .parse()
            .map_err(|_| invalid(format!("权重不是数字: '{}'", part)))?;
        if !weight.is_finite() || weight < 0.0 {
            return Err(invalid(format!("权重必须为非负有限数: '{}'", part)));
        }
        if pairs.iter().any(|(k, _): &(String, f64)| k == key) {
            return Err(invalid(format!("重复的键: '{}'", key)));
        }
        pairs.push((key.to_string(), weight));
    }

    if pairs.is_empty() {
        return Err(invalid("分布为空".to_string()));
    }
    Ok(pairs)
}

impl<K: DistributionKey> Distribution<K> {
    /// 由权重构建并归一化；总和必须大于0
    pub fn from_weights(weights: Vec<(K, f64)>) -> Result<Self> {
        let invalid = |reason: String| SynthError::InvalidDistribution {
            label: K::LABEL.to_string(),
            reason,
        };
        if weights.iter().any(|(_, w)| !w.is_finite() || *w < 0.0) {
            return Err(invalid("权重必须为非负有限数".to_string()));
        }
        let total: f64 = weights.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return Err(invalid(format!("{} distribution must sum > 0", K::LABEL)));
        }
        let entries = weights.into_iter().map(|(k, w)| (k, w / total)).collect();
        Ok(Self { entries })
    }

    /// 解析分布字符串
    pub fn parse(input: &str) -> Result<Self> {
        let mut weights = Vec::new();
        for (key, weight) in parse_weights(input, K::LABEL)? {
            let key = key.parse::<K>().map_err(|_| SynthError::InvalidDistribution {
                label: K::LABEL.to_string(),
                reason: format!("未知的键: '{}'", key),
            })?;
            weights.push((key, weight));
        }
        Self::from_weights(weights)
    }

    /// 归一化概率；不存在的键为0
    pub fn probability(&self, key: K) -> f64 {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, w)| *w)
            .unwrap_or(0.0)
    }

    pub fn entries(&self) -> &[(K, f64)] {
        &self.entries
    }

    /// 按输入顺序做加权采样
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> K {
        let r: f64 = rng.gen();
        let mut acc = 0.0;
        for (key, weight) in &self.entries {
            acc += weight;
            if r < acc {
                return *key;
            }
        }
        // 浮点累加误差时落到最后一个正权重的键
        self.entries
            .iter()
            .rev()
            .find(|(_, w)| *w > 0.0)
            .or_else(|| self.entries.last())
            .map(|(k, _)| *k)
            .unwrap_or_else(|| self.entries[0].0)
    }
}

impl<K: DistributionKey> fmt::Display for Distribution<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|(k, w)| format!("{}:{:.3}", k, w))
            .collect();
        f.write_str(&parts.join(","))
    }
}

impl Default for StageDistribution {
    fn default() -> Self {
        Self {
            entries: vec![
                (StageGroup::I, 0.25),
                (StageGroup::II, 0.25),
                (StageGroup::III, 0.30),
                (StageGroup::IV, 0.20),
            ],
        }
    }
}

impl Default for ResponseDistribution {
    fn default() -> Self {
        Self {
            entries: vec![
                (ResponseCategory::CR, 0.1),
                (ResponseCategory::PR, 0.3),
                (ResponseCategory::SD, 0.4),
                (ResponseCategory::PD, 0.2),
            ],
        }
    }
}

impl StageDistribution {
    /// 分期提示采样
    pub fn sample_stage<R: Rng + ?Sized>(&self, rng: &mut R) -> StageGroup {
        stage_hint_from_dist(self, rng)
    }
}

/// 按 I、II、III、IV 顺序做逆CDF采样；累积概率未覆盖随机数时返回III
pub fn stage_hint_from_dist<R: Rng + ?Sized>(dist: &StageDistribution, rng: &mut R) -> StageGroup {
    let r: f64 = rng.gen();
    let mut acc = 0.0;
    for stage in StageGroup::ALL {
        acc += dist.probability(stage);
        if r <= acc {
            return stage;
        }
    }
    StageGroup::III
}
