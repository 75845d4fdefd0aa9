//! 生成器配置
//!
//! 配置层次：内置默认值 → 可选TOML文件 → `SYNTHRAD_` 环境变量 → 命令行参数。
//! 合并后的配置在生成开始前统一校验一次。

use chrono::NaiveDate;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use synthrad_clinical::{
    validate_studies_per_patient, CohortMode, CohortSettings, ResponseDistribution,
    StageDistribution, TimelineOptions,
};
use synthrad_clinical::distribution::{DEFAULT_RESPONSE_DIST, DEFAULT_STAGE_DIST};
use synthrad_core::{Lobe, Result, SynthError};
use synthrad_ontology::{
    parse_profile_distribution, OntologySettings, ProfileDistribution, DEFAULT_PROFILE_DIST,
};
use tracing::info;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "SYNTHRAD";

/// 生成器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// 患者数量
    pub patients: usize,
    pub out_dir: PathBuf,
    pub seed: u64,
    /// 强制原发灶肺叶
    pub lobe: Option<String>,
    pub stage_dist: String,
    pub response_dist: String,
    /// 旧模式下是否生成一次随访
    pub follow_up: bool,
    pub follow_up_days: i64,
    /// 每位患者最多检查次数（2–10）
    pub studies_per_patient: u32,
    pub legacy_mode: bool,
    pub radlex: bool,
    pub radlex_dist: String,
    /// JSONL 文件名，位于输出目录内
    pub jsonl: Option<String>,
    /// 日期锚点，为空时使用当天
    pub anchor_date: Option<NaiveDate>,
    pub ontology: OntologySettings,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            patients: 5,
            out_dir: PathBuf::from("./out"),
            seed: 0,
            lobe: None,
            stage_dist: DEFAULT_STAGE_DIST.to_string(),
            response_dist: DEFAULT_RESPONSE_DIST.to_string(),
            follow_up: false,
            follow_up_days: 90,
            studies_per_patient: 5,
            legacy_mode: false,
            radlex: true,
            radlex_dist: DEFAULT_PROFILE_DIST.to_string(),
            jsonl: None,
            anchor_date: None,
            ontology: OntologySettings::default(),
        }
    }
}

/// 校验后的运行计划
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub cohort: CohortSettings,
    /// 未启用RadLex时为空
    pub profiles: Option<ProfileDistribution>,
    pub out_dir: PathBuf,
    pub jsonl: Option<String>,
}

impl GeneratorConfig {
    /// 合并默认值、配置文件与环境变量
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&GeneratorConfig::default())
            .map_err(|e| SynthError::Config(e.to_string()))?;

        let mut builder = Config::builder().add_source(defaults);
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: GeneratorConfig = builder
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| SynthError::Config(e.to_string()))?;

        match config_path {
            Some(path) => info!("Configuration loaded from: {}", path.display()),
            None => info!("Configuration loaded from defaults and environment"),
        }
        Ok(config)
    }

    /// 校验全部输入并解析分布；任何错误都在生成前返回
    pub fn validate(&self, today: NaiveDate) -> Result<RunPlan> {
        if self.patients == 0 {
            return Err(SynthError::Validation("患者数量必须至少为1".to_string()));
        }
        validate_studies_per_patient(self.studies_per_patient)?;
        if self.follow_up_days <= 0 {
            return Err(SynthError::Validation(format!(
                "随访间隔必须为正数，实际为 {}",
                self.follow_up_days
            )));
        }

        let stage_dist = StageDistribution::parse(&self.stage_dist)?;
        let response_dist = ResponseDistribution::parse(&self.response_dist)?;
        let lobe = self
            .lobe
            .as_deref()
            .filter(|code| !code.trim().is_empty())
            .map(str::parse::<Lobe>)
            .transpose()?;
        let profiles = if self.radlex {
            Some(parse_profile_distribution(&self.radlex_dist)?)
        } else {
            None
        };
        if let Some(name) = &self.jsonl {
            if name.trim().is_empty() || Path::new(name).file_name().is_none() {
                return Err(SynthError::Validation(format!("无效的JSONL文件名: '{}'", name)));
            }
        }

        let timeline = TimelineOptions {
            stage_dist,
            response_dist,
            lobe,
            max_studies: self.studies_per_patient,
            anchor_date: self.anchor_date.unwrap_or(today),
        };
        timeline.validate()?;

        let mode = if self.legacy_mode {
            CohortMode::Legacy {
                follow_up: self.follow_up,
                follow_up_days: self.follow_up_days,
            }
        } else {
            CohortMode::Longitudinal
        };

        Ok(RunPlan {
            cohort: CohortSettings {
                patient_count: self.patients,
                seed: self.seed,
                mode,
                timeline,
            },
            profiles,
            out_dir: self.out_dir.clone(),
            jsonl: self.jsonl.clone(),
        })
    }
}
