//! SynthRad 命令行主程序

mod config;
mod run;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::Parser;
use crate::config::GeneratorConfig;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// 合成肺癌CT报告生成器命令行参数
#[derive(Parser, Debug)]
#[command(name = "synthrad")]
#[command(about = "Generate synthetic lung cancer CT reports with TNM-aware details")]
struct Args {
    /// 患者数量
    #[arg(long = "n")]
    patients: Option<usize>,

    /// 输出目录
    #[arg(long)]
    out: Option<PathBuf>,

    /// 随机种子
    #[arg(long)]
    seed: Option<u64>,

    /// 强制原发灶肺叶 (RUL, RML, RLL, LUL, LLL)
    #[arg(long)]
    lobe: Option<String>,

    /// 分期分布，例如 "I:0.25,II:0.25,III:0.30,IV:0.20"
    #[arg(long)]
    stage_dist: Option<String>,

    /// 旧模式下为每个基线生成一次随访
    #[arg(long)]
    follow_up: bool,

    /// 基线与随访间隔天数
    #[arg(long)]
    follow_up_days: Option<i64>,

    /// 每位患者最多检查次数 (2-10)
    #[arg(long)]
    studies_per_patient: Option<u32>,

    /// 随访反应分布，例如 "CR:0.1,PR:0.3,SD:0.4,PD:0.2"
    #[arg(long)]
    response_dist: Option<String>,

    /// 关闭RadLex解剖映射
    #[arg(long)]
    no_radlex: bool,

    /// RadLex增强档位分布，例如 "standard:0.7,conservative:0.3"
    #[arg(long)]
    radlex_dist: Option<String>,

    /// 旧模式：每位患者一次基线，可选一次随访
    #[arg(long)]
    legacy_mode: bool,

    /// 输出目录内的JSONL文件名
    #[arg(long)]
    jsonl: Option<String>,

    /// 日期锚点 (YYYY-MM-DD)，默认当天
    #[arg(long)]
    anchor_date: Option<NaiveDate>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 日志级别
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// 显式给出的命令行参数覆盖配置
    fn apply(&self, config: &mut GeneratorConfig) {
        if let Some(patients) = self.patients {
            config.patients = patients;
        }
        if let Some(out) = &self.out {
            config.out_dir = out.clone();
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(lobe) = &self.lobe {
            config.lobe = Some(lobe.clone());
        }
        if let Some(dist) = &self.stage_dist {
            config.stage_dist = dist.clone();
        }
        if self.follow_up {
            config.follow_up = true;
        }
        if let Some(days) = self.follow_up_days {
            config.follow_up_days = days;
        }
        if let Some(studies) = self.studies_per_patient {
            config.studies_per_patient = studies;
        }
        if let Some(dist) = &self.response_dist {
            config.response_dist = dist.clone();
        }
        if self.no_radlex {
            config.radlex = false;
        }
        if let Some(dist) = &self.radlex_dist {
            config.radlex_dist = dist.clone();
        }
        if self.legacy_mode {
            config.legacy_mode = true;
        }
        if let Some(jsonl) = &self.jsonl {
            config.jsonl = Some(jsonl.clone());
        }
        if let Some(date) = self.anchor_date {
            config.anchor_date = Some(date);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 初始化日志
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("启动SynthRad生成器...");

    let mut config = GeneratorConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    args.apply(&mut config);

    let plan = match config.validate(Local::now().date_naive()) {
        Ok(plan) => plan,
        Err(e) => {
            error!("输入校验失败: {}", e);
            return Err(e.into());
        }
    };

    info!("生成配置:");
    info!("  患者数量: {}", plan.cohort.patient_count);
    info!("  随机种子: {}", plan.cohort.seed);
    info!("  生成模式: {:?}", plan.cohort.mode);
    info!("  日期锚点: {}", plan.cohort.timeline.anchor_date);
    info!("  输出目录: {}", plan.out_dir.display());

    let mapper = run::build_mapper(&plan, &config.ontology).await;
    let summary = match run::run_cohort(&plan, mapper.as_ref()).await {
        Ok(summary) => summary,
        Err(e) => {
            error!("生成失败: {:#}", e);
            return Err(e);
        }
    };

    info!(
        "完成: {} 位患者, {} 次检查",
        summary.overview.total_patients, summary.overview.total_studies
    );
    match serde_json::to_string(&summary.overview) {
        Ok(overview) => info!("队列概览: {}", overview),
        Err(e) => error!("队列概览序列化失败: {}", e),
    }
    if let Some(path) = summary.jsonl_path {
        info!("JSONL: {}", path.display());
    }
    Ok(())
}
