//! 输出目录写入
//!
//! 布局为 `<out>/<patient_id>/study_<NN>/<accession>.{txt,json}`。
//! 每个检查先写入同级临时目录，完成后整体重命名到位，
//! 中途失败不会留下不完整的检查目录。

use crate::case_file::CaseDocument;
use crate::jsonl::{to_jsonl, RecistRecord};
use std::path::{Path, PathBuf};
use synthrad_core::{Case, Meta, Result, SynthError};
use synthrad_ontology::AnatomicMap;
use tracing::{debug, info};

/// 已写入的单个检查
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCase {
    pub study_dir: PathBuf,
    pub report_path: PathBuf,
    pub json_path: PathBuf,
}

/// 输出写入器
#[derive(Debug, Clone)]
pub struct OutputWriter {
    base_path: PathBuf,
}

impl OutputWriter {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// 检查目录
    pub fn study_dir(&self, meta: &Meta) -> PathBuf {
        self.base_path
            .join(&meta.patient_id)
            .join(format!("study_{:02}", meta.visit_number))
    }

    /// 原子写入一个检查的报告与组合JSON
    pub async fn write_case(&self, case: &Case, report: &str, mapping: &AnatomicMap) -> Result<StoredCase> {
        let meta = &case.meta;
        if meta.patient_id.is_empty() || meta.accession_number.is_empty() {
            return Err(SynthError::Validation(
                "病例缺少患者ID或检查号，无法确定输出路径".to_string(),
            ));
        }

        let study_dir = self.study_dir(meta);
        let patient_dir = study_dir
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| SynthError::Internal(format!("无效的输出路径: {}", study_dir.display())))?;
        tokio::fs::create_dir_all(&patient_dir).await?;

        let document = CaseDocument::new(case, mapping).to_json_pretty()?;

        // 临时目录在患者目录内创建，保证重命名不跨文件系统
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&patient_dir)?;
        let file_stem = &meta.accession_number;
        tokio::fs::write(staging.path().join(format!("{}.txt", file_stem)), report).await?;
        tokio::fs::write(staging.path().join(format!("{}.json", file_stem)), document).await?;

        if tokio::fs::try_exists(&study_dir).await? {
            debug!("Replacing existing study directory {}", study_dir.display());
            tokio::fs::remove_dir_all(&study_dir).await?;
        }
        tokio::fs::rename(staging.path(), &study_dir).await?;
        // staging 析构时目录已不存在，清理失败会被忽略
        drop(staging);

        debug!(
            "Stored {} visit {} at {}",
            meta.patient_id,
            meta.visit_number,
            study_dir.display()
        );
        Ok(StoredCase {
            report_path: study_dir.join(format!("{}.txt", file_stem)),
            json_path: study_dir.join(format!("{}.json", file_stem)),
            study_dir,
        })
    }

    /// 原子写入 JSONL 文件，返回文件路径
    pub async fn write_jsonl(&self, filename: &str, records: &[RecistRecord]) -> Result<PathBuf> {
        let valid_name = Path::new(filename)
            .file_name()
            .map_or(false, |name| name == std::ffi::OsStr::new(filename));
        if !valid_name {
            return Err(SynthError::Validation(format!("无效的JSONL文件名: '{}'", filename)));
        }
        tokio::fs::create_dir_all(&self.base_path).await?;

        let text = to_jsonl(records)?;
        let path = self.base_path.join(filename);
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.base_path)?;
        let staged = staging.path().join(filename);
        tokio::fs::write(&staged, text).await?;
        tokio::fs::rename(&staged, &path).await?;

        info!("Created JSONL file: {} ({} records)", path.display(), records.len());
        Ok(path)
    }
}
