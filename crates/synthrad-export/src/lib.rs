//! # SynthRad 导出
//!
//! 负责生成结果的落盘：
//! - RECIST JSONL 记录
//! - 单病例组合JSON（元数据、临床真值、解剖映射）
//! - 按患者/检查分层的原子目录写入

pub mod case_file;
pub mod jsonl;
pub mod writer;

pub use case_file::{CaseDocument, ClinicalData};
pub use jsonl::{cohort_records, to_jsonl, LesionRecord, RecistRecord};
pub use writer::{OutputWriter, StoredCase};
