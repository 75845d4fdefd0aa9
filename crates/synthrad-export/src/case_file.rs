//! 单病例组合JSON
//!
//! 文件包含检查元数据、临床真值与解剖映射三部分。

use serde::Serialize;
use synthrad_core::{Case, Met, Meta, Node, Primary, ResponseCategory, Tnm};
use synthrad_ontology::AnatomicMap;

/// 临床真值部分
#[derive(Debug, Serialize)]
pub struct ClinicalData<'a> {
    pub primary: Option<&'a Primary>,
    pub nodes: &'a [Node],
    pub mets: &'a [Met],
    pub tnm: &'a Tnm,
    pub rationale: &'a [String],
    pub response_status: Option<ResponseCategory>,
}

/// 组合文档
#[derive(Debug, Serialize)]
pub struct CaseDocument<'a> {
    pub meta: &'a Meta,
    pub clinical_data: ClinicalData<'a>,
    pub anatomic_mapping: &'a AnatomicMap,
}

impl<'a> CaseDocument<'a> {
    pub fn new(case: &'a Case, anatomic_mapping: &'a AnatomicMap) -> Self {
        Self {
            meta: &case.meta,
            clinical_data: ClinicalData {
                primary: case.primary.as_ref(),
                nodes: &case.nodes,
                mets: &case.mets,
                tnm: &case.tnm,
                rationale: &case.rationale,
                response_status: case.response_status,
            },
            anatomic_mapping,
        }
    }

    /// 带缩进的JSON文本
    pub fn to_json_pretty(&self) -> synthrad_core::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
