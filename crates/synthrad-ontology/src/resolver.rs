//! 概念解析接口
//!
//! 将报告术语解析为本体概念。解析是尽力而为的旁路，
//! 任何失败都以 `None` 表示，不影响临床字段。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 本体概念
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    pub label: String,
    /// 概念IRI
    pub identifier: String,
    /// RadLex编号，例如 `RID13170`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notation: Option<String>,
    #[serde(default)]
    pub parents: Vec<String>,
}

impl Concept {
    /// 创建无父概念的概念
    pub fn new(label: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            identifier: identifier.into(),
            notation: None,
            parents: Vec::new(),
        }
    }

    pub fn with_notation(mut self, notation: impl Into<String>) -> Self {
        self.notation = Some(notation.into());
        self
    }
}

/// 术语类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermCategory {
    Anatomy,  // 解剖部位
    Finding,  // 影像所见
    Artifact, // 伪影
}

/// 解析上下文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveContext {
    pub category: TermCategory,
    /// 附加检索词，例如 "lung"、"mediastinal"
    pub hints: Vec<String>,
}

impl ResolveContext {
    pub fn new(category: TermCategory) -> Self {
        Self {
            category,
            hints: Vec::new(),
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    /// 缓存键：术语与上下文词统一小写后以 `|` 连接
    pub fn cache_key(&self, term: &str) -> String {
        let mut key = term.to_lowercase();
        for hint in &self.hints {
            key.push('|');
            key.push_str(&hint.to_lowercase());
        }
        key
    }
}

/// 概念解析器
#[async_trait]
pub trait ConceptResolver: Send + Sync {
    /// 解析器名称
    fn name(&self) -> &str;

    /// 解析术语；不可用或未命中时返回 `None`
    async fn resolve(&self, term: &str, context: &ResolveContext) -> Option<Concept>;
}

/// 空解析器，始终返回 `None`
#[derive(Debug, Clone, Copy, Default)]
pub struct NullResolver;

#[async_trait]
impl ConceptResolver for NullResolver {
    fn name(&self) -> &str {
        "null"
    }

    async fn resolve(&self, _term: &str, _context: &ResolveContext) -> Option<Concept> {
        None
    }
}

/// 常用胸部术语的种子概念
const SEED_CONCEPTS: &[(&str, &str, &str)] = &[
    ("lung", "http://radlex.org/RID12780", "RID12780"),
    ("right lung", "http://radlex.org/RID13168", "RID13168"),
    ("left lung", "http://radlex.org/RID13169", "RID13169"),
    ("right upper lobe of lung", "http://radlex.org/RID13170", "RID13170"),
    ("right middle lobe of lung", "http://radlex.org/RID13171", "RID13171"),
    ("right lower lobe of lung", "http://radlex.org/RID13172", "RID13172"),
    ("left upper lobe of lung", "http://radlex.org/RID13173", "RID13173"),
    ("left lower lobe of lung", "http://radlex.org/RID13174", "RID13174"),
    ("mediastinum", "http://radlex.org/RID1310", "RID1310"),
    ("lymph node", "http://radlex.org/RID13176", "RID13176"),
    ("mass", "http://radlex.org/RID49492", "RID49492"),
    ("nodule", "http://radlex.org/RID49493", "RID49493"),
    ("metastasis", "http://radlex.org/RID49494", "RID49494"),
    ("liver", "http://radlex.org/RID12781", "RID12781"),
    ("brain", "http://radlex.org/RID12782", "RID12782"),
    ("bone", "http://radlex.org/RID12783", "RID12783"),
    ("adrenal gland", "http://radlex.org/RID12784", "RID12784"),
    ("kidney", "http://radlex.org/RID12785", "RID12785"),
];

/// 离线种子表中的概念
pub fn seed_concept(term: &str) -> Option<Concept> {
    let term = term.trim().to_lowercase();
    SEED_CONCEPTS
        .iter()
        .find(|(label, _, _)| *label == term)
        .map(|(label, iri, rid)| Concept::new(*label, *iri).with_notation(*rid))
}

/// 基于内存表的解析器，可离线使用
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    concepts: HashMap<String, Concept>,
}

impl StaticResolver {
    /// 创建包含种子概念的解析器
    pub fn with_seed() -> Self {
        let mut resolver = Self::default();
        for (label, iri, rid) in SEED_CONCEPTS {
            resolver.insert(*label, Concept::new(*label, *iri).with_notation(*rid));
        }
        resolver
    }

    pub fn insert(&mut self, term: impl AsRef<str>, concept: Concept) {
        self.concepts.insert(term.as_ref().to_lowercase(), concept);
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }
}

#[async_trait]
impl ConceptResolver for StaticResolver {
    fn name(&self) -> &str {
        "static"
    }

    async fn resolve(&self, term: &str, _context: &ResolveContext) -> Option<Concept> {
        self.concepts.get(&term.trim().to_lowercase()).cloned()
    }
}
