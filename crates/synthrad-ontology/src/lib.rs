//! # SynthRad 本体集成
//!
//! 可选的本体增强旁路，包括：
//! - 概念解析接口及空解析器、离线种子解析器
//! - BioPortal RadLex 解析器，带本地JSON缓存与有限重试
//! - 每秒/每分钟调用限流
//! - 增强档位及其分布
//! - 病例解剖映射
//!
//! 所有失败都视为“无增强”，不会影响临床字段。

pub mod bioportal;
pub mod mapper;
pub mod profile;
pub mod rate_limit;
pub mod resolver;

pub use bioportal::{BioPortalResolver, OntologySettings, API_KEY_ENV, DEFAULT_BASE_URL};
pub use mapper::{AnatomicLocation, AnatomicMap, AnatomicMapper, FindingType, LesionFinding};
pub use profile::{
    parse_profile_distribution, EnhancementProfile, ProfileDistribution, ProfileSettings,
    DEFAULT_PROFILE_DIST,
};
pub use rate_limit::RateLimiter;
pub use resolver::{Concept, ConceptResolver, NullResolver, ResolveContext, StaticResolver, TermCategory};
