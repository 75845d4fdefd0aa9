//! BioPortal RadLex 解析器
//!
//! 通过 BioPortal REST 接口检索 RadLex 概念。检索顺序为：
//! 缓存 → 种子表 → 精确检索 → 带上下文检索 → 最佳匹配 → 标注器。
//! 所有网络失败都记录 `warn!` 并返回 `None`。

use crate::rate_limit::RateLimiter;
use crate::resolver::{seed_concept, Concept, ConceptResolver, ResolveContext};
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use synthrad_core::{Result, SynthError};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// BioPortal 默认地址
pub const DEFAULT_BASE_URL: &str = "https://data.bioontology.org";

/// 读取API密钥的环境变量
pub const API_KEY_ENV: &str = "BIOPORTAL_API_KEY";

const ONTOLOGY: &str = "RADLEX";
const SEARCH_PAGE_SIZE: u32 = 10;

/// 本体服务配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OntologySettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub cache_file: Option<PathBuf>,
    pub rate_limit_per_second: f64,
    pub rate_limit_per_minute: usize,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for OntologySettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_file: Some(PathBuf::from("./radlex_cache/radlex_concepts.json")),
            rate_limit_per_second: 1.0,
            rate_limit_per_minute: 60,
            request_timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl OntologySettings {
    /// 配置中的密钥优先，其次读取环境变量
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

/// BioPortal 检索结果条目
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClassHit {
    #[serde(rename = "@id")]
    id: Option<String>,
    pref_label: Option<String>,
    notation: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchPage {
    #[serde(default)]
    collection: Vec<ClassHit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotationSpan {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Annotation {
    annotated_class: ClassHit,
    #[serde(default)]
    annotations: Vec<AnnotationSpan>,
}

impl ClassHit {
    fn into_concept(self) -> Option<Concept> {
        let label = self.pref_label.filter(|l| !l.is_empty())?;
        let identifier = self.id.filter(|i| !i.is_empty())?;
        Some(Concept {
            label,
            identifier,
            notation: self.notation,
            parents: Vec::new(),
        })
    }
}

/// 精确检索：标签与查询词忽略大小写相等的第一条
fn pick_exact(hits: Vec<ClassHit>, query: &str) -> Option<Concept> {
    hits.into_iter()
        .filter(|hit| {
            hit.pref_label
                .as_deref()
                .map(|l| l.eq_ignore_ascii_case(query))
                .unwrap_or(false)
        })
        .find_map(ClassHit::into_concept)
}

fn pick_best(hits: Vec<ClassHit>) -> Option<Concept> {
    hits.into_iter().next().and_then(ClassHit::into_concept)
}

fn pick_annotation(annotations: Vec<Annotation>) -> Option<Concept> {
    annotations
        .into_iter()
        .filter(|a| a.annotations.first().map(|s| !s.text.is_empty()).unwrap_or(true))
        .find_map(|a| a.annotated_class.into_concept())
}

/// 重试退避：250ms 起逐次翻倍
fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(250u64.saturating_mul(1u64 << attempt.min(6)))
}

async fn load_cache(path: &Path) -> HashMap<String, Concept> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => match serde_json::from_str::<HashMap<String, Concept>>(&text) {
            Ok(cache) => {
                info!("Loaded {} cached RadLex concepts", cache.len());
                cache
            }
            Err(e) => {
                warn!("Failed to parse RadLex cache {}: {}", path.display(), e);
                HashMap::new()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
        Err(e) => {
            warn!("Failed to load RadLex cache {}: {}", path.display(), e);
            HashMap::new()
        }
    }
}

/// BioPortal RadLex 解析器
pub struct BioPortalResolver {
    client: reqwest::Client,
    api_key: String,
    settings: OntologySettings,
    limiter: Arc<RateLimiter>,
    cache: Mutex<HashMap<String, Concept>>,
}

impl BioPortalResolver {
    /// 创建解析器并加载本地缓存；缺少API密钥时返回错误
    pub async fn new(settings: OntologySettings) -> Result<Self> {
        let limiter = Arc::new(RateLimiter::new(
            settings.rate_limit_per_second,
            settings.rate_limit_per_minute,
        ));
        Self::with_limiter(settings, limiter).await
    }

    /// 使用共享限流器创建解析器
    pub async fn with_limiter(settings: OntologySettings, limiter: Arc<RateLimiter>) -> Result<Self> {
        let api_key = settings
            .resolved_api_key()
            .ok_or_else(|| SynthError::Ontology(format!("缺少 {} 配置", API_KEY_ENV)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| SynthError::Ontology(format!("HTTP客户端创建失败: {}", e)))?;

        let cache = match &settings.cache_file {
            Some(path) => load_cache(path).await,
            None => HashMap::new(),
        };

        Ok(Self {
            client,
            api_key,
            settings,
            limiter,
            cache: Mutex::new(cache),
        })
    }

    pub fn settings(&self) -> &OntologySettings {
        &self.settings
    }

    /// 当前缓存条目数
    pub async fn cached_len(&self) -> usize {
        self.cache.lock().await.len()
    }

    /// 添加认证头
    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("Authorization", format!("apikey token={}", self.api_key))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    /// 概念资源地址，IRI 作为单个路径段编码
    fn class_url(&self, iri: &str, suffix: Option<&str>) -> Option<Url> {
        let mut url = Url::parse(&self.settings.base_url).ok()?;
        {
            let mut segments = url.path_segments_mut().ok()?;
            segments
                .pop_if_empty()
                .extend(["ontologies", ONTOLOGY, "classes", iri]);
            if let Some(suffix) = suffix {
                segments.push(suffix);
            }
        }
        Some(url)
    }

    /// 带限流与有限重试的请求；服务端错误与429会重试
    async fn fetch<T, F>(&self, what: &str, build: F) -> Option<T>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let attempts = self.settings.max_retries + 1;
        for attempt in 1..=attempts {
            self.limiter.acquire().await;
            match self.authorized(build()).send().await {
                Ok(response) if response.status().is_success() => {
                    return match response.json::<T>().await {
                        Ok(body) => Some(body),
                        Err(e) => {
                            warn!("RadLex {} response could not be decoded: {}", what, e);
                            None
                        }
                    };
                }
                Ok(response) => {
                    let status = response.status();
                    if !(status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS) {
                        warn!("RadLex {} request rejected: {}", what, status);
                        return None;
                    }
                    warn!("RadLex {} request failed ({}/{}): {}", what, attempt, attempts, status);
                }
                Err(e) => {
                    warn!("RadLex {} request failed ({}/{}): {}", what, attempt, attempts, e);
                }
            }
            if attempt < attempts {
                tokio::time::sleep(backoff(attempt)).await;
            }
        }
        None
    }

    async fn search(&self, query: &str, exact: bool) -> Vec<ClassHit> {
        let url = self.endpoint("search");
        let page_size = SEARCH_PAGE_SIZE.to_string();
        let page: Option<SearchPage> = self
            .fetch("search", || {
                let mut params = vec![
                    ("q", query),
                    ("ontologies", ONTOLOGY),
                    ("pagesize", page_size.as_str()),
                ];
                if exact {
                    params.push(("exact_match", "true"));
                }
                self.client.get(&url).query(&params)
            })
            .await;
        page.map(|p| p.collection).unwrap_or_default()
    }

    /// 精确检索
    pub async fn search_exact(&self, query: &str) -> Option<Concept> {
        pick_exact(self.search(query, true).await, query)
    }

    /// 非精确检索，取首条结果
    pub async fn search_best(&self, query: &str) -> Option<Concept> {
        pick_best(self.search(query, false).await)
    }

    /// 标注器兜底，可能匹配到短语中的片段
    pub async fn annotate_span(&self, text: &str) -> Option<Concept> {
        let url = self.endpoint("annotator");
        let body = serde_json::json!({ "text": text });
        let annotations: Option<Vec<Annotation>> = self
            .fetch("annotator", || {
                self.client
                    .post(&url)
                    .query(&[
                        ("ontologies", ONTOLOGY),
                        ("longest_only", "true"),
                        ("include", "prefLabel,synonym,definition,notation"),
                    ])
                    .json(&body)
            })
            .await;
        annotations.and_then(pick_annotation)
    }

    /// 父概念标签
    pub async fn fetch_parents(&self, iri: &str) -> Vec<String> {
        let Some(url) = self.class_url(iri, Some("parents")) else {
            warn!("Invalid RadLex base URL: {}", self.settings.base_url);
            return Vec::new();
        };
        let parents: Option<Vec<ClassHit>> = self
            .fetch("parents", || self.client.get(url.clone()))
            .await;
        parents
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.pref_label)
            .collect()
    }

    async fn cached(&self, key: &str, term: &str) -> Option<Concept> {
        let cache = self.cache.lock().await;
        cache
            .get(key)
            .or_else(|| cache.get(&term.to_lowercase()))
            .cloned()
    }

    /// 写入缓存并持久化
    async fn remember(&self, key: String, concept: Concept) {
        let snapshot = {
            let mut cache = self.cache.lock().await;
            cache.insert(key, concept);
            serde_json::to_string_pretty(&*cache)
        };
        let Some(path) = &self.settings.cache_file else {
            return;
        };
        let text = match snapshot {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to serialize RadLex cache: {}", e);
                return;
            }
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!("Failed to create RadLex cache directory {}: {}", parent.display(), e);
                return;
            }
        }
        match tokio::fs::write(path, text).await {
            Ok(()) => debug!("Saved RadLex cache to {}", path.display()),
            Err(e) => warn!("Failed to save RadLex cache {}: {}", path.display(), e),
        }
    }

    async fn lookup(&self, term: &str, context: &ResolveContext) -> Option<Concept> {
        if let Some(concept) = self.search_exact(term).await {
            return Some(concept);
        }
        if !context.hints.is_empty() {
            let boosted = format!("{} {}", term, context.hints.join(" "));
            if let Some(concept) = self.search_exact(&boosted).await {
                return Some(concept);
            }
            if let Some(concept) = self.search_best(&boosted).await {
                return Some(concept);
            }
        }
        if let Some(concept) = self.search_best(term).await {
            return Some(concept);
        }
        self.annotate_span(term).await
    }
}

#[async_trait]
impl ConceptResolver for BioPortalResolver {
    fn name(&self) -> &str {
        "bioportal"
    }

    async fn resolve(&self, term: &str, context: &ResolveContext) -> Option<Concept> {
        let key = context.cache_key(term);
        if let Some(concept) = self.cached(&key, term).await {
            return Some(concept);
        }
        if let Some(concept) = seed_concept(term) {
            return Some(concept);
        }

        let mut concept = self.lookup(term, context).await?;
        concept.parents = self.fetch_parents(&concept.identifier).await;
        debug!("Resolved '{}' to {} ({})", term, concept.label, concept.identifier);
        self.remember(key, concept.clone()).await;
        Some(concept)
    }
}
