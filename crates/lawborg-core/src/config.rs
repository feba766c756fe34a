use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;

const DEFAULT_OFFICIAL_DOMAINS: &str =
    ".gov,federalregister.gov,courtlistener.com,supremecourt.gov,uscourts.gov,ecfr.gov";
const DEFAULT_ACADEMIC_DOMAINS: &str =
    ".edu,law.cornell.edu,ssrn.com,jstor.org,scholar.google.com,heinonline.org";
const DEFAULT_BLOCKED_DOMAINS: &str = "wikipedia.org";
const DEFAULT_JURISDICTION_MARKERS: &str = "united states,u.s.,usa,federal";

/// Full application configuration. Secrets and tunables both come from
/// env/.env; nothing is persisted.
#[derive(Debug, Clone)]
pub struct Config {
    // Web
    pub web_bind: String,
    pub web_port: u16,

    // Jurisdiction
    pub default_jurisdiction: String,
    /// Lower-case substrings that mark a query as already jurisdiction-scoped.
    pub jurisdiction_markers: Vec<String>,

    // Provider budgets
    pub provider_timeout_s: u64,
    pub extract_timeout_s: u64,
    /// Max in-flight requests per provider.
    pub provider_concurrency: usize,
    /// Max claims retrieving at once.
    pub retriever_fanout: usize,
    /// Whole-run deadline; 0 disables it.
    pub pipeline_timeout_s: u64,

    // Cascade
    pub desired_results: usize,
    pub extract_top_k: usize,
    pub extract_max_chars: usize,
    pub official_domains: Vec<String>,
    pub academic_domains: Vec<String>,
    pub blocked_domains: Vec<String>,
    pub knowledge_base_path: String,

    // Drafting / verification
    pub support_threshold: f64,
    pub max_citations_per_claim: usize,
    pub pipeline_version: String,
    pub prompt_version: String,

    // Provider credentials
    pub brave_api_key: String,
    pub courtlistener_token: String,
    pub reader_base_url: String,

    // Language model
    /// "none" (default), "ollama" or "anthropic".
    pub backend: String,
    pub model: String,
    pub ollama_url: String,
    pub anthropic_api_key: String,
    pub model_timeout_s: u64,
}

fn parse_dotenv(path: &Path) -> HashMap<String, String> {
    let mut map = HashMap::new();
    let Ok(contents) = std::fs::read_to_string(path) else {
        return map;
    };
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            let v = v.trim().trim_matches('"');
            map.insert(k.trim().to_string(), v.to_string());
        }
    }
    map
}

fn get(key: &str, dotenv: &HashMap<String, String>) -> Option<String> {
    std::env::var(key).ok().or_else(|| dotenv.get(key).cloned())
}

fn get_str(key: &str, dotenv: &HashMap<String, String>, default: &str) -> String {
    get(key, dotenv).unwrap_or_else(|| default.to_string())
}

fn get_u16(key: &str, dotenv: &HashMap<String, String>, default: u16) -> u16 {
    get(key, dotenv)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_u64(key: &str, dotenv: &HashMap<String, String>, default: u64) -> u64 {
    get(key, dotenv)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_usize(key: &str, dotenv: &HashMap<String, String>, default: usize) -> usize {
    get(key, dotenv)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_ratio(key: &str, dotenv: &HashMap<String, String>, default: f64) -> f64 {
    get(key, dotenv)
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| (0.0..=1.0).contains(v))
        .unwrap_or(default)
}

fn get_list(key: &str, dotenv: &HashMap<String, String>, default: &str) -> Vec<String> {
    parse_list(&get_str(key, dotenv, default))
}

/// Split a comma-separated setting into trimmed, lower-cased, non-empty items.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::load(Path::new(".env"))
    }

    /// Load from the process environment, falling back to `dotenv_path` and
    /// then to built-in defaults.
    pub fn load(dotenv_path: &Path) -> Result<Self> {
        let dotenv = parse_dotenv(dotenv_path);

        let backend = get_str("BACKEND", &dotenv, "none");
        let default_model = match backend.as_str() {
            "anthropic" => "claude-sonnet-4-6",
            "ollama" => "llama3.1",
            _ => "",
        };

        let config = Config {
            web_bind: get_str("WEB_BIND", &dotenv, "127.0.0.1"),
            web_port: get_u16("WEB_PORT", &dotenv, 3232),
            default_jurisdiction: get_str("DEFAULT_JURISDICTION", &dotenv, "United States"),
            jurisdiction_markers: get_list(
                "JURISDICTION_MARKERS",
                &dotenv,
                DEFAULT_JURISDICTION_MARKERS,
            ),
            provider_timeout_s: get_u64("PROVIDER_TIMEOUT_S", &dotenv, 8),
            extract_timeout_s: get_u64("EXTRACT_TIMEOUT_S", &dotenv, 10),
            provider_concurrency: get_usize("PROVIDER_CONCURRENCY", &dotenv, 4).max(1),
            retriever_fanout: get_usize("RETRIEVER_FANOUT", &dotenv, 4).max(1),
            pipeline_timeout_s: get_u64("PIPELINE_TIMEOUT_S", &dotenv, 90),
            desired_results: get_usize("DESIRED_RESULTS", &dotenv, 5).max(1),
            extract_top_k: get_usize("EXTRACT_TOP_K", &dotenv, 3),
            extract_max_chars: get_usize("EXTRACT_MAX_CHARS", &dotenv, 5000),
            official_domains: get_list("OFFICIAL_DOMAINS", &dotenv, DEFAULT_OFFICIAL_DOMAINS),
            academic_domains: get_list("ACADEMIC_DOMAINS", &dotenv, DEFAULT_ACADEMIC_DOMAINS),
            blocked_domains: get_list("BLOCKED_DOMAINS", &dotenv, DEFAULT_BLOCKED_DOMAINS),
            knowledge_base_path: get_str("KNOWLEDGE_BASE_PATH", &dotenv, ""),
            support_threshold: get_ratio("SUPPORT_THRESHOLD", &dotenv, 0.8),
            max_citations_per_claim: get_usize("MAX_CITATIONS_PER_CLAIM", &dotenv, 3).max(1),
            pipeline_version: get_str("PIPELINE_VERSION", &dotenv, "lawborg-pipeline/1"),
            prompt_version: get_str("PROMPT_VERSION", &dotenv, crate::prompt::PROMPT_VERSION),
            brave_api_key: get_str("BRAVE_API_KEY", &dotenv, ""),
            courtlistener_token: get_str("COURTLISTENER_TOKEN", &dotenv, ""),
            reader_base_url: get_str("READER_BASE_URL", &dotenv, "https://r.jina.ai"),
            model: get_str("MODEL", &dotenv, default_model),
            backend,
            ollama_url: get_str("OLLAMA_URL", &dotenv, "http://127.0.0.1:11434"),
            anthropic_api_key: get_str("ANTHROPIC_API_KEY", &dotenv, ""),
            model_timeout_s: get_u64("MODEL_TIMEOUT_S", &dotenv, 120),
        };

        if config.backend == "anthropic" && config.anthropic_api_key.is_empty() {
            anyhow::bail!("BACKEND=anthropic requires ANTHROPIC_API_KEY");
        }
        Ok(config)
    }
}
