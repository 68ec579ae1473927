use serde::Deserialize;

/// Main configuration structure for Catalog-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
}

/// Crawl pacing and sizing
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of fetch pipelines in flight at once
    #[serde(rename = "concurrency-limit")]
    pub concurrency_limit: u32,

    /// Number of pending URLs handed to the executor at a time
    #[serde(rename = "batch-size")]
    pub batch_size: usize,

    /// Maximum number of records per shard file
    #[serde(rename = "shard-size")]
    pub shard_size: usize,

    /// Lower bound of the random delay before each fetch (milliseconds)
    #[serde(rename = "jitter-min-ms", default = "default_jitter_min_ms")]
    pub jitter_min_ms: u64,

    /// Upper bound of the random delay before each fetch (milliseconds)
    #[serde(rename = "jitter-max-ms", default = "default_jitter_max_ms")]
    pub jitter_max_ms: u64,

    /// Timeout for a single page fetch (seconds)
    #[serde(rename = "fetch-timeout-secs", default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_jitter_min_ms() -> u64 {
    1000
}

fn default_jitter_max_ms() -> u64 {
    5000
}

fn default_fetch_timeout_secs() -> u64 {
    60
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL; ContactEmail)
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Catalog input configuration
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// Directory holding one catalog JSON file per pair
    #[serde(rename = "catalog-dir")]
    pub catalog_dir: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Root directory for shard files
    #[serde(rename = "shard-dir")]
    pub shard_dir: String,

    /// Path to the SQLite ledger file
    #[serde(rename = "ledger-path")]
    pub ledger_path: String,

    /// Where to write the markdown run summary, if anywhere
    #[serde(rename = "summary-path", default)]
    pub summary_path: Option<String>,
}

/// CSS selectors used by the course page extractor
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ExtractorConfig {
    pub title: String,
    pub bio: String,
    pub objective: String,
    pub section: String,
    pub section_title: String,
    pub lecture_title: String,
    pub requirement: String,
    pub description: String,
    pub target_audience: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            title: "h1.clp-lead__title".to_string(),
            bio: "div.clp-lead__headline".to_string(),
            objective: "span[class*='what-you-will-learn--objective-item']".to_string(),
            section: "div[class*='section--panel']".to_string(),
            section_title: "span[class*='section--section-title']".to_string(),
            lecture_title: "[class*='section--course-lecture-title']".to_string(),
            requirement: "[data-purpose='requirements'] li".to_string(),
            description: "[data-purpose='course-description']".to_string(),
            target_audience: "[data-purpose='target-audience'] li".to_string(),
        }
    }
}

impl ExtractorConfig {
    /// Field name and selector pairs, for validation and error reporting
    pub fn selectors(&self) -> [(&'static str, &str); 9] {
        [
            ("title", self.title.as_str()),
            ("bio", self.bio.as_str()),
            ("objective", self.objective.as_str()),
            ("section", self.section.as_str()),
            ("section-title", self.section_title.as_str()),
            ("lecture-title", self.lecture_title.as_str()),
            ("requirement", self.requirement.as_str()),
            ("description", self.description.as_str()),
            ("target-audience", self.target_audience.as_str()),
        ]
    }
}
