use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub seeds_path: PathBuf,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Top-level tasks fetched concurrently. Pages within a task are always
    /// sequential.
    pub max_concurrent_tasks: usize,
    pub inter_request_delay_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_base_secs: u64,
    /// Upper bound on fetches per top-level task, guarding against
    /// continuation cycles.
    pub max_requests_per_task: usize,
}
