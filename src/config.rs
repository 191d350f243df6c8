use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub const WORKSPACE_ENV: &str = "GRADEENTRYD_WORKSPACE";
pub const LOG_ENV: &str = "GRADEENTRYD_LOG";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Workspace opened before the first request, if set.
    pub workspace: Option<PathBuf>,
    pub log_filter: Option<String>,
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            workspace: non_empty(WORKSPACE_ENV).map(PathBuf::from),
            log_filter: non_empty(LOG_ENV),
        }
    }

    pub fn env_filter(&self) -> EnvFilter {
        self.log_filter
            .as_deref()
            .and_then(|f| EnvFilter::try_new(f).ok())
            .unwrap_or_else(|| EnvFilter::new("info"))
    }
}

/// Logs go to stderr; stdout carries the protocol.
pub fn init_logging(config: &DaemonConfig) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn reads_and_trims_env_values() {
        let env: HashMap<&str, &str> = [(WORKSPACE_ENV, " /tmp/ws "), (LOG_ENV, "")]
            .into_iter()
            .collect();
        let cfg = DaemonConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.workspace, Some(PathBuf::from("/tmp/ws")));
        assert_eq!(cfg.log_filter, None);
    }

    #[test]
    fn bad_filter_falls_back_to_info() {
        let cfg = DaemonConfig {
            workspace: None,
            log_filter: Some("gradeentryd=notalevel".to_string()),
        };
        assert_eq!(cfg.env_filter().to_string(), "info");
    }
}
