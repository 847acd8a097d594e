//! Cluster Configuration
//!
//! Every value here is supplied from outside the dispatch core. Defaults match a
//! small local cluster; `from_env` overlays `STATS_*` environment variables.

use crate::dispatch::protocol::FACADE_PATH;

use anyhow::{Context, Result, bail};
use std::time::Duration;

/// What the shard router does with a job whose text holds no words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyJobPolicy {
    /// Drop the job without dispatching anything or replying.
    #[default]
    Ignore,
    /// Reply to the requester with a failure.
    Reject,
}

impl std::str::FromStr for EmptyJobPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "reject" => Ok(Self::Reject),
            other => bail!("unknown empty job policy '{}' (expected ignore|reject)", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Only nodes carrying this role may lead or host workers.
    pub role: String,
    /// Deadline for a job's aggregation.
    pub aggregation_timeout: Duration,
    /// Workers started on each compute node.
    pub workers_per_node: usize,
    /// Well-known path of the leader facade on every node.
    pub facade_path: String,
    /// How often the client driver submits its sample job.
    pub client_interval: Duration,
    pub sample_text: String,
    pub empty_job_policy: EmptyJobPolicy,
    /// Round-trip every message through bincode inside the fabric.
    pub serialize_messages: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            role: "compute".to_string(),
            aggregation_timeout: Duration::from_secs(3),
            workers_per_node: 3,
            facade_path: FACADE_PATH.to_string(),
            client_interval: Duration::from_secs(2),
            sample_text: "this is the text that will be analyzed".to_string(),
            empty_job_policy: EmptyJobPolicy::Ignore,
            serialize_messages: true,
        }
    }
}

impl ClusterConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(role) = lookup("STATS_ROLE") {
            config.role = role;
        }
        if let Some(ms) = lookup("STATS_AGGREGATION_TIMEOUT_MS") {
            let ms: u64 = ms
                .parse()
                .context("STATS_AGGREGATION_TIMEOUT_MS must be an integer")?;
            config.aggregation_timeout = Duration::from_millis(ms);
        }
        if let Some(count) = lookup("STATS_WORKERS_PER_NODE") {
            config.workers_per_node = count
                .parse()
                .context("STATS_WORKERS_PER_NODE must be an integer")?;
        }
        if let Some(path) = lookup("STATS_FACADE_PATH") {
            config.facade_path = path;
        }
        if let Some(ms) = lookup("STATS_CLIENT_INTERVAL_MS") {
            let ms: u64 = ms
                .parse()
                .context("STATS_CLIENT_INTERVAL_MS must be an integer")?;
            config.client_interval = Duration::from_millis(ms);
        }
        if let Some(text) = lookup("STATS_SAMPLE_TEXT") {
            config.sample_text = text;
        }
        if let Some(policy) = lookup("STATS_EMPTY_JOB_POLICY") {
            config.empty_job_policy = policy.parse()?;
        }
        if let Some(flag) = lookup("STATS_SERIALIZE_MESSAGES") {
            config.serialize_messages = flag
                .parse()
                .context("STATS_SERIALIZE_MESSAGES must be true or false")?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.role.trim().is_empty() {
            bail!("role must not be empty");
        }
        if self.aggregation_timeout.is_zero() {
            bail!("aggregation timeout must be greater than zero");
        }
        if self.client_interval.is_zero() {
            bail!("client interval must be greater than zero");
        }
        if self.workers_per_node == 0 {
            bail!("workers_per_node must be at least 1");
        }
        if !self.facade_path.starts_with('/') {
            bail!("facade path '{}' must start with '/'", self.facade_path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ClusterConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.role, "compute");
        assert_eq!(config.facade_path, FACADE_PATH);
        assert_eq!(config.empty_job_policy, EmptyJobPolicy::Ignore);
    }

    #[test]
    fn test_lookup_overrides_defaults() {
        let config = ClusterConfig::from_lookup(lookup_from(&[
            ("STATS_ROLE", "backend"),
            ("STATS_AGGREGATION_TIMEOUT_MS", "250"),
            ("STATS_WORKERS_PER_NODE", "5"),
            ("STATS_EMPTY_JOB_POLICY", "Reject"),
            ("STATS_SERIALIZE_MESSAGES", "false"),
        ]))
        .unwrap();

        assert_eq!(config.role, "backend");
        assert_eq!(config.aggregation_timeout, Duration::from_millis(250));
        assert_eq!(config.workers_per_node, 5);
        assert_eq!(config.empty_job_policy, EmptyJobPolicy::Reject);
        assert!(!config.serialize_messages);
    }

    #[test]
    fn test_bad_number_is_reported() {
        let err = ClusterConfig::from_lookup(lookup_from(&[("STATS_WORKERS_PER_NODE", "many")]))
            .unwrap_err();

        assert!(err.to_string().contains("STATS_WORKERS_PER_NODE"));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = ClusterConfig::from_lookup(lookup_from(&[("STATS_WORKERS_PER_NODE", "0")]));

        assert!(result.is_err());
    }

    #[test]
    fn test_zero_client_interval_rejected() {
        let result = ClusterConfig::from_lookup(lookup_from(&[("STATS_CLIENT_INTERVAL_MS", "0")]));

        assert!(result.is_err());
        assert!(
            ClusterConfig {
                client_interval: Duration::ZERO,
                ..ClusterConfig::default()
            }
            .validate()
            .is_err()
        );
    }

    #[test]
    fn test_unknown_policy_rejected() {
        assert!("drop".parse::<EmptyJobPolicy>().is_err());
        assert_eq!("ignore".parse::<EmptyJobPolicy>().unwrap(), EmptyJobPolicy::Ignore);
    }
}
