// Probe settings, read from the environment

use anyhow::{anyhow, Context, Result};
use reshandler_core::AcquisitionStrategy;
use std::time::Duration;

pub const DEFAULT_TARGET: &str = "127.0.0.1:6379";
pub const DEFAULT_PROBE_COUNT: u32 = 10;
pub const DEFAULT_PROBE_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_PROBE_LINE: &str = "PING";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSettings {
    pub target: String,
    pub strategy: AcquisitionStrategy,
    pub count: u32,
    pub interval: Duration,
    pub line: String,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET.to_string(),
            strategy: AcquisitionStrategy::default(),
            count: DEFAULT_PROBE_COUNT,
            interval: Duration::from_millis(DEFAULT_PROBE_INTERVAL_MS),
            line: DEFAULT_PROBE_LINE.to_string(),
        }
    }
}

impl ProbeSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; unset keys keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(target) = lookup("RESHANDLER_TARGET") {
            settings.target = target;
        }
        if let Some(strategy) = lookup("RESHANDLER_STRATEGY") {
            settings.strategy = strategy
                .parse()
                .map_err(|e| anyhow!("invalid RESHANDLER_STRATEGY: {e}"))?;
        }
        if let Some(count) = lookup("RESHANDLER_PROBE_COUNT") {
            settings.count = count
                .parse()
                .with_context(|| format!("invalid RESHANDLER_PROBE_COUNT: {count}"))?;
        }
        if let Some(ms) = lookup("RESHANDLER_PROBE_INTERVAL_MS") {
            let ms: u64 = ms
                .parse()
                .with_context(|| format!("invalid RESHANDLER_PROBE_INTERVAL_MS: {ms}"))?;
            settings.interval = Duration::from_millis(ms);
        }
        if let Some(line) = lookup("RESHANDLER_PROBE_LINE") {
            settings.line = line;
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = ProbeSettings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, ProbeSettings::default());
    }

    #[test]
    fn test_overrides() {
        let settings = ProbeSettings::from_lookup(lookup(&[
            ("RESHANDLER_TARGET", "10.0.0.5:7000"),
            ("RESHANDLER_STRATEGY", "inline"),
            ("RESHANDLER_PROBE_COUNT", "3"),
            ("RESHANDLER_PROBE_INTERVAL_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(settings.target, "10.0.0.5:7000");
        assert_eq!(settings.strategy, AcquisitionStrategy::Inline);
        assert_eq!(settings.count, 3);
        assert_eq!(settings.interval, Duration::from_millis(250));
        assert_eq!(settings.line, DEFAULT_PROBE_LINE);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(ProbeSettings::from_lookup(lookup(&[("RESHANDLER_STRATEGY", "eager")])).is_err());
        assert!(ProbeSettings::from_lookup(lookup(&[("RESHANDLER_PROBE_COUNT", "-1")])).is_err());
    }
}
