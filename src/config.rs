//! Index and matching configuration.

use serde::{Deserialize, Serialize};

use crate::error::{LexisError, Result};

/// Configuration of the forward index store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardIndexConfig {
    /// Extra token capacity reserved whenever storage grows at the end.
    pub growth_reserve: usize,
}

impl Default for ForwardIndexConfig {
    fn default() -> Self {
        ForwardIndexConfig {
            growth_reserve: 4096,
        }
    }
}

/// Tuning knobs for promoting clause pairs to forward-index NFA matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NfaMatchingConfig {
    /// Maximum cost factor at which NFA promotion is still accepted.
    /// `0` disables NFA promotion entirely.
    pub nfa_threshold: u64,

    /// Minimum number of distinct terms the NFA-side annotation must have.
    pub min_unique_terms: u64,
}

impl NfaMatchingConfig {
    /// Default threshold factor.
    pub const DEFAULT_NFA_THRESHOLD: u64 = 900;

    /// Below this many distinct terms, per-token NFA checks do not pay off.
    pub const DEFAULT_MIN_UNIQUE_TERMS: u64 = 10_000;

    /// Config with NFA promotion switched off.
    pub fn disabled() -> Self {
        NfaMatchingConfig {
            nfa_threshold: 0,
            ..Default::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.nfa_threshold > 0
    }
}

impl Default for NfaMatchingConfig {
    fn default() -> Self {
        NfaMatchingConfig {
            nfa_threshold: Self::DEFAULT_NFA_THRESHOLD,
            min_unique_terms: Self::DEFAULT_MIN_UNIQUE_TERMS,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub forward_index: ForwardIndexConfig,
    pub nfa_matching: NfaMatchingConfig,
}

impl IndexConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: IndexConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values that cannot produce a working index.
    pub fn validate(&self) -> Result<()> {
        // Cost factors are scaled by 1000 and multiplied by hit counts;
        // keep the threshold well inside u64 range.
        if self.nfa_matching.nfa_threshold > u32::MAX as u64 {
            return Err(LexisError::invalid_config(format!(
                "nfa_threshold {} is out of range",
                self.nfa_matching.nfa_threshold
            )));
        }
        if self.forward_index.growth_reserve > (1 << 30) {
            return Err(LexisError::invalid_config(format!(
                "growth_reserve {} exceeds the 2^30 token limit",
                self.forward_index.growth_reserve
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IndexConfig::default();
        assert_eq!(config.nfa_matching.nfa_threshold, 900);
        assert_eq!(config.nfa_matching.min_unique_terms, 10_000);
        assert!(config.nfa_matching.is_enabled());
        assert!(!NfaMatchingConfig::disabled().is_enabled());
    }

    #[test]
    fn test_partial_json() {
        let config = IndexConfig::from_json(r#"{"nfa_matching": {"nfa_threshold": 50}}"#).unwrap();
        assert_eq!(config.nfa_matching.nfa_threshold, 50);
        assert_eq!(config.nfa_matching.min_unique_terms, 10_000);
        assert_eq!(config.forward_index, ForwardIndexConfig::default());

        let back = IndexConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_invalid_config() {
        let result = IndexConfig::from_json(r#"{"nfa_matching": {"nfa_threshold": 99999999999}}"#);
        assert!(matches!(result, Err(LexisError::InvalidConfig(_))));
    }
}
