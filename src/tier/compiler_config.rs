use std::{fmt, str::FromStr};

use crate::{errors::TickError, tier::tier_model::ComplianceTier};

pub const ENV_TARGET_TIER: &str = "SEVEN_TICK_TARGET_TIER";
pub const ENV_OPTIMIZE_FOR: &str = "SEVEN_TICK_OPTIMIZE_FOR";
pub const ENV_ENABLE_SHARDING: &str = "SEVEN_TICK_ENABLE_SHARDING";
pub const ENV_ENABLE_VECTORIZATION: &str = "SEVEN_TICK_ENABLE_VECTORIZATION";
pub const ENV_NUM_SHARDS: &str = "SEVEN_TICK_NUM_SHARDS";

/// Tie-break between layouts that both fit the target tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OptimizeFor {
    /// Dense single-object PS->O when it fits.
    #[default]
    Latency,
    /// CSR over (predicate, subject) when it fits.
    Throughput,
}

impl fmt::Display for OptimizeFor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OptimizeFor::Latency => "latency",
            OptimizeFor::Throughput => "throughput",
        })
    }
}

impl FromStr for OptimizeFor {
    type Err = TickError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latency" => Ok(OptimizeFor::Latency),
            "throughput" => Ok(OptimizeFor::Throughput),
            other => Err(TickError::InvalidConfig(format!(
                "unknown optimize_for '{other}', expected latency or throughput"
            ))),
        }
    }
}

/// Options read by the kernel specializer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompilerConfig {
    pub target_tier: ComplianceTier,
    pub optimize_for: OptimizeFor,
    pub enable_sharding: bool,
    /// Compiled kernels answer batches in eight-lane groups, one pattern at a time otherwise.
    pub enable_vectorization: bool,
    /// First shard count tried, a power of two.
    pub num_shards: u32,
    /// Largest shard count tried before giving up.
    pub max_shards: u32,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            target_tier: ComplianceTier::L1,
            optimize_for: OptimizeFor::Latency,
            enable_sharding: true,
            enable_vectorization: true,
            num_shards: 4,
            max_shards: 4096,
        }
    }
}

impl CompilerConfig {
    pub fn new(target_tier: ComplianceTier) -> Self {
        Self {
            target_tier,
            ..Self::default()
        }
    }

    pub fn with_optimize_for(mut self, optimize_for: OptimizeFor) -> Self {
        self.optimize_for = optimize_for;
        self
    }

    pub fn with_sharding(mut self, enable: bool) -> Self {
        self.enable_sharding = enable;
        self
    }

    pub fn with_vectorization(mut self, enable: bool) -> Self {
        self.enable_vectorization = enable;
        self
    }

    pub fn with_shards(mut self, num_shards: u32, max_shards: u32) -> Self {
        self.num_shards = num_shards;
        self.max_shards = max_shards;
        self
    }

    /// Defaults overridden by `SEVEN_TICK_*` environment variables.
    pub fn from_env() -> Result<Self, TickError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable name.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, TickError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(v) = lookup(ENV_TARGET_TIER) {
            config.target_tier = v.parse()?;
        }
        if let Some(v) = lookup(ENV_OPTIMIZE_FOR) {
            config.optimize_for = v.parse()?;
        }
        if let Some(v) = lookup(ENV_ENABLE_SHARDING) {
            config.enable_sharding = parse_flag(ENV_ENABLE_SHARDING, &v)?;
        }
        if let Some(v) = lookup(ENV_ENABLE_VECTORIZATION) {
            config.enable_vectorization = parse_flag(ENV_ENABLE_VECTORIZATION, &v)?;
        }
        if let Some(v) = lookup(ENV_NUM_SHARDS) {
            config.num_shards = v.trim().parse().map_err(|_| {
                TickError::InvalidConfig(format!("{ENV_NUM_SHARDS}='{v}' is not a number"))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TickError> {
        if self.target_tier == ComplianceTier::NonCompliant {
            return Err(TickError::InvalidConfig(
                "target tier must be L1, L2 or L3".into(),
            ));
        }
        if !self.num_shards.is_power_of_two() || !self.max_shards.is_power_of_two() {
            return Err(TickError::InvalidConfig(format!(
                "shard counts must be powers of two (num_shards {}, max_shards {})",
                self.num_shards, self.max_shards
            )));
        }
        if self.num_shards > self.max_shards {
            return Err(TickError::InvalidConfig(format!(
                "num_shards {} exceeds max_shards {}",
                self.num_shards, self.max_shards
            )));
        }
        Ok(())
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, TickError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(TickError::InvalidConfig(format!(
            "{key}='{value}' is not a boolean"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, CompilerConfig::default());
        assert_eq!(config.num_shards, 4);
        assert!(config.enable_sharding);
    }

    #[test]
    fn test_overrides() {
        let config = CompilerConfig::from_lookup(lookup(&[
            (ENV_TARGET_TIER, "l3"),
            (ENV_OPTIMIZE_FOR, "Throughput"),
            (ENV_ENABLE_SHARDING, "false"),
            (ENV_ENABLE_VECTORIZATION, "0"),
            (ENV_NUM_SHARDS, "16"),
        ]))
        .unwrap();
        assert_eq!(config.target_tier, ComplianceTier::L3);
        assert_eq!(config.optimize_for, OptimizeFor::Throughput);
        assert!(!config.enable_sharding);
        assert!(!config.enable_vectorization);
        assert_eq!(config.num_shards, 16);
    }

    #[test]
    fn test_invalid_values() {
        for vars in [
            [(ENV_TARGET_TIER, "L9")],
            [(ENV_OPTIMIZE_FOR, "size")],
            [(ENV_ENABLE_SHARDING, "maybe")],
            [(ENV_NUM_SHARDS, "three")],
            [(ENV_NUM_SHARDS, "3")],
            [(ENV_TARGET_TIER, "NON_COMPLIANT")],
        ] {
            assert!(
                matches!(
                    CompilerConfig::from_lookup(lookup(&vars)),
                    Err(TickError::InvalidConfig(_))
                ),
                "{vars:?}"
            );
        }
        assert!(CompilerConfig::default().with_shards(8, 4).validate().is_err());
    }
}
