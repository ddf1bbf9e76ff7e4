use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - pool.threads_count is not 0
/// - probabilities lie in 0.0..=1.0
/// - demo.poll_timeout_ms is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.pool.threads_count == 0 {
        return Err(ConfigError::ValidationError(
            "pool.threads_count cannot be 0".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&config.simulation.failure_probability) {
        return Err(ConfigError::ValidationError(format!(
            "simulation.failure_probability must be within 0.0..=1.0, got {}",
            config.simulation.failure_probability
        )));
    }

    if !(0.0..=1.0).contains(&config.demo.stop_chance) {
        return Err(ConfigError::ValidationError(format!(
            "demo.stop_chance must be within 0.0..=1.0, got {}",
            config.demo.stop_chance
        )));
    }

    if config.demo.poll_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "demo.poll_timeout_ms cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DemoConfig, PoolConfig, SimulationConfig};

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_zero_threads_fails() {
        let config = Config {
            pool: PoolConfig { threads_count: 0 },
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains("threads_count"));
    }

    #[test]
    fn test_validate_failure_probability_out_of_range() {
        let config = Config {
            simulation: SimulationConfig {
                failure_probability: 1.5,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_stop_chance_negative() {
        let config = Config {
            demo: DemoConfig {
                stop_chance: -0.1,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_poll_timeout() {
        let config = Config {
            demo: DemoConfig {
                poll_timeout_ms: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }
}
