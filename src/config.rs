use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::catalog::{DEFAULT_PROFILE_NAME, default_profile, find_profile};
use crate::model::ContainerProfile;
use crate::packer::PackingConfig;
use crate::volumetric::SUPPORTED_PRECISIONS;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub calculator: CalculatorConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            calculator: CalculatorConfig::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    const DEFAULT_PORT: u16 = 8080;
    const HOST_VAR: &'static str = "CBM_PLANNER_API_HOST";
    const PORT_VAR: &'static str = "CBM_PLANNER_API_PORT";

    fn from_env() -> Self {
        let host_value = env_string(Self::HOST_VAR).unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, effective_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                tracing::warn!(
                    "⚠️ Could not parse {} ('{}'): {}. Using {}.",
                    Self::HOST_VAR,
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (Self::DEFAULT_BIND_IP, Self::DEFAULT_HOST.to_string())
            }
        };

        let port = match env_string(Self::PORT_VAR) {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    tracing::warn!(
                        "⚠️ {} must not be 0. Using {}.",
                        Self::PORT_VAR,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    tracing::warn!(
                        "⚠️ Could not parse {} ('{}'): {}. Using {}.",
                        Self::PORT_VAR,
                        raw,
                        err,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

        Self {
            bind_ip,
            display_host: effective_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }

    /// Checks whether the hostname matches the default value.
    pub fn uses_default_host(&self) -> bool {
        self.display_host == Self::DEFAULT_HOST
    }
}

/// Defaults for the calculator and the container visualizer.
#[derive(Clone, Debug)]
pub struct CalculatorConfig {
    default_precision: f64,
    default_container: &'static ContainerProfile,
    packing: PackingConfig,
}

impl CalculatorConfig {
    pub const DEFAULT_PRECISION: f64 = 0.01;

    const PRECISION_VAR: &'static str = "CBM_PLANNER_DEFAULT_PRECISION";
    const CONTAINER_VAR: &'static str = "CBM_PLANNER_DEFAULT_CONTAINER";
    const MIN_GRID_STEP_VAR: &'static str = "CBM_PLANNER_PACKING_MIN_GRID_STEP";
    const GRID_DIVISIONS_VAR: &'static str = "CBM_PLANNER_PACKING_GRID_DIVISIONS";
    const STACK_FALLBACKS_VAR: &'static str = "CBM_PLANNER_PACKING_STACK_FALLBACKS";
    const MIN_EXTENT_VAR: &'static str = "CBM_PLANNER_PACKING_MIN_EXTENT";
    const EPSILON_VAR: &'static str = "CBM_PLANNER_PACKING_EPSILON";

    fn from_env() -> Self {
        let default_precision = load_f64_with_warning(
            Self::PRECISION_VAR,
            Self::DEFAULT_PRECISION,
            is_offered_precision,
            "must be 0 or one of 0.01, 0.1, 1",
            "Note: Billing precision differs from the 0.01 m³ default",
        );

        let default_container = resolve_container(env_string(Self::CONTAINER_VAR));

        let min_grid_step = load_f64_with_warning(
            Self::MIN_GRID_STEP_VAR,
            PackingConfig::DEFAULT_MIN_GRID_STEP,
            |value| value > 0.0,
            "must be greater than 0",
            "Warning: Adjusted grid step may slow down packing considerably",
        );

        let grid_divisions = load_f64_with_warning(
            Self::GRID_DIVISIONS_VAR,
            PackingConfig::DEFAULT_GRID_DIVISIONS,
            |value| value >= 1.0,
            "must be at least 1",
            "Warning: Adjusted grid divisions change where boxes end up",
        );

        let min_extent = load_f64_with_warning(
            Self::MIN_EXTENT_VAR,
            PackingConfig::DEFAULT_MIN_EXTENT,
            |value| value > 0.0,
            "must be greater than 0",
            "Warning: Adjusted minimum extent changes how tiny boxes are drawn",
        );

        let epsilon = load_f64_with_warning(
            Self::EPSILON_VAR,
            PackingConfig::DEFAULT_EPSILON,
            |value| value > 0.0,
            "must be greater than 0",
            "Warning: Adjusted tolerances may cause numerical instabilities",
        );

        let stack_fallbacks = env_string(Self::STACK_FALLBACKS_VAR)
            .and_then(|raw| parse_bool(&raw, Self::STACK_FALLBACKS_VAR))
            .unwrap_or(PackingConfig::DEFAULT_STACK_FALLBACKS);

        let packing = PackingConfig::builder()
            .min_grid_step(min_grid_step)
            .grid_divisions(grid_divisions)
            .min_extent(min_extent)
            .epsilon(epsilon)
            .stack_fallbacks(stack_fallbacks)
            .build();

        Self {
            default_precision,
            default_container,
            packing,
        }
    }

    /// Billing precision used when a request does not send one.
    pub fn default_precision(&self) -> f64 {
        self.default_precision
    }

    /// Container profile used when a request does not name one.
    pub fn default_container(&self) -> &'static ContainerProfile {
        self.default_container
    }

    /// Returns the configured PackingConfig.
    pub fn packing_config(&self) -> PackingConfig {
        self.packing
    }
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            default_precision: Self::DEFAULT_PRECISION,
            default_container: default_profile(),
            packing: PackingConfig::default(),
        }
    }
}

/// Billing precisions the calculator offers; 0 disables rounding.
fn is_offered_precision(value: f64) -> bool {
    value == 0.0 || SUPPORTED_PRECISIONS.contains(&value)
}

fn resolve_container(raw: Option<String>) -> &'static ContainerProfile {
    let Some(name) = raw else {
        return default_profile();
    };

    match find_profile(&name) {
        Some(profile) => profile,
        None => {
            tracing::warn!(
                "⚠️ Unknown container '{}' in {}. Using {}.",
                name,
                CalculatorConfig::CONTAINER_VAR,
                DEFAULT_PROFILE_NAME
            );
            default_profile()
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            tracing::warn!("⚠️ Access to {} failed: {}. Using default value.", name, err);
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            tracing::warn!(
                "⚠️ Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name,
                other
            );
            None
        }
    }
}

fn load_f64_with_warning(
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> f64 {
    match env_string(var_name) {
        Some(raw) => parse_f64_with_warning(var_name, &raw, default, validator, invalid_hint, warning),
        None => default,
    }
}

fn parse_f64_with_warning(
    var_name: &str,
    raw: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> f64 {
    match raw.parse::<f64>() {
        Ok(value) if !value.is_finite() || !validator(value) => {
            tracing::warn!(
                "⚠️ {} contains invalid value '{}': {}. Using {}.",
                var_name,
                raw,
                invalid_hint,
                default
            );
            default
        }
        Ok(value) => {
            let tolerance = (default.abs().max(1.0)) * 1e-9;
            if (value - default).abs() > tolerance {
                tracing::info!("⚠️ {} ({} = {}).", warning, var_name, value);
            }
            value
        }
        Err(err) => {
            tracing::warn!(
                "⚠️ Could not parse {} ('{}') as number: {}. Using {}.",
                var_name,
                raw,
                err,
                default
            );
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_true_values() {
        assert_eq!(parse_bool("1", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("true", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("yes", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("y", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("on", "TEST_VAR"), Some(true));

        assert_eq!(parse_bool("TRUE", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("Yes", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool(" true ", "TEST_VAR"), Some(true));
    }

    #[test]
    fn test_parse_bool_false_values() {
        assert_eq!(parse_bool("0", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("false", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("no", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("n", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("off", "TEST_VAR"), Some(false));

        assert_eq!(parse_bool("FALSE", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("  0  ", "TEST_VAR"), Some(false));
    }

    #[test]
    fn test_parse_bool_invalid_values() {
        assert_eq!(parse_bool("invalid", "TEST_VAR"), None);
        assert_eq!(parse_bool("2", "TEST_VAR"), None);
        assert_eq!(parse_bool("", "TEST_VAR"), None);
    }

    #[test]
    fn invalid_numbers_fall_back_to_default() {
        let positive = |value: f64| value > 0.0;
        assert_eq!(parse_f64_with_warning("TEST_VAR", "abc", 0.02, positive, "", ""), 0.02);
        assert_eq!(parse_f64_with_warning("TEST_VAR", "-1", 0.02, positive, "", ""), 0.02);
        assert_eq!(parse_f64_with_warning("TEST_VAR", "NaN", 0.02, |_| true, "", ""), 0.02);
        assert_eq!(parse_f64_with_warning("TEST_VAR", "inf", 0.02, |_| true, "", ""), 0.02);
        assert_eq!(parse_f64_with_warning("TEST_VAR", "0.05", 0.02, positive, "", ""), 0.05);
    }

    #[test]
    fn default_precision_must_be_an_offered_increment() {
        let load = |raw: &str| {
            parse_f64_with_warning(
                "TEST_VAR",
                raw,
                CalculatorConfig::DEFAULT_PRECISION,
                is_offered_precision,
                "",
                "",
            )
        };
        assert_eq!(load("0.1"), 0.1);
        assert_eq!(load("1"), 1.0);
        assert_eq!(load("0"), 0.0);
        assert_eq!(load("0.05"), CalculatorConfig::DEFAULT_PRECISION);
        assert_eq!(load("-0.01"), CalculatorConfig::DEFAULT_PRECISION);
    }

    #[test]
    fn container_name_resolves_against_catalog() {
        assert_eq!(resolve_container(None).name, DEFAULT_PROFILE_NAME);
        assert_eq!(
            resolve_container(Some("40ft high cube".to_string())).name,
            "40ft High Cube"
        );
        assert_eq!(
            resolve_container(Some("53ft Reefer".to_string())).name,
            DEFAULT_PROFILE_NAME
        );
    }

    #[test]
    fn default_calculator_config_uses_catalog_default() {
        let config = CalculatorConfig::default();
        assert_eq!(config.default_precision(), 0.01);
        assert_eq!(config.default_container().name, DEFAULT_PROFILE_NAME);
        assert_eq!(config.packing_config(), PackingConfig::default());
    }
}
