//! # Configuration module
//!
//! This module provide utilities and helpers to interact with the configuration

use std::{convert::TryFrom, path::PathBuf, time::Duration};

use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File, Map};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

// -----------------------------------------------------------------------------
// Constants

pub const DEFAULT_PASSWORD: &str = "Password01**";
pub const DEFAULT_DESCRIPTION: &str = "For Aurora MySQL zero-ETL integrations";
pub const REDACTED: &str = "<redacted>";

const DEFAULTS: &[(&str, &str)] = &[
    ("source.cluster", "my-source-cluster"),
    ("source.parameter_group", "my-source-param-group"),
    ("source.parameter_group_family", "aurora-mysql8.0"),
    ("source.description", DEFAULT_DESCRIPTION),
    ("source.engine", "aurora-mysql"),
    ("source.engine_version", "8.0.mysql_aurora.3.05.0"),
    ("source.database", "myauroradb"),
    ("source.username", "username"),
    ("source.password", DEFAULT_PASSWORD),
    ("source.instance_class", "db.r6g.2xlarge"),
    ("target.cluster", "my-target-cluster"),
    ("target.parameter_group", "my-target-param-group"),
    ("target.parameter_group_family", "redshift-1.0"),
    ("target.description", DEFAULT_DESCRIPTION),
    ("target.node_type", "ra3.4xlarge"),
    ("target.username", "username"),
    ("target.password", DEFAULT_PASSWORD),
    ("integration.name", "my-integration"),
];

// -----------------------------------------------------------------------------
// Aws structure

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
pub struct Aws {
    #[serde(rename = "region", default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(rename = "profile", default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

// -----------------------------------------------------------------------------
// Source structure

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Source {
    #[serde(rename = "cluster")]
    pub cluster: String,
    #[serde(rename = "parameter_group")]
    pub parameter_group: String,
    #[serde(rename = "parameter_group_family")]
    pub parameter_group_family: String,
    #[serde(rename = "description")]
    pub description: String,
    #[serde(rename = "engine")]
    pub engine: String,
    #[serde(rename = "engine_version")]
    pub engine_version: String,
    #[serde(rename = "database")]
    pub database: String,
    #[serde(rename = "username")]
    pub username: String,
    #[serde(rename = "password")]
    pub password: String,
    #[serde(rename = "instance_class")]
    pub instance_class: String,
    #[serde(rename = "instance", default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl Source {
    /// returns the identifier of the writer instance of the source cluster
    pub fn instance_identifier(&self) -> String {
        self.instance
            .to_owned()
            .unwrap_or_else(|| format!("{}-instance", self.cluster))
    }
}

// -----------------------------------------------------------------------------
// Target structure

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Target {
    #[serde(rename = "cluster")]
    pub cluster: String,
    #[serde(rename = "parameter_group")]
    pub parameter_group: String,
    #[serde(rename = "parameter_group_family")]
    pub parameter_group_family: String,
    #[serde(rename = "description")]
    pub description: String,
    #[serde(rename = "node_type")]
    pub node_type: String,
    #[serde(rename = "nodes")]
    pub nodes: i32,
    #[serde(rename = "encrypted")]
    pub encrypted: bool,
    #[serde(rename = "username")]
    pub username: String,
    #[serde(rename = "password")]
    pub password: String,
}

// -----------------------------------------------------------------------------
// Integration structure

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Integration {
    #[serde(rename = "name")]
    pub name: String,
}

// -----------------------------------------------------------------------------
// Waiter structure

/// bounds of the availability poll, durations are expressed in seconds
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct Waiter {
    #[serde(rename = "initial_delay")]
    pub initial_delay: u64,
    #[serde(rename = "max_delay")]
    pub max_delay: u64,
    #[serde(rename = "multiplier")]
    pub multiplier: f64,
    #[serde(rename = "jitter")]
    pub jitter: f64,
    #[serde(rename = "max_attempts")]
    pub max_attempts: u32,
    #[serde(rename = "timeout")]
    pub timeout: u64,
}

impl Default for Waiter {
    fn default() -> Self {
        Self {
            initial_delay: 60,
            max_delay: 300,
            multiplier: 1.5,
            jitter: 0.1,
            max_attempts: 120,
            timeout: 7200,
        }
    }
}

impl Waiter {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

// -----------------------------------------------------------------------------
// ConfigurationError enum

#[derive(thiserror::Error, Debug)]
pub enum ConfigurationError {
    #[error("failed to load file '{0:?}', {1}")]
    File(PathBuf, ConfigError),
    #[error("failed to load configuration, {0}")]
    Cast(ConfigError),
    #[error("failed to set default for key '{0}', {1}")]
    Default(String, ConfigError),
    #[error("invalid value for key '{0}', {1}")]
    Validate(&'static str, String),
}

// -----------------------------------------------------------------------------
// Configuration structures

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct Configuration {
    #[serde(rename = "rollback", default)]
    pub rollback: bool,
    #[serde(rename = "aws", default)]
    pub aws: Aws,
    #[serde(rename = "source")]
    pub source: Source,
    #[serde(rename = "target")]
    pub target: Target,
    #[serde(rename = "integration")]
    pub integration: Integration,
    #[serde(rename = "waiter")]
    pub waiter: Waiter,
}

impl TryFrom<PathBuf> for Configuration {
    type Error = ConfigurationError;

    fn try_from(path: PathBuf) -> Result<Self, Self::Error> {
        let builder = defaults()?.add_source(File::from(path.to_owned()).required(true));

        Self::build(builder.add_source(environment(None)))
            .map_err(|err| ConfigurationError::File(path, err))
            .and_then(Self::validate)
    }
}

impl Configuration {
    pub fn try_default() -> Result<Self, ConfigurationError> {
        let mut builder = defaults()?;
        let mut paths = vec![
            PathBuf::from(format!("/usr/share/{}/config", env!("CARGO_PKG_NAME"))),
            PathBuf::from(format!("/etc/{}/config", env!("CARGO_PKG_NAME"))),
        ];

        if let Some(home) = std::env::var_os("HOME") {
            let home = PathBuf::from(home);

            paths.push(home.join(format!(".config/{}/config", env!("CARGO_PKG_NAME"))));
            paths.push(home.join(format!(".local/share/{}/config", env!("CARGO_PKG_NAME"))));
        }

        paths.push(PathBuf::from("config"));
        for path in paths {
            builder = builder.add_source(File::from(path).required(false));
        }

        Self::build(builder.add_source(environment(None)))
            .map_err(ConfigurationError::Cast)
            .and_then(Self::validate)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }

    fn validate(self) -> Result<Self, ConfigurationError> {
        let waiter = &self.waiter;

        if waiter.max_attempts == 0 {
            return Err(ConfigurationError::Validate(
                "waiter.max_attempts",
                "must be greater than zero".into(),
            ));
        }

        if !(0.0..=1.0).contains(&waiter.jitter) {
            return Err(ConfigurationError::Validate(
                "waiter.jitter",
                format!("expected a ratio between 0 and 1, got {}", waiter.jitter),
            ));
        }

        if waiter.multiplier < 1.0 {
            return Err(ConfigurationError::Validate(
                "waiter.multiplier",
                format!("expected a value greater or equal to 1, got {}", waiter.multiplier),
            ));
        }

        if waiter.initial_delay > waiter.max_delay {
            return Err(ConfigurationError::Validate(
                "waiter.initial_delay",
                format!(
                    "initial delay ({}s) is greater than maximum delay ({}s)",
                    waiter.initial_delay, waiter.max_delay
                ),
            ));
        }

        if self.target.nodes < 1 {
            return Err(ConfigurationError::Validate(
                "target.nodes",
                format!("expected at least one node, got {}", self.target.nodes),
            ));
        }

        Ok(self)
    }

    /// logs hints about the loaded configuration
    pub fn help(&self) {
        debug!(
            source = self.source.cluster,
            target = self.target.cluster,
            integration = self.integration.name,
            "Loaded configuration"
        );

        for key in self.default_passwords() {
            error!(
                key = key,
                "Master password is the built-in default, set it before provisioning"
            );
        }
    }

    /// returns the keys of the master passwords left to the built-in default
    pub fn default_passwords(&self) -> Vec<&'static str> {
        let mut keys = vec![];

        if self.source.password == DEFAULT_PASSWORD {
            keys.push("source.password");
        }

        if self.target.password == DEFAULT_PASSWORD {
            keys.push("target.password");
        }

        keys
    }

    /// returns a copy of the configuration without credentials
    pub fn redacted(&self) -> Self {
        let mut config = self.to_owned();

        config.source.password = REDACTED.to_string();
        config.target.password = REDACTED.to_string();
        config
    }
}

// -----------------------------------------------------------------------------
// helpers

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigurationError> {
    let waiter = Waiter::default();
    let mut builder = Config::builder();

    for (key, value) in DEFAULTS {
        builder = builder
            .set_default(*key, *value)
            .map_err(|err| ConfigurationError::Default(key.to_string(), err))?;
    }

    let numbers: &[(&str, config::Value)] = &[
        ("target.nodes", 2_i64.into()),
        ("target.encrypted", true.into()),
        ("waiter.initial_delay", (waiter.initial_delay as i64).into()),
        ("waiter.max_delay", (waiter.max_delay as i64).into()),
        ("waiter.multiplier", waiter.multiplier.into()),
        ("waiter.jitter", waiter.jitter.into()),
        ("waiter.max_attempts", (waiter.max_attempts as i64).into()),
        ("waiter.timeout", (waiter.timeout as i64).into()),
        ("rollback", false.into()),
    ];

    for (key, value) in numbers {
        builder = builder
            .set_default(*key, value.to_owned())
            .map_err(|err| ConfigurationError::Default(key.to_string(), err))?;
    }

    Ok(builder)
}

/// overrides from `ZERO_ETL_PROVISIONER_<SECTION>__<KEY>` variables, values are
/// kept as strings and converted when deserialized, so that passwords such as
/// `00123456` are not read as numbers. `source` replaces the process
/// environment when given.
fn environment(source: Option<Map<String, String>>) -> Environment {
    Environment::with_prefix(&env!("CARGO_PKG_NAME").replace('-', "_"))
        .prefix_separator("_")
        .separator("__")
        .source(source)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temporary file to be created");

        file.write_all(content.as_bytes())
            .expect("configuration to be written");
        file
    }

    #[test]
    fn defaults_match_the_provisioning_constants() {
        let file = write("");
        let config = Configuration::try_from(file.path().to_path_buf()).unwrap();

        assert_eq!(config.source.cluster, "my-source-cluster");
        assert_eq!(config.source.parameter_group, "my-source-param-group");
        assert_eq!(config.source.parameter_group_family, "aurora-mysql8.0");
        assert_eq!(config.source.engine_version, "8.0.mysql_aurora.3.05.0");
        assert_eq!(config.source.instance_identifier(), "my-source-cluster-instance");
        assert_eq!(config.target.cluster, "my-target-cluster");
        assert_eq!(config.target.node_type, "ra3.4xlarge");
        assert_eq!(config.target.nodes, 2);
        assert!(config.target.encrypted);
        assert_eq!(config.integration.name, "my-integration");
        assert_eq!(config.waiter, Waiter::default());
        assert!(!config.rollback);
    }

    #[test]
    fn file_overrides_defaults() {
        let file = write(
            r#"
rollback = true

[aws]
region = "eu-west-1"

[source]
cluster = "orders"
instance = "orders-writer"

[target]
nodes = 4

[waiter]
max_attempts = 3
"#,
        );

        let config = Configuration::try_from(file.path().to_path_buf()).unwrap();

        assert!(config.rollback);
        assert_eq!(config.aws.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.source.cluster, "orders");
        assert_eq!(config.source.instance_identifier(), "orders-writer");
        assert_eq!(config.source.parameter_group, "my-source-param-group");
        assert_eq!(config.target.nodes, 4);
        assert_eq!(config.waiter.max_attempts, 3);
        assert_eq!(config.waiter.initial_delay, 60);
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let result = Configuration::try_from(PathBuf::from("/nonexistent/zero-etl.toml"));

        assert!(matches!(result, Err(ConfigurationError::File(_, _))));
    }

    #[test]
    fn invalid_waiter_bounds_are_rejected() {
        let file = write("[waiter]\njitter = 1.5\n");
        let result = Configuration::try_from(file.path().to_path_buf());
        assert!(matches!(
            result,
            Err(ConfigurationError::Validate("waiter.jitter", _))
        ));

        let file = write("[waiter]\nmax_attempts = 0\n");
        let result = Configuration::try_from(file.path().to_path_buf());
        assert!(matches!(
            result,
            Err(ConfigurationError::Validate("waiter.max_attempts", _))
        ));

        let file = write("[waiter]\ninitial_delay = 600\nmax_delay = 60\n");
        let result = Configuration::try_from(file.path().to_path_buf());
        assert!(matches!(
            result,
            Err(ConfigurationError::Validate("waiter.initial_delay", _))
        ));
    }

    fn from_environment(variables: &[(&str, &str)]) -> Result<Configuration, ConfigurationError> {
        let source = variables
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<Map<_, _>>();

        let builder = defaults()?.add_source(environment(Some(source)));

        Configuration::build(builder)
            .map_err(ConfigurationError::Cast)
            .and_then(Configuration::validate)
    }

    #[test]
    fn environment_keeps_passwords_verbatim() {
        let config = from_environment(&[
            ("ZERO_ETL_PROVISIONER_SOURCE__PASSWORD", "00123456"),
            ("ZERO_ETL_PROVISIONER_TARGET__PASSWORD", "1e10"),
            ("ZERO_ETL_PROVISIONER_SOURCE__USERNAME", "true"),
        ])
        .unwrap();

        assert_eq!(config.source.password, "00123456");
        assert_eq!(config.target.password, "1e10");
        assert_eq!(config.source.username, "true");
    }

    #[test]
    fn environment_converts_numbers_and_booleans() {
        let config = from_environment(&[
            ("ZERO_ETL_PROVISIONER_TARGET__NODES", "4"),
            ("ZERO_ETL_PROVISIONER_TARGET__ENCRYPTED", "false"),
            ("ZERO_ETL_PROVISIONER_WAITER__MAX_ATTEMPTS", "7"),
            ("ZERO_ETL_PROVISIONER_WAITER__MULTIPLIER", "2.5"),
            ("ZERO_ETL_PROVISIONER_ROLLBACK", "true"),
        ])
        .unwrap();

        assert_eq!(config.target.nodes, 4);
        assert!(!config.target.encrypted);
        assert_eq!(config.waiter.max_attempts, 7);
        assert_eq!(config.waiter.multiplier, 2.5);
        assert!(config.rollback);
    }

    #[test]
    fn environment_rejects_malformed_numbers() {
        let result = from_environment(&[("ZERO_ETL_PROVISIONER_TARGET__NODES", "two")]);

        assert!(matches!(result, Err(ConfigurationError::Cast(_))));
    }

    #[test]
    fn default_passwords_are_reported() {
        let config = from_environment(&[]).unwrap();
        assert_eq!(
            config.default_passwords(),
            vec!["source.password", "target.password"]
        );

        let config =
            from_environment(&[("ZERO_ETL_PROVISIONER_TARGET__PASSWORD", "s3cr3t!")]).unwrap();
        assert_eq!(config.default_passwords(), vec!["source.password"]);
    }

    #[test]
    fn redacted_hides_passwords() {
        let file = write("");
        let config = Configuration::try_from(file.path().to_path_buf())
            .unwrap()
            .redacted();

        assert_eq!(config.source.password, REDACTED);
        assert_eq!(config.target.password, REDACTED);
    }
}
