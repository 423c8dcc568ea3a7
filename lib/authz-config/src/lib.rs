mod env_overrides;
pub mod log;
pub mod primitives;

use config::{Config, File, FileFormat, FileSourceFile};
use envconfig::Envconfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::Infallible;

use crate::{
    env_overrides::{EnvVarOverrides, EnvVarOverridesError},
    log::LoggingConfig,
    primitives::single_or_multiple::SingleOrMultiple,
};

/// Authorization declarations of a whole schema.
#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AuthzManifest {
    /// The logger configuration of the tooling that loads this manifest.
    #[serde(default)]
    pub log: LoggingConfig,

    /// Schema-wide policy settings.
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Object types, keyed by type name.
    #[serde(default)]
    pub objects: BTreeMap<String, ObjectConfig>,

    /// Root fields (queries and mutations), keyed by field name.
    #[serde(default)]
    pub operations: BTreeMap<String, OperationDeclaration>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Rule applied when neither the field nor the operation names one.
    ///
    /// Can also be set via the `AUTHZ_DEFAULT_RULE` environment variable.
    #[serde(default = "default_rule")]
    pub default_rule: String,

    /// Roles whose operations may omit the `scope` option.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_scoped_roles: Option<SingleOrMultiple<String>>,

    /// Message returned for a denied field. `{field}` is replaced with the field name.
    #[serde(default = "default_unauthorized_message")]
    pub unauthorized_message: String,
}

impl PolicyConfig {
    pub fn not_scoped_roles(&self) -> Vec<String> {
        self.not_scoped_roles.clone().map(Into::into).unwrap_or_default()
    }

    pub fn unauthorized_message_for(&self, field: &str) -> String {
        self.unauthorized_message.replace("{field}", field)
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            default_rule: default_rule(),
            not_scoped_roles: None,
            unauthorized_message: default_unauthorized_message(),
        }
    }
}

fn default_rule() -> String {
    "default".to_string()
}

fn default_unauthorized_message() -> String {
    "Unauthorized access to field {field}".to_string()
}

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(deny_unknown_fields)]
pub struct ObjectConfig {
    /// Backing source of the type. Required for the type to be used as an operation `scope`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Whether field rules of this type are enforced (`scope?`). Defaults to `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<bool>,

    /// Alternative spelling of `scope` (`scope_field?`). Declaring both is an error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_field: Option<bool>,

    #[serde(default)]
    pub fields: BTreeMap<String, FieldConfig>,
}

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(deny_unknown_fields)]
pub struct FieldConfig {
    #[serde(default)]
    pub private: bool,

    /// Overrides the policy's default rule for this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,

    /// Value returned instead of an error when the caller is denied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymize_with: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationKindConfig {
    #[default]
    Query,
    Mutation,
}

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(deny_unknown_fields)]
pub struct OperationDeclaration {
    #[serde(default)]
    pub kind: OperationKindConfig,

    /// The operation's authorization options (`permit`, `scope`, `args`, `rule`, `optional`).
    ///
    /// Kept untyped here, the options are validated when the schema is composed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to load manifest: {0}")]
    ManifestLoadError(#[from] config::ConfigError),
    #[error("Failed to apply manifest overrides: {0}")]
    EnvVarOverridesError(#[from] EnvVarOverridesError),
    #[error("Failed to load the environment variables: {0}")]
    EnvVarLoadError(#[from] envconfig::Error),
    #[error("Failed to parse the manifest file path: {0}")]
    ManifestPathParseError(Infallible),
}

static DEFAULT_FILE_NAMES: &[&str] = &["authz.yaml", "authz.yml", "authz.json", "authz.json5"];

pub fn load_manifest(override_manifest_path: Option<String>) -> Result<AuthzManifest, ManifestError> {
    let env_overrides = EnvVarOverrides::init_from_env()?;
    let mut config = Config::builder();

    if let Some(path_str) = override_manifest_path {
        let path_buf = path_str
            .parse::<std::path::PathBuf>()
            .map_err(ManifestError::ManifestPathParseError)?;
        let as_file: File<FileSourceFile, _> = path_buf.into();

        config = config.add_source(as_file.required(true));
    } else {
        for name in DEFAULT_FILE_NAMES {
            config = config.add_source(File::with_name(name).required(false));
        }
    }

    config = env_overrides.apply_overrides(config)?;

    Ok(config.build()?.try_deserialize::<AuthzManifest>()?)
}

pub fn parse_yaml_manifest(manifest_raw: &str) -> Result<AuthzManifest, ManifestError> {
    Ok(Config::builder()
        .add_source(File::from_str(manifest_raw, FileFormat::Yaml))
        .build()?
        .try_deserialize::<AuthzManifest>()?)
}

/// JSON schema of the manifest file, for editor integration.
pub fn manifest_json_schema() -> schemars::Schema {
    schemars::schema_for!(AuthzManifest)
}
