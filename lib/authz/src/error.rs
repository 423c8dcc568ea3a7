/// A malformed option inside one operation's authorization declaration.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("permit option must be present")]
    MissingPermit,
    #[error("permit option must be a role name, got: {0}")]
    InvalidPermit(String),
    #[error("optional option must be a boolean, got: {0}")]
    InvalidOptional(String),
    #[error("rule option must be a bare rule name, got: {0}")]
    InvalidRule(String),
    #[error("scope must be present for this role: {role}")]
    MissingScope { role: String },
    #[error("scope option is not a valid scoped entity: {0}")]
    InvalidScopedEntity(String),
    #[error("scope option must be false, \"$source\" or a scoped entity, got: {0}")]
    InvalidScope(String),
    #[error("args option is malformed: {0}")]
    InvalidArgs(String),
    #[error("authorization declaration must be a mapping, got: {0}")]
    NotAMapping(String),
    #[error("unknown authorization option: {0}")]
    UnknownOption(String),
}

/// Build-time errors. Any of these must keep the schema from being served.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Invalid authorization for query {operation}: {source}")]
    InvalidOperationConfig {
        operation: String,
        #[source]
        source: ConfigError,
    },
    #[error("no permission specified for query {operation}")]
    MissingPermission { operation: String },
    #[error("object {object} declares both scope? and scope_field?, only one is allowed")]
    ConflictingScopeFlags { object: String },
    #[error("unknown object type: {0}")]
    UnknownObject(String),
}

impl SchemaError {
    pub fn invalid_config(operation: impl Into<String>, source: ConfigError) -> Self {
        SchemaError::InvalidOperationConfig {
            operation: operation.into(),
            source,
        }
    }
}
