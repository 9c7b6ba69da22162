pub const DEFAULT_DATABASE_NAME: &str = "ridgedb";
pub const DEFAULT_SCHEMA: &str = "PUBLIC";
pub const DEFAULT_ADMIN_USER: &str = "SA";

/// Configuration used when opening a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub name: String,
    /// Schema created on open and used for unqualified names.
    pub default_schema: String,
    /// Name of the administrator created on open. Owns the default schema.
    pub admin_user: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            name: DEFAULT_DATABASE_NAME.to_string(),
            default_schema: DEFAULT_SCHEMA.to_string(),
            admin_user: DEFAULT_ADMIN_USER.to_string(),
        }
    }
}
