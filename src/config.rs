use anyhow::Result;
use std::env;

/// Region used when `S3_REGION` is not set.
pub const DEFAULT_REGION: &str = "ap-south-1";

/// Port used when `RDS_PORT` is not set.
pub const DEFAULT_DB_PORT: u16 = 3306;

#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub region: String,
    pub endpoint: Option<String>,
    pub path_style: bool,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub schema: Option<String>,
}

impl StorageConfig {
    /// Storage settings for `region` with ambient credentials and no custom endpoint.
    pub fn for_region(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            endpoint: None,
            path_style: false,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::for_region(DEFAULT_REGION)
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source. Empty values count
    /// as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let endpoint = var("S3_ENDPOINT");
        let path_style = match var("S3_PATH_STYLE") {
            Some(value) => value.parse()?,
            None => endpoint.is_some(),
        };

        Ok(Self {
            storage: StorageConfig {
                region: var("S3_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
                endpoint,
                path_style,
                access_key_id: var("AWS_ACCESS_KEY_ID"),
                secret_access_key: var("AWS_SECRET_ACCESS_KEY"),
                session_token: var("AWS_SESSION_TOKEN"),
            },
            database: DatabaseConfig {
                host: var("RDS_HOST"),
                port: match var("RDS_PORT") {
                    Some(port) => port.parse()?,
                    None => DEFAULT_DB_PORT,
                },
                username: var("RDS_USERNAME"),
                password: var("RDS_PASSWORD"),
                schema: var("RDS_SCHEMA"),
            },
        })
    }
}
