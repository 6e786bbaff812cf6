use std::path::PathBuf;

use crate::error::ConfigError;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    pub media: MediaSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_password_hash_cost")]
    pub password_hash_cost: u32,
}

fn default_password_hash_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

/// JWT signing settings
///
/// Access and refresh tokens are signed with independent secrets so a leaked
/// access secret cannot be used to mint refresh tokens (and vice versa).
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_expiry: i64,   // seconds (e.g., 900 for 15 minutes)
    pub refresh_token_expiry: i64,  // seconds (e.g., 864000 for 10 days)
    pub issuer: String,
}

impl JwtSettings {
    /// Checked once at startup, before any token is issued.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_token_secret.is_empty() || self.refresh_token_secret.is_empty() {
            return Err(ConfigError::MissingRequired("jwt signing secret".to_string()));
        }

        if self.access_token_secret == self.refresh_token_secret {
            return Err(ConfigError::InvalidValue(
                "access and refresh tokens must use different secrets".to_string(),
            ));
        }

        if self.access_token_expiry < 0 || self.refresh_token_expiry < 0 {
            return Err(ConfigError::InvalidValue("token expiry must not be negative".to_string()));
        }

        if self.access_token_expiry >= self.refresh_token_expiry {
            return Err(ConfigError::InvalidValue(
                "access token expiry must be shorter than refresh token expiry".to_string(),
            ));
        }

        Ok(())
    }
}

/// Where uploaded avatars and cover images live
#[derive(serde::Deserialize, Clone)]
pub struct MediaSettings {
    /// Multipart files land here before being handed to the uploader
    pub temp_dir: PathBuf,
    /// Final location, served under `/uploads`
    pub upload_dir: PathBuf,
    pub public_base_url: String,
    pub max_file_size: usize,
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(config::Environment::with_prefix("APP").separator("__"))
        .build()?;
    settings.try_deserialize::<Settings>()
}
