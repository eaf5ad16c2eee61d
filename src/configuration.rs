use crate::error::ConfigError;

const MIN_SECRET_LENGTH: usize = 32;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

#[derive(serde::Deserialize, Clone, Debug)]
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

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// JWT signing and lifetime settings
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_expiry: i64,   // seconds (e.g., 10800 for 3 hours)
    pub refresh_token_expiry: i64,  // seconds (e.g., 86400 for 1 day)
    pub issuer: String,
}

impl std::fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSettings")
            .field("secret", &"<redacted>")
            .field("access_token_expiry", &self.access_token_expiry)
            .field("refresh_token_expiry", &self.refresh_token_expiry)
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl JwtSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::InvalidValue(format!(
                "jwt.secret must be at least {} bytes",
                MIN_SECRET_LENGTH
            )));
        }
        if self.access_token_expiry <= 0 {
            return Err(ConfigError::InvalidValue(
                "jwt.access_token_expiry must be positive".to_string(),
            ));
        }
        if self.refresh_token_expiry <= self.access_token_expiry {
            return Err(ConfigError::InvalidValue(
                "jwt.refresh_token_expiry must exceed jwt.access_token_expiry".to_string(),
            ));
        }
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::MissingRequired("jwt.issuer".to_string()));
        }
        Ok(())
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.jwt.validate()
    }
}

/// Load settings from `configuration.yaml` (optional) and `APP_*` environment
/// variables, e.g. `APP_JWT__SECRET` overrides `jwt.secret`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;
    let settings = settings.try_deserialize::<Settings>()?;
    settings.validate()?;
    Ok(settings)
}
