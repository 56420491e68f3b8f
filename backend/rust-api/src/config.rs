use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_database: String,
    pub jwt_secret: String,
    pub uploads_dir: String,
    pub bind_addr: String,
    /// Credentials for the bootstrap admin account (created on first start).
    pub admin_email: String,
    pub admin_password: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load environment variables from root .env file (two levels up)
        // Try root .env first, then fallback to local .env
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            // Fallback to current directory .env for backward compatibility
            dotenvy::dotenv().ok();
        }

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let config_builder = config::Config::builder()
            .add_source(
                config::File::with_name(&format!("config/{}", env)).required(false), // Allow missing config file, fallback to ENV
            )
            // Override with environment variables (prefix: APP_)
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        let settings = config_builder.build()?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "englishmaster".to_string());

        let jwt_secret = settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
            .unwrap_or_else(|_| {
                if env == "prod" {
                    panic!("FATAL: JWT_SECRET must be set in production!");
                }
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            });

        let uploads_dir = settings
            .get_string("storage.uploads_dir")
            .or_else(|_| env::var("UPLOADS_DIR"))
            .unwrap_or_else(|_| "uploads".to_string());

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .unwrap_or_else(|_| {
                let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
                format!("0.0.0.0:{}", port)
            });

        let admin_email = settings
            .get_string("bootstrap.admin_email")
            .or_else(|_| env::var("ADMIN_EMAIL"))
            .unwrap_or_else(|_| "admin@englishmaster.uz".to_string());

        let admin_password = settings
            .get_string("bootstrap.admin_password")
            .or_else(|_| env::var("ADMIN_PASSWORD"))
            .unwrap_or_else(|_| {
                if env == "prod" {
                    panic!("FATAL: ADMIN_PASSWORD must be set in production!");
                }
                "admin123".to_string()
            });

        Ok(Config {
            mongo_uri,
            mongo_database,
            jwt_secret,
            uploads_dir,
            bind_addr,
            admin_email,
            admin_password,
        })
    }
}
