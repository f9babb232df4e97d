use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::net::SocketAddr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub session: SessionConfig,
    pub upload: UploadConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// Tabular query gateway; empty disables delegated queries
    pub gateway_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub idle_ttl_secs: u64,
    pub max_sessions: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Pick up .env before reading overrides
        let _ = dotenv::dotenv();

        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("llm.gateway_url", "")?
            .set_default("llm.model", "gpt-4o-mini")?
            .set_default("session.idle_ttl_secs", 3600)?
            .set_default("session.max_sessions", 1000)?
            .set_default("upload.max_bytes", 50 * 1024 * 1024)?
            .set_default("logging.level", "info")?;

        if let Ok(host) = env::var("HOST") {
            builder = builder.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.port", port.parse::<u16>().unwrap_or(5000))?;
        }

        if let Ok(gateway_url) = env::var("LLM_GATEWAY_URL") {
            builder = builder.set_override("llm.gateway_url", gateway_url)?;
        }

        if let Ok(api_key) = env::var("LLM_API_KEY") {
            builder = builder.set_override("llm.api_key", api_key)?;
        }

        if let Ok(model) = env::var("LLM_MODEL") {
            builder = builder.set_override("llm.model", model)?;
        }

        if let Ok(ttl) = env::var("SESSION_IDLE_TTL_SECS") {
            builder = builder.set_override("session.idle_ttl_secs", ttl.parse::<u64>().unwrap_or(3600))?;
        }

        if let Ok(max) = env::var("SESSION_MAX_SESSIONS") {
            builder = builder.set_override("session.max_sessions", max.parse::<u64>().unwrap_or(1000))?;
        }

        if let Ok(max_bytes) = env::var("UPLOAD_MAX_BYTES") {
            builder = builder.set_override(
                "upload.max_bytes",
                max_bytes.parse::<u64>().unwrap_or(50 * 1024 * 1024),
            )?;
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            builder = builder.set_override("logging.level", log_level)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Parsed listen address
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let address = self.server_address();
        address
            .parse()
            .with_context(|| format!("Invalid server address {}", address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::from_env();
        assert!(config.is_ok());

        let config = config.unwrap();
        assert!(config.session.max_sessions > 0);
        assert!(config.upload.max_bytes > 0);
        assert!(!config.server.host.is_empty());
    }

    #[test]
    fn test_server_address() {
        let config = Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            llm: LlmConfig {
                gateway_url: String::new(),
                api_key: None,
                model: "m".to_string(),
            },
            session: SessionConfig {
                idle_ttl_secs: 60,
                max_sessions: 10,
            },
            upload: UploadConfig { max_bytes: 1024 },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        };
        assert_eq!(config.server_address(), "127.0.0.1:8080");
        assert_eq!(config.socket_addr().unwrap().port(), 8080);

        let mut bad = config.clone();
        bad.server.host = "not a host".to_string();
        let err = bad.socket_addr().unwrap_err();
        assert!(err.to_string().contains("Invalid server address not a host:8080"));
    }
}
