use serde::Deserialize;

use synapse_core::net::protocol::MAX_MESSAGE_SIZE;

/// Top-level server configuration, loaded from `synapse.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// `"text"` or `"json"`.
    pub log_format: String,
    /// Allowed browser origins for the HTTP API. Empty allows any origin.
    pub cors_origins: Vec<String>,
    pub auth: AuthFileConfig,
    pub limits: LimitsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:5000".to_string(),
            log_format: "text".to_string(),
            cors_origins: Vec::new(),
            auth: AuthFileConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    pub ws_rate_limit_per_sec: f64,
    /// Outbound frames queued per connection before broadcasts to it are dropped.
    pub connection_message_buffer: usize,
    /// Largest inbound text frame accepted, in bytes. Bounds voice clip length.
    pub max_frame_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 500,
            ws_rate_limit_per_sec: 50.0,
            connection_message_buffer: 256,
            max_frame_bytes: MAX_MESSAGE_SIZE,
        }
    }
}

/// Auth section of the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthFileConfig {
    pub bearer_token: Option<String>,
}

impl ServerConfig {
    /// Check the configuration. Returns one message per problem; empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            problems.push(format!(
                "listen_addr '{}' is not a valid socket address",
                self.listen_addr
            ));
        }
        if !matches!(self.log_format.as_str(), "text" | "json") {
            problems.push(format!(
                "log_format must be \"text\" or \"json\", got '{}'",
                self.log_format
            ));
        }
        if self.limits.max_ws_connections == 0 {
            problems.push("limits.max_ws_connections must be > 0".to_string());
        }
        let rate = self.limits.ws_rate_limit_per_sec;
        if rate <= 0.0 || !rate.is_finite() {
            problems.push("limits.ws_rate_limit_per_sec must be > 0".to_string());
        }
        if self.limits.connection_message_buffer == 0 {
            problems.push("limits.connection_message_buffer must be > 0".to_string());
        }
        if self.limits.max_frame_bytes == 0 {
            problems.push("limits.max_frame_bytes must be > 0".to_string());
        }

        if self.auth.bearer_token.is_some() {
            tracing::warn!(
                "bearer_token is set in config file, prefer SYNAPSE_API_TOKEN in production"
            );
        }

        problems
    }

    /// Load config from `synapse.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("synapse.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from synapse.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse synapse.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No synapse.toml found, using defaults");
                ServerConfig::default()
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Apply `SYNAPSE_*` overrides read through `var`.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = var("SYNAPSE_LISTEN_ADDR")
            && !addr.is_empty()
        {
            self.listen_addr = addr;
        }
        if let Some(token) = var("SYNAPSE_API_TOKEN")
            && !token.is_empty()
        {
            self.auth.bearer_token = Some(token);
        }
        if let Some(format) = var("SYNAPSE_LOG_FORMAT")
            && !format.is_empty()
        {
            self.log_format = format;
        }
        if let Some(origins) = var("SYNAPSE_CORS_ORIGINS") {
            self.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }

        // Limits overrides
        if let Some(val) = var("SYNAPSE_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            self.limits.max_ws_connections = n;
        }
        if let Some(val) = var("SYNAPSE_WS_RATE_LIMIT")
            && let Ok(n) = val.parse::<f64>()
        {
            self.limits.ws_rate_limit_per_sec = n;
        }
        if let Some(val) = var("SYNAPSE_MAX_FRAME_BYTES")
            && let Ok(n) = val.parse::<usize>()
        {
            self.limits.max_frame_bytes = n;
        }
    }
}
