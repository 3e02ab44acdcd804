use anyhow::{bail, Context};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub geoip: GeoIpConfig,
    pub instrumentation: InstrumentationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoIpConfig {
    /// Path to a MaxMind City .mmdb file. Geolocation is disabled when unset.
    pub city_db_path: Option<String>,
    #[serde(default = "GeoIpConfig::default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
}

impl GeoIpConfig {
    const fn default_lookup_timeout_ms() -> u64 {
        250
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentationConfig {
    /// Path prefixes that are never recorded
    pub exempt_path_prefixes: Vec<String>,
    pub client_ip: ClientIpConfig,
}

impl InstrumentationConfig {
    pub fn default_exempt_path_prefixes() -> Vec<String> {
        vec!["/analytics".to_string(), "/health".to_string()]
    }
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            exempt_path_prefixes: Self::default_exempt_path_prefixes(),
            client_ip: ClientIpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustedProxyMode {
    /// Use the socket peer address only
    #[default]
    None,
    /// Forwarded / X-Forwarded-For
    Standard,
    /// CF-Connecting-IP
    Cloudflare,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientIpConfig {
    pub trusted_proxy_mode: TrustedProxyMode,
    #[serde(default)]
    pub trusted_proxies: Vec<IpNet>,
    #[serde(default)]
    pub num_trusted_proxies: Option<usize>,
    #[serde(default)]
    pub ip_anonymization: bool,
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

fn env_list(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
}

/// A zero timeout would turn every lookup into a miss
fn parse_lookup_timeout_ms(raw: &str) -> anyhow::Result<u64> {
    let ms = raw
        .trim()
        .parse::<u64>()
        .context("GEOIP_LOOKUP_TIMEOUT_MS must be a number of milliseconds")?;
    if ms == 0 {
        bail!("GEOIP_LOOKUP_TIMEOUT_MS must be greater than 0");
    }
    Ok(ms)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str =
            std::env::var("DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            "sqlite" => DatabaseBackend::Sqlite,
            other => bail!("Unknown DATABASE_BACKEND '{other}'. Supported values: sqlite, postgres"),
        };

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./zwischen.db?mode=rwc".to_string());

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;

        let api_host = std::env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let api_port = std::env::var("API_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()
            .context("API_PORT must be a valid port number")?;

        let city_db_path = std::env::var("GEOIP_CITY_DB_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty());
        let lookup_timeout_ms = match std::env::var("GEOIP_LOOKUP_TIMEOUT_MS") {
            Ok(v) => parse_lookup_timeout_ms(&v)?,
            Err(_) => GeoIpConfig::default_lookup_timeout_ms(),
        };

        let exempt_path_prefixes = env_list("EXEMPT_PATH_PREFIXES")
            .unwrap_or_else(InstrumentationConfig::default_exempt_path_prefixes);

        let trusted_proxy_mode = match std::env::var("TRUSTED_PROXY_MODE")
            .unwrap_or_else(|_| "none".to_string())
            .to_lowercase()
            .as_str()
        {
            "none" => TrustedProxyMode::None,
            "standard" => TrustedProxyMode::Standard,
            "cloudflare" => TrustedProxyMode::Cloudflare,
            other => bail!(
                "Unknown TRUSTED_PROXY_MODE '{other}'. Supported values: none, standard, cloudflare"
            ),
        };

        let trusted_proxies = env_list("TRUSTED_PROXIES")
            .unwrap_or_default()
            .iter()
            .map(|cidr| {
                cidr.parse::<IpNet>()
                    .with_context(|| format!("Invalid CIDR '{cidr}' in TRUSTED_PROXIES"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let num_trusted_proxies = std::env::var("NUM_TRUSTED_PROXIES")
            .ok()
            .map(|v| v.parse::<usize>())
            .transpose()
            .context("NUM_TRUSTED_PROXIES must be a non-negative integer")?;

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            geoip: GeoIpConfig {
                city_db_path,
                lookup_timeout_ms,
            },
            instrumentation: InstrumentationConfig {
                exempt_path_prefixes,
                client_ip: ClientIpConfig {
                    trusted_proxy_mode,
                    trusted_proxies,
                    num_trusted_proxies,
                    ip_anonymization: env_flag("IP_ANONYMIZATION"),
                },
            },
        })
    }
}
