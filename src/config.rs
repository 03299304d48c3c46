use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub base_url: String,
    pub token: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            base_url: std::env::var("AMO_BASE_URL")
                .or_else(|_| {
                    std::env::var("AMO_SUBDOMAIN")
                        .map(|subdomain| format!("https://{}.amocrm.ru", subdomain))
                })
                .map_err(|_| {
                    anyhow::anyhow!("AMO_BASE_URL or AMO_SUBDOMAIN environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("AMO_BASE_URL cannot be empty");
                    }
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("AMO_BASE_URL must start with http:// or https://");
                    }
                    Ok(url.trim_end_matches('/').to_string())
                })?,
            token: std::env::var("AMO_TOKEN")
                .map_err(|_| anyhow::anyhow!("AMO_TOKEN environment variable required"))
                .and_then(|token| {
                    if token.trim().is_empty() {
                        anyhow::bail!("AMO_TOKEN cannot be empty");
                    }
                    Ok(token)
                })?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("AmoCRM base URL: {}", config.base_url);

        Ok(config)
    }
}
