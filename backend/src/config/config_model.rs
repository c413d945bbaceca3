#[derive(Debug, Clone, PartialEq)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub stripe: Stripe,
    pub database: Database,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendServer {
    pub port: u16,
    /// MiB.
    pub body_limit: u64,
    /// Seconds.
    pub timeout: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stripe {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub api_base: String,
    pub webhook_tolerance_secs: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Database {
    pub url: Option<String>,
}
