#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("a database url is required")]
    NoDatabaseUrl,
    #[error("the connection pool needs at least one connection")]
    ZeroPoolSize,
    #[error("the configured chain needs a chain id")]
    EmptyChainId,
}
