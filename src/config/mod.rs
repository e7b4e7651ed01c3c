mod settings;

pub use settings::{
    AnnouncerConfig, AuthConfig, CacheConfig, DatabaseConfig, LoggingConfig, OtelConfig,
    ServerConfig, Settings, StoreConfig,
};
