//! Health reporting.

use std::sync::Arc;

use chrono::Utc;
use qa_common::config::ServerConfig;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tracing::warn;

pub const SERVICE_NAME: &str = "qa-dashboard";

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub os: &'static str,
    pub arch: &'static str,
    pub family: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplicationInfo {
    pub environment: String,
    pub api_prefix: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize)]
pub struct DependencyStatus {
    pub database: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailedHealth {
    #[serde(flatten)]
    pub basic: HealthStatus,
    pub system: SystemInfo,
    pub application: ApplicationInfo,
    pub dependencies: DependencyStatus,
}

/// Health service.
#[derive(Clone)]
pub struct HealthService {
    db: Arc<DatabaseConnection>,
    server: ServerConfig,
}

impl HealthService {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>, server: ServerConfig) -> Self {
        Self { db, server }
    }

    /// Liveness report.
    #[must_use]
    pub fn basic(&self) -> HealthStatus {
        HealthStatus {
            status: "healthy",
            service: SERVICE_NAME,
            version: env!("CARGO_PKG_VERSION"),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// Liveness report plus runtime and dependency details.
    ///
    /// The overall status degrades when the database does not answer a ping.
    pub async fn detailed(&self) -> DetailedHealth {
        let database = match self.db.ping().await {
            Ok(()) => "healthy",
            Err(e) => {
                warn!(error = %e, "Database ping failed");
                "unhealthy"
            }
        };

        let mut basic = self.basic();
        if database != "healthy" {
            basic.status = "degraded";
        }

        DetailedHealth {
            basic,
            system: SystemInfo {
                os: std::env::consts::OS,
                arch: std::env::consts::ARCH,
                family: std::env::consts::FAMILY,
            },
            application: ApplicationInfo {
                environment: self.server.environment.clone(),
                api_prefix: self.server.api_prefix.clone(),
                host: self.server.host.clone(),
                port: self.server.port,
            },
            dependencies: DependencyStatus { database },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use qa_common::Config;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn service() -> HealthService {
        let config = Config::from_toml_str(
            r#"
            [server]
            environment = "test"
            [database]
            url = "postgres://localhost/qa"
            [auth]
            secret_key = "secret"
            [moderation]
            api_key = "k"
            "#,
        )
        .unwrap();
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        HealthService::new(Arc::new(db), config.server)
    }

    #[test]
    fn test_basic() {
        let health = service().basic();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.service, SERVICE_NAME);
        assert!(!health.version.is_empty());
    }

    #[tokio::test]
    async fn test_detailed_serializes_flat() {
        let health = service().detailed().await;
        let json = serde_json::to_value(&health).unwrap();
        assert!(json["status"].is_string());
        assert_eq!(json["application"]["environment"], "test");
        assert_eq!(json["application"]["api_prefix"], "/api/v1");
        assert_eq!(json["system"]["os"], std::env::consts::OS);
        assert!(json["dependencies"]["database"].is_string());
    }
}
