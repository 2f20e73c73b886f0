//! MySQL connection provider
//!
//! Startup goes through three steps:
//! 1. [`connect_server`]: a pool with no default schema
//! 2. [`ensure_database`]: `CREATE DATABASE IF NOT EXISTS`
//! 3. [`connect_database`]: a pool scoped to the catalog database, used by
//!    everything afterwards

use crate::config::CatalogConfig;
use crate::db::identifier::is_valid_identifier;
use crate::db::mysql_schema::quote_identifier;
use crate::{Error, Result};
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::MySqlPool;
use tracing::info;

const MAX_CONNECTIONS: u32 = 10;

/// Server address and account used for every connection
#[derive(Clone)]
pub struct Credentials {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn from_config(config: &CatalogConfig) -> Self {
        Self {
            host: config.db_host.clone(),
            port: config.db_port,
            user: config.db_user.clone(),
            password: config.db_password.clone(),
        }
    }

    /// Connect options, optionally selecting a default database
    pub fn connect_options(&self, database: Option<&str>) -> MySqlConnectOptions {
        let options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password);

        match database {
            Some(name) => options.database(name),
            None => options,
        }
    }
}

// The password stays out of logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

async fn open_pool(options: MySqlConnectOptions, target: &str) -> Result<MySqlPool> {
    MySqlPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await
        .map_err(|e| Error::Connection(format!("Failed to connect to {}: {}", target, e)))
}

/// Connect to the server without selecting a database
pub async fn connect_server(credentials: &Credentials) -> Result<MySqlPool> {
    let target = format!("{}:{}", credentials.host, credentials.port);
    let pool = open_pool(credentials.connect_options(None), &target).await?;
    info!("Connected to MySQL server at {}", target);
    Ok(pool)
}

/// Create the database if it does not exist yet
pub async fn ensure_database(pool: &MySqlPool, name: &str) -> Result<()> {
    if !is_valid_identifier(name) {
        return Err(Error::Config(format!(
            "database name '{}' is not a valid identifier",
            name
        )));
    }

    sqlx::query(&create_database_sql(name))
        .execute(pool)
        .await
        .map_err(|e| Error::Connection(format!("Failed to create database {}: {}", name, e)))?;

    info!("Database {} is present", name);
    Ok(())
}

fn create_database_sql(name: &str) -> String {
    format!("CREATE DATABASE IF NOT EXISTS {}", quote_identifier(name))
}

/// Connect with `name` as the default database
pub async fn connect_database(credentials: &Credentials, name: &str) -> Result<MySqlPool> {
    let target = format!("{}:{}/{}", credentials.host, credentials.port, name);
    let pool = open_pool(credentials.connect_options(Some(name)), &target).await?;
    info!("Connected to database {}", name);
    Ok(pool)
}

/// Run all three connection steps and return the scoped pool
///
/// The server-scoped pool is closed once the database exists.
pub async fn connect_catalog(credentials: &Credentials, name: &str) -> Result<MySqlPool> {
    let server = connect_server(credentials).await?;
    let ensured = ensure_database(&server, name).await;
    server.close().await;
    ensured?;

    connect_database(credentials, name).await
}
