//! MongoDB client construction from [`StoreOptions`]

use crate::options::{PoolConfig, StoreOptions};
use crate::Result;
use bson::Document;
use mongodb::{
    options::{ClientOptions, Credential},
    Client, Database,
};
use tracing::info;

/// Driver client built from store options
///
/// The driver connects lazily, so constructing a `Connection` does not
/// require a reachable server.
#[derive(Debug, Clone)]
pub struct Connection {
    client: Client,
}

impl Connection {
    /// Create a client for the hosts, replica set, credentials and pool
    /// settings in `options`
    pub async fn connect(options: &StoreOptions) -> Result<Self> {
        options.validate()?;

        let mut client_options = ClientOptions::parse(options.connection_uri()).await?;
        apply_pool_config(&mut client_options, &options.pool);

        if let Some(username) = &options.username {
            let mut credential = Credential::default();
            credential.username = Some(username.clone());
            credential.password = options.password.clone();
            client_options.credential = Some(credential);
        }

        let client = Client::with_options(client_options)?;

        info!(
            hosts = %options.hosts.join(","),
            replica_set = options.replica_set.as_deref().unwrap_or(""),
            "MongoDB client created"
        );

        Ok(Self { client })
    }

    /// Wrap an existing driver client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Get a reference to the client
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn database(&self, name: &str) -> Database {
        self.client.database(name)
    }

    /// List all database names on the server
    pub async fn list_database_names(&self) -> Result<Vec<String>> {
        let names = self.client.list_database_names().await?;
        Ok(names)
    }

    /// Run a database command against `database`
    pub async fn run_command(&self, database: &str, command: Document) -> Result<Document> {
        let reply = self.client.database(database).run_command(command).await?;
        Ok(reply)
    }
}

fn apply_pool_config(client_options: &mut ClientOptions, config: &PoolConfig) {
    if let Some(min) = config.min_pool_size {
        client_options.min_pool_size = Some(min);
    }
    if let Some(max) = config.max_pool_size {
        client_options.max_pool_size = Some(max);
    }
    if let Some(idle) = config.max_idle_time {
        client_options.max_idle_time = Some(idle);
    }
    if let Some(connect) = config.connect_timeout {
        client_options.connect_timeout = Some(connect);
    }
    if let Some(server_sel) = config.server_selection_timeout {
        client_options.server_selection_timeout = Some(server_sel);
    }
    if let Some(app) = &config.app_name {
        client_options.app_name = Some(app.clone());
    }
}
