use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, TestcontainersError};
use thiserror::Error;

const REDIS_IMAGE: &str = "redis";
const REDIS_TAG: &str = "8.6.0";
const REDIS_PORT: u16 = 6379;

#[derive(Debug, Error)]
pub enum RedisServerError {
    #[error("failed to start Redis container: {0}")]
    Start(#[source] TestcontainersError),

    #[error("failed to look up the mapped Redis address: {0}")]
    Address(#[source] TestcontainersError),

    #[error("failed to connect to the Redis container: {0}")]
    Connect(#[from] redis::RedisError),
}

pub type Result<T> = std::result::Result<T, RedisServerError>;

/// Test fixture for a disposable, standalone Redis server.
///
/// The container is stopped when the fixture is dropped.
pub struct RedisServer {
    container: ContainerAsync<GenericImage>,
}

impl RedisServer {
    /// Starts a Redis container and waits until it accepts connections.
    pub async fn start() -> Result<Self> {
        let container = GenericImage::new(REDIS_IMAGE, REDIS_TAG)
            .with_exposed_port(REDIS_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"))
            .start()
            .await
            .map_err(RedisServerError::Start)?;
        Ok(Self { container })
    }

    pub async fn host(&self) -> Result<String> {
        let host = self
            .container
            .get_host()
            .await
            .map_err(RedisServerError::Address)?
            .to_string();
        match host.as_str() {
            "localhost" => Ok(String::from("127.0.0.1")),
            _ => Ok(host),
        }
    }

    pub async fn port(&self) -> Result<u16> {
        self.container
            .get_host_port_ipv4(REDIS_PORT)
            .await
            .map_err(RedisServerError::Address)
    }

    /// Connection URL for the running server, e.g. `redis://127.0.0.1:32768`.
    pub async fn url(&self) -> Result<String> {
        Ok(format!("redis://{}:{}", self.host().await?, self.port().await?))
    }

    /// Opens a fresh multiplexed connection, for inspecting keys directly.
    pub async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        let client = redis::Client::open(self.url().await?.as_str())?;
        Ok(client.get_multiplexed_async_connection().await?)
    }
}
