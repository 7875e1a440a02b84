// Compute provider boundary. The fleet controller only sees this trait.

mod error;
mod openstack;

pub use error::CloudError;
pub use openstack::{OpenStackRepo, parse_launched_at};

use async_trait::async_trait;

use crate::config::CloudConfig;
use crate::models::ServerSummary;

/// Everything needed to boot one game VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSpec {
    pub name: String,
    pub image_id: String,
    pub flavor_id: String,
    pub network_id: String,
    pub keypair_name: String,
    pub security_group: String,
}

impl ServerSpec {
    pub fn from_config(name: impl Into<String>, cloud: &CloudConfig) -> Self {
        Self {
            name: name.into(),
            image_id: cloud.image_id.clone(),
            flavor_id: cloud.flavor_id.clone(),
            network_id: cloud.network_id.clone(),
            keypair_name: cloud.keypair_name.clone(),
            security_group: cloud.security_group.clone(),
        }
    }
}

#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// All servers in the project, manager nodes included.
    async fn list_servers(&self) -> Result<Vec<ServerSummary>, CloudError>;

    /// Returns the new server's id.
    async fn create_server(&self, spec: &ServerSpec) -> Result<String, CloudError>;

    /// Current status, or `None` once the server no longer exists.
    async fn server_status(&self, id: &str) -> Result<Option<String>, CloudError>;

    async fn delete_server(&self, id: &str) -> Result<(), CloudError>;
}
