// Inventory endpoints
//
// Managed-entity enumeration. The server resolves display paths, so a
// listing entry is directly usable for both selection UIs and queries.

use tracing::debug;

use crate::client::ApiClient;
use crate::error::Error;
use crate::model::InventoryObject;

impl ApiClient {
    /// List every host in the inventory, recursively from the root.
    ///
    /// `GET /api/inventory/hosts`
    pub async fn list_hosts(&self) -> Result<Vec<InventoryObject>, Error> {
        let url = self.api_url("inventory/hosts");
        debug!("listing hosts");
        self.get(url).await
    }

    /// List every datacenter in the inventory.
    ///
    /// `GET /api/inventory/datacenters`
    pub async fn list_datacenters(&self) -> Result<Vec<InventoryObject>, Error> {
        let url = self.api_url("inventory/datacenters");
        debug!("listing datacenters");
        self.get(url).await
    }
}
