use serde::{Deserialize, Serialize};

use crate::domain::Engine;

/// `GET /stores`, `DELETE /stores/{name}`
pub const STORES_PATH: &str = "stores";
/// `POST /provision`
pub const PROVISION_PATH: &str = "provision";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProvisionRequest {
    pub engine: Engine,
}
