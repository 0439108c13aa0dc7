use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use shared::{
    domain::Store,
    protocol::{ProvisionRequest, PROVISION_PATH, STORES_PATH},
};
use url::Url;

/// The remote service that owns the true state of all stores.
#[async_trait]
pub trait StoreAuthority: Send + Sync {
    async fn list_stores(&self) -> Result<Vec<Store>>;
    async fn provision(&self, request: &ProvisionRequest) -> Result<()>;
    async fn delete_store(&self, name: &str) -> Result<()>;
}

pub struct HttpAuthority {
    http: Client,
    base: Url,
}

impl HttpAuthority {
    /// `timeout` of `None` leaves requests bounded only by the transport.
    pub fn new(api_base: &str, timeout: Option<Duration>) -> Result<Self> {
        let base = Url::parse(api_base).with_context(|| format!("invalid api base: {api_base}"))?;
        if base.cannot_be_a_base() {
            return Err(anyhow!("api base must be an http(s) url: {api_base}"));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("failed to build http client")?;

        Ok(Self { http, base })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("api base cannot carry a path: {}", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl StoreAuthority for HttpAuthority {
    async fn list_stores(&self) -> Result<Vec<Store>> {
        let stores = self
            .http
            .get(self.endpoint(&[STORES_PATH])?)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(stores)
    }

    async fn provision(&self, request: &ProvisionRequest) -> Result<()> {
        self.http
            .post(self.endpoint(&[PROVISION_PATH])?)
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn delete_store(&self, name: &str) -> Result<()> {
        self.http
            .delete(self.endpoint(&[STORES_PATH, name])?)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/authority_tests.rs"]
mod tests;
