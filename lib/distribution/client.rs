use futures::future::BoxFuture;
use governor::{Quota, RateLimiter};
use log::{debug, info};
use nonzero_ext::nonzero;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use super::{
    ChannelCatalog, ChannelId, DistributionClient, DistributionError, FileRef, GlobalRateLimiter,
    ProductSnapshot, VersionId,
};

/// Default request budget shared by catalog lookups and segment downloads.
const REQUESTS_PER_SECOND: u32 = 64;

#[derive(Debug, Deserialize)]
struct SessionPayload {
    token: String,
}

#[derive(Debug, Deserialize)]
struct SnapshotPayload {
    version: String,
    channels: Vec<ChannelCatalog>,
}

/// HTTP implementation used by the production runtime.
///
/// The rate limiter is injected at this level (rather than around batch
/// loops) so every request issued on behalf of a run draws from the same
/// budget.
#[derive(Clone)]
pub struct HttpDistributionClient {
    client: reqwest::Client,
    base_url: String,
    session_token: String,
    request_budget: GlobalRateLimiter,
}

impl HttpDistributionClient {
    /// Authenticates against the distribution service and returns a session
    /// bound client.
    pub async fn connect(
        base_url: String,
        account: &str,
        password: &str,
    ) -> Result<Self, DistributionError> {
        let client = reqwest::Client::new();
        let response = client
            .post(format!("{base_url}/session"))
            .json(&serde_json::json!({ "account": account, "password": password }))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(DistributionError::AuthRejected {
                account: account.to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(DistributionError::UnexpectedStatus {
                resource: "session".to_string(),
                status: status.as_u16(),
            });
        }

        let payload: SessionPayload = response.json().await?;
        info!("Session established for account {account}");
        Ok(Self {
            client,
            base_url,
            session_token: payload.token,
            request_budget: Arc::new(RateLimiter::direct(Quota::per_second(nonzero!(
                REQUESTS_PER_SECOND
            )))),
        })
    }
}

impl DistributionClient for HttpDistributionClient {
    fn product_snapshot<'a>(
        &'a self,
        product_id: u32,
    ) -> BoxFuture<'a, Result<ProductSnapshot, DistributionError>> {
        Box::pin(async move {
            self.request_budget.until_ready().await;

            let url = format!("{}/products/{}/snapshot", self.base_url, product_id);
            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.session_token)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(DistributionError::UnexpectedStatus {
                    resource: format!("product {product_id} snapshot"),
                    status: response.status().as_u16(),
                });
            }

            let payload: SnapshotPayload = response.json().await?;
            if payload.version.is_empty() {
                return Err(DistributionError::Parse(format!(
                    "product {product_id} snapshot carries an empty version id"
                )));
            }

            Ok(ProductSnapshot {
                version: VersionId::new(payload.version),
                catalogs: payload.channels,
            })
        })
    }

    fn fetch_file<'a>(
        &'a self,
        channel: ChannelId,
        file: &'a FileRef,
        dest: &'a Path,
    ) -> BoxFuture<'a, Result<(), DistributionError>> {
        Box::pin(async move {
            self.request_budget.until_ready().await;

            let url = format!("{}/channels/{}/files/{}", self.base_url, channel, file.name);
            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.session_token)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(DistributionError::UnexpectedStatus {
                    resource: format!("channel {channel} file {}", file.name),
                    status: response.status().as_u16(),
                });
            }

            let bytes = response.bytes().await?;
            debug!(
                "Fetched {} ({} bytes) from channel {channel}",
                file.name,
                bytes.len()
            );
            tokio::fs::write(dest, &bytes)
                .await
                .map_err(|source| DistributionError::Io {
                    path: dest.to_path_buf(),
                    source,
                })?;

            Ok(())
        })
    }
}
