use std::future::Future;

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    error::DisplayErrorContext,
    types::{Delete, Object, ObjectIdentifier},
    Client,
};
use tokio::sync::mpsc::{Receiver, Sender};

use super::{DeletionOutcome, DeletionRequest, ObjectEntry, ObjectStore};
use crate::config::PurgeConfig;
use crate::error::{PurgeError, Result};

/// Maximum keys per DeleteObjects request.
pub const MAX_BATCH_SIZE: usize = 1000;

/// Code attached to every key of a batch whose whole request failed.
const BATCH_FAILED_CODE: &str = "BatchRequestFailed";

#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    use_v1: bool,
}

impl S3Store {
    /// Build a client for an S3-compatible endpoint with static credentials
    pub async fn new(config: &PurgeConfig) -> Result<Self> {
        if config.access_key.is_empty() || config.secret_key.is_empty() {
            return Err(PurgeError::Client("access_key and secret_key are required".into()));
        }

        let endpoint_url = config.endpoint_url();
        tracing::debug!(
            "S3 client: endpoint={}, region={}, bucket={}, use_v1={}",
            endpoint_url,
            config.region,
            config.bucket,
            config.use_v1
        );

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "purge-config",
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .endpoint_url(&endpoint_url)
            .credentials_provider(credentials)
            .load()
            .await;

        // S3-compatible services generally expect path-style addressing
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            use_v1: config.use_v1,
        })
    }

    fn listing_error(&self, message: String) -> PurgeError {
        PurgeError::Listing {
            bucket: self.bucket.clone(),
            message,
        }
    }

    async fn list_v2(&self, sender: &Sender<ObjectEntry>) -> Result<usize> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .into_paginator()
            .send();

        let mut listed = 0usize;
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| self.listing_error(DisplayErrorContext(&e).to_string()))?;

            match forward_page(page.contents(), sender).await {
                Some(sent) => listed += sent,
                None => return Ok(listed),
            }
        }

        Ok(listed)
    }

    async fn list_v1(&self, sender: &Sender<ObjectEntry>) -> Result<usize> {
        let mut marker: Option<String> = None;
        let mut listed = 0usize;

        loop {
            let page = self
                .client
                .list_objects()
                .bucket(&self.bucket)
                .set_marker(marker.clone())
                .send()
                .await
                .map_err(|e| self.listing_error(DisplayErrorContext(&e).to_string()))?;

            match forward_page(page.contents(), sender).await {
                Some(sent) => listed += sent,
                None => return Ok(listed),
            }

            let last_key = page.contents().last().and_then(Object::key);
            marker = next_v1_marker(page.is_truncated(), page.next_marker(), last_key);
            if marker.is_none() {
                return Ok(listed);
            }
        }
    }

    async fn delete_batch(&self, keys: Vec<String>, outcomes: &Sender<DeletionOutcome>) -> Result<()> {
        tracing::debug!("S3 DeleteObjects: bucket={}, keys={}", self.bucket, keys.len());

        let identifiers = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| PurgeError::Remove(format!("Failed to build object identifier: {e}")))?;

        let delete = Delete::builder()
            .set_objects(Some(identifiers))
            .quiet(true)
            .build()
            .map_err(|e| PurgeError::Remove(format!("Failed to build Delete request: {e}")))?;

        let response = self
            .client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await;

        let failed = match response {
            Ok(output) => output
                .errors()
                .iter()
                .map(|err| DeletionOutcome {
                    key: err.key().unwrap_or_default().to_string(),
                    code: err.code().unwrap_or("unknown").to_string(),
                    message: err.message().unwrap_or("no message").to_string(),
                })
                .collect(),
            Err(e) => {
                let message = DisplayErrorContext(&e).to_string();
                tracing::error!(
                    "S3 DeleteObjects request failed: bucket={}, keys={}, error={}",
                    self.bucket,
                    keys.len(),
                    message
                );
                request_failure_outcomes(keys, &message)
            }
        };

        tracing::debug!("S3 DeleteObjects done: failed={}", failed.len());
        for outcome in failed {
            if outcomes.send(outcome).await.is_err() {
                break;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_objects(&self, sender: Sender<ObjectEntry>) -> Result<()> {
        tracing::debug!("S3 LIST: bucket={}, recursive=true, v1={}", self.bucket, self.use_v1);

        let listed = if self.use_v1 {
            self.list_v1(&sender).await?
        } else {
            self.list_v2(&sender).await?
        };

        tracing::debug!("S3 LIST success: bucket={}, objects={}", self.bucket, listed);
        Ok(())
    }

    async fn remove_objects(
        &self,
        requests: Receiver<DeletionRequest>,
        outcomes: Sender<DeletionOutcome>,
    ) -> Result<()> {
        let outcomes = &outcomes;
        drain_in_batches(requests, MAX_BATCH_SIZE, move |keys| {
            self.delete_batch(keys, outcomes)
        })
        .await
    }
}

/// Send every keyed object of a listing page. `None` once the receiver is gone.
async fn forward_page(objects: &[Object], sender: &Sender<ObjectEntry>) -> Option<usize> {
    let mut sent = 0usize;
    for key in objects.iter().filter_map(Object::key) {
        let entry = ObjectEntry {
            key: key.to_string(),
        };
        if sender.send(entry).await.is_err() {
            tracing::debug!("S3 LIST receiver closed");
            return None;
        }
        sent += 1;
    }
    Some(sent)
}

/// Where the next V1 page starts. `NextMarker` is only returned when a
/// delimiter is set, so the last key of the page stands in for it.
fn next_v1_marker(
    is_truncated: Option<bool>,
    next_marker: Option<&str>,
    last_key: Option<&str>,
) -> Option<String> {
    if !is_truncated.unwrap_or(false) {
        return None;
    }
    next_marker.or(last_key).map(str::to_string)
}

/// Collect requests into batches of at most `batch_size` keys and hand each
/// full batch to `delete`; the remainder goes out once `requests` closes.
async fn drain_in_batches<F, Fut>(
    mut requests: Receiver<DeletionRequest>,
    batch_size: usize,
    mut delete: F,
) -> Result<()>
where
    F: FnMut(Vec<String>) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut batch = Vec::with_capacity(batch_size);

    while let Some(request) = requests.recv().await {
        batch.push(request.key);
        if batch.len() == batch_size {
            delete(std::mem::replace(&mut batch, Vec::with_capacity(batch_size))).await?;
        }
    }

    if !batch.is_empty() {
        delete(batch).await?;
    }

    Ok(())
}

/// One outcome per key when the whole DeleteObjects request failed.
fn request_failure_outcomes(keys: Vec<String>, message: &str) -> Vec<DeletionOutcome> {
    keys.into_iter()
        .map(|key| DeletionOutcome {
            key,
            code: BATCH_FAILED_CODE.to_string(),
            message: message.to_string(),
        })
        .collect()
}
