use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, meta::region::RegionProviderChain};
use aws_sdk_s3::primitives::ByteStream;
use tracing::info;

use crate::config::PublishConfig;

/// Destination for finished artifacts.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Uploads `path` and returns a reference to the published copy.
    async fn publish(&self, path: &Path) -> anyhow::Result<String>;
}

fn object_key(prefix: &str, run_id: &str, path: &Path) -> anyhow::Result<String> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid filename {}", path.display()))?;
    let prefix = prefix.trim_matches('/');
    Ok(if prefix.is_empty() {
        format!("{run_id}/{name}")
    } else {
        format!("{prefix}/{run_id}/{name}")
    })
}

pub struct S3Publisher {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
    run_id: String,
}

impl S3Publisher {
    pub async fn from_env(config: &PublishConfig, run_id: &str) -> Self {
        let region_provider = RegionProviderChain::default_provider().or_else("us-east-1");
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;
        Self {
            client: aws_sdk_s3::Client::new(&aws_config),
            bucket: config.bucket.clone(),
            prefix: config.prefix.clone(),
            run_id: run_id.to_string(),
        }
    }
}

#[async_trait]
impl Publisher for S3Publisher {
    async fn publish(&self, path: &Path) -> anyhow::Result<String> {
        let key = object_key(&self.prefix, &self.run_id, path)?;
        let body = ByteStream::from_path(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body)
            .send()
            .await
            .with_context(|| format!("Upload to s3://{}/{} failed", self.bucket, key))?;

        let reference = format!("s3://{}/{}", self.bucket, key);
        info!("Uploaded {} to {}", path.display(), reference);
        Ok(reference)
    }
}

/// Logs where an artifact would go without uploading it.
pub struct DryRunPublisher {
    pub bucket: String,
    pub prefix: String,
    pub run_id: String,
}

#[async_trait]
impl Publisher for DryRunPublisher {
    async fn publish(&self, path: &Path) -> anyhow::Result<String> {
        let key = object_key(&self.prefix, &self.run_id, path)?;
        let reference = format!("s3://{}/{}", self.bucket, key);
        info!("[dry run] would upload {} to {}", path.display(), reference);
        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn keys_group_artifacts_by_run() {
        assert_eq!(
            object_key("/videos/", "how-dns-works", Path::new("final_video.mp4")).unwrap(),
            "videos/how-dns-works/final_video.mp4"
        );
        assert_eq!(
            object_key("", "run", Path::new("a.wav")).unwrap(),
            "run/a.wav"
        );
        assert!(object_key("videos", "run", Path::new("/")).is_err());
    }

    #[tokio::test]
    async fn dry_run_returns_reference() {
        let publisher = DryRunPublisher {
            bucket: "renders".into(),
            prefix: "videos".into(),
            run_id: "wifi".into(),
        };
        assert_eq!(
            publisher.publish(Path::new("output/final_video.mp4")).await.unwrap(),
            "s3://renders/videos/wifi/final_video.mp4"
        );
    }
}
