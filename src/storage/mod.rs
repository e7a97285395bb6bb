// Object storage for pipeline artifacts
//
// - s3: AWS S3 implementation
//
// Every artifact exchanged with the remote functions lives in one bucket and
// is addressed by a path-like key.

pub mod s3;

use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use tracing::info;

use crate::config::StorageConfig;
use crate::error::{Result, DubError};
use crate::functions::ParameterStore;

/// Bucket-scoped object storage
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload a local file under `key`
    async fn upload(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()>;

    /// Download `key` into a local file, replacing it
    async fn download(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()>;

    /// Fetch an object's body
    async fn get_bytes(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Names of every bucket visible to the caller
    async fn list_buckets(&self) -> Result<Vec<String>>;
}

/// Where the pipeline bucket name comes from
#[derive(Debug, Clone)]
pub enum BucketLocator {
    Named(String),
    Parameter(String),
    Pattern(String),
}

impl From<&StorageConfig> for BucketLocator {
    fn from(config: &StorageConfig) -> Self {
        if let Some(name) = &config.bucket {
            Self::Named(name.clone())
        } else if let Some(parameter) = &config.bucket_parameter {
            Self::Parameter(parameter.clone())
        } else {
            Self::Pattern(config.bucket_pattern.clone())
        }
    }
}

impl BucketLocator {
    pub async fn resolve(
        &self,
        store: &dyn ObjectStore,
        parameters: &dyn ParameterStore,
    ) -> Result<String> {
        let bucket = match self {
            Self::Named(name) => name.clone(),
            Self::Parameter(name) => parameters.get_parameter(name).await?,
            Self::Pattern(pattern) => {
                let regex = Regex::new(pattern)
                    .map_err(|e| DubError::Config(format!("Invalid bucket pattern '{}': {}", pattern, e)))?;
                store.list_buckets().await?
                    .into_iter()
                    .find(|name| regex.is_match(name))
                    .ok_or_else(|| DubError::Config(format!("No bucket matches pattern '{}'", pattern)))?
            }
        };

        info!("Using bucket {}", bucket);
        Ok(bucket)
    }
}

/// Split an S3 location into (bucket, key).
///
/// Understands `s3://bucket/key`, path-style `https://s3.<region>.amazonaws.com/bucket/key`
/// and virtual-hosted `https://bucket.s3.<region>.amazonaws.com/key`. Keys are
/// percent-decoded.
pub fn parse_s3_location(location: &str) -> Option<(String, String)> {
    let url = reqwest::Url::parse(location).ok()?;
    let host = url.host_str()?;
    let path = url.path().trim_start_matches('/');

    let (bucket, key) = match url.scheme() {
        "s3" => (host.to_string(), path),
        "https" | "http" => {
            let labels: Vec<&str> = host.strip_suffix(".amazonaws.com")?.split('.').collect();
            // Labels left of the last `s3` / `s3-<region>` label name the bucket
            let service = labels.iter().rposition(|label| is_s3_label(label))?;
            if service == 0 {
                let (bucket, key) = path.split_once('/')?;
                (bucket.to_string(), key)
            } else {
                (labels[..service].join("."), path)
            }
        }
        _ => return None,
    };

    if bucket.is_empty() || key.is_empty() {
        return None;
    }
    let key = urlencoding::decode(key).ok()?;
    Some((bucket, key.into_owned()))
}

/// `s3` or a legacy regional endpoint label such as `s3-us-west-1`
fn is_s3_label(label: &str) -> bool {
    match label.strip_prefix("s3-") {
        Some(region) => region.contains('-') && region.ends_with(|c: char| c.is_ascii_digit()),
        None => label == "s3",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::MockParameterStore;

    #[test]
    fn test_parse_s3_locations() {
        assert_eq!(
            parse_s3_location("s3://my-bucket/runs/a/t.json"),
            Some(("my-bucket".to_string(), "runs/a/t.json".to_string()))
        );
        assert_eq!(
            parse_s3_location("https://s3.us-west-1.amazonaws.com/my-bucket/tel2eng.json"),
            Some(("my-bucket".to_string(), "tel2eng.json".to_string()))
        );
        assert_eq!(
            parse_s3_location("https://my-bucket.s3.us-west-1.amazonaws.com/tel2eng.json"),
            Some(("my-bucket".to_string(), "tel2eng.json".to_string()))
        );
        assert_eq!(parse_s3_location("https://example.com/transcript.json"), None);
        assert_eq!(parse_s3_location("not a url"), None);
    }

    #[test]
    fn test_parse_s3_bucket_named_like_endpoint() {
        assert_eq!(
            parse_s3_location("https://s3-logs.s3.us-west-1.amazonaws.com/job.json"),
            Some(("s3-logs".to_string(), "job.json".to_string()))
        );
        assert_eq!(
            parse_s3_location("https://s3-us-west-1.amazonaws.com/my-bucket/job.json"),
            Some(("my-bucket".to_string(), "job.json".to_string()))
        );
        assert_eq!(
            parse_s3_location("https://my.dotted.bucket.s3-us-west-1.amazonaws.com/job.json"),
            Some(("my.dotted.bucket".to_string(), "job.json".to_string()))
        );
    }

    #[test]
    fn test_parse_s3_decodes_keys() {
        assert_eq!(
            parse_s3_location("s3://b/runs/a%20b/t.json"),
            Some(("b".to_string(), "runs/a b/t.json".to_string()))
        );
        assert_eq!(
            parse_s3_location("https://b.s3.us-west-1.amazonaws.com/%E0%B0%A4%E0%B1%86.json"),
            Some(("b".to_string(), "తె.json".to_string()))
        );
        assert_eq!(
            parse_s3_location("https://s3.us-west-1.amazonaws.com/b/a+b.json"),
            Some(("b".to_string(), "a+b.json".to_string()))
        );
    }

    #[tokio::test]
    async fn test_named_bucket_needs_no_lookups() {
        let store = MockObjectStore::new();
        let params = MockParameterStore::new();

        let bucket = BucketLocator::Named("fixed".to_string())
            .resolve(&store, &params)
            .await
            .unwrap();
        assert_eq!(bucket, "fixed");
    }

    #[tokio::test]
    async fn test_parameter_bucket() {
        let store = MockObjectStore::new();
        let mut params = MockParameterStore::new();
        params.expect_get_parameter()
            .withf(|name: &str| name == "BucketName")
            .times(1)
            .returning(|_| Ok("from-ssm".to_string()));

        let bucket = BucketLocator::Parameter("BucketName".to_string())
            .resolve(&store, &params)
            .await
            .unwrap();
        assert_eq!(bucket, "from-ssm");
    }

    #[tokio::test]
    async fn test_pattern_picks_first_match() {
        let mut store = MockObjectStore::new();
        store.expect_list_buckets().returning(|| {
            Ok(vec![
                "unrelated".to_string(),
                "telugutoenglishtranscrip-transcribebucket1a2b".to_string(),
                "telugutoenglishtranscrip-transcribebucket9z".to_string(),
            ])
        });
        let params = MockParameterStore::new();

        let locator = BucketLocator::from(&StorageConfig::default());
        let bucket = locator.resolve(&store, &params).await.unwrap();
        assert_eq!(bucket, "telugutoenglishtranscrip-transcribebucket1a2b");
    }

    #[tokio::test]
    async fn test_pattern_without_match_is_config_error() {
        let mut store = MockObjectStore::new();
        store.expect_list_buckets().returning(|| Ok(vec!["other".to_string()]));
        let params = MockParameterStore::new();

        let result = BucketLocator::Pattern("^dub".to_string()).resolve(&store, &params).await;
        assert!(matches!(result, Err(DubError::Config(_))));
    }
}
