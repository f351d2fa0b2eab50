//! S3 backend built on `aws-sdk-s3`.
//!
//! One SDK request per trait call, except listing, which follows
//! continuation tokens until the listing is exhausted or `max_keys` entries
//! have been collected. No retries are layered on top of the SDK's own.

use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::{ByteStream, DateTime as SmithyDateTime};
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::object::{ListRequest, ObjectMeta, ObjectSummary, StoredObject};
use crate::traits::ObjectStore;

/// Characters left unescaped in a `CopySource` header.
const COPY_SOURCE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Connection options for the S3 backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Options {
    /// Region override. The SDK's default provider chain applies otherwise.
    pub region: Option<String>,
    /// Endpoint override for S3-compatible services.
    pub endpoint_url: Option<String>,
    /// Address buckets by path instead of by virtual host.
    pub force_path_style: bool,
    /// Bodies larger than this many bytes are spooled to a scratch file
    /// before upload.
    pub staging_threshold: usize,
}

impl Default for S3Options {
    fn default() -> Self {
        Self {
            region: None,
            endpoint_url: None,
            force_path_style: false,
            staging_threshold: 8 * 1024 * 1024,
        }
    }
}

/// Object store backed by an S3 bucket.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    staging_threshold: usize,
}

impl S3ObjectStore {
    /// Load credentials and region from the environment and build a client.
    pub async fn connect(bucket: impl Into<String>, options: &S3Options) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &options.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &options.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;
        let config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(options.force_path_style)
            .build();

        let bucket = bucket.into();
        info!(bucket = %bucket, endpoint = ?options.endpoint_url, "connected S3 object store");
        Self::from_client(Client::from_conf(config), bucket, options.staging_threshold)
    }

    /// Wrap an already configured client.
    pub fn from_client(client: Client, bucket: impl Into<String>, staging_threshold: usize) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            staging_threshold,
        }
    }

    fn copy_source(&self, key: &str) -> String {
        utf8_percent_encode(&format!("{}/{}", self.bucket, key), COPY_SOURCE).to_string()
    }

    async fn body_for(&self, body: Vec<u8>) -> StoreResult<(ByteStream, Option<tempfile::NamedTempFile>)> {
        if body.len() <= self.staging_threshold {
            return Ok((ByteStream::from(body), None));
        }
        let scratch = tempfile::NamedTempFile::new()?;
        tokio::fs::write(scratch.path(), &body).await?;
        let stream = ByteStream::from_path(scratch.path())
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?;
        debug!(size = body.len(), path = %scratch.path().display(), "staged upload body");
        Ok((stream, Some(scratch)))
    }
}

fn to_chrono(timestamp: &SmithyDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}

fn is_status_404<E>(err: &SdkError<E, HttpResponse>) -> bool {
    err.raw_response()
        .map(|response| response.status().as_u16() == 404)
        .unwrap_or(false)
}

fn backend<E>(operation: &'static str, key: &str, err: SdkError<E, HttpResponse>) -> StoreError
where
    E: std::error::Error + 'static,
{
    StoreError::backend(operation, key, DisplayErrorContext(err))
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn get_object(&self, key: &str) -> StoreResult<Option<StoredObject>> {
        debug!(bucket = %self.bucket, key, "get_object");
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                let missing = err.as_service_error().is_some_and(|e| e.is_no_such_key())
                    || is_status_404(&err);
                if missing {
                    return Ok(None);
                }
                return Err(backend("get_object", key, err));
            }
        };

        let last_modified = output.last_modified().and_then(to_chrono);
        let body = output
            .body
            .collect()
            .await
            .map_err(|e| StoreError::backend("get_object", key, e))?
            .into_bytes()
            .to_vec();
        Ok(Some(StoredObject {
            meta: ObjectMeta {
                key: key.to_string(),
                last_modified,
                size: body.len() as u64,
            },
            body,
        }))
    }

    async fn head_object(&self, key: &str) -> StoreResult<Option<ObjectMeta>> {
        debug!(bucket = %self.bucket, key, "head_object");
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => Ok(Some(ObjectMeta {
                key: key.to_string(),
                last_modified: output.last_modified().and_then(to_chrono),
                size: output.content_length().unwrap_or(0).max(0) as u64,
            })),
            Err(err) => {
                let missing =
                    err.as_service_error().is_some_and(|e| e.is_not_found()) || is_status_404(&err);
                if missing {
                    Ok(None)
                } else {
                    Err(backend("head_object", key, err))
                }
            }
        }
    }

    async fn put_object(&self, key: &str, body: Vec<u8>) -> StoreResult<()> {
        debug!(bucket = %self.bucket, key, size = body.len(), "put_object");
        // The scratch file must outlive the request.
        let (stream, _scratch) = self.body_for(body).await?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(stream)
            .send()
            .await
            .map_err(|e| backend("put_object", key, e))?;
        Ok(())
    }

    async fn copy_object(&self, source: &str, destination: &str) -> StoreResult<()> {
        debug!(bucket = %self.bucket, source, destination, "copy_object");
        match self
            .client
            .copy_object()
            .bucket(&self.bucket)
            .key(destination)
            .copy_source(self.copy_source(source))
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if is_status_404(&err) => Err(StoreError::NotFound(source.to_string())),
            Err(err) => Err(backend("copy_object", source, err)),
        }
    }

    async fn delete_object(&self, key: &str) -> StoreResult<()> {
        debug!(bucket = %self.bucket, key, "delete_object");
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| backend("delete_object", key, e))?;
        Ok(())
    }

    async fn list_objects(&self, request: &ListRequest) -> StoreResult<Vec<ObjectSummary>> {
        debug!(
            bucket = %self.bucket,
            prefix = %request.prefix,
            delimiter = ?request.delimiter,
            max_keys = ?request.max_keys,
            "list_objects"
        );
        let limit = request.max_keys.unwrap_or(usize::MAX);
        let mut summaries = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut call = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&request.prefix);
            if let Some(delimiter) = &request.delimiter {
                call = call.delimiter(delimiter);
            }
            if let Some(max_keys) = request.max_keys {
                let remaining = max_keys.saturating_sub(summaries.len());
                call = call.max_keys(i32::try_from(remaining).unwrap_or(i32::MAX));
            }
            if let Some(token) = continuation.take() {
                call = call.continuation_token(token);
            }

            let page = call
                .send()
                .await
                .map_err(|e| backend("list_objects", &request.prefix, e))?;

            for object in page.contents() {
                if let Some(key) = object.key() {
                    summaries.push(ObjectSummary::new(
                        key,
                        object.last_modified().and_then(to_chrono),
                    ));
                }
            }
            for prefix in page.common_prefixes() {
                if let Some(key) = prefix.prefix() {
                    summaries.push(ObjectSummary::new(key, None));
                }
            }

            if summaries.len() >= limit {
                summaries.truncate(limit);
                break;
            }
            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }
        Ok(summaries)
    }
}

impl std::fmt::Debug for S3ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ObjectStore")
            .field("bucket", &self.bucket)
            .field("staging_threshold", &self.staging_threshold)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_store(staging_threshold: usize) -> S3ObjectStore {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        S3ObjectStore::from_client(Client::from_conf(config), "my bucket", staging_threshold)
    }

    #[test]
    fn default_options() {
        let options = S3Options::default();
        assert!(options.region.is_none());
        assert!(!options.force_path_style);
        assert_eq!(options.staging_threshold, 8 * 1024 * 1024);
    }

    #[test]
    fn copy_source_is_percent_encoded() {
        let store = offline_store(0);
        assert_eq!(
            store.copy_source("nb/Untitled Folder/a+b.ipynb"),
            "my%20bucket/nb/Untitled%20Folder/a%2Bb.ipynb"
        );
        assert_eq!(store.copy_source("plain/key_1.txt"), "my%20bucket/plain/key_1.txt");
    }

    #[test]
    fn timestamps_convert() {
        let ts = SmithyDateTime::from_secs(1_700_000_000);
        assert_eq!(to_chrono(&ts).unwrap().timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn small_bodies_are_not_staged() {
        let store = offline_store(16);
        let (_, scratch) = store.body_for(b"tiny".to_vec()).await.unwrap();
        assert!(scratch.is_none());
    }

    #[tokio::test]
    async fn large_bodies_are_staged_and_cleaned_up() {
        let store = offline_store(4);
        let (_, scratch) = store.body_for(b"more than four".to_vec()).await.unwrap();
        let scratch = scratch.expect("staged");
        let path = scratch.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), b"more than four");
        drop(scratch);
        assert!(!path.exists());
    }

    mod replayed {
        use aws_sdk_s3::config::retry::RetryConfig;
        use aws_sdk_s3::config::{BehaviorVersion, Credentials};
        use aws_smithy_http_client::test_util::{ReplayEvent, StaticReplayClient};
        use aws_smithy_types::body::SdkBody;

        use super::*;

        const ENDPOINT: &str = "https://s3.us-east-1.amazonaws.com/mybucket";

        fn store_replaying(events: Vec<ReplayEvent>) -> (S3ObjectStore, StaticReplayClient) {
            let replay = StaticReplayClient::new(events);
            let config = aws_sdk_s3::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .region(Region::new("us-east-1"))
                .credentials_provider(Credentials::new("AKID", "secret", None, None, "test"))
                .retry_config(RetryConfig::disabled())
                .force_path_style(true)
                .http_client(replay.clone())
                .build();
            let store = S3ObjectStore::from_client(Client::from_conf(config), "mybucket", 1024);
            (store, replay)
        }

        fn event(path: &str, status: u16, body: &str) -> ReplayEvent {
            ReplayEvent::new(
                http::Request::builder()
                    .uri(format!("{ENDPOINT}/{path}"))
                    .body(SdkBody::empty())
                    .unwrap(),
                http::Response::builder()
                    .status(status)
                    .body(SdkBody::from(body.to_string()))
                    .unwrap(),
            )
        }

        fn listing(contents: &[&str], prefixes: &[&str], next: Option<&str>) -> String {
            let mut xml = String::from(
                r#"<?xml version="1.0" encoding="UTF-8"?><ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Name>mybucket</Name>"#,
            );
            for key in contents {
                xml.push_str(&format!(
                    "<Contents><Key>{key}</Key><LastModified>2024-01-01T00:00:00.000Z</LastModified><Size>1</Size></Contents>"
                ));
            }
            for prefix in prefixes {
                xml.push_str(&format!("<CommonPrefixes><Prefix>{prefix}</Prefix></CommonPrefixes>"));
            }
            match next {
                Some(token) => xml.push_str(&format!(
                    "<IsTruncated>true</IsTruncated><NextContinuationToken>{token}</NextContinuationToken>"
                )),
                None => xml.push_str("<IsTruncated>false</IsTruncated>"),
            }
            xml.push_str("</ListBucketResult>");
            xml
        }

        #[tokio::test]
        async fn head_of_missing_object_is_none() {
            let (store, _) = store_replaying(vec![event("nb/missing.txt", 404, "")]);
            assert!(store.head_object("nb/missing.txt").await.unwrap().is_none());
        }

        #[tokio::test]
        async fn forbidden_head_is_an_error() {
            let (store, _) = store_replaying(vec![event("nb/secret.txt", 403, "")]);
            let err = store.head_object("nb/secret.txt").await.unwrap_err();
            assert!(matches!(
                err,
                StoreError::Backend { operation: "head_object", ref key, .. } if key == "nb/secret.txt"
            ));
        }

        #[tokio::test]
        async fn get_of_missing_key_is_none() {
            let body = r#"<?xml version="1.0" encoding="UTF-8"?><Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message><Key>nb/gone.ipynb</Key></Error>"#;
            let (store, _) = store_replaying(vec![event("nb/gone.ipynb", 404, body)]);
            assert!(store.get_object("nb/gone.ipynb").await.unwrap().is_none());
        }

        #[tokio::test]
        async fn get_returns_body_and_size() {
            let (store, _) = store_replaying(vec![event("nb/a.txt", 200, "hello")]);
            let object = store.get_object("nb/a.txt").await.unwrap().unwrap();
            assert_eq!(object.body, b"hello");
            assert_eq!(object.meta.key, "nb/a.txt");
            assert_eq!(object.meta.size, 5);
        }

        #[tokio::test]
        async fn listing_follows_continuation_tokens() {
            let (store, replay) = store_replaying(vec![
                event(
                    "?list-type=2&delimiter=%2F&prefix=nb%2F",
                    200,
                    &listing(&["nb/a.ipynb"], &["nb/sub/"], Some("page-2")),
                ),
                event(
                    "?list-type=2&continuation-token=page-2&delimiter=%2F&prefix=nb%2F",
                    200,
                    &listing(&["nb/b.txt"], &[], None),
                ),
            ]);
            let summaries = store
                .list_objects(&ListRequest::new("nb/").delimiter("/"))
                .await
                .unwrap();

            let keys: Vec<&str> = summaries.iter().map(|s| s.key.as_str()).collect();
            assert_eq!(keys, ["nb/a.ipynb", "nb/sub/", "nb/b.txt"]);
            assert_eq!(summaries[0].last_modified.unwrap().timestamp(), 1_704_067_200);
            assert!(summaries[1].last_modified.is_none());

            let uris: Vec<String> = replay.actual_requests().map(|r| r.uri().to_string()).collect();
            assert_eq!(uris.len(), 2);
            assert!(!uris[0].contains("continuation-token"));
            assert!(uris[1].contains("continuation-token=page-2"));
        }

        #[tokio::test]
        async fn max_keys_stops_after_the_first_entries() {
            let (store, replay) = store_replaying(vec![event(
                "?list-type=2&max-keys=1&prefix=nb%2Fproj%2F",
                200,
                &listing(&["nb/proj/a.txt", "nb/proj/b.txt"], &[], Some("page-2")),
            )]);
            let summaries = store
                .list_objects(&ListRequest::new("nb/proj/").max_keys(1))
                .await
                .unwrap();

            assert_eq!(summaries.len(), 1);
            assert_eq!(summaries[0].key, "nb/proj/a.txt");
            let uris: Vec<String> = replay.actual_requests().map(|r| r.uri().to_string()).collect();
            assert_eq!(uris.len(), 1);
            assert!(uris[0].contains("max-keys=1"));
        }
    }
}
