use aws_config::BehaviorVersion;
use aws_sdk_s3::{config::Credentials, config::Region, Client};

#[derive(Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
    pub force_path_style: bool,
    /// Base under which uploaded objects are publicly reachable. Falls back
    /// to path-style `{endpoint}/{bucket}` when unset.
    pub public_base: Option<String>,
}

#[derive(Clone)]
pub struct StorageClient {
    client: Client,
    bucket: String,
    endpoint: String,
    public_base: Option<String>,
}

impl StorageClient {
    pub async fn new(config: StorageConfig) -> Result<Self, String> {
        let credentials = Credentials::new(
            config.access_key,
            config.secret_key,
            None,
            None,
            "fabula",
        );
        let region = Region::new(config.region);
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(region)
            .credentials_provider(credentials)
            .endpoint_url(config.endpoint.clone())
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.force_path_style)
            .build();
        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            public_base: config
                .public_base
                .map(|base| base.trim_end_matches('/').to_string()),
        })
    }

    pub async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), String> {
        self.ensure_bucket().await?;
        self.client
            .put_object()
            .bucket(self.bucket.as_str())
            .key(key)
            .content_type(content_type)
            .body(aws_sdk_s3::primitives::ByteStream::from(body))
            .send()
            .await
            .map_err(|err| format!("put object failed: {err}"))?;
        Ok(())
    }

    pub fn public_url(&self, key: &str) -> String {
        match &self.public_base {
            Some(base) => format!("{base}/{key}"),
            None => format!("{}/{}/{}", self.endpoint, self.bucket, key),
        }
    }

    async fn ensure_bucket(&self) -> Result<(), String> {
        let exists = self
            .client
            .head_bucket()
            .bucket(self.bucket.as_str())
            .send()
            .await
            .is_ok();
        if !exists {
            self.client
                .create_bucket()
                .bucket(self.bucket.as_str())
                .send()
                .await
                .map_err(|err| format!("create bucket failed: {err}"))?;
        }
        Ok(())
    }
}

/// Strips a `data:image/png;base64,` style prefix so payloads from either the
/// provider (bare base64) or the frontend (data URL) decode the same way.
pub fn strip_data_url_prefix(b64: &str) -> &str {
    if !b64.starts_with("data:") {
        return b64;
    }
    match b64.find(";base64,") {
        Some(position) => &b64[position + ";base64,".len()..],
        None => b64,
    }
}

#[cfg(test)]
mod tests {
    use super::strip_data_url_prefix;

    #[test]
    fn strips_data_url_prefix() {
        assert_eq!(
            strip_data_url_prefix("data:image/png;base64,aGVsbG8="),
            "aGVsbG8="
        );
        assert_eq!(strip_data_url_prefix("aGVsbG8="), "aGVsbG8=");
        assert_eq!(strip_data_url_prefix("data:text/plain,hi"), "data:text/plain,hi");
    }
}
