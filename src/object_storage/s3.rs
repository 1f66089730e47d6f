use super::{file_key_for, StorageError, StorageUrlIssuer, UploadUrlGrant};
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use std::time::Duration;

const UPLOAD_URL_TTL: Duration = Duration::from_secs(10 * 60);
const DOWNLOAD_URL_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
pub struct S3UrlIssuerConfig {
    pub key_id: String,
    pub application_key: String,
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
}

/// Pre-signs PUT and GET requests against an S3-compatible bucket.
pub struct S3UrlIssuer {
    client: Client,
    bucket: String,
}

impl S3UrlIssuer {
    pub fn new(config: S3UrlIssuerConfig) -> Self {
        let credentials = Credentials::new(
            &config.key_id,
            &config.application_key,
            None,
            None,
            "resonate-storage",
        );

        let s3_config = aws_sdk_s3::config::Builder::new()
            .region(Region::new(config.region))
            .endpoint_url(&config.endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .behavior_version_latest()
            .build();

        S3UrlIssuer {
            client: Client::from_conf(s3_config),
            bucket: config.bucket,
        }
    }
}

fn presigning(ttl: Duration) -> Result<PresigningConfig, StorageError> {
    PresigningConfig::expires_in(ttl).map_err(|e| StorageError::Unavailable(e.to_string()))
}

#[async_trait]
impl StorageUrlIssuer for S3UrlIssuer {
    async fn issue_upload_url(
        &self,
        file_name: &str,
        content_type: &str,
    ) -> Result<UploadUrlGrant, StorageError> {
        let file_key = file_key_for(file_name);
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&file_key)
            .content_type(content_type)
            .presigned(presigning(UPLOAD_URL_TTL)?)
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        Ok(UploadUrlGrant {
            upload_url: request.uri().to_string(),
            file_key,
            bucket_name: self.bucket.clone(),
        })
    }

    async fn issue_download_url(&self, file_key: &str) -> Result<String, StorageError> {
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(file_key)
            .presigned(presigning(DOWNLOAD_URL_TTL)?)
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        Ok(request.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::super::file_key_for;

    #[test]
    fn file_keys_keep_the_name_and_never_collide() {
        let a = file_key_for("song.mp3");
        let b = file_key_for("song.mp3");
        assert!(a.ends_with("-song.mp3"));
        assert!(b.ends_with("-song.mp3"));
        assert_ne!(a, b);
    }
}
