// Authorized S3 access on top of reqwest: SigV4-signed ranged GET and HEAD.
// This is all the S3 API surface the crate needs; anything more belongs in a
// real SDK.
mod sign;

use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet};
use reqwest::Client;

use crate::credentials::AwsCredentials;
use crate::Error;

// RFC 3986 unreserved characters plus '/' stay as-is in S3 object key paths
const KEY_ENCODE_SET: &AsciiSet = &percent_encoding::NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Splits an `s3://bucket/key` URL into (bucket, key)
pub fn parse_s3_url(url: &str) -> Result<(String, String), Error> {
    let rest = url
        .strip_prefix("s3://")
        .ok_or_else(|| Error::InvalidData(format!("Not an s3:// URL: {url}")))?;
    match rest.split_once('/') {
        Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => {
            Ok((bucket.to_string(), key.to_string()))
        }
        _ => Err(Error::InvalidData(format!(
            "Failed to extract bucket/key from {url}"
        ))),
    }
}

pub struct S3Client {
    client: Client,
    credentials: AwsCredentials,
    region: String,
}

impl S3Client {
    pub fn new(credentials: AwsCredentials, region: &str) -> Result<S3Client, Error> {
        credentials.validate()?;
        let client = Client::builder().build()?;
        Ok(S3Client {
            client,
            credentials,
            region: region.to_string(),
        })
    }

    /// Builds a client with fresh Earthdata credentials for `dataset` (same
    /// side effects and failure modes as `auth::get_s3_credentials`)
    pub async fn for_dataset(dataset: &str) -> Result<S3Client, Error> {
        let credentials = crate::auth::get_s3_credentials(dataset).await?;
        S3Client::new(credentials, crate::credentials::DEFAULT_REGION)
    }

    fn host_for_bucket(&self, bucket: &str) -> String {
        format!("{}.s3.{}.amazonaws.com", bucket, self.region)
    }

    fn signed_request(
        &self,
        method: reqwest::Method,
        bucket: &str,
        key: &str,
    ) -> Result<reqwest::RequestBuilder, Error> {
        let host = self.host_for_bucket(bucket);
        let uri = format!("/{}", utf8_percent_encode(key, KEY_ENCODE_SET));
        let headers =
            sign::sign_request(&self.credentials, &self.region, method.as_str(), &host, &uri)?;
        let mut req = self
            .client
            .request(method, format!("https://{host}{uri}"))
            .header("Host", headers.host_header)
            .header("x-amz-date", headers.amz_date_header)
            .header("Authorization", headers.authorization_header);
        if let Some(token) = headers.security_token_header {
            req = req.header("x-amz-security-token", token);
        }
        Ok(req)
    }

    /// Reads the byte range `[from, to]` (inclusive) of an object. Requires an
    /// explicit 206 (Partial Content): a server replying 200 with the whole
    /// object is not something we want here. A range reaching past EOF still
    /// gets a 206 with the data until EOF, so short bodies are fine; a range
    /// entirely past EOF is a 416 and errors out
    pub async fn get_object_range(
        &self,
        bucket: &str,
        key: &str,
        from: u64,
        to: u64,
    ) -> Result<Bytes, Error> {
        let resp = self
            .signed_request(reqwest::Method::GET, bucket, key)?
            .header("Range", format!("bytes={from}-{to}"))
            .send()
            .await?;
        if resp.status().as_u16() == 206 {
            Ok(resp.bytes().await?)
        } else {
            Err(Error::SourceError(format!(
                "Range request failed, code={}: {}",
                resp.status().as_u16(),
                resp.text().await?,
            )))
        }
    }

    /// Returns the object size in bytes via a HEAD request
    pub async fn head_object(&self, bucket: &str, key: &str) -> Result<u64, Error> {
        let resp = self
            .signed_request(reqwest::Method::HEAD, bucket, key)?
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::SourceError(format!(
                "HEAD request failed, code={}",
                resp.status().as_u16(),
            )));
        }
        // Read the Content-Length header, not Response::content_length(): the
        // latter reports the body size, and a HEAD body is empty
        content_length_from_headers(resp.headers())
    }
}

fn content_length_from_headers(headers: &reqwest::header::HeaderMap) -> Result<u64, Error> {
    headers
        .get(reqwest::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or_else(|| Error::SourceError("HEAD response without Content-Length".to_string()))
}

#[cfg(test)]
mod tests {
    use super::{content_length_from_headers, parse_s3_url};
    use crate::Error;
    use reqwest::header::{HeaderMap, HeaderValue, CONTENT_LENGTH};

    #[test]
    fn test_parse_s3_url() {
        let (bucket, key) =
            parse_s3_url("s3://opera-ops-rs-pop1/OPERA_L2_CSLC-S1/T042/t042.h5").unwrap();
        assert_eq!(bucket, "opera-ops-rs-pop1");
        assert_eq!(key, "OPERA_L2_CSLC-S1/T042/t042.h5");
    }

    #[test]
    fn test_content_length_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("1234"));
        assert_eq!(content_length_from_headers(&headers).unwrap(), 1234);

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("not-a-number"));
        assert!(matches!(
            content_length_from_headers(&headers),
            Err(Error::SourceError(_))
        ));

        assert!(matches!(
            content_length_from_headers(&HeaderMap::new()),
            Err(Error::SourceError(_))
        ));
    }

    #[test]
    fn test_parse_s3_url_invalid() {
        for url in ["https://example.com/x", "s3://bucket-only", "s3://bucket/", "s3:///key"] {
            assert!(matches!(parse_s3_url(url), Err(Error::InvalidData(_))), "{url}");
        }
    }
}
