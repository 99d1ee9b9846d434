use crate::s3::{parse_s3_url, S3Client};
use crate::Error;
use bytes::Buf;
use std::cmp::min;

#[derive(Debug, Default)]
struct Stats {
    requests_count: usize,
}

/// Ranged reads of a single S3 object through an authorized client
pub struct S3Source {
    client: S3Client,
    bucket: String,
    key: String,
    stats: Stats,
}

impl S3Source {
    pub fn new(client: S3Client, url: &str) -> Result<S3Source, Error> {
        let (bucket, key) = parse_s3_url(url)?;
        Ok(S3Source {
            client,
            bucket,
            key,
            stats: Default::default(),
        })
    }

    pub async fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.stats.requests_count += 1;
        let (from, to) = byte_range(offset, buf.len());
        let mut body = self
            .client
            .get_object_range(&self.bucket, &self.key, from, to)
            .await?;
        // A partial read past EOF returns the data until EOF, so a short body
        // here is the EOF signal
        let len_to_copy = min(body.remaining(), buf.len());
        body.copy_to_slice(&mut buf[0..len_to_copy]);
        Ok(len_to_copy)
    }

    pub async fn len(&mut self) -> Result<u64, Error> {
        self.stats.requests_count += 1;
        self.client.head_object(&self.bucket, &self.key).await
    }

    pub fn get_stats(&self) -> String {
        format!("{:?}", self.stats)
    }
}

// HTTP Range bounds are inclusive: reading len bytes at offset ends at
// offset + len - 1
fn byte_range(offset: u64, len: usize) -> (u64, u64) {
    (offset, offset + len as u64 - 1)
}
