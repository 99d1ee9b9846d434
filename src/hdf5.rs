// Remote HDF5 file access over S3.
//
// This opens the object as a page-cached ranged-read source and validates the
// HDF5 superblock signature. Structural parsing of the file (object headers,
// datasets) is left to the caller; the handle exposes positioned reads.
use crate::auth::get_s3_credentials;
use crate::credentials::{AwsCredentials, DEFAULT_REGION};
use crate::s3::S3Client;
use crate::sources::{S3Source, Source, DEFAULT_CACHE_BYTES, DEFAULT_PAGE_SIZE};
use crate::Error;

/// The 8-byte HDF5 superblock signature: `\x89HDF\r\n\x1a\n`
pub const HDF5_SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1a, b'\n'];

// The superblock sits after an optional userblock whose size is a power of two
// starting at 512; give up after a reasonable number of doublings
const MAX_SIGNATURE_OFFSET: u64 = 1 << 20;

#[derive(Debug, Clone, Copy)]
pub struct OpenOptions {
    /// Filesystem page size in bytes
    pub page_size: usize,
    /// Read cache size in bytes
    pub cache_bytes: usize,
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions {
            page_size: DEFAULT_PAGE_SIZE,
            cache_bytes: DEFAULT_CACHE_BYTES,
        }
    }
}

/// A read-only handle on a remote HDF5 file. Dropping the handle releases it
#[derive(Debug)]
pub struct RemoteHdf5 {
    source: Source,
    signature_offset: u64,
    size: u64,
}

impl RemoteHdf5 {
    /// Opens `url` (an `s3://bucket/key` URL) for read-only access.
    ///
    /// When `credentials` is None, fetches fresh ones for `dataset` via
    /// Earthdata login (same side effects and failure modes as
    /// `auth::get_s3_credentials`)
    pub async fn open(
        url: &str,
        credentials: Option<AwsCredentials>,
        dataset: &str,
        options: OpenOptions,
    ) -> Result<RemoteHdf5, Error> {
        let credentials = match credentials {
            Some(c) => c,
            None => get_s3_credentials(dataset).await?,
        };
        let client = S3Client::new(credentials, DEFAULT_REGION)?;
        let source = Source::new_s3(
            S3Source::new(client, url)?,
            options.page_size,
            options.cache_bytes,
        );
        Self::from_source(source).await
    }

    async fn from_source(mut source: Source) -> Result<RemoteHdf5, Error> {
        let size = source.len().await?;
        let signature_offset = find_signature(&mut source, size).await?;
        Ok(RemoteHdf5 {
            source,
            signature_offset,
            size,
        })
    }

    /// Offset of the superblock signature (nonzero when the file has a
    /// userblock)
    pub fn signature_offset(&self) -> u64 {
        self.signature_offset
    }

    /// Object size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Positioned read through the page cache (metadata-sized reads)
    pub async fn read_exact(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        self.source.read_exact(offset, buf).await
    }

    /// Positioned read bypassing the page cache (large raw data reads)
    pub async fn read_exact_direct(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        self.source.read_exact_direct(offset, buf).await
    }

    pub fn get_stats(&self) -> String {
        self.source.get_stats()
    }
}

// The signature lives at offset 0, or after a userblock at offset 512, 1024,
// 2048, ... (doubling)
async fn find_signature(source: &mut Source, size: u64) -> Result<u64, Error> {
    let mut offset = 0u64;
    while offset + HDF5_SIGNATURE.len() as u64 <= size && offset <= MAX_SIGNATURE_OFFSET {
        let mut buf = [0u8; 8];
        source.read_exact(offset, &mut buf).await?;
        if buf == HDF5_SIGNATURE {
            return Ok(offset);
        }
        offset = if offset == 0 { 512 } else { offset * 2 };
    }
    Err(Error::NotHdf5(
        "No HDF5 superblock signature found".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::{OpenOptions, RemoteHdf5, HDF5_SIGNATURE};
    use crate::sources::Source;
    use crate::Error;

    fn open_options() -> OpenOptions {
        OpenOptions::default()
    }

    fn memory_file(data: Vec<u8>) -> Source {
        let options = open_options();
        Source::new_memory(data, options.page_size, options.cache_bytes)
    }

    fn hdf5_bytes(userblock: usize) -> Vec<u8> {
        let mut data = vec![0u8; userblock];
        data.extend_from_slice(&HDF5_SIGNATURE);
        // Truncated superblock is fine: only the signature is validated
        data.extend_from_slice(&[0u8; 64]);
        data
    }

    #[tokio::test]
    async fn test_open_signature_at_start() {
        let h5 = RemoteHdf5::from_source(memory_file(hdf5_bytes(0)))
            .await
            .unwrap();
        assert_eq!(h5.signature_offset(), 0);
        assert_eq!(h5.size(), 72);
    }

    #[tokio::test]
    async fn test_open_signature_after_userblock() {
        for userblock in [512, 1024, 4096] {
            let h5 = RemoteHdf5::from_source(memory_file(hdf5_bytes(userblock)))
                .await
                .unwrap();
            assert_eq!(h5.signature_offset(), userblock as u64);
        }
    }

    #[tokio::test]
    async fn test_open_not_hdf5() {
        let res = RemoteHdf5::from_source(memory_file(vec![0u8; 4096])).await;
        assert!(matches!(res, Err(Error::NotHdf5(_))));
    }

    #[tokio::test]
    async fn test_open_too_short() {
        let res = RemoteHdf5::from_source(memory_file(vec![0u8; 4])).await;
        assert!(matches!(res, Err(Error::NotHdf5(_))));
    }

    #[tokio::test]
    async fn test_read_after_open() {
        let data = hdf5_bytes(0);
        let mut h5 = RemoteHdf5::from_source(memory_file(data.clone()))
            .await
            .unwrap();
        let mut buf = [0u8; 8];
        h5.read_exact(0, &mut buf).await.unwrap();
        assert_eq!(buf, HDF5_SIGNATURE);
        h5.read_exact_direct(8, &mut buf).await.unwrap();
        assert_eq!(buf, [0u8; 8]);
    }
}
