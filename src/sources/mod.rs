use std::{fmt, io::ErrorKind};

mod memory;
mod s3;

pub use memory::MemorySource;
pub use s3::S3Source;
use std::collections::HashMap;

use crate::errors::Error;
use std::io;

/// Filesystem page size tuned for cloud-optimized HDF5 (4 MiB)
pub const DEFAULT_PAGE_SIZE: usize = 4 * 1024 * 1024;

/// Read cache budget (100 MiB)
pub const DEFAULT_CACHE_BYTES: usize = 100 * 1024 * 1024;

enum SourceKind {
    S3(S3Source),
    #[allow(dead_code)] // This is used for testing
    Memory(MemorySource),
}

impl fmt::Debug for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S3(_) => f.debug_tuple("S3").finish(),
            Self::Memory(_) => f.debug_tuple("Memory").finish(),
        }
    }
}

impl SourceKind {
    /// This tries to read the given buffer at the given offset. If EOF is
    /// reached, this will return Ok(n) where n < buf.len()
    async fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, Error> {
        match self {
            SourceKind::S3(s) => s.read(offset, buf).await,
            SourceKind::Memory(s) => Ok(s.read(offset, buf).await?),
        }
    }

    /// Reads exactly the given buffer from the given offset. This returns an
    /// Err(ErrorKind::UnexpectedEof) if EOF is reached while reading. If this
    /// returns Ok(), it is guaranteed the whole buffer has been read
    pub async fn read_exact(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        let bytes_count = self.read(offset, buf).await?;
        if bytes_count < buf.len() {
            Err(Error::IO(io::Error::from(ErrorKind::UnexpectedEof)))
        } else {
            Ok(())
        }
    }

    async fn len(&mut self) -> Result<u64, Error> {
        match self {
            SourceKind::S3(s) => s.len().await,
            SourceKind::Memory(s) => Ok(s.len()),
        }
    }

    pub fn get_stats(&self) -> String {
        match self {
            SourceKind::S3(s) => s.get_stats(),
            SourceKind::Memory(s) => s.get_stats(),
        }
    }
}

/// Read-through page cache over a source.
///
/// Remote HDF5 metadata (superblock, object headers, b-tree nodes) is spread
/// over small reads that would each turn into an HTTP range request; caching
/// whole pages keeps the request count down. Cloud-optimized files pack
/// metadata into aligned pages, so a handful of page reads usually cover it.
/// Large raw data reads should bypass the cache via `read_exact_direct`.
struct PageCache {
    page_size: usize,
    max_pages: usize,
    // Maps a page index to the page data. Note that the last page will still
    // have page_size data, but data past `source_len` is zero-filled
    pages: HashMap<u64, Vec<u8>>,
    // Once we have reached EOF, we store the source len here
    source_len: Option<u64>,
}

impl fmt::Debug for PageCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageCache")
            .field("page_size", &self.page_size)
            .field("source_len", &self.source_len)
            .finish()
    }
}

impl PageCache {
    pub fn new(page_size: usize, cache_bytes: usize) -> Self {
        PageCache {
            page_size,
            max_pages: std::cmp::max(1, cache_bytes / page_size),
            pages: HashMap::new(),
            source_len: None,
        }
    }

    async fn read_page(
        &mut self,
        source_kind: &mut SourceKind,
        page_index: u64,
    ) -> Result<&[u8], Error> {
        if self.pages.len() >= self.max_pages {
            // Here, a LRU cache would probably be a better idea. For now we
            // just evict randomly a page for simplicity's sake
            let key = *self.pages.keys().next().unwrap();
            self.pages.remove(&key);
        }

        match self.pages.entry(page_index) {
            std::collections::hash_map::Entry::Occupied(e) => Ok(e.into_mut()),
            std::collections::hash_map::Entry::Vacant(e) => {
                let mut page = vec![0u8; self.page_size];
                let read_count = source_kind
                    .read(page_index * self.page_size as u64, &mut page)
                    .await?;
                if read_count < page.len() {
                    // A short read means we reached EOF. The first EOF we see
                    // fixes the source length; seeing another short read at a
                    // different page is a logic error
                    if let Some(source_len) = self.source_len {
                        return Err(Error::SourceError(format!(
                            "Reached EOF a second time (previous source_len={}), now read_count={} at page_index={}",
                            source_len, read_count, page_index
                        )));
                    } else {
                        self.source_len =
                            Some(page_index * self.page_size as u64 + read_count as u64);
                    }
                }
                Ok(e.insert(page))
            }
        }
    }

    pub async fn read_exact(
        &mut self,
        source_kind: &mut SourceKind,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<(), Error> {
        if buf.is_empty() {
            return Ok(());
        }
        let page_size = self.page_size as u64;
        let start_page = offset / page_size;
        // Page of the last byte read: a read ending exactly on a page boundary
        // must not touch the next page (which may lie entirely past EOF)
        let end_page = (offset + buf.len() as u64 - 1) / page_size;
        let mut buf_offset = 0;
        for page_id in start_page..end_page + 1 {
            let page_start_offset = (page_id * page_size) as i64;
            let page = self.read_page(source_kind, page_id).await?;

            let page_from = std::cmp::max(offset as i64 - page_start_offset, 0) as usize;
            let page_to = std::cmp::min(
                (offset as i64 + buf.len() as i64) - page_start_offset,
                page_size as i64,
            ) as usize;
            let read_count = page_to - page_from;
            buf[buf_offset..buf_offset + read_count].copy_from_slice(&page[page_from..page_to]);

            // Read past EOF check
            if let Some(source_len) = self.source_len {
                if offset + buf.len() as u64 > source_len {
                    return Err(Error::SourceError(format!(
                        "Trying to read past EOF (source_len={}), offset + buf.len() = {}",
                        source_len,
                        offset as usize + buf.len()
                    )));
                }
            }
            buf_offset += read_count;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct Source {
    kind: SourceKind,
    cache: PageCache,
}

impl Source {
    fn new(kind: SourceKind, page_size: usize, cache_bytes: usize) -> Source {
        Source {
            kind,
            cache: PageCache::new(page_size, cache_bytes),
        }
    }

    pub fn new_s3(source: S3Source, page_size: usize, cache_bytes: usize) -> Source {
        Source::new(SourceKind::S3(source), page_size, cache_bytes)
    }

    #[allow(dead_code)] // This is used for testing
    pub fn new_memory(data: Vec<u8>, page_size: usize, cache_bytes: usize) -> Source {
        Source::new(SourceKind::Memory(MemorySource::new(data)), page_size, cache_bytes)
    }

    // Read going through the page cache
    pub async fn read_exact(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        self.cache.read_exact(&mut self.kind, offset, buf).await
    }

    // Read bypassing the page cache
    pub async fn read_exact_direct(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        self.kind.read_exact(offset, buf).await
    }

    /// The source length in bytes (a HEAD request for S3 sources)
    pub async fn len(&mut self) -> Result<u64, Error> {
        self.kind.len().await
    }

    pub fn get_stats(&self) -> String {
        self.kind.get_stats()
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::Error;
    use crate::sources::Source;

    const PAGE_SIZE: usize = 1024;
    const CACHE_BYTES: usize = 16 * 1024;

    fn patterned_buf(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn test_cached_source() {
        for data_len in [100, 1025, 5000] {
            let data = patterned_buf(data_len);

            let mut source = Source::new_memory(data.clone(), PAGE_SIZE, CACHE_BYTES);

            for offset in [0, 50, 1026] {
                if offset > data_len {
                    continue;
                }
                let mut out = vec![0u8; data_len - offset];
                source.read_exact(offset as u64, &mut out).await.unwrap();
                assert_eq!(out, data[offset..]);
            }
        }
    }

    #[tokio::test]
    async fn test_cached_source_across_page_boundary() {
        let data = patterned_buf(4 * PAGE_SIZE);
        let mut source = Source::new_memory(data.clone(), PAGE_SIZE, CACHE_BYTES);

        let offset = PAGE_SIZE - 10;
        let mut out = vec![0u8; 2 * PAGE_SIZE];
        source.read_exact(offset as u64, &mut out).await.unwrap();
        assert_eq!(out, data[offset..offset + 2 * PAGE_SIZE]);
    }

    #[tokio::test]
    async fn test_cached_source_cache_hits() {
        let data = patterned_buf(2000);
        let mut source = Source::new_memory(data.clone(), PAGE_SIZE, CACHE_BYTES);

        let offset = 513;
        let mut out = vec![0u8; data.len() - offset];
        source.read_exact(offset as u64, &mut out).await.unwrap();
        source.read_exact(offset as u64, &mut out).await.unwrap();
        assert_eq!(out, data[offset..]);

        // The second read should be fully served from the page cache
        assert!(source.get_stats().contains("read_counts=2"));
    }

    #[tokio::test]
    async fn test_direct_source_no_cache() {
        let data = patterned_buf(500);
        let mut source = Source::new_memory(data.clone(), PAGE_SIZE, CACHE_BYTES);

        let mut out = vec![0u8; 100];
        source.read_exact_direct(0, &mut out).await.unwrap();
        source.read_exact_direct(0, &mut out).await.unwrap();
        assert_eq!(out, data[..100]);

        // Direct reads bypass the cache entirely
        assert!(source.get_stats().contains("read_counts=2"));
    }

    #[tokio::test]
    async fn test_cached_source_exact_page_read() {
        // Reading a whole page-multiple source must not fetch the page past
        // the end (for S3 that extra range request would be entirely past EOF)
        for pages in [1, 3] {
            let data = patterned_buf(pages * PAGE_SIZE);
            let mut source = Source::new_memory(data.clone(), PAGE_SIZE, CACHE_BYTES);

            let mut out = vec![0u8; data.len()];
            source.read_exact(0, &mut out).await.unwrap();
            assert_eq!(out, data);
            assert!(source.get_stats().contains(&format!("read_counts={pages}")));
        }
    }

    #[tokio::test]
    async fn test_cached_source_read_past_eof() {
        let data = patterned_buf(50);
        let mut source = Source::new_memory(data, PAGE_SIZE, CACHE_BYTES);

        let mut out = vec![0u8; 10];
        let res = source.read_exact(45, &mut out).await;
        assert!(matches!(res, Err(Error::SourceError(_msg))));
    }

    #[tokio::test]
    async fn test_direct_source_read_past_eof() {
        let data = patterned_buf(50);
        let mut source = Source::new_memory(data, PAGE_SIZE, CACHE_BYTES);

        let mut out = vec![0u8; 10];
        let res = source.read_exact_direct(45, &mut out).await;
        assert!(matches!(res, Err(Error::IO(_))));
    }

    #[tokio::test]
    async fn test_source_len() {
        let mut source = Source::new_memory(patterned_buf(1234), PAGE_SIZE, CACHE_BYTES);
        assert_eq!(source.len().await.unwrap(), 1234);
    }

    #[tokio::test]
    async fn test_cache_budget_is_at_least_one_page() {
        // A cache budget smaller than the page size still caches one page
        let data = patterned_buf(3 * PAGE_SIZE);
        let mut source = Source::new_memory(data.clone(), PAGE_SIZE, 10);
        let mut out = vec![0u8; data.len()];
        source.read_exact(0, &mut out).await.unwrap();
        assert_eq!(out, data);
    }
}
