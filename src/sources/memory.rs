use std::io;

#[derive(Default)]
struct Stats {
    read_counts: usize,
}

pub struct MemorySource {
    buffer: Vec<u8>,
    stats: Stats,
}

impl MemorySource {
    pub fn new(buffer: Vec<u8>) -> MemorySource {
        MemorySource {
            buffer,
            stats: Default::default(),
        }
    }

    pub fn len(&self) -> u64 {
        self.buffer.len() as u64
    }

    /// Reads at `offset`, returning the number of bytes copied (less than
    /// `buf.len()` when the read reaches EOF)
    pub async fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, io::Error> {
        self.stats.read_counts += 1;
        let offset = offset as usize;
        if offset > self.buffer.len() {
            return Ok(0);
        }
        let end = std::cmp::min(self.buffer.len(), offset + buf.len());
        buf[..(end - offset)].copy_from_slice(&self.buffer[offset..end]);
        Ok(end - offset)
    }

    pub fn get_stats(&self) -> String {
        format!("read_counts={}", self.stats.read_counts)
    }
}
