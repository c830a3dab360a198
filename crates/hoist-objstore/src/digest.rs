//! Running MD5 digest and chunked reading helpers.

use std::io::{self, Read};

use md5::{Digest, Md5};

/// Extended attribute name that holds the content digest of an object.
pub const DIGEST_ATTRIBUTE: &str = "MD5";

/// Incremental MD5 over the bytes of one object.
#[derive(Clone, Default)]
pub struct ContentDigest {
    hasher: Md5,
    bytes: u64,
}

impl ContentDigest {
    /// Start an empty digest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk.
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.bytes += chunk.len() as u64;
    }

    /// Bytes fed so far.
    #[must_use]
    pub const fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Consume the digest and return it as lowercase hex.
    #[must_use]
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

/// Lowercase hex MD5 of an in-memory buffer.
#[must_use]
pub fn digest_bytes(data: &[u8]) -> String {
    let mut digest = ContentDigest::new();
    digest.update(data);
    digest.finish()
}

/// Stream `reader` to the end in `chunk_size` pieces and return its hex MD5
/// together with the number of bytes read.
///
/// # Errors
///
/// Returns the first read error reported by `reader`.
pub fn digest_reader<R: Read>(mut reader: R, chunk_size: usize) -> io::Result<(String, u64)> {
    let mut buffer = vec![0_u8; chunk_size.max(1)];
    let mut digest = ContentDigest::new();
    loop {
        let filled = read_chunk(&mut reader, &mut buffer)?;
        if filled == 0 {
            break;
        }
        digest.update(&buffer[..filled]);
    }
    let bytes = digest.bytes();
    Ok((digest.finish(), bytes))
}

/// Fill `buffer` from `reader`, stopping early only at end of input.
///
/// Returns the number of bytes placed in `buffer`; zero means end of input.
///
/// # Errors
///
/// Returns the first read error other than [`io::ErrorKind::Interrupted`].
pub fn read_chunk<R: Read>(reader: &mut R, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}
