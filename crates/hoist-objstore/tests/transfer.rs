use std::io::{self, Cursor, Read};

use anyhow::Result;
use hoist_objstore::{
    DIGEST_ATTRIBUTE, MemoryCluster, ObjectStoreClient, SessionSettings, StoreError, digest_bytes,
};

fn client(cluster: &MemoryCluster) -> Result<ObjectStoreClient> {
    Ok(ObjectStoreClient::connect(
        &cluster.connector(),
        &SessionSettings::new("/etc/hoist/hoist.conf", "admin", "data"),
    )?)
}

fn sample(len: usize) -> Vec<u8> {
    (0..=255_u8).cycle().skip(17).take(len).collect()
}

/// Serves `limit` bytes of `data`, then fails.
struct Interrupted<'a> {
    data: &'a [u8],
    limit: usize,
}

impl Read for Interrupted<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.limit == 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "source went away"));
        }
        let take = buf.len().min(self.limit).min(self.data.len());
        if take == 0 {
            return Ok(0);
        }
        buf[..take].copy_from_slice(&self.data[..take]);
        self.data = &self.data[take..];
        self.limit -= take;
        Ok(take)
    }
}

#[test]
fn digest_is_independent_of_chunk_size() -> Result<()> {
    let data = sample(100_003);
    let expected = digest_bytes(&data);
    let cluster = MemoryCluster::with_pools(["data"]);
    let mut session = client(&cluster)?;

    for (index, chunk_size) in [1_usize, 7, 4096, 65_536, 100_003, 1 << 22].iter().enumerate() {
        let oid = format!("/data/blob-{index}");
        let summary = session.stream_write(&oid, Cursor::new(&data), *chunk_size)?;
        assert_eq!(summary.digest, expected, "chunk size {chunk_size}");
        assert_eq!(summary.bytes, data.len() as u64);
        assert_eq!(
            cluster.attribute("data", &oid, DIGEST_ATTRIBUTE),
            Some(expected.as_bytes().to_vec())
        );
        assert_eq!(cluster.object("data", &oid), Some(data.clone()));
    }
    Ok(())
}

#[test]
fn interrupted_copy_rerun_leaves_exact_source_bytes() -> Result<()> {
    let cluster = MemoryCluster::with_pools(["data"]);
    let mut session = client(&cluster)?;
    let oid = "/data/big.bin";

    session.stream_write(oid, Cursor::new(sample(50_000)), 1024)?;

    let source = sample(20_000);
    let failed = session.stream_write(
        oid,
        Interrupted {
            data: &source,
            limit: 9_000,
        },
        1024,
    );
    assert!(matches!(failed, Err(StoreError::SourceRead { .. })));

    let summary = session.stream_write(oid, Cursor::new(&source), 1024)?;
    assert_eq!(cluster.object("data", oid), Some(source.clone()));
    assert!(session.validate_by_size(oid, source.len() as u64));
    assert!(session.validate_by_digest(oid, &summary.digest));
    Ok(())
}
