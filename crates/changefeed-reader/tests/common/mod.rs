#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use changefeed::{
    BlobEntry, BlobStore, ChangeFeedClient, ChangeFeedConfig, ListMode, ObjectStoreBlobs,
    StoreError,
};
use changefeed_format::{ChunkWriter, EventJson};
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::ObjectStore;
use serde_json::json;

pub const CONTAINER: &str = "changefeed";

pub fn make_test_event(id: &str) -> EventJson {
    json!({
        "id": id,
        "eventType": "BlobCreated",
        "subject": format!("/blobServices/default/containers/data/blobs/{}", id),
        "eventTime": "2021-01-01T01:15:00Z",
        "data": { "contentLength": 512 }
    })
}

/// Shard path of `shard` within the segment at `segment` ("YYYY/MM/DD/hhmm").
pub fn shard_path(shard: &str, segment: &str) -> String {
    format!("log/{}/{}/", shard, segment)
}

/// Builds a change feed inside an in-memory object store.
pub struct FeedFixture {
    memory: Arc<InMemory>,
}

impl FeedFixture {
    pub fn new() -> Self {
        Self {
            memory: Arc::new(InMemory::new()),
        }
    }

    pub async fn put(&self, relative: &str, bytes: impl Into<Bytes>) {
        self.memory
            .put(&Path::from(format!("{}/{}", CONTAINER, relative)), bytes.into())
            .await
            .unwrap();
    }

    pub async fn set_last_consumable(&self, time: &str) {
        let doc = json!({ "version": 0, "lastConsumable": time, "storageDiagnostics": {} });
        self.put("meta/segments.json", serde_json::to_vec(&doc).unwrap())
            .await;
    }

    /// Writes the manifest of `segment` listing the given shards.
    pub async fn add_segment(&self, segment: &str, shards: &[&str]) {
        let shard_paths: Vec<String> = shards
            .iter()
            .map(|s| format!("{}/{}", CONTAINER, shard_path(s, segment)))
            .collect();
        let manifest = json!({
            "version": 0,
            "begin": "2021-01-01T01:00:00Z",
            "intervalSecs": 3600,
            "status": "Finalized",
            "shardPaths": shard_paths,
        });
        self.put(
            &format!("idx/segments/{}/meta.json", segment),
            serde_json::to_vec(&manifest).unwrap(),
        )
        .await;
    }

    /// Writes one chunk whose blocks hold events with the given ids.
    pub async fn add_chunk(&self, segment: &str, shard: &str, chunk: &str, blocks: &[&[&str]]) {
        let mut writer = ChunkWriter::new();
        for block in blocks {
            let events: Vec<EventJson> = block.iter().map(|id| make_test_event(id)).collect();
            writer.append_block(&events).unwrap();
        }
        self.put(
            &format!("{}{}", shard_path(shard, segment), chunk),
            writer.into_bytes(),
        )
        .await;
    }

    pub fn blobs(&self) -> ObjectStoreBlobs {
        ObjectStoreBlobs::new(self.memory.clone(), CONTAINER)
    }

    pub fn client(&self) -> ChangeFeedClient {
        self.client_with(ChangeFeedConfig::default())
    }

    pub fn client_with(&self, config: ChangeFeedConfig) -> ChangeFeedClient {
        ChangeFeedClient::new(Arc::new(self.blobs()), config)
    }

    /// Two shards in segment 01:00 holding three and two events.
    pub async fn two_shard_scenario() -> Self {
        let fixture = Self::new();
        fixture.set_last_consumable("2021-01-01T02:00:00Z").await;
        fixture.add_segment("2021/01/01/0100", &["00", "01"]).await;
        fixture
            .add_chunk("2021/01/01/0100", "00", "000000.cfb", &[&["e1", "e2"], &["e3"]])
            .await;
        fixture
            .add_chunk("2021/01/01/0100", "01", "000000.cfb", &[&["e4", "e5"]])
            .await;
        fixture
    }
}

/// Store wrapper counting calls per operation.
pub struct CountingStore {
    inner: ObjectStoreBlobs,
    pub exists_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub range_calls: AtomicUsize,
    pub whole_calls: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: ObjectStoreBlobs) -> Self {
        Self {
            inner,
            exists_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            range_calls: AtomicUsize::new(0),
            whole_calls: AtomicUsize::new(0),
        }
    }

    pub fn total_calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
            + self.list_calls.load(Ordering::SeqCst)
            + self.range_calls.load(Ordering::SeqCst)
            + self.whole_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for CountingStore {
    async fn exists(&self) -> Result<bool, StoreError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.exists().await
    }

    async fn list_children(
        &self,
        prefix: &str,
        mode: ListMode,
    ) -> Result<Vec<BlobEntry>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_children(prefix, mode).await
    }

    async fn download_range(
        &self,
        path: &str,
        offset: u64,
        length: Option<u64>,
    ) -> Result<Bytes, StoreError> {
        self.range_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.download_range(path, offset, length).await
    }

    async fn download_whole(&self, path: &str) -> Result<Bytes, StoreError> {
        self.whole_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.download_whole(path).await
    }
}
