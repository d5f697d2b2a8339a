fn main() {
    println!("Run `cargo test -p end-to-end` to execute the end-to-end upload tests.");
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::net::SocketAddr;
    use std::path::Path;
    use std::sync::Arc;

    use chunkstream_data_channel::{DUPLEX_CAPACITY, pair};
    use chunkstream_object_store::{BucketAdmin, FsObjectStore, ObjectStore};
    use chunkstream_protocol::{
        Chunk, Destination, MAX_CHUNK_SIZE, STATUS_OK_MESSAGE, Status, StatusCode,
    };
    use chunkstream_transfer::{
        Reassembler, ServerConfig, UploadClient, UploadConfig, UploadServer,
    };
    use sha2::{Digest, Sha256};
    use tokio::task::{JoinHandle, JoinSet};
    use tokio_util::sync::CancellationToken;

    struct Running {
        addr: SocketAddr,
        cancel: CancellationToken,
        handle: JoinHandle<()>,
    }

    impl Running {
        async fn stop(self) {
            self.cancel.cancel();
            self.handle.await.unwrap();
        }
    }

    async fn serve(store: Arc<dyn ObjectStore>) -> Running {
        let server = UploadServer::new(store, ServerConfig::default());
        let listener = server.bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let serve_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            server.serve(listener, serve_cancel).await.unwrap();
        });
        Running {
            addr,
            cancel,
            handle,
        }
    }

    fn write_source(dir: &Path, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content).unwrap();
        path
    }

    /// Deterministic, non-repeating-looking test content.
    fn content(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 253) as u8).collect()
    }

    #[tokio::test]
    async fn helloworld_round_trip_through_filesystem_store() {
        let root = tempfile::tempdir().unwrap();
        let sources = tempfile::tempdir().unwrap();
        let store = FsObjectStore::open(root.path()).await.unwrap();
        store.ensure_bucket("b").await.unwrap();
        let server = serve(Arc::new(store)).await;

        let path = write_source(sources.path(), "hello.txt", b"HELLOWORLD");
        let report = UploadClient::new(server.addr, UploadConfig::new(4).unwrap())
            .upload(&path, &Destination::new("b", "o"), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.status.code(), StatusCode::Ok);
        assert_eq!(report.status.message(), STATUS_OK_MESSAGE);
        assert_eq!(report.chunks, 3);
        assert_eq!(std::fs::read(root.path().join("b/o")).unwrap(), b"HELLOWORLD");

        server.stop().await;
    }

    #[tokio::test]
    async fn large_file_with_largest_chunks() {
        let root = tempfile::tempdir().unwrap();
        let sources = tempfile::tempdir().unwrap();
        let store = FsObjectStore::open(root.path()).await.unwrap();
        store.ensure_bucket("big").await.unwrap();
        let server = serve(Arc::new(store)).await;

        let data = content(2 * MAX_CHUNK_SIZE + 17);
        let path = write_source(sources.path(), "big.bin", &data);
        let report = UploadClient::new(server.addr, UploadConfig::new(MAX_CHUNK_SIZE).unwrap())
            .upload(&path, &Destination::new("big", "nested/big.bin"), CancellationToken::new())
            .await
            .unwrap();

        assert!(report.status.is_ok());
        assert_eq!(report.chunks, 3);
        assert_eq!(report.sha256, hex::encode(Sha256::digest(&data)));
        let stored = std::fs::read(root.path().join("big/nested/big.bin")).unwrap();
        assert_eq!(stored.len(), data.len());
        assert!(stored == data);

        server.stop().await;
    }

    #[tokio::test]
    async fn empty_file_creates_empty_object() {
        let root = tempfile::tempdir().unwrap();
        let sources = tempfile::tempdir().unwrap();
        let store = FsObjectStore::open(root.path()).await.unwrap();
        store.ensure_bucket("b").await.unwrap();
        let server = serve(Arc::new(store)).await;

        let path = write_source(sources.path(), "empty", b"");
        let report = UploadClient::new(server.addr, UploadConfig::default())
            .upload(&path, &Destination::new("b", "empty"), CancellationToken::new())
            .await
            .unwrap();

        assert!(report.status.is_ok());
        assert_eq!(std::fs::read(root.path().join("b/empty")).unwrap(), b"");

        server.stop().await;
    }

    #[tokio::test]
    async fn missing_bucket_reports_failed_and_stores_nothing() {
        let root = tempfile::tempdir().unwrap();
        let sources = tempfile::tempdir().unwrap();
        let store = FsObjectStore::open(root.path()).await.unwrap();
        let server = serve(Arc::new(store.clone())).await;

        let path = write_source(sources.path(), "f", &content(10_000));
        let report = UploadClient::new(server.addr, UploadConfig::new(1000).unwrap())
            .upload(&path, &Destination::new("absent", "f"), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.status.code(), StatusCode::Failed);
        assert!(!report.status.message().is_empty());
        assert!(store.list_buckets().await.unwrap().is_empty());

        server.stop().await;
    }

    #[tokio::test]
    async fn concurrent_uploads_do_not_interleave() {
        let root = tempfile::tempdir().unwrap();
        let sources = tempfile::tempdir().unwrap();
        let store = FsObjectStore::open(root.path()).await.unwrap();
        store.ensure_bucket("b").await.unwrap();
        let server = serve(Arc::new(store)).await;

        let mut uploads = JoinSet::new();
        for i in 0..6usize {
            let data = content(50_000 + i * 1_111);
            let path = write_source(sources.path(), &format!("src-{i}"), &data);
            let addr = server.addr;
            uploads.spawn(async move {
                let report = UploadClient::new(addr, UploadConfig::new(997).unwrap())
                    .upload(
                        &path,
                        &Destination::new("b", format!("obj-{i}")),
                        CancellationToken::new(),
                    )
                    .await
                    .unwrap();
                (i, data, report)
            });
        }

        while let Some(joined) = uploads.join_next().await {
            let (i, data, report) = joined.unwrap();
            assert!(report.status.is_ok(), "upload {i}: {}", report.status);
            let stored = std::fs::read(root.path().join(format!("b/obj-{i}"))).unwrap();
            assert!(stored == data, "object {i} differs from its source");
        }

        server.stop().await;
    }

    #[tokio::test]
    async fn second_upload_replaces_object() {
        let root = tempfile::tempdir().unwrap();
        let sources = tempfile::tempdir().unwrap();
        let store = FsObjectStore::open(root.path()).await.unwrap();
        store.ensure_bucket("b").await.unwrap();
        let server = serve(Arc::new(store)).await;
        let client = UploadClient::new(server.addr, UploadConfig::new(3).unwrap());
        let destination = Destination::new("b", "o");

        let first = write_source(sources.path(), "first", b"first version");
        let second = write_source(sources.path(), "second", b"v2");
        for path in [&first, &second] {
            let report = client
                .upload(path, &destination, CancellationToken::new())
                .await
                .unwrap();
            assert!(report.status.is_ok());
        }

        assert_eq!(std::fs::read(root.path().join("b/o")).unwrap(), b"v2");
        server.stop().await;
    }

    #[tokio::test]
    async fn aborted_session_leaves_no_object_behind() {
        let root = tempfile::tempdir().unwrap();
        let store = FsObjectStore::open(root.path()).await.unwrap();
        store.ensure_bucket("b").await.unwrap();
        let reassembler = Reassembler::new(Arc::new(store));

        let (mut tx, rx) = pair(DUPLEX_CAPACITY, 1024, CancellationToken::new());
        let session = tokio::spawn(async move { reassembler.run(rx).await });

        let destination = Destination::new("b", "o");
        tx.send(&Chunk::new(&destination, b"HELL".to_vec())).await.unwrap();
        tx.send(&Chunk::new(&destination, b"OWOR".to_vec())).await.unwrap();
        drop(tx);

        assert!(session.await.unwrap().is_err());
        let leftovers: Vec<_> = std::fs::read_dir(root.path().join("b"))
            .unwrap()
            .collect();
        assert!(leftovers.is_empty(), "bucket should be empty: {leftovers:?}");
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let sources = tempfile::tempdir().unwrap();
        let path = write_source(sources.path(), "f", b"data");
        let err = UploadClient::new(addr, UploadConfig::default())
            .upload(&path, &Destination::new("b", "o"), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn status_serializes_for_display() {
        let json = serde_json::to_value(Status::ok()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"code": "ok", "message": STATUS_OK_MESSAGE})
        );

        let failed: Status =
            serde_json::from_str(r#"{"code": "failed", "message": "disk full"}"#).unwrap();
        assert_eq!(failed.code(), StatusCode::Failed);
        assert_eq!(failed.message(), "disk full");
    }
}
