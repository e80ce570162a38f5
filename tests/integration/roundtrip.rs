use crate::*;

#[tokio::test]
async fn test_hello_world_round_trip() {
    let cluster = Cluster::new(1024, 5, 2, 4);
    let payload = Bytes::from_static(b"Hello, World!");

    let infos = cluster.store(&payload).await.unwrap();
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].fragments.len(), 3);
    for fragment in &infos[0].fragments {
        assert_eq!(fragment.replicas.len(), 2);
        assert_ne!(fragment.replicas[0].peer, fragment.replicas[1].peer);
    }

    let recovered = cluster
        .reassembler()
        .reassemble(&infos, payload.len() as u64)
        .await
        .unwrap();
    assert_eq!(recovered, payload);
}

#[tokio::test]
async fn test_round_trip_across_sizes() {
    for len in [0usize, 1, 63, 64, 65, 1000, 4096 + 17] {
        let cluster = Cluster::new(256, 40, 3, 7);
        let payload = test_data(len);

        let infos = cluster.store(&payload).await.unwrap();
        assert_eq!(infos.len(), len.div_ceil(256));

        let recovered = cluster
            .reassembler()
            .reassemble(&infos, len as u64)
            .await
            .unwrap();
        assert_eq!(recovered, payload, "payload of {len} bytes");
    }
}

#[tokio::test]
async fn test_round_trip_from_broadcast_metadata_only() {
    let cluster = Cluster::new(100, 30, 2, 6);
    let payload = test_data(777);
    cluster.store(&payload).await.unwrap();

    // Reassemble from what the last peer heard, not from the publisher's return value.
    let heard = cluster.tables[5].snapshot();
    let recovered = cluster
        .reassembler()
        .reassemble(&heard, payload.len() as u64)
        .await
        .unwrap();
    assert_eq!(recovered, payload);
}

#[tokio::test]
async fn test_fresh_reassembler_needs_only_shard_infos() {
    let cluster = Cluster::new(64, 16, 2, 3);
    let payload = test_data(200);
    let infos = cluster.store(&payload).await.unwrap();

    // Round-trip the metadata through its wire form, as a separate process would.
    let decoded: Vec<ShardInfo> = infos
        .iter()
        .map(|info| ShardInfo::decode(&info.encode().unwrap()).unwrap())
        .collect();

    let reassembler = Reassembler::with_timeout(cluster.pool.clone(), PEER_TIMEOUT);
    let recovered = reassembler
        .reassemble(&decoded, payload.len() as u64)
        .await
        .unwrap();
    assert_eq!(recovered, payload);
}

#[tokio::test]
async fn test_placement_is_reproducible() {
    let a = Cluster::new(50, 7, 3, 5);
    let b = Cluster::new(50, 7, 3, 5);
    let payload = test_data(321);

    let first = a.store(&payload).await.unwrap();
    let second = b.store(&payload).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_zero_filled_payload_over_dir_stores() {
    let root = std::env::temp_dir().join(format!("scatter-zero-payload-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&root);

    let config = ShardingConfig::new(1024 * 1024, 64 * 1024, 1, 2, PEER_TIMEOUT * 8).unwrap();
    let pool = PeerPool::from_peers((0..2).map(|i| {
        let store = DirStore::new(root.join(format!("node{i}"))).unwrap();
        (peer(i), Arc::new(store) as Arc<dyn ContentStore>)
    }))
    .unwrap();

    let hub = BroadcastHub::new();
    let channel = Arc::new(hub.join(PeerId::new("planner"))) as Arc<dyn BroadcastChannel>;
    let publisher = Publisher::new(pool.clone(), channel, TOPIC, &config).unwrap();

    // Every fragment has identical bytes, so each peer receives concurrent puts of one object.
    let payload = Bytes::from(vec![0u8; 1024 * 1024]);
    let shards = plan(&payload, &config).unwrap();
    let infos = publisher.publish_all(&shards).await.unwrap();
    assert_eq!(infos[0].fragments.len(), 16);
    for fragment in &infos[0].fragments {
        assert_eq!(fragment.replicas.len(), 1);
    }

    let recovered = Reassembler::new(pool, &config)
        .reassemble(&infos, payload.len() as u64)
        .await
        .unwrap();
    assert_eq!(recovered, payload);
    let _ = std::fs::remove_dir_all(&root);
}
