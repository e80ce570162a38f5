use crate::*;
use scatter_core::ShardError;
use scatter_services::ShardState;

#[tokio::test]
async fn test_replication_above_peer_count_is_rejected() {
    let config = ShardingConfig {
        shard_size: 1024,
        max_fragment_size: 5,
        replication_factor: 3,
        peer_count: 2,
        per_peer_timeout: PEER_TIMEOUT,
    };
    let err = plan(&Bytes::from_static(b"Hello, World!"), &config).unwrap_err();
    assert!(matches!(err, ShardError::InvalidConfiguration(_)));
}

#[tokio::test]
async fn test_all_replicas_down_names_shard_and_fragment() {
    // Two shards of two fragments; R=2, N=4.
    // Ordinals: s0f0 -> 0,1  s0f1 -> 2,3  s1f0 -> 0,1  s1f1 -> 2,3
    let cluster = Cluster::new(10, 5, 2, 4);
    let payload = test_data(20);
    let infos = cluster.store(&payload).await.unwrap();

    // Drop only shard 1 fragment 1's copies.
    for replica in &infos[1].fragments[1].replicas {
        cluster.store_of(&replica.peer).remove(&replica.content_id);
    }

    let reassembler = cluster.reassembler();
    let err = reassembler.reassemble(&infos, 20).await.unwrap_err();
    match err {
        ShardError::PayloadIncomplete {
            failed_shards,
            missing_shards,
            causes,
            ..
        } => {
            assert_eq!(failed_shards, vec![1]);
            assert!(missing_shards.is_empty());
            assert_eq!(causes.len(), 1);
            assert!(matches!(
                causes[0],
                ShardError::FragmentUnrecoverable {
                    shard: 1,
                    fragment: 1
                }
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(reassembler.shard_state(0), Some(ShardState::Verified));
    assert_eq!(reassembler.shard_state(1), Some(ShardState::Failed));
}

#[tokio::test]
async fn test_outage_of_every_replica_fails_payload() {
    let cluster = Cluster::new(1024, 5, 2, 4);
    let payload = Bytes::from_static(b"Hello, World!");
    let infos = cluster.store(&payload).await.unwrap();

    let _down = cluster.outage(&[2, 3]);
    let err = cluster
        .reassembler()
        .reassemble(&infos, 13)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ShardError::PayloadIncomplete { ref failed_shards, .. } if failed_shards == &vec![0]
    ));
}

#[tokio::test]
async fn test_corrupted_copy_is_integrity_mismatch() {
    let cluster = Cluster::new(1024, 5, 2, 4);
    let payload = Bytes::from_static(b"Hello, World!");
    let infos = cluster.store(&payload).await.unwrap();

    let first = &infos[0].fragments[0].replicas[0];
    assert!(cluster.store_of(&first.peer).corrupt(&first.content_id));

    let reassembler = cluster.reassembler();
    let err = reassembler.reassemble_shard(&infos[0]).await.unwrap_err();
    assert!(matches!(err, ShardError::IntegrityMismatch { shard: 0 }));

    let err = reassembler.reassemble(&infos, 13).await.unwrap_err();
    match err {
        ShardError::PayloadIncomplete { causes, .. } => {
            assert!(matches!(causes[0], ShardError::IntegrityMismatch { shard: 0 }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_missing_shard_info_is_reported() {
    let cluster = Cluster::new(10, 5, 1, 2);
    let payload = test_data(30);
    let infos = cluster.store(&payload).await.unwrap();
    assert_eq!(infos.len(), 3);

    let partial = vec![infos[0].clone(), infos[2].clone()];
    let err = cluster
        .reassembler()
        .reassemble(&partial, 30)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ShardError::PayloadIncomplete { ref missing_shards, covered_len: 20, .. }
            if missing_shards == &vec![1]
    ));
}

#[tokio::test]
async fn test_wrong_expected_length_is_incomplete() {
    let cluster = Cluster::new(10, 5, 1, 2);
    let payload = test_data(25);
    let infos = cluster.store(&payload).await.unwrap();

    let err = cluster
        .reassembler()
        .reassemble(&infos, 40)
        .await
        .unwrap_err();
    assert!(matches!(err, ShardError::PayloadIncomplete { .. }));
}

#[tokio::test]
async fn test_unstorable_fragment_is_not_announced() {
    let cluster = Cluster::new(1024, 5, 2, 4);
    let payload = Bytes::from_static(b"Hello, World!");

    let err = {
        let _down = cluster.outage(&[2, 3]);
        cluster.store(&payload).await.unwrap_err()
    };
    let err = err.downcast::<ShardError>().unwrap();
    assert!(matches!(
        err,
        ShardError::FragmentUnstorable {
            shard: 0,
            fragment: 1
        }
    ));
    assert!(cluster.tables.iter().all(|t| t.is_empty()));
}

#[tokio::test]
async fn test_announce_failure_is_reported() {
    let cluster = Cluster::new(1024, 5, 2, 4);
    cluster.planner.set_online(false);

    let err = cluster
        .store(&Bytes::from_static(b"Hello, World!"))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast::<ShardError>().unwrap(),
        ShardError::Channel(_)
    ));
    assert!(cluster.tables.iter().all(|t| t.is_empty()));
}
