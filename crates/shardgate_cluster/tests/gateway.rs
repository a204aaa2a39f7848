//! End-to-end gateway behavior against the sandbox backend.

mod common;

use common::*;

// ── Execute ──

#[test]
fn test_execute_shard_autocommit() {
    let (gateway, provider) = setup();
    let result = gateway
        .execute_shard(&QueryShard::new("query", UNSHARDED, ["0"]), None)
        .unwrap();

    assert_eq!(result.rows, single_row_result().rows);
    assert_eq!(result.fields, single_row_result().fields);
    assert!(result.session.is_none());
    let conn = conn(&provider, UNSHARDED, "0");
    assert_eq!(conn.begin_count(), 0);
    assert_eq!(conn.executed(), vec![("query".to_string(), None)]);
}

#[test]
fn test_execute_shard_outside_transaction_records_nothing() {
    let (gateway, provider) = setup();
    let mut session = Session::new();
    let result = gateway
        .execute_shard(&QueryShard::new("query", UNSHARDED, ["0"]), Some(&mut session))
        .unwrap();

    assert!(result.session.is_none());
    assert_eq!(session, Session::new());
    assert_eq!(conn(&provider, UNSHARDED, "0").begin_count(), 0);
}

#[test]
fn test_begin_then_execute_opens_shard_transaction() {
    let (gateway, provider) = setup();
    let mut session = Session::new();
    gateway.begin(&mut session).unwrap();

    let query = QueryShard::new("query", UNSHARDED, ["0"]);
    let result = gateway.execute_shard(&query, Some(&mut session)).unwrap();

    assert!(session.in_transaction());
    assert_eq!(session.shard_sessions().len(), 1);
    let shard_session = &session.shard_sessions()[0];
    assert_eq!(shard_session.keyspace, UNSHARDED);
    assert_eq!(shard_session.shard, ShardId::from("0"));
    assert_eq!(shard_session.transaction_id, TxnId(1));
    assert_eq!(shard_session.tablet_role, TabletRole::Primary);
    assert_eq!(result.session.as_ref(), Some(&session));

    // Second touch reuses the transaction and carries no session payload.
    let again = gateway.execute_shard(&query, Some(&mut session)).unwrap();
    assert!(again.session.is_none());
    assert_eq!(session.shard_sessions().len(), 1);
    let conn = conn(&provider, UNSHARDED, "0");
    assert_eq!(conn.begin_count(), 1);
    assert_eq!(
        conn.executed(),
        vec![
            ("query".to_string(), Some(TxnId(1))),
            ("query".to_string(), Some(TxnId(1))),
        ]
    );
}

#[test]
fn test_commit_after_execute() {
    let (gateway, provider) = setup();
    let mut session = Session::new();
    gateway.begin(&mut session).unwrap();
    gateway
        .execute_shard(&QueryShard::new("query", UNSHARDED, ["0"]), Some(&mut session))
        .unwrap();

    gateway.commit(&mut session).unwrap();

    let conn = conn(&provider, UNSHARDED, "0");
    assert_eq!(conn.commit_count(), 1);
    assert_eq!(conn.committed(), vec![TxnId(1)]);
    assert!(conn.open_txns().is_empty());
    assert!(!session.in_transaction());
    assert!(session.shard_sessions().is_empty());
}

#[test]
fn test_begin_twice_is_rejected() {
    let (gateway, _provider) = setup();
    let mut session = Session::new();
    gateway.begin(&mut session).unwrap();
    let err = gateway.begin(&mut session).unwrap_err();
    assert!(matches!(err, GatewayError::AlreadyInTransaction));
    assert!(err.is_user_error());
}

#[test]
fn test_execute_key_range_spans_shards() {
    let (gateway, provider) = setup();
    let mut session = in_txn();
    let result = gateway
        .execute_key_range(
            &KeyRangeQuery::new("query", KEYSPACE, "10-40"),
            Some(&mut session),
        )
        .unwrap();

    assert_eq!(result.rows.len(), 2);
    assert_eq!(result.rows_affected, 2);
    let touched: Vec<&str> = session
        .shard_sessions()
        .iter()
        .map(|s| s.shard.as_str())
        .collect();
    assert_eq!(touched, vec!["-20", "20-40"]);
    assert_eq!(result.session.as_ref(), Some(&session));
    assert_eq!(conn(&provider, KEYSPACE, "40-60").exec_count(), 0);
}

#[test]
fn test_unreachable_shard_is_transient() {
    let (gateway, provider) = setup();
    provider.unmap_shard(UNSHARDED, &ShardId::from("0"));
    let err = gateway
        .execute_shard(&QueryShard::new("query", UNSHARDED, ["0"]), None)
        .unwrap_err();
    assert!(matches!(err, GatewayError::BackendUnavailable { .. }));
    assert!(err.is_transient());
}

#[test]
fn test_failed_begin_records_nothing() {
    let (gateway, provider) = setup();
    conn(&provider, UNSHARDED, "0").fail_begin(BackendError::Unavailable("down".into()));
    let mut session = in_txn();
    let err = gateway
        .execute_shard(&QueryShard::new("query", UNSHARDED, ["0"]), Some(&mut session))
        .unwrap_err();
    assert!(matches!(err, GatewayError::BackendUnavailable { .. }));
    assert!(session.in_transaction());
    assert!(session.shard_sessions().is_empty());
}

#[test]
fn test_tablet_role_mismatch_rejected() {
    let (gateway, provider) = setup();
    let mut session = in_txn();
    gateway
        .execute_shard(&QueryShard::new("query", UNSHARDED, ["0"]), Some(&mut session))
        .unwrap();

    let replica = QueryShard::new("query", UNSHARDED, ["0"]).with_tablet_role(TabletRole::Replica);
    let err = gateway.execute_shard(&replica, Some(&mut session)).unwrap_err();
    assert!(matches!(err, GatewayError::TabletRoleMismatch { .. }));
    assert_eq!(conn(&provider, UNSHARDED, "0").exec_count(), 1);
}

// ── Batch ──

#[test]
fn test_batch_merges_per_query() {
    let (gateway, _provider) = setup();
    let batch = BatchQueryShard::new(
        vec![BoundQuery::new("query"), BoundQuery::new("query")],
        KEYSPACE,
        ["-20", "20-40"],
    );
    let out = gateway.execute_batch_shard(&batch, None).unwrap();

    assert_eq!(out.list.len(), 2);
    for result in &out.list {
        assert_eq!(result.rows_affected, 2);
        assert_eq!(result.rows.len(), 2);
    }
    assert!(out.session.is_none());
}

#[test]
fn test_batch_in_transaction_records_each_shard_once() {
    let (gateway, provider) = setup();
    let mut session = in_txn();
    let batch = BatchQueryShard::new(
        vec![BoundQuery::new("q1"), BoundQuery::new("q2")],
        KEYSPACE,
        ["-20", "20-40"],
    );
    let out = gateway.execute_batch_shard(&batch, Some(&mut session)).unwrap();

    assert_eq!(session.shard_sessions().len(), 2);
    assert_eq!(out.session.as_ref(), Some(&session));
    for shard in ["-20", "20-40"] {
        let conn = conn(&provider, KEYSPACE, shard);
        assert_eq!(conn.begin_count(), 1);
        let txn = session
            .find(KEYSPACE, &ShardId::from(shard))
            .unwrap()
            .transaction_id;
        assert_eq!(
            conn.executed(),
            vec![("q1".to_string(), Some(txn)), ("q2".to_string(), Some(txn))]
        );
    }

    // Everything already open: no payload the second time around.
    let again = gateway.execute_batch_shard(&batch, Some(&mut session)).unwrap();
    assert!(again.session.is_none());
}

#[test]
fn test_batch_failure_keeps_other_shard_transaction() {
    let (gateway, provider) = setup();
    conn(&provider, KEYSPACE, "20-40").fail_execute(BackendError::Execution("dup key".into()));
    let mut session = in_txn();
    let batch = BatchQueryShard::new(vec![BoundQuery::new("insert")], KEYSPACE, ["-20", "20-40"]);

    let err = gateway.execute_batch_shard(&batch, Some(&mut session)).unwrap_err();
    assert!(matches!(err, GatewayError::BackendExecution { .. }));
    assert_eq!(err.shard(), Some(&ShardId::from("20-40")));

    // Both begins succeeded, so both transactions stay recorded for rollback.
    assert_eq!(session.shard_sessions().len(), 2);
    gateway.rollback(&mut session).unwrap();
    assert_eq!(conn(&provider, KEYSPACE, "-20").rolled_back(), vec![TxnId(1)]);
    assert_eq!(conn(&provider, KEYSPACE, "20-40").rolled_back(), vec![TxnId(1)]);
}

#[test]
fn test_batch_with_bounded_scatter() {
    let (gateway, provider) = setup();
    let gateway = gateway.with_max_scatter_parallelism(3);
    let batch = BatchQueryShard::new(vec![BoundQuery::new("query")], KEYSPACE, SHARDS);
    let out = gateway.execute_batch_shard(&batch, None).unwrap();

    assert_eq!(out.list[0].rows_affected, SHARDS.len() as u64);
    for shard in SHARDS {
        assert_eq!(conn(&provider, KEYSPACE, shard).exec_count(), 1);
    }
}

#[test]
fn test_batch_failure_stops_later_waves() {
    let (gateway, provider) = setup();
    let gateway = gateway.with_max_scatter_parallelism(2);
    conn(&provider, KEYSPACE, "-20").fail_execute(BackendError::Execution("boom".into()));
    let mut session = in_txn();
    let batch = BatchQueryShard::new(vec![BoundQuery::new("update")], KEYSPACE, SHARDS);

    let err = gateway.execute_batch_shard(&batch, Some(&mut session)).unwrap_err();
    assert_eq!(err.shard(), Some(&ShardId::from("-20")));

    assert_eq!(session.shard_sessions().len(), 2);
    for shard in &SHARDS[2..] {
        let conn = conn(&provider, KEYSPACE, shard);
        assert_eq!(conn.begin_count(), 0);
        assert_eq!(conn.exec_count(), 0);
    }
}

// ── Commit / rollback ──

#[test]
fn test_commit_is_best_effort_in_open_order() {
    let (gateway, provider) = setup();
    let mut session = in_txn();
    for shard in ["40-60", "-20", "20-40"] {
        gateway
            .execute_shard(&QueryShard::new("update", KEYSPACE, [shard]), Some(&mut session))
            .unwrap();
    }
    conn(&provider, KEYSPACE, "-20").fail_commit(BackendError::Execution("lost".into()));
    conn(&provider, KEYSPACE, "20-40").fail_commit(BackendError::Unavailable("gone".into()));

    let err = gateway.commit(&mut session).unwrap_err();
    // First failure in open order wins.
    assert_eq!(err.shard(), Some(&ShardId::from("-20")));
    assert!(matches!(err, GatewayError::BackendExecution { .. }));
    assert_eq!(session, Session::new());

    let journal = provider.journal();
    let commits: Vec<&str> = journal
        .iter()
        .filter(|e| e.op == SandboxOp::Commit)
        .map(|e| e.shard.as_str())
        .collect();
    assert_eq!(commits, vec!["40-60", "-20", "20-40"]);
    assert_eq!(conn(&provider, KEYSPACE, "40-60").committed(), vec![TxnId(1)]);
}

#[test]
fn test_rollback_is_best_effort() {
    let (gateway, provider) = setup();
    let mut session = in_txn();
    let batch = BatchQueryShard::new(vec![BoundQuery::new("update")], KEYSPACE, ["-20", "20-40"]);
    gateway.execute_batch_shard(&batch, Some(&mut session)).unwrap();
    conn(&provider, KEYSPACE, "-20").fail_rollback(BackendError::Unavailable("reset".into()));

    let err = gateway.rollback(&mut session).unwrap_err();
    assert_eq!(err.shard(), Some(&ShardId::from("-20")));
    assert!(matches!(err, GatewayError::BackendUnavailable { .. }));
    assert_eq!(session, Session::new());
    assert_eq!(conn(&provider, KEYSPACE, "20-40").rolled_back(), vec![TxnId(1)]);
    assert_eq!(conn(&provider, KEYSPACE, "-20").open_txns(), vec![TxnId(1)]);

    let journal = provider.journal();
    let rollbacks: Vec<&str> = journal
        .iter()
        .filter(|e| e.op == SandboxOp::Rollback)
        .map(|e| e.shard.as_str())
        .collect();
    assert_eq!(rollbacks, vec!["-20", "20-40"]);
}

#[test]
fn test_rollback_without_shard_sessions() {
    let (gateway, provider) = setup();
    let mut session = Session::new();
    gateway.begin(&mut session).unwrap();
    gateway.rollback(&mut session).unwrap();

    assert!(!session.in_transaction());
    assert!(provider.journal().is_empty());
}

#[test]
fn test_commit_outside_transaction_is_rejected() {
    let (gateway, _provider) = setup();
    let mut session = Session::new();
    assert!(matches!(
        gateway.commit(&mut session),
        Err(GatewayError::NotInTransaction)
    ));
}

// ── Streaming ──

#[test]
fn test_stream_key_range_single_shard() {
    let (gateway, provider) = setup();
    let mut chunks = Vec::new();
    gateway
        .stream_execute_key_range(&KeyRangeQuery::new("query", KEYSPACE, "-20"), None, |c| {
            chunks.push(c);
            Ok(())
        })
        .unwrap();

    assert_eq!(chunks, vec![single_row_result()]);
    assert_eq!(conn(&provider, KEYSPACE, "-20").stream_count(), 1);
}

#[test]
fn test_stream_key_range_spanning_shards_fails() {
    let (gateway, provider) = setup();
    let mut calls = 0;
    let err = gateway
        .stream_execute_key_range(&KeyRangeQuery::new("query", KEYSPACE, "10-40"), None, |_| {
            calls += 1;
            Ok(())
        })
        .unwrap_err();

    match err {
        GatewayError::UnsupportedMultiShardStream { keyspace, shards } => {
            assert_eq!(keyspace, KEYSPACE);
            assert_eq!(shards, vec![ShardId::from("-20"), ShardId::from("20-40")]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(calls, 0);
    assert!(provider.journal().is_empty());
}

#[test]
fn test_stream_whole_keyspace_fails() {
    let (gateway, _provider) = setup();
    let err = gateway
        .stream_execute_key_range(&KeyRangeQuery::new("query", KEYSPACE, ""), None, |_| Ok(()))
        .unwrap_err();
    assert!(matches!(err, GatewayError::UnsupportedMultiShardStream { .. }));
}

#[test]
fn test_stream_in_transaction_appends_session_chunk() {
    let (gateway, provider) = setup();
    let data = conn(&provider, KEYSPACE, "-20");
    data.set_stream_chunks(vec![single_row_result(), single_row_result()]);

    let mut session = in_txn();
    let mut chunks = Vec::new();
    gateway
        .stream_execute_key_range(
            &KeyRangeQuery::new("select", KEYSPACE, "-20"),
            Some(&mut session),
            |c| {
                chunks.push(c);
                Ok(())
            },
        )
        .unwrap();

    assert_eq!(chunks.len(), 3);
    assert!(chunks[..2].iter().all(|c| c.session.is_none() && c.rows.len() == 1));
    let last = &chunks[2];
    assert!(last.rows.is_empty() && last.fields.is_empty());
    assert_eq!(last.session.as_ref(), Some(&session));
    assert_eq!(session.shard_sessions().len(), 1);
    assert_eq!(data.executed(), vec![("select".to_string(), Some(TxnId(1)))]);
}

#[test]
fn test_stream_shard_reusing_transaction_has_no_session_chunk() {
    let (gateway, _provider) = setup();
    let mut session = in_txn();
    let query = QueryShard::new("select", UNSHARDED, ["0"]);
    gateway.execute_shard(&query, Some(&mut session)).unwrap();

    let mut chunks = Vec::new();
    gateway
        .stream_execute_shard(&query, Some(&mut session), |c| {
            chunks.push(c);
            Ok(())
        })
        .unwrap();
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].session.is_none());
}

#[test]
fn test_stream_callback_error_stops_stream() {
    let (gateway, provider) = setup();
    conn(&provider, UNSHARDED, "0")
        .set_stream_chunks(vec![single_row_result(), single_row_result(), single_row_result()]);

    let mut seen = 0;
    let err = gateway
        .stream_execute_shard(&QueryShard::new("select", UNSHARDED, ["0"]), None, |_| {
            seen += 1;
            if seen == 2 {
                return Err(GatewayError::CallbackAborted("client closed".into()));
            }
            Ok(())
        })
        .unwrap_err();

    assert_eq!(seen, 2);
    match err {
        GatewayError::CallbackAborted(reason) => assert_eq!(reason, "client closed"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_stream_backend_error_maps_to_shard() {
    let (gateway, provider) = setup();
    conn(&provider, UNSHARDED, "0").fail_stream(BackendError::Execution("bad plan".into()));
    let err = gateway
        .stream_execute_shard(&QueryShard::new("select", UNSHARDED, ["0"]), None, |_| Ok(()))
        .unwrap_err();
    assert!(matches!(err, GatewayError::BackendExecution { .. }));
    assert!(err.is_retryable());
}
