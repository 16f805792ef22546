mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use common::*;
use entity_audit::{DatabaseError, DbContext, MemoryStore, SaveError};

#[tokio::test]
async fn async_commit_matches_sync_commit() -> Result<()> {
    let sync_store = MemoryStore::new();
    let async_store = MemoryStore::new();
    let mut sync_ctx = context_with(sync_store.clone(), Arc::new(FixedClock(base_time())));
    let mut async_ctx = context_with(async_store.clone(), Arc::new(FixedClock(base_time())));

    let mut order = Order::new("wendy", 50);
    let token = SessionToken::new("w");

    for ctx in [&mut sync_ctx, &mut async_ctx] {
        ctx.add(&order)?;
        ctx.add(&token)?;
    }
    sync_ctx.save_changes()?;
    async_ctx.save_changes_async(CancellationToken::new()).await?;

    order.total = 60;
    for ctx in [&mut sync_ctx, &mut async_ctx] {
        ctx.update(&order)?;
        ctx.remove(&token)?;
    }
    sync_ctx.save_changes()?;
    async_ctx.save_changes_async(CancellationToken::new()).await?;

    assert_eq!(sync_store.get("orders", order.id), async_store.get("orders", order.id));
    assert_eq!(sync_store.count("session_tokens"), async_store.count("session_tokens"));
    assert_eq!(sync_ctx.last_audit_summary(), async_ctx.last_audit_summary());

    Ok(())
}

#[tokio::test]
async fn cancelled_token_writes_nothing() -> Result<()> {
    let mut ctx = context_at(base_time());
    ctx.add(&Order::new("xavier", 1))?;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = ctx.save_changes_async(cancel).await.unwrap_err();

    assert!(matches!(err, SaveError::Cancelled));
    assert!(err.is_cancelled());
    assert_eq!(ctx.store().batches_executed(), 0);
    assert!(ctx.has_changes());

    Ok(())
}

#[tokio::test]
async fn cancellation_during_store_call_is_reported() -> Result<()> {
    let mut ctx = DbContext::with_clock(model(), BlockingStore, Arc::new(FixedClock(base_time())));
    ctx.add(&Order::new("yvonne", 2))?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = ctx.save_changes_async_with(true, cancel).await.unwrap_err();
    assert!(matches!(err, SaveError::Cancelled));
    assert!(ctx.has_changes());

    Ok(())
}

#[tokio::test]
async fn async_store_failure_is_surfaced_unchanged() -> Result<()> {
    let mut ctx = DbContext::with_clock(model(), FailingStore::default(), Arc::new(FixedClock(base_time())));
    ctx.add(&Order::new("zed", 3))?;

    let err = ctx.save_changes_async(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, SaveError::Store(DatabaseError::QueryError(_))));
    assert!(!err.is_cancelled());
    assert!(ctx.has_changes());

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_contexts_share_only_the_store() -> Result<()> {
    let store = MemoryStore::new();
    let model = model();

    let tasks = (0..8).map(|worker| {
        let store = store.clone();
        let model = model.clone();
        tokio::spawn(async move {
            let mut ctx = DbContext::with_clock(model, store, Arc::new(StepClock::default()));
            for i in 0..10 {
                ctx.add(&Order::new(&format!("worker-{}", worker), i))?;
            }
            let affected = ctx.save_changes_async(CancellationToken::new()).await?;
            Ok::<u64, SaveError>(affected)
        })
    });

    for result in futures::future::join_all(tasks).await {
        assert_eq!(result??, 10);
    }

    assert_eq!(store.count("orders"), 80);
    assert_eq!(store.batches_executed(), 8);
    assert!(store
        .list("orders", false)
        .iter()
        .all(|order| order.insert_date() == Some(StepClock::nth(0))));

    Ok(())
}
