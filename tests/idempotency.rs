//! Pairwise uniqueness: exhaustive first-pass coverage, idempotent
//! re-evaluation, and racing duplicate triggers.

use std::sync::Arc;

use refind::notify::LogTransport;
use refind::{
    Contact, Embedding, EngineConfig, Item, ItemKind, ItemRepository, MatchEngine,
    MatchResultRepository, MemoryStore, NotificationRepository, PairKey,
};

fn engine_with(store: &Arc<MemoryStore>) -> MatchEngine {
    MatchEngine::new(
        EngineConfig::default(),
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(LogTransport),
        None,
    )
}

async fn insert_embedded(store: &MemoryStore, id: u64, kind: ItemKind, vector: Vec<f32>) {
    let mut item = Item::new(id, kind, format!("{kind}-{id}"));
    item.embedding = Some(Embedding(vector));
    ItemRepository::insert(store, item).await.unwrap();
}

#[tokio::test]
async fn first_evaluation_produces_n_by_m_rows_and_reruns_add_none() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_with(&store);

    for id in 1..=2 {
        insert_embedded(&store, id, ItemKind::Lost, vec![1.0, 0.0, id as f32]).await;
    }
    for id in 10..=12 {
        insert_embedded(&store, id, ItemKind::Found, vec![0.0, 1.0, id as f32]).await;
    }

    for id in 1..=2 {
        engine.on_item_created(ItemKind::Lost, id).await;
    }
    assert_eq!(MatchResultRepository::all(store.as_ref()).await.unwrap().len(), 6);

    // Re-trigger every item from both sides: no new rows.
    for id in 1..=2 {
        engine.on_item_created(ItemKind::Lost, id).await;
    }
    for id in 10..=12 {
        engine.on_item_created(ItemKind::Found, id).await;
    }
    assert_eq!(MatchResultRepository::all(store.as_ref()).await.unwrap().len(), 6);
}

#[tokio::test]
async fn cross_triggered_pair_is_recorded_once() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_with(&store);

    insert_embedded(&store, 1, ItemKind::Lost, vec![3.0, 4.0]).await;
    insert_embedded(&store, 2, ItemKind::Found, vec![3.0, 4.0]).await;

    // Both items were freshly created; each side triggers a scan of the
    // other corpus.
    engine.on_item_created(ItemKind::Lost, 1).await;
    engine.on_item_created(ItemKind::Found, 2).await;

    let rows = MatchResultRepository::all(store.as_ref()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].pair,
        PairKey {
            lost_id: 1,
            found_id: 2
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_triggers_for_the_same_pair_yield_one_row() {
    let store = Arc::new(MemoryStore::new());
    let engine = Arc::new(engine_with(&store));

    insert_embedded(&store, 1, ItemKind::Lost, vec![3.0, 4.0]).await;
    insert_embedded(&store, 2, ItemKind::Found, vec![3.0, 4.0]).await;

    let from_lost = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.on_item_created(ItemKind::Lost, 1).await })
    };
    let from_found = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.on_item_created(ItemKind::Found, 2).await })
    };
    from_lost.await.unwrap();
    from_found.await.unwrap();

    assert_eq!(MatchResultRepository::all(store.as_ref()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn re_evaluation_does_not_renotify() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_with(&store);

    let mut lost = Item::new(1, ItemKind::Lost, "lost-1");
    lost.embedding = Some(Embedding(vec![3.0, 4.0]));
    lost.contact = Some(Contact {
        email: Some("owner@example.com".into()),
        phone: None,
    });
    ItemRepository::insert(store.as_ref(), lost).await.unwrap();
    insert_embedded(&store, 2, ItemKind::Found, vec![3.0, 4.0]).await;

    engine.on_item_created(ItemKind::Lost, 1).await;
    assert_eq!(NotificationRepository::all(store.as_ref()).await.unwrap().len(), 1);

    engine.on_item_created(ItemKind::Lost, 1).await;
    engine.on_item_created(ItemKind::Found, 2).await;
    engine.rematch(ItemKind::Lost, 1).await.unwrap();

    // The matched pair notified exactly once despite four evaluations.
    assert_eq!(NotificationRepository::all(store.as_ref()).await.unwrap().len(), 1);
}
