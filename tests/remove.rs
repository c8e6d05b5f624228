mod support;

use docmodel::{GetOptions, HookEvent, ModelInstance, OdmError, Value};
use support::{Op, Shop};

async fn saved_widget(shop: &Shop) -> (ModelInstance, Vec<String>) {
    let corner = shop.stores.create([("name", "Corner")]).await.unwrap();
    let widget = shop
        .products
        .create([
            ("name", Value::from("Widget")),
            ("sku", Value::from("W-1")),
            ("store", Value::from(&corner)),
        ])
        .await
        .unwrap();
    let refs = widget.ref_keys();
    assert_eq!(refs.len(), 3);
    (widget, refs)
}

#[tokio::test]
async fn remove_deletes_primary_before_references() {
    let shop = Shop::new();
    let (widget, refs) = saved_widget(&shop).await;
    let key = widget.key().unwrap();
    shop.store.clear_ops();

    widget.remove().await.unwrap();

    let ops = shop.store.ops();
    assert_eq!(ops.len(), 4);
    assert_eq!(ops[0], Op::Remove(key.clone()));
    for ref_key in &refs {
        assert!(ops[1..].contains(&Op::Remove(ref_key.clone())));
        assert!(!shop.store.inner().contains(ref_key));
    }
    assert!(!shop.store.inner().contains(&key));
    assert!(widget.cas().is_none());
    assert!(widget.ref_keys().is_empty());
}

#[tokio::test]
async fn remove_succeeds_when_reference_cleanup_fails() {
    let shop = Shop::new();
    let (widget, refs) = saved_widget(&shop).await;
    shop.store.fail_removes_matching("Product$");

    widget.remove().await.unwrap();

    assert!(!shop.store.inner().contains(&widget.key().unwrap()));
    for ref_key in &refs {
        assert!(shop.store.inner().contains(ref_key));
    }
}

#[tokio::test]
async fn failed_primary_remove_leaves_references_alone() {
    let shop = Shop::new();
    let (widget, refs) = saved_widget(&shop).await;
    let key = widget.key().unwrap();
    shop.store.fail_removes_matching(&key);
    shop.store.clear_ops();

    let err = widget.remove().await.unwrap_err();
    assert!(matches!(err, OdmError::Store(_)));
    assert_eq!(shop.store.ops(), vec![Op::Remove(key)]);
    assert_eq!(widget.ref_keys(), refs);
}

#[tokio::test]
async fn stale_instance_cannot_remove() {
    let shop = Shop::new();
    let (widget, _) = saved_widget(&shop).await;

    let other = shop
        .products
        .get_by_id(&widget.id().unwrap(), &GetOptions::default())
        .await
        .unwrap();
    other.set("price", 3).unwrap();
    other.save().await.unwrap();

    let err = widget.remove().await.unwrap_err();
    assert!(err.is_cas_conflict(), "got {:?}", err);
    assert!(shop.store.inner().contains(&widget.key().unwrap()));
}

#[tokio::test]
async fn unloaded_indexed_instance_cannot_remove() {
    let shop = Shop::new();
    let (widget, _) = saved_widget(&shop).await;
    let handle = shop.products.ref_id(&widget.id().unwrap());
    shop.store.clear_ops();

    let err = handle.remove().await.unwrap_err();
    assert!(matches!(err, OdmError::NotLoaded { .. }));
    assert!(shop.store.ops().is_empty());
}

#[tokio::test]
async fn unloaded_unindexed_instance_removes_by_key() {
    let shop = Shop::new();
    let ann = shop.customers.create([("name", "Ann")]).await.unwrap();
    let handle = shop.customers.ref_id(&ann.id().unwrap());

    handle.remove().await.unwrap();
    assert!(!shop.store.inner().contains(&ann.key().unwrap()));
}

#[tokio::test]
async fn removed_instance_can_be_saved_again() {
    let shop = Shop::new();
    let (widget, refs) = saved_widget(&shop).await;

    widget.remove().await.unwrap();
    widget.save().await.unwrap();

    assert!(shop.store.inner().contains(&widget.key().unwrap()));
    for ref_key in &refs {
        assert!(shop.store.inner().contains(ref_key));
    }
}

#[tokio::test]
async fn remove_hooks() {
    let shop = Shop::new();
    let (widget, _) = saved_widget(&shop).await;

    shop.products.post(HookEvent::Remove, |_| async {
        Err(OdmError::hook("already gone"))
    });
    shop.products.pre(HookEvent::Remove, |instance| async move {
        match instance.get("name") {
            Some(Value::String(name)) if name == "Keep" => Err(OdmError::hook("protected")),
            _ => Ok(()),
        }
    });

    widget.set("name", "Keep").unwrap();
    widget.save().await.unwrap();
    let err = widget.remove().await.unwrap_err();
    assert!(matches!(err, OdmError::Hook(_)));
    assert!(shop.store.inner().contains(&widget.key().unwrap()));

    widget.set("name", "Widget").unwrap();
    widget.save().await.unwrap();
    widget.remove().await.unwrap();
    assert!(!shop.store.inner().contains(&widget.key().unwrap()));
}
