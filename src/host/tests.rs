use super::*;
use crate::client::EntityClient;
use crate::store::{LastGoodCache, MemoryWidgetStore};
use crate::testing::{attribute_config, state_only_config, FakeEntityClient};
use crate::widget::ConfigError;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

struct Fixture {
    host: WidgetHost,
    store: Arc<MemoryWidgetStore>,
    client: Arc<FakeEntityClient>,
    rx: mpsc::UnboundedReceiver<RenderUpdate>,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryWidgetStore::new());
    let client = Arc::new(
        FakeEntityClient::new()
            .with_entity(EntitySnapshot::new("light.porch", "off"))
            .with_entity(
                EntitySnapshot::new("climate.hall", "heat")
                    .with_attribute("temperature", json!(21))
                    .with_attribute("hvac_action", json!("heating")),
            ),
    );
    let (sink, rx) = ChannelRenderSink::new();
    let resolver = Resolver::new(client.clone(), store.clone());
    let host = WidgetHost::new(store.clone(), resolver, Arc::new(sink));
    Fixture {
        host,
        store,
        client,
        rx,
    }
}

async fn join(handles: Vec<JoinHandle<()>>) {
    for result in futures::future::join_all(handles).await {
        result.unwrap();
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<RenderUpdate>) -> Vec<RenderUpdate> {
    let mut updates = Vec::new();
    while let Ok(update) = rx.try_recv() {
        updates.push(update);
    }
    updates
}

#[tokio::test]
async fn test_on_create_saves_and_renders() {
    let mut f = fixture();
    let input = WidgetConfigInput {
        entity_id: Some("climate.hall".to_string()),
        attribute_ids: Some(vec!["temperature".to_string(), "hvac_action".to_string()]),
        label: None,
        text_size: Some("18".to_string()),
        state_separator: Some(": ".to_string()),
        attribute_separator: Some(" / ".to_string()),
    };

    f.host.on_create(10, input).unwrap().await.unwrap();

    assert!(f.store.get(10).unwrap().is_some());
    let updates = drain(&mut f.rx);
    assert_eq!(
        updates,
        vec![RenderUpdate {
            instance_id: 10,
            text: Some("heat: 21 / heating".to_string()),
            label: "climate.hall".to_string(),
            text_size_sp: 18.0,
            is_error: false,
        }]
    );
}

#[tokio::test]
async fn test_on_create_rejects_missing_entity_id() {
    let mut f = fixture();

    let err = f
        .host
        .on_create(10, WidgetConfigInput::default())
        .unwrap_err();

    assert_eq!(
        err.downcast_ref::<ConfigError>(),
        Some(&ConfigError::MissingEntityId)
    );
    assert!(f.store.get_all().unwrap().is_empty());
    assert!(drain(&mut f.rx).is_empty());
}

#[tokio::test]
async fn test_reconfigure_keeps_last_good_text() {
    let mut f = fixture();
    f.store.save(&state_only_config(3, "light.porch")).unwrap();
    f.host.on_refresh(3).await.unwrap();
    assert_eq!(f.store.get_last_good(3).unwrap(), Some("off".to_string()));

    f.client.set_offline(true);
    let input = WidgetConfigInput {
        entity_id: Some("light.porch".to_string()),
        label: Some("Porch".to_string()),
        ..Default::default()
    };
    f.host.on_create(3, input).unwrap().await.unwrap();

    let updates = drain(&mut f.rx);
    let last = updates.last().unwrap();
    assert_eq!(last.label, "Porch");
    assert_eq!(last.text.as_deref(), Some("off"));
    assert!(last.is_error);
}

#[tokio::test]
async fn test_on_refresh_offline_shows_stale_text_with_error() {
    let mut f = fixture();
    f.store.save(&state_only_config(1, "light.porch")).unwrap();
    f.host.on_refresh(1).await.unwrap();

    f.client.set_offline(true);
    f.host.on_refresh(1).await.unwrap();

    let updates = drain(&mut f.rx);
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].text.as_deref(), Some("off"));
    assert!(!updates[0].is_error);
    assert_eq!(updates[1].text.as_deref(), Some("off"));
    assert!(updates[1].is_error);
}

#[tokio::test]
async fn test_on_refresh_all() {
    let mut f = fixture();
    f.store.save(&state_only_config(1, "light.porch")).unwrap();
    f.store
        .save(&attribute_config(2, "climate.hall", &["temperature"]))
        .unwrap();

    join(f.host.on_refresh_all().unwrap()).await;

    let mut updates = drain(&mut f.rx);
    updates.sort_by_key(|u| u.instance_id);
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].text.as_deref(), Some("off"));
    assert_eq!(updates[1].text.as_deref(), Some("heat-21"));
}

#[tokio::test]
async fn test_external_event_fans_out_to_matching_instances_only() {
    let mut f = fixture();
    for id in [1, 2, 3] {
        f.store.save(&state_only_config(id, "light.porch")).unwrap();
    }
    for id in [4, 5] {
        f.store.save(&state_only_config(id, "climate.hall")).unwrap();
    }

    let handles = f
        .host
        .on_external_event("light.porch", EntitySnapshot::new("light.porch", "on"))
        .unwrap();
    assert_eq!(handles.len(), 3);
    join(handles).await;

    let mut ids: Vec<i64> = drain(&mut f.rx)
        .into_iter()
        .inspect(|u| assert_eq!(u.text.as_deref(), Some("on")))
        .map(|u| u.instance_id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec![1, 2, 3]);

    // Pushed snapshot is used directly
    assert_eq!(f.client.calls(), 0);
}

#[tokio::test]
async fn test_external_event_without_matches() {
    let mut f = fixture();
    f.store.save(&state_only_config(1, "light.porch")).unwrap();

    let handles = f
        .host
        .on_external_event("switch.fan", EntitySnapshot::new("switch.fan", "on"))
        .unwrap();

    assert!(handles.is_empty());
    assert!(drain(&mut f.rx).is_empty());
}

#[tokio::test]
async fn test_deleted_instance_is_not_refreshed() {
    let mut f = fixture();
    f.store.save(&state_only_config(1, "light.porch")).unwrap();

    assert_eq!(f.host.on_delete(&[1]).unwrap(), 1);
    assert!(f.store.get(1).unwrap().is_none());

    f.host.on_refresh(1).await.unwrap();
    join(
        f.host
            .on_external_event("light.porch", EntitySnapshot::new("light.porch", "on"))
            .unwrap(),
    )
    .await;

    assert!(drain(&mut f.rx).is_empty());
    assert_eq!(f.client.calls(), 0);
}

/// Client that blocks until released, to delete an instance mid-refresh
struct GatedClient {
    gate: Arc<Notify>,
}

#[async_trait]
impl EntityClient for GatedClient {
    async fn get_entity(&self, entity_id: &str) -> anyhow::Result<EntitySnapshot> {
        self.gate.notified().await;
        Ok(EntitySnapshot::new(entity_id, "late"))
    }
}

#[tokio::test]
async fn test_refresh_outliving_delete_is_discarded() {
    let store = Arc::new(MemoryWidgetStore::new());
    let gate = Arc::new(Notify::new());
    let client = Arc::new(GatedClient { gate: gate.clone() });
    let (sink, mut rx) = ChannelRenderSink::new();
    let host = WidgetHost::new(
        store.clone(),
        Resolver::new(client, store.clone()),
        Arc::new(sink),
    );
    store.save(&state_only_config(1, "light.porch")).unwrap();

    let handle = host.on_refresh(1);
    tokio::time::sleep(Duration::from_millis(50)).await;
    host.on_delete(&[1]).unwrap();
    gate.notify_one();
    handle.await.unwrap();

    assert!(drain(&mut rx).is_empty());
    assert_eq!(store.get_last_good(1).unwrap(), None);
}

#[tokio::test]
async fn test_push_listener_fans_out_until_closed() {
    let mut f = fixture();
    f.store.save(&state_only_config(1, "light.porch")).unwrap();

    let (tx, rx) = broadcast::channel(16);
    let listener = tokio::spawn(Arc::new(f.host.clone()).run_push_listener(rx));

    tx.send(EntitySnapshot::new("light.porch", "on")).unwrap();
    let update = tokio::time::timeout(Duration::from_secs(2), f.rx.recv())
        .await
        .expect("no render within timeout")
        .expect("render channel closed");
    assert_eq!(update.instance_id, 1);
    assert_eq!(update.text.as_deref(), Some("on"));

    drop(tx);
    tokio::time::timeout(Duration::from_secs(2), listener)
        .await
        .expect("listener did not exit")
        .unwrap();
}
