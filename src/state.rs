//! Shared board context.
//!
//! DESIGN
//! ======
//! `BoardContext` is what every service operation receives. It bundles the
//! read-only configuration, the state store, the record store and the
//! handler registry. Clone is cheap: all inner fields are Arc-wrapped or
//! Clone handles onto shared state.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::ConfigStore;
use crate::hooks::{BoardHandle, HandlerRegistry};
use crate::record_store::RecordStore;
use crate::settings::BoardSettings;
use crate::store::BoardStore;

/// Everything one mounted board needs.
#[derive(Clone)]
pub struct BoardContext {
    pub config: Arc<ConfigStore>,
    pub store: BoardStore,
    pub records: Arc<dyn RecordStore>,
    pub hooks: Arc<HandlerRegistry>,
    pub settings: BoardSettings,
    /// Held for the duration of a transition when single-flight is on.
    pub transition_lock: Arc<Mutex<()>>,
}

impl BoardContext {
    #[must_use]
    pub fn new(
        config: ConfigStore,
        records: Arc<dyn RecordStore>,
        hooks: HandlerRegistry,
        settings: BoardSettings,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store: BoardStore::new(),
            records,
            hooks: Arc::new(hooks),
            settings,
            transition_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Handle given to hooks.
    #[must_use]
    pub fn handle(&self) -> BoardHandle {
        BoardHandle::new(self.clone())
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use serde_json::json;

    use super::*;
    use crate::metadata::{Attribute, LaneOption, Metadata, STATUS_ATTRIBUTE};
    use crate::record::{Data, Record};
    use crate::record_store::{InMemoryRecordStore, RecordQuery, RecordStoreError};

    pub const SUBSCRIPTION_LOOKUP: &str = "oss_incidentid";
    pub const PARENT_LOOKUP: &str = "regardingobjectid";

    /// `incident` with a two-lane status attribute: Open (1) and Done (2).
    #[must_use]
    pub fn incident_metadata() -> Metadata {
        Metadata {
            logical_name: "incident".into(),
            logical_collection_name: "incidents".into(),
            primary_id_attribute: "incidentid".into(),
            primary_name_attribute: "title".into(),
            display_name: Some("Case".into()),
            display_collection_name: Some("Cases".into()),
            attributes: vec![Attribute::new(
                STATUS_ATTRIBUTE,
                vec![LaneOption::new(1, "Open").with_state(0), LaneOption::new(2, "Done").with_state(1)],
            )],
        }
    }

    /// Board with `incident` as primary and `task` nested under it.
    #[must_use]
    pub fn sample_definition_json() -> String {
        json!({
            "config": {
                "primaryEntity": {
                    "logicalName": "incident",
                    "swimLaneSource": "statuscode",
                    "subscriptionLookup": SUBSCRIPTION_LOOKUP,
                    "notificationLookup": SUBSCRIPTION_LOOKUP,
                    "customButtons": [
                        {"id": "escalate", "label": "Escalate", "callBack": "board.escalate"}
                    ]
                },
                "secondaryEntity": {
                    "logicalName": "task",
                    "swimLaneSource": "oss_stage",
                    "parentLookup": PARENT_LOOKUP
                }
            },
            "metadata": [
                incident_metadata(),
                {
                    "logicalName": "task",
                    "logicalCollectionName": "tasks",
                    "primaryIdAttribute": "activityid",
                    "primaryNameAttribute": "subject",
                    "attributes": [{
                        "logicalName": "oss_stage",
                        "optionSet": [
                            {"value": 10, "label": "Todo"},
                            {"value": 20, "label": "Doing"}
                        ]
                    }]
                },
                {
                    "logicalName": "oss_subscription",
                    "logicalCollectionName": "oss_subscriptions",
                    "primaryIdAttribute": "oss_subscriptionid",
                    "primaryNameAttribute": "oss_name"
                },
                {
                    "logicalName": "oss_notification",
                    "logicalCollectionName": "oss_notifications",
                    "primaryIdAttribute": "oss_notificationid",
                    "primaryNameAttribute": "oss_name"
                }
            ],
            "views": [
                {
                    "entity": "incident",
                    "id": "v-active",
                    "name": "Active Cases",
                    "fetchXml": "<fetch><entity name=\"incident\"><attribute name=\"title\"/></entity></fetch>",
                    "layoutXml": "<grid><row><cell name=\"title\"/><cell name=\"statuscode\"/></row></grid>"
                },
                {
                    "entity": "task",
                    "id": "v-tasks",
                    "name": "Open Tasks",
                    "fetchXml": "<fetch><entity name=\"task\"/></fetch>",
                    "layoutXml": "<grid><row><cell name=\"subject\"/></row></grid>"
                }
            ],
            "forms": [
                {
                    "entity": "incident",
                    "id": "f-card",
                    "name": "Case Card",
                    "parsed": {"header": {"rows": [{"cells": ["title"]}]}}
                }
            ]
        })
        .to_string()
    }

    #[must_use]
    pub fn sample_config() -> ConfigStore {
        ConfigStore::from_json(&sample_definition_json()).unwrap()
    }

    /// Incidents `1` (Open) and `2` (Done); tasks `t1` (Todo) under `1`, `t2` (Doing) under `2`.
    #[must_use]
    pub fn sample_fixture() -> serde_json::Value {
        json!({
            "incident": [
                {"incidentid": "1", "title": "Printer on fire", "statuscode": 1, "statecode": 0},
                {"incidentid": "2", "title": "Laptop battery", "statuscode": 2, "statecode": 1}
            ],
            "task": [
                {"activityid": "t1", "subject": "Call vendor", "oss_stage": 10, "_regardingobjectid_value": "1"},
                {"activityid": "t2", "subject": "Order part", "oss_stage": 20, "_regardingobjectid_value": "2"}
            ]
        })
    }

    /// In-memory store that records every call and can be told to fail writes,
    /// or to fail fetches once an update went through.
    pub struct RecordingStore {
        pub inner: InMemoryRecordStore,
        pub calls: Mutex<Vec<String>>,
        pub updates: Mutex<Vec<(String, String, Data)>>,
        fail_writes: AtomicBool,
        fail_fetches_after_update: AtomicBool,
        updated: AtomicBool,
    }

    impl RecordingStore {
        #[must_use]
        pub fn new(inner: InMemoryRecordStore) -> Self {
            Self {
                inner,
                calls: Mutex::new(Vec::new()),
                updates: Mutex::new(Vec::new()),
                fail_writes: AtomicBool::new(false),
                fail_fetches_after_update: AtomicBool::new(false),
                updated: AtomicBool::new(false),
            }
        }

        pub fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub fn fail_fetches_after_update(&self, fail: bool) {
            self.fail_fetches_after_update.store(fail, Ordering::SeqCst);
        }

        fn check_write(&self) -> Result<(), RecordStoreError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(RecordStoreError::Rejected { status: 412, body: "precondition failed".into() });
            }
            Ok(())
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn clear_calls(&self) {
            self.calls.lock().unwrap().clear();
        }
    }

    #[async_trait::async_trait]
    impl RecordStore for RecordingStore {
        async fn fetch(&self, entity: &str, query: &RecordQuery) -> Result<Vec<Record>, RecordStoreError> {
            self.calls.lock().unwrap().push(format!("fetch:{entity}"));
            if self.fail_fetches_after_update.load(Ordering::SeqCst) && self.updated.load(Ordering::SeqCst) {
                return Err(RecordStoreError::Transport("connection reset".into()));
            }
            self.inner.fetch(entity, query).await
        }

        async fn update(&self, entity: &str, id: &str, patch: &Data) -> Result<(), RecordStoreError> {
            self.calls.lock().unwrap().push(format!("update:{entity}:{id}"));
            self.updates
                .lock()
                .unwrap()
                .push((entity.to_string(), id.to_string(), patch.clone()));
            self.check_write()?;
            self.inner.update(entity, id, patch).await?;
            self.updated.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn create(&self, entity: &str, attributes: &Data) -> Result<String, RecordStoreError> {
            self.calls.lock().unwrap().push(format!("create:{entity}"));
            self.check_write()?;
            self.inner.create(entity, attributes).await
        }

        async fn delete(&self, entity: &str, id: &str) -> Result<(), RecordStoreError> {
            self.calls.lock().unwrap().push(format!("delete:{entity}:{id}"));
            self.check_write()?;
            self.inner.delete(entity, id).await
        }
    }

    /// Sample board over a recording store seeded with [`sample_fixture`].
    pub fn test_context_with(hooks: HandlerRegistry, settings: BoardSettings) -> (BoardContext, Arc<RecordingStore>) {
        context_with_config(sample_config(), hooks, settings)
    }

    pub fn test_context() -> (BoardContext, Arc<RecordingStore>) {
        test_context_with(HandlerRegistry::new(), BoardSettings::default())
    }

    /// Board for a tweaked definition, over the same seeded recording store.
    pub fn context_with_config(
        config: ConfigStore,
        hooks: HandlerRegistry,
        settings: BoardSettings,
    ) -> (BoardContext, Arc<RecordingStore>) {
        let metadata: Vec<Metadata> = ["incident", "task", "oss_subscription", "oss_notification"]
            .iter()
            .filter_map(|name| config.metadata_for(name).map(|m| (**m).clone()))
            .collect();
        let inner = InMemoryRecordStore::from_metadata(&metadata).with_fixture(sample_fixture());
        let records = Arc::new(RecordingStore::new(inner));
        let ctx = BoardContext::new(config, records.clone(), hooks, settings);
        (ctx, records)
    }

    /// Sample definition with `edit` applied to its JSON.
    pub fn edited_config(edit: impl FnOnce(&mut serde_json::Value)) -> ConfigStore {
        let mut def: serde_json::Value = serde_json::from_str(&sample_definition_json()).unwrap();
        edit(&mut def);
        ConfigStore::from_json(&def.to_string()).unwrap()
    }
}
