use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use laneboard::config::{BoardSide, ConfigStore};
use laneboard::hooks::HandlerRegistry;
use laneboard::record_store::webapi::WebApiConfig;
use laneboard::record_store::{InMemoryRecordStore, RecordStore, WebApiRecordStore};
use laneboard::services::refresh;
use laneboard::settings::BoardSettings;
use laneboard::state::BoardContext;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let definition_path: PathBuf = std::env::var("BOARD_DEFINITION_PATH")
        .unwrap_or_else(|_| "board.json".into())
        .into();
    let config = ConfigStore::from_path(&definition_path).expect("board definition invalid");

    // Live Web API when configured, otherwise an in-memory store seeded from a fixture.
    let records: Arc<dyn RecordStore> = match WebApiConfig::from_env() {
        Ok(webapi) => {
            tracing::info!(base_url = %webapi.base_url, "using web api record store");
            Arc::new(WebApiRecordStore::new(webapi, config.collection_names()).expect("web api client init failed"))
        }
        Err(e) => {
            tracing::warn!(error = %e, "web api not configured, using in-memory record store");
            Arc::new(load_fixture(&config))
        }
    };

    let ctx = BoardContext::new(config, records, HandlerRegistry::new(), BoardSettings::from_env());
    refresh::load_board(&ctx).await.expect("board load failed");

    let state = ctx.store.snapshot();
    let label = ctx.config.metadata(BoardSide::Primary).map_or("records", |m| m.label());
    for lane in state.lanes(BoardSide::Primary) {
        let name = lane.option.as_ref().map_or("(other)", |o| o.label.as_str());
        println!("{name}: {} {label}", lane.data.len());
    }
    if let Some(text) = &state.progress_text {
        tracing::info!(progress = %text, "board loaded");
    }
}

fn load_fixture(config: &ConfigStore) -> InMemoryRecordStore {
    let metadata: HashMap<_, _> = config
        .collection_names()
        .into_keys()
        .filter_map(|name| config.metadata_for(&name).map(|m| (name, (**m).clone())))
        .collect();
    let store = InMemoryRecordStore::from_metadata(metadata.values());

    let Ok(path) = std::env::var("BOARD_FIXTURE_PATH") else {
        return store;
    };
    let json = std::fs::read_to_string(&path).expect("fixture unreadable");
    let fixture: serde_json::Value = serde_json::from_str(&json).expect("fixture invalid");
    tracing::info!(%path, "seeding in-memory record store");
    store.with_fixture(fixture)
}
