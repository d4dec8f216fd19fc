#![forbid(unsafe_code)]

use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

pub(super) async fn health(State(state): State<AppState>) -> Json<Value> {
    let (time, _) = vu_storage::now_stamp();
    Json(json!({
        "ok": true,
        "service": "verify-upgrade",
        "time": time,
        "port": state.port(),
        "db": {
            "primary": state.primary_health().as_str(),
            "legacy": state.legacy_health().as_str(),
        },
    }))
}
