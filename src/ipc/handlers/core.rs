use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    let courses = state.store.course_list().map(|c| c.len()).ok();
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "courseCount": courses,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        _ => None,
    }
}
