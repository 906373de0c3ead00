use crate::calc::GradeWeights;
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{params_as, required_str, HandlerResult};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

/// Stored weights plus the derived total and validity flag.
fn weights_json(w: &GradeWeights) -> serde_json::Value {
    let mut v = json!(w);
    v["totalWeight"] = json!(w.total_weight());
    v["isValid"] = json!(w.is_valid());
    v
}

fn handle_weights_get(state: &mut AppState, req: &Request) -> HandlerResult {
    let course_id = required_str(req, "courseId")?;
    match state
        .store
        .weights_get(&course_id)
        .map_err(|e| store_err(&req.id, e))?
    {
        Some(w) => Ok(ok(&req.id, json!({ "weights": weights_json(&w) }))),
        None => Err(err(
            &req.id,
            "not_found",
            "no grade weights for course",
            Some(json!({ "courseId": course_id })),
        )),
    }
}

fn handle_weights_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let all = state
        .store
        .weights_list()
        .map_err(|e| store_err(&req.id, e))?;
    let rows: Vec<serde_json::Value> = all.iter().map(weights_json).collect();
    Ok(ok(&req.id, json!({ "weights": rows })))
}

// Draft weights that do not total 100 are stored as-is; grading rejects them.
fn handle_weights_upsert(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut w: GradeWeights = params_as(req, None)?;
    w.course_id = w.course_id.trim().to_string();
    if w.course_id.is_empty() {
        return Err(err(&req.id, "bad_params", "courseId must not be empty", None));
    }
    state
        .store
        .weights_upsert(&w)
        .map_err(|e| store_err(&req.id, e))?;
    if !w.is_valid() {
        log::info!(
            "weights for course {} stored as draft (total {})",
            w.course_id,
            w.total_weight()
        );
    }
    Ok(ok(&req.id, json!({ "weights": weights_json(&w) })))
}

fn handle_weights_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let course_id = required_str(req, "courseId")?;
    let deleted = state
        .store
        .weights_delete(&course_id)
        .map_err(|e| store_err(&req.id, e))?;
    if !deleted {
        return Err(err(&req.id, "not_found", "no grade weights for course", None));
    }
    Ok(ok(&req.id, json!({ "deleted": true })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let resp = match req.method.as_str() {
        "weights.get" => handle_weights_get(state, req),
        "weights.list" => handle_weights_list(state, req),
        "weights.upsert" => handle_weights_upsert(state, req),
        "weights.delete" => handle_weights_delete(state, req),
        _ => return None,
    };
    Some(resp.unwrap_or_else(|e| e))
}
