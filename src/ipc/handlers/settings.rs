use crate::ipc::error::{grade_err, ok, store_err};
use crate::ipc::helpers::{params_as, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::scale::{LetterScale, LETTER_SCALE_SETTING};
use serde_json::json;

fn handle_letter_scale_get(state: &mut AppState, req: &Request) -> HandlerResult {
    let stored = state
        .store
        .settings_get_json(LETTER_SCALE_SETTING)
        .map_err(|e| store_err(&req.id, e))?;
    let is_default = stored.is_none();
    let scale = state
        .store
        .letter_scale()
        .map_err(|e| store_err(&req.id, e))?;
    Ok(ok(
        &req.id,
        json!({ "scale": scale, "isDefault": is_default }),
    ))
}

fn handle_letter_scale_set(state: &mut AppState, req: &Request) -> HandlerResult {
    // A null scale goes back to the conventional table.
    if req.params.get("scale").map(|v| v.is_null()).unwrap_or(false) {
        state
            .store
            .settings_delete(LETTER_SCALE_SETTING)
            .map_err(|e| store_err(&req.id, e))?;
        return Ok(ok(&req.id, json!({ "scale": LetterScale::default() })));
    }

    let scale: LetterScale = params_as(req, Some("scale"))?;
    scale.validate().map_err(|e| grade_err(&req.id, e))?;
    state
        .store
        .settings_set_json(LETTER_SCALE_SETTING, &json!(scale))
        .map_err(|e| store_err(&req.id, e))?;
    Ok(ok(&req.id, json!({ "scale": scale })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let resp = match req.method.as_str() {
        "settings.letterScale.get" => handle_letter_scale_get(state, req),
        "settings.letterScale.set" => handle_letter_scale_set(state, req),
        _ => return None,
    };
    Some(resp.unwrap_or_else(|e| e))
}
