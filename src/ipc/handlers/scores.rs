use crate::calc::Category;
use crate::db::ScoreRow;
use crate::ipc::error::{err, grade_err, ok, store_err};
use crate::ipc::helpers::{optional_str, params_as, required_str, HandlerResult};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn score_json(row: &ScoreRow) -> serde_json::Value {
    let mut v = json!(row);
    v["percentage"] = json!(row.record().ok().and_then(|r| r.percentage()));
    v
}

fn parse_category(req: &Request) -> Result<Option<Category>, serde_json::Value> {
    let Some(raw) = optional_str(req, "category")? else {
        return Ok(None);
    };
    if raw.is_empty() || raw.eq_ignore_ascii_case("ALL") {
        return Ok(None);
    }
    Category::parse(&raw).map(Some).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            "category must be one of: assignment, quiz, exam",
            None,
        )
    })
}

fn handle_scores_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let student_id = optional_str(req, "studentId")?;
    let course_id = optional_str(req, "courseId")?;
    let category = parse_category(req)?;
    let rows = state
        .store
        .score_list(student_id.as_deref(), course_id.as_deref(), category)
        .map_err(|e| store_err(&req.id, e))?;
    let scores: Vec<serde_json::Value> = rows.iter().map(score_json).collect();
    Ok(ok(&req.id, json!({ "scores": scores })))
}

fn handle_scores_upsert(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut row: ScoreRow = params_as(req, None)?;
    row.student_id = row.student_id.trim().to_string();
    row.course_id = row.course_id.trim().to_string();
    row.item_id = row.item_id.trim().to_string();
    if row.student_id.is_empty() || row.course_id.is_empty() || row.item_id.is_empty() {
        return Err(err(
            &req.id,
            "bad_params",
            "studentId, courseId and itemId must not be empty",
            None,
        ));
    }
    row.record().map_err(|e| grade_err(&req.id, e))?;

    let score_id = state
        .store
        .score_upsert(&row)
        .map_err(|e| store_err(&req.id, e))?;
    row.id = score_id.clone();
    Ok(ok(
        &req.id,
        json!({ "scoreId": score_id, "score": score_json(&row) }),
    ))
}

fn handle_scores_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let score_id = required_str(req, "scoreId")?;
    let deleted = state
        .store
        .score_delete(&score_id)
        .map_err(|e| store_err(&req.id, e))?;
    if !deleted {
        return Err(err(&req.id, "not_found", "score not found", None));
    }
    Ok(ok(&req.id, json!({ "deleted": true })))
}

fn handle_scores_get(state: &mut AppState, req: &Request) -> HandlerResult {
    let score_id = required_str(req, "scoreId")?;
    match state
        .store
        .score_get(&score_id)
        .map_err(|e| store_err(&req.id, e))?
    {
        Some(row) => Ok(ok(&req.id, json!({ "score": score_json(&row) }))),
        None => Err(err(&req.id, "not_found", "score not found", None)),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let resp = match req.method.as_str() {
        "scores.get" => handle_scores_get(state, req),
        "scores.list" => handle_scores_list(state, req),
        "scores.upsert" => handle_scores_upsert(state, req),
        "scores.delete" => handle_scores_delete(state, req),
        _ => return None,
    };
    Some(resp.unwrap_or_else(|e| e))
}
