use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{optional_str, params_as, required_str, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::quiz::Quiz;
use serde_json::json;
use uuid::Uuid;

fn quiz_json(q: &Quiz) -> serde_json::Value {
    let mut v = json!(q);
    v["totalPoints"] = json!(q.total_points());
    v
}

fn handle_quizzes_get(state: &mut AppState, req: &Request) -> HandlerResult {
    let quiz_id = required_str(req, "quizId")?;
    match state
        .store
        .quiz_get(&quiz_id)
        .map_err(|e| store_err(&req.id, e))?
    {
        Some(q) => Ok(ok(&req.id, json!({ "quiz": quiz_json(&q) }))),
        None => Err(err(&req.id, "not_found", "quiz not found", None)),
    }
}

fn handle_quizzes_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let course_id = optional_str(req, "courseId")?;
    let quizzes = state
        .store
        .quiz_list(course_id.as_deref())
        .map_err(|e| store_err(&req.id, e))?;
    let rows: Vec<serde_json::Value> = quizzes.iter().map(quiz_json).collect();
    Ok(ok(&req.id, json!({ "quizzes": rows })))
}

fn handle_quizzes_upsert(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut quiz: Quiz = {
        let mut raw = req.params.clone();
        let missing_id = raw
            .get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().is_empty())
            .unwrap_or(true);
        if missing_id {
            if let Some(obj) = raw.as_object_mut() {
                obj.insert("id".into(), json!(Uuid::new_v4().to_string()));
            }
        }
        let scoped = Request {
            params: raw,
            ..req.clone()
        };
        params_as(&scoped, None)?
    };
    quiz.course_id = quiz.course_id.trim().to_string();
    if quiz.course_id.is_empty() {
        return Err(err(&req.id, "bad_params", "courseId must not be empty", None));
    }
    quiz.validate()
        .map_err(|m| err(&req.id, "bad_params", m, None))?;

    state
        .store
        .quiz_upsert(&quiz)
        .map_err(|e| store_err(&req.id, e))?;
    Ok(ok(
        &req.id,
        json!({ "quizId": quiz.id, "quiz": quiz_json(&quiz) }),
    ))
}

fn handle_quizzes_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let quiz_id = required_str(req, "quizId")?;
    let deleted = state
        .store
        .quiz_delete(&quiz_id)
        .map_err(|e| store_err(&req.id, e))?;
    if !deleted {
        return Err(err(&req.id, "not_found", "quiz not found", None));
    }
    Ok(ok(&req.id, json!({ "deleted": true })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let resp = match req.method.as_str() {
        "quizzes.get" => handle_quizzes_get(state, req),
        "quizzes.list" => handle_quizzes_list(state, req),
        "quizzes.upsert" => handle_quizzes_upsert(state, req),
        "quizzes.delete" => handle_quizzes_delete(state, req),
        _ => return None,
    };
    Some(resp.unwrap_or_else(|e| e))
}
