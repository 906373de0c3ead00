use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{params_as, required_str, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::transcript::{Course, MAX_CREDITS};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CourseParams {
    #[serde(default)]
    id: Option<String>,
    code: String,
    name: String,
    #[serde(default)]
    credits: u32,
}

fn handle_courses_get(state: &mut AppState, req: &Request) -> HandlerResult {
    let course_id = required_str(req, "courseId")?;
    match state
        .store
        .course_get(&course_id)
        .map_err(|e| store_err(&req.id, e))?
    {
        Some(course) => Ok(ok(&req.id, json!({ "course": course }))),
        None => Err(err(&req.id, "not_found", "course not found", None)),
    }
}

fn handle_courses_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let courses = state
        .store
        .course_list()
        .map_err(|e| store_err(&req.id, e))?;
    Ok(ok(&req.id, json!({ "courses": courses })))
}

fn handle_courses_upsert(state: &mut AppState, req: &Request) -> HandlerResult {
    let p: CourseParams = params_as(req, None)?;
    let code = p.code.trim().to_string();
    let name = p.name.trim().to_string();
    if code.is_empty() || name.is_empty() {
        return Err(err(
            &req.id,
            "bad_params",
            "code and name must not be empty",
            None,
        ));
    }
    if p.credits > MAX_CREDITS {
        return Err(err(
            &req.id,
            "bad_params",
            format!("credits must be at most {}", MAX_CREDITS),
            Some(json!({ "credits": p.credits })),
        ));
    }
    let course = Course {
        id: p
            .id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        code,
        name,
        credits: p.credits,
    };
    state
        .store
        .course_upsert(&course)
        .map_err(|e| store_err(&req.id, e))?;
    Ok(ok(&req.id, json!({ "courseId": course.id, "course": course })))
}

fn handle_courses_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let course_id = required_str(req, "courseId")?;
    let deleted = state
        .store
        .course_delete(&course_id)
        .map_err(|e| store_err(&req.id, e))?;
    if !deleted {
        return Err(err(&req.id, "not_found", "course not found", None));
    }
    Ok(ok(&req.id, json!({ "deleted": true })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let resp = match req.method.as_str() {
        "courses.get" => handle_courses_get(state, req),
        "courses.list" => handle_courses_list(state, req),
        "courses.upsert" => handle_courses_upsert(state, req),
        "courses.delete" => handle_courses_delete(state, req),
        _ => return None,
    };
    Some(resp.unwrap_or_else(|e| e))
}
