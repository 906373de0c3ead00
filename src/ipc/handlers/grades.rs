use crate::calc::compute_course_grade;
use crate::error::GradeError;
use crate::ipc::error::{grade_err, ok, store_err};
use crate::ipc::helpers::{required_str, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::transcript::TranscriptEntry;
use serde_json::json;

fn handle_grades_course(state: &mut AppState, req: &Request) -> HandlerResult {
    let student_id = required_str(req, "studentId")?;
    let course_id = required_str(req, "courseId")?;
    let scale = state
        .store
        .letter_scale()
        .map_err(|e| store_err(&req.id, e))?;
    let report = compute_course_grade(&state.store, &scale, &student_id, &course_id)
        .map_err(|e| grade_err(&req.id, e))?;
    Ok(ok(&req.id, json!(report)))
}

fn handle_grades_finalize(state: &mut AppState, req: &Request) -> HandlerResult {
    let student_id = required_str(req, "studentId")?;
    let course_id = required_str(req, "courseId")?;
    let semester = required_str(req, "semester")?;

    let course = state
        .store
        .course_get(&course_id)
        .map_err(|e| store_err(&req.id, e))?
        .ok_or_else(|| grade_err(&req.id, GradeError::not_found("course", course_id.as_str())))?;
    let scale = state
        .store
        .letter_scale()
        .map_err(|e| store_err(&req.id, e))?;
    let report = compute_course_grade(&state.store, &scale, &student_id, &course_id)
        .map_err(|e| grade_err(&req.id, e))?;

    let Some(result) = report.grade.result() else {
        return Ok(ok(
            &req.id,
            json!({ "grade": report.grade, "entry": null }),
        ));
    };

    let entry = TranscriptEntry::from_course_grade(&course, result, &semester);
    state
        .store
        .transcript_upsert(&student_id, &entry)
        .map_err(|e| store_err(&req.id, e))?;
    log::info!(
        "finalized {} {} for student {}: {}",
        entry.course_code,
        entry.semester,
        student_id,
        entry.final_grade
    );
    Ok(ok(&req.id, json!({ "grade": report.grade, "entry": entry })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let resp = match req.method.as_str() {
        "grades.course" => handle_grades_course(state, req),
        "grades.finalize" => handle_grades_finalize(state, req),
        _ => return None,
    };
    Some(resp.unwrap_or_else(|e| e))
}
