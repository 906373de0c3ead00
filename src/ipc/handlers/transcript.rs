use crate::ipc::error::{err, grade_err, ok, store_err};
use crate::ipc::helpers::{params_as, required_str, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::transcript::{compute_student_gpa, TranscriptEntry, MAX_CREDITS};
use serde_json::json;

fn entry_json(e: &TranscriptEntry) -> serde_json::Value {
    let mut v = json!(e);
    v["gradePoints"] = json!(e.grade_points());
    v
}

fn handle_transcript_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let student_id = required_str(req, "studentId")?;
    let entries = state
        .store
        .transcript_list(&student_id)
        .map_err(|e| store_err(&req.id, e))?;
    let rows: Vec<serde_json::Value> = entries.iter().map(entry_json).collect();
    Ok(ok(&req.id, json!({ "studentId": student_id, "entries": rows })))
}

fn handle_transcript_upsert(state: &mut AppState, req: &Request) -> HandlerResult {
    let student_id = required_str(req, "studentId")?;
    let mut entry: TranscriptEntry = params_as(req, None)?;
    entry.course_code = entry.course_code.trim().to_string();
    entry.semester = entry.semester.trim().to_string();
    if entry.course_code.is_empty() || entry.semester.is_empty() {
        return Err(err(
            &req.id,
            "bad_params",
            "courseCode and semester must not be empty",
            None,
        ));
    }
    if entry.credits > MAX_CREDITS {
        return Err(err(
            &req.id,
            "bad_params",
            format!("credits must be at most {}", MAX_CREDITS),
            Some(json!({ "credits": entry.credits })),
        ));
    }
    state
        .store
        .transcript_upsert(&student_id, &entry)
        .map_err(|e| store_err(&req.id, e))?;
    Ok(ok(&req.id, json!({ "entry": entry_json(&entry) })))
}

fn handle_transcript_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let student_id = required_str(req, "studentId")?;
    let course_code = required_str(req, "courseCode")?;
    let semester = required_str(req, "semester")?;
    let deleted = state
        .store
        .transcript_delete(&student_id, &course_code, &semester)
        .map_err(|e| store_err(&req.id, e))?;
    if !deleted {
        return Err(err(&req.id, "not_found", "transcript entry not found", None));
    }
    Ok(ok(&req.id, json!({ "deleted": true })))
}

fn handle_transcript_gpa(state: &mut AppState, req: &Request) -> HandlerResult {
    let student_id = required_str(req, "studentId")?;
    let outcome =
        compute_student_gpa(&state.store, &student_id).map_err(|e| grade_err(&req.id, e))?;
    log::debug!("gpa for student {}: {:?}", student_id, outcome.gpa());
    let mut v = json!(outcome);
    v["studentId"] = json!(student_id);
    Ok(ok(&req.id, v))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let resp = match req.method.as_str() {
        "transcript.list" => handle_transcript_list(state, req),
        "transcript.upsert" => handle_transcript_upsert(state, req),
        "transcript.delete" => handle_transcript_delete(state, req),
        "transcript.gpa" => handle_transcript_gpa(state, req),
        _ => return None,
    };
    Some(resp.unwrap_or_else(|e| e))
}
