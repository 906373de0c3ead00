use crate::error::GradeError;
use crate::ipc::error::{grade_err, ok, store_err};
use crate::ipc::helpers::{instant_param, optional_str, params_as, required_str, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::quiz::{Answers, Quiz, QuizAttempt};
use serde_json::json;

fn load_attempt(state: &AppState, req: &Request) -> Result<QuizAttempt, serde_json::Value> {
    let attempt_id = required_str(req, "attemptId")?;
    state
        .store
        .attempt_get(&attempt_id)
        .map_err(|e| store_err(&req.id, e))?
        .ok_or_else(|| grade_err(&req.id, GradeError::not_found("attempt", attempt_id)))
}

fn load_quiz(state: &AppState, req: &Request, quiz_id: &str) -> Result<Quiz, serde_json::Value> {
    state
        .store
        .quiz_get(quiz_id)
        .map_err(|e| store_err(&req.id, e))?
        .ok_or_else(|| grade_err(&req.id, GradeError::not_found("quiz", quiz_id)))
}

fn answers_param(req: &Request) -> Result<Answers, serde_json::Value> {
    match req.params.get("answers") {
        None => Ok(Answers::new()),
        Some(v) if v.is_null() => Ok(Answers::new()),
        Some(_) => params_as(req, Some("answers")),
    }
}

/// Writes an in-progress transition. Losing the race to another writer is
/// reported the same as writing to a finalized attempt.
fn persist_open(state: &AppState, req: &Request, attempt: &QuizAttempt) -> HandlerResult {
    let written = state
        .store
        .attempt_update_open(attempt)
        .map_err(|e| store_err(&req.id, e))?;
    if !written {
        return Err(grade_err(
            &req.id,
            GradeError::AttemptAlreadyFinalized {
                attempt_id: attempt.id.clone(),
                status: "finalized".into(),
            },
        ));
    }
    Ok(ok(&req.id, json!({ "attempt": attempt })))
}

fn handle_attempts_start(state: &mut AppState, req: &Request) -> HandlerResult {
    let quiz_id = required_str(req, "quizId")?;
    let student_id = required_str(req, "studentId")?;
    let at = instant_param(req)?;
    let quiz = load_quiz(state, req, &quiz_id)?;

    let number = state
        .store
        .next_attempt_number(&quiz.id, &student_id)
        .map_err(|e| store_err(&req.id, e))?;
    let attempt = QuizAttempt::start(&quiz, &student_id, number, at);
    state
        .store
        .attempt_insert(&attempt)
        .map_err(|e| store_err(&req.id, e))?;
    log::info!(
        "attempt {} started: quiz {} student {} #{}",
        attempt.id,
        quiz.id,
        student_id,
        number
    );
    Ok(ok(
        &req.id,
        json!({
            "attempt": attempt,
            "deadline": quiz.deadline(attempt.started_at),
        }),
    ))
}

fn handle_attempts_save_answers(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut attempt = load_attempt(state, req)?;
    let answers = answers_param(req)?;
    attempt
        .save_answers(answers)
        .map_err(|e| grade_err(&req.id, e))?;
    persist_open(state, req, &attempt)
}

fn handle_attempts_submit(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut attempt = load_attempt(state, req)?;
    let answers = answers_param(req)?;
    let at = instant_param(req)?;
    let quiz = load_quiz(state, req, &attempt.quiz_id)?;
    attempt
        .submit(&quiz, answers, at)
        .map_err(|e| grade_err(&req.id, e))?;
    persist_open(state, req, &attempt)
}

fn handle_attempts_time_out(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut attempt = load_attempt(state, req)?;
    let quiz = load_quiz(state, req, &attempt.quiz_id)?;
    attempt
        .time_out(&quiz)
        .map_err(|e| grade_err(&req.id, e))?;
    persist_open(state, req, &attempt)
}

fn handle_attempts_get(state: &mut AppState, req: &Request) -> HandlerResult {
    let attempt = load_attempt(state, req)?;
    Ok(ok(&req.id, json!({ "attempt": attempt })))
}

fn handle_attempts_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let student_id = optional_str(req, "studentId")?;
    let quiz_id = optional_str(req, "quizId")?;
    let attempts = state
        .store
        .attempt_list(student_id.as_deref(), quiz_id.as_deref())
        .map_err(|e| store_err(&req.id, e))?;
    Ok(ok(&req.id, json!({ "attempts": attempts })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let resp = match req.method.as_str() {
        "attempts.start" => handle_attempts_start(state, req),
        "attempts.saveAnswers" => handle_attempts_save_answers(state, req),
        "attempts.submit" => handle_attempts_submit(state, req),
        "attempts.timeOut" => handle_attempts_time_out(state, req),
        "attempts.get" => handle_attempts_get(state, req),
        "attempts.list" => handle_attempts_list(state, req),
        _ => return None,
    };
    Some(resp.unwrap_or_else(|e| e))
}
