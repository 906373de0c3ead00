use serde_json::json;

use crate::error::GradeError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub fn grade_err(id: &str, e: GradeError) -> serde_json::Value {
    let details = match &e {
        GradeError::InvalidWeights { course_id, total } => {
            Some(json!({ "courseId": course_id, "totalWeight": total }))
        }
        GradeError::AttemptAlreadyFinalized { attempt_id, status } => {
            Some(json!({ "attemptId": attempt_id, "status": status }))
        }
        _ => None,
    };
    if let GradeError::Store(inner) = &e {
        log::error!("store failure: {:?}", inner);
    }
    err(id, e.code(), e.to_string(), details)
}

pub fn store_err(id: &str, e: anyhow::Error) -> serde_json::Value {
    grade_err(id, GradeError::Store(e))
}
