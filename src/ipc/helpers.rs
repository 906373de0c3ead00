use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use crate::ipc::error::err;
use crate::ipc::types::Request;

pub type HandlerResult = Result<serde_json::Value, serde_json::Value>;

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    let s = req
        .params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))?;
    if s.is_empty() {
        return Err(err(
            &req.id,
            "bad_params",
            format!("{} must not be empty", key),
            None,
        ));
    }
    Ok(s)
}

pub fn optional_str(req: &Request, key: &str) -> Result<Option<String>, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.trim().to_string()))
            .ok_or_else(|| {
                err(
                    &req.id,
                    "bad_params",
                    format!("{} must be string or null", key),
                    None,
                )
            }),
    }
}

/// Deserializes `params[key]`, or the whole params object when `key` is None.
pub fn params_as<T: DeserializeOwned>(
    req: &Request,
    key: Option<&str>,
) -> Result<T, serde_json::Value> {
    let raw = match key {
        Some(k) => req
            .params
            .get(k)
            .cloned()
            .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", k), None))?,
        None => req.params.clone(),
    };
    serde_json::from_value(raw).map_err(|e| {
        let what = key.unwrap_or("params");
        err(&req.id, "bad_params", format!("invalid {}: {}", what, e), None)
    })
}

/// `params.at` (RFC 3339) when given, otherwise the current time.
pub fn instant_param(req: &Request) -> Result<DateTime<Utc>, serde_json::Value> {
    let Some(raw) = optional_str(req, "at")? else {
        return Ok(Utc::now());
    };
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            err(
                &req.id,
                "bad_params",
                format!("at must be an RFC 3339 timestamp: {}", e),
                None,
            )
        })
}
