use axum::body::Bytes;
use axum::extract::Multipart;
use axum::http::StatusCode;
use axum::response::Json;
use serde_json::Value;

use crate::error::{LensError, Result};
use crate::report::assemble::{analyze_block_files, analyze_transaction};
use crate::report::types::{BlockFileReport, TxRequest};

use super::types::{BlockUpload, HealthResponse};

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

pub async fn analyze(body: Bytes) -> (StatusCode, Json<Value>) {
    respond(parse_and_analyze(&body))
}

fn parse_and_analyze(body: &[u8]) -> Result<Value> {
    // Distinguish malformed JSON from a well-formed envelope with bad or
    // missing fields.
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| LensError::InvalidJson(format!("request body is not valid JSON: {e}")))?;
    let request: TxRequest = serde_json::from_value(value)
        .map_err(|e| LensError::InvalidFixture(format!("bad analyze request: {e}")))?;
    let report = analyze_transaction(&request)?;
    to_json(&report)
}

pub async fn analyze_block(multipart: Multipart) -> (StatusCode, Json<Value>) {
    respond(parse_and_analyze_block(multipart).await)
}

async fn parse_and_analyze_block(mut multipart: Multipart) -> Result<Value> {
    let mut upload = BlockUpload::default();
    let mut seen_blk = false;
    let mut seen_rev = false;

    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| LensError::InvalidFixture(format!("bad multipart body: {e}")))?;
        let Some(field) = field else { break };
        let name = field.name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| LensError::InvalidFixture(format!("bad multipart field {name}: {e}")))?;
        match name.as_str() {
            "blk" => {
                upload.blk = data.to_vec();
                seen_blk = true;
            }
            "rev" => {
                upload.rev = data.to_vec();
                seen_rev = true;
            }
            "xor" => upload.xor = data.to_vec(),
            _ => {}
        }
    }

    if !seen_blk || !seen_rev {
        return Err(LensError::InvalidFixture(
            "block analysis needs 'blk' and 'rev' fields".to_string(),
        ));
    }

    let blocks = analyze_block_files(&upload.blk, &upload.rev, &upload.xor, false)?;
    to_json(&BlockFileReport {
        ok: true,
        mode: "block",
        blocks,
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| LensError::Internal(format!("serialization: {e}")))
}

fn respond(result: Result<Value>) -> (StatusCode, Json<Value>) {
    match result {
        Ok(value) => (StatusCode::OK, Json(value)),
        Err(err) => {
            let status = match err {
                LensError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            };
            let envelope = serde_json::to_value(err.to_envelope())
                .unwrap_or_else(|_| serde_json::json!({ "ok": false }));
            (status, Json(envelope))
        }
    }
}
