//! # Cursor Utilities
//!
//! Opaque keyset cursors for the job and execution listings. A cursor holds
//! the `(created_at, id)` of the last row on the previous page.

use crate::error::ApiError;
use axum::http::StatusCode;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Position after which the next page starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorData {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

/// Encode cursor data as an opaque base64 string
pub fn encode_cursor(created_at: &DateTime<Utc>, id: &Uuid) -> String {
    let json = serde_json::json!({
        "created_at": created_at,
        "id": id,
    });
    base64::engine::general_purpose::STANDARD.encode(json.to_string().as_bytes())
}

fn invalid(message: &str) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message)
}

/// Decode cursor data from an opaque base64 string with validation
pub fn decode_cursor(cursor: &str) -> Result<CursorData, ApiError> {
    // Check cursor length to prevent extremely large inputs
    if cursor.len() > 1000 {
        return Err(invalid("cursor is too long"));
    }

    if cursor.is_empty() {
        return Err(invalid("cursor cannot be empty"));
    }

    if !cursor
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=')
    {
        return Err(invalid("cursor contains invalid characters"));
    }

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(cursor)
        .map_err(|_| invalid("cursor is not valid base64"))?;

    if decoded.len() > 500 {
        return Err(invalid("decoded cursor is too large"));
    }

    let json =
        String::from_utf8(decoded).map_err(|_| invalid("cursor contains invalid UTF-8 data"))?;

    let cursor_data: CursorData =
        serde_json::from_str(&json).map_err(|_| invalid("cursor contains invalid JSON structure"))?;

    // Rows are never created in the future, so such a cursor was forged
    if cursor_data.created_at > Utc::now() + chrono::Duration::days(1) {
        return Err(invalid("cursor timestamp is too far in the future"));
    }

    if cursor_data.id.is_nil() {
        return Err(invalid("cursor contains invalid ID"));
    }

    Ok(cursor_data)
}
