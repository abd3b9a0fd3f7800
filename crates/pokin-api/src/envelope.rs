//! Response envelope handling.
//!
//! Every backend response is `{ status, success, message, data, timestamp }`.
//! The HTTP status and the `success` flag are both checked; either one
//! failing makes the call a business failure.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::model::{LevelCount, PerformanceNode, ThemeSummary};
use crate::request::ResponseKind;

/// Decoded `data` of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiPayload {
    Themes(Vec<ThemeSummary>),
    Tree(PerformanceNode),
    Forest(Vec<PerformanceNode>),
    Counts(Vec<LevelCount>),
    Done,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: Option<u16>,
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ThemeList {
    Plain(Vec<ThemeSummary>),
    Wrapped { tematiks: Vec<ThemeSummary> },
}

#[derive(Deserialize)]
struct OpdForest {
    #[serde(default)]
    roots: Vec<PerformanceNode>,
}

#[derive(Deserialize)]
struct CountSummary {
    #[serde(default)]
    details: Vec<LevelCount>,
}

/// Turn a raw HTTP status and body into a payload or an [`ApiError`].
pub fn decode_response(kind: ResponseKind, status: u16, body: &str) -> Result<ApiPayload, ApiError> {
    let envelope = serde_json::from_str::<Envelope>(body);

    if !(200..300).contains(&status) {
        let message = envelope
            .ok()
            .and_then(|e| e.message)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| reason(status));
        return Err(ApiError::Business { status, message });
    }

    let envelope = envelope.map_err(|e| ApiError::Decode(format!("not an API envelope: {e}")))?;

    if !envelope.success {
        let status = envelope.status.unwrap_or(status);
        let message = envelope
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "Request failed".to_string());
        return Err(ApiError::Business { status, message });
    }

    let data = envelope.data.unwrap_or(serde_json::Value::Null);
    match kind {
        ResponseKind::Themes => {
            if data.is_null() {
                return Ok(ApiPayload::Themes(Vec::new()));
            }
            let themes = match decode::<ThemeList>(data)? {
                ThemeList::Plain(themes) => themes,
                ThemeList::Wrapped { tematiks } => tematiks,
            };
            Ok(ApiPayload::Themes(themes))
        }
        ResponseKind::Tree => Ok(ApiPayload::Tree(decode(data)?)),
        ResponseKind::Forest => Ok(ApiPayload::Forest(decode::<OpdForest>(data)?.roots)),
        ResponseKind::Counts => Ok(ApiPayload::Counts(decode::<CountSummary>(data)?.details)),
        ResponseKind::Empty => Ok(ApiPayload::Done),
    }
}

fn decode<T: DeserializeOwned>(data: serde_json::Value) -> Result<T, ApiError> {
    serde_json::from_value(data).map_err(|e| ApiError::Decode(e.to_string()))
}

fn reason(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {status}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(data: serde_json::Value) -> String {
        json!({
            "status": 200,
            "success": true,
            "message": "OK",
            "data": data,
            "timestamp": "2025-01-01T00:00:00"
        })
        .to_string()
    }

    #[test]
    fn test_themes_plain_and_wrapped() {
        let theme = json!({"id": 1, "namaPohon": "Pendidikan", "tahun": 2025});

        let plain = decode_response(ResponseKind::Themes, 200, &ok(json!([theme.clone()]))).unwrap();
        let wrapped = decode_response(
            ResponseKind::Themes,
            200,
            &ok(json!({"tahun": 2025, "tematiks": [theme]})),
        )
        .unwrap();
        assert_eq!(plain, wrapped);

        match plain {
            ApiPayload::Themes(themes) => assert_eq!(themes[0].title(), "Pendidikan"),
            other => panic!("unexpected payload {other:?}"),
        }

        let empty = decode_response(ResponseKind::Themes, 200, &ok(json!([]))).unwrap();
        assert_eq!(empty, ApiPayload::Themes(Vec::new()));
    }

    #[test]
    fn test_forest_and_counts() {
        let forest = decode_response(
            ResponseKind::Forest,
            200,
            &ok(json!({"roots": [{
                "id": 10, "namaPohon": "Strategi", "tahun": 2025,
                "jenisPohon": "STRATEGIC_PEMDA", "levelPohon": 4, "kodeOpd": "1.02"
            }]})),
        )
        .unwrap();
        match forest {
            ApiPayload::Forest(roots) => {
                assert_eq!(roots.len(), 1);
                assert_eq!(roots[0].org_unit_code.as_deref(), Some("1.02"));
            }
            other => panic!("unexpected payload {other:?}"),
        }

        let counts = decode_response(
            ResponseKind::Counts,
            200,
            &ok(json!({"details": [
                {"levelPohon": 4, "jenisPohon": "STRATEGIC_PEMDA", "pending": 2, "approved": 5}
            ]})),
        )
        .unwrap();
        assert_eq!(
            counts,
            ApiPayload::Counts(vec![LevelCount {
                level: 4,
                node_type: "STRATEGIC_PEMDA".to_string(),
                pending: 2,
                approved: 5,
            }])
        );
    }

    #[test]
    fn test_success_false_is_business_error() {
        let body = json!({"status": 400, "success": false, "message": "Nama wajib diisi"}).to_string();
        let err = decode_response(ResponseKind::Empty, 200, &body).unwrap_err();
        assert_eq!(
            err,
            ApiError::Business {
                status: 400,
                message: "Nama wajib diisi".to_string()
            }
        );
    }

    #[test]
    fn test_error_status_uses_envelope_message_or_reason() {
        let body = json!({"status": 404, "success": false, "message": "Tidak ditemukan"}).to_string();
        let err = decode_response(ResponseKind::Tree, 404, &body).unwrap_err();
        assert_eq!(err.to_string(), "Tidak ditemukan (status 404)");

        let err = decode_response(ResponseKind::Tree, 502, "<html>Bad Gateway</html>").unwrap_err();
        assert_eq!(
            err,
            ApiError::Business {
                status: 502,
                message: "Bad Gateway".to_string()
            }
        );
    }

    #[test]
    fn test_non_envelope_success_is_decode_error() {
        let err = decode_response(ResponseKind::Tree, 200, "[1, 2, 3]").unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));

        let err = decode_response(ResponseKind::Tree, 200, &ok(json!({"id": "x"}))).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn test_mutation_ignores_data() {
        let done = decode_response(ResponseKind::Empty, 201, &ok(json!({"id": 99}))).unwrap();
        assert_eq!(done, ApiPayload::Done);
    }
}
