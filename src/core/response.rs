//! Envelope JSON uniforme delle risposte HTTP: `{ code, msg, data }`
//! con `code = 0` in caso di successo.

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: 0,
            msg: "success".to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn ok_empty() -> Self {
        Self {
            code: 0,
            msg: "success".to_string(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_shape() {
        let body = serde_json::to_value(ApiResponse::ok(serde_json::json!({"x": 1}))).unwrap();
        assert_eq!(body["code"], 0);
        assert_eq!(body["msg"], "success");
        assert_eq!(body["data"]["x"], 1);
    }

    #[test]
    fn test_empty_envelope_omits_data() {
        let body = serde_json::to_value(ApiResponse::ok_empty()).unwrap();
        assert_eq!(body["code"], 0);
        assert!(body.get("data").is_none());
    }
}
