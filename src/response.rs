use serde::Serialize;
use utoipa::ToSchema;

/// Pagination block; every field is `None` on single-resource responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct Meta {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub total: Option<i64>,
}

impl Meta {
    pub fn new(page: i64, per_page: i64, total: i64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
            total: Some(total),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Envelope shared by success and error bodies: `{ message, data, meta }`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: Option<T>,
    pub meta: Option<Meta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T, meta: Option<Meta>) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta,
        }
    }

    /// Single resource with an empty pagination block.
    pub fn ok(data: T) -> Self {
        Self::success("OK", data, Some(Meta::empty()))
    }

    /// Failure body; `detail` carries the error string and any conflicts.
    pub fn failure(message: impl Into<String>, detail: T) -> Self {
        Self {
            message: message.into(),
            data: Some(detail),
            meta: Some(Meta::empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_wraps_data_with_empty_meta() {
        let body = serde_json::to_value(ApiResponse::ok(json!({ "id": 1 }))).unwrap();
        assert_eq!(body["message"], "OK");
        assert_eq!(body["data"]["id"], 1);
        assert_eq!(body["meta"], json!({ "page": null, "per_page": null, "total": null }));
    }

    #[test]
    fn failure_keeps_envelope_shape() {
        let body =
            serde_json::to_value(ApiResponse::failure("Forbidden", json!({ "error": "Forbidden" })))
                .unwrap();
        assert_eq!(body["message"], "Forbidden");
        assert_eq!(body["data"]["error"], "Forbidden");
        assert_eq!(Meta::empty(), Meta::default());
    }
}
