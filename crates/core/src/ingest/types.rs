use crate::domain::pagination::PageMeta;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    Items { records: Vec<Value>, meta: PageMeta },
    Predictions { records: Vec<Value>, meta: PageMeta },
    Bare(Vec<Value>),
    Unrecognized { meta: PageMeta },
}

impl ResponsePayload {
    pub fn decode(payload: Value) -> Self {
        match payload {
            Value::Array(records) => ResponsePayload::Bare(records),
            Value::Object(mut obj) => {
                let meta = PageMeta {
                    pages: obj.get("pages").and_then(as_u64).and_then(|p| u32::try_from(p).ok()),
                    total: obj.get("total").and_then(as_u64),
                };

                // First present envelope key wins, even when it does not hold a list.
                if let Some(items) = obj.remove("items").filter(|v| !v.is_null()) {
                    return match items {
                        Value::Array(records) => ResponsePayload::Items { records, meta },
                        _ => ResponsePayload::Unrecognized { meta },
                    };
                }
                if let Some(predictions) = obj.remove("predictions").filter(|v| !v.is_null()) {
                    return match predictions {
                        Value::Array(records) => ResponsePayload::Predictions { records, meta },
                        _ => ResponsePayload::Unrecognized { meta },
                    };
                }
                ResponsePayload::Unrecognized { meta }
            }
            _ => ResponsePayload::Unrecognized {
                meta: PageMeta::default(),
            },
        }
    }

    pub fn meta(&self) -> PageMeta {
        match self {
            ResponsePayload::Items { meta, .. }
            | ResponsePayload::Predictions { meta, .. }
            | ResponsePayload::Unrecognized { meta } => *meta,
            ResponsePayload::Bare(_) => PageMeta::default(),
        }
    }

    pub fn into_records(self) -> Vec<Value> {
        match self {
            ResponsePayload::Items { records, .. }
            | ResponsePayload::Predictions { records, .. }
            | ResponsePayload::Bare(records) => records,
            ResponsePayload::Unrecognized { .. } => Vec::new(),
        }
    }
}

fn as_u64(v: &Value) -> Option<u64> {
    v.as_u64().or_else(|| {
        v.as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f as u64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_items_envelope_with_meta() {
        let payload = ResponsePayload::decode(json!({
            "items": [{"id": "a"}, {"id": "b"}],
            "pages": 3,
            "total": 250,
        }));
        assert_eq!(
            payload.meta(),
            PageMeta {
                pages: Some(3),
                total: Some(250)
            }
        );
        assert_eq!(payload.into_records().len(), 2);
    }

    #[test]
    fn falls_back_to_predictions_then_bare_array() {
        let payload = ResponsePayload::decode(json!({"predictions": [{"id": "a"}]}));
        assert!(matches!(payload, ResponsePayload::Predictions { .. }));
        assert_eq!(payload.into_records().len(), 1);

        let bare = ResponsePayload::decode(json!([{"id": "a"}, {"id": "b"}, {"id": "c"}]));
        assert_eq!(bare.meta(), PageMeta::default());
        assert_eq!(bare.into_records().len(), 3);
    }

    #[test]
    fn non_list_payloads_yield_no_records() {
        assert!(ResponsePayload::decode(json!({"items": {"id": "a"}}))
            .into_records()
            .is_empty());
        assert!(ResponsePayload::decode(json!({"message": "ok"}))
            .into_records()
            .is_empty());
        assert!(ResponsePayload::decode(json!("oops")).into_records().is_empty());
        assert!(ResponsePayload::decode(Value::Null).into_records().is_empty());
    }

    #[test]
    fn null_items_key_falls_through_to_predictions() {
        let payload = ResponsePayload::decode(json!({"items": null, "predictions": [{"id": "a"}]}));
        assert_eq!(payload.into_records().len(), 1);
    }
}
