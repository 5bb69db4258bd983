//! Decoding the batch request body and encoding the batch response body.

use crate::error::BatchError;
use crate::types::{RequestSpec, ResponseSpec};

/// Decode a batch body into its sub-requests, in document order.
///
/// Surrounding whitespace is ignored. Anything other than a JSON array of
/// well-formed sub-requests fails the whole batch; there is no partial parse.
pub fn parse_request_list(body: &str) -> Result<Vec<RequestSpec>, BatchError> {
    serde_json::from_str(body.trim()).map_err(|e| BatchError::Parse(e.to_string()))
}

/// Same as [`parse_request_list`] for a raw body that must first be UTF-8.
pub fn parse_request_bytes(body: &[u8]) -> Result<Vec<RequestSpec>, BatchError> {
    let text = std::str::from_utf8(body)
        .map_err(|e| BatchError::Parse(format!("body is not valid UTF-8: {e}")))?;
    parse_request_list(text)
}

pub fn encode_response_list(responses: &[ResponseSpec]) -> Result<String, BatchError> {
    serde_json::to_string(responses).map_err(|e| BatchError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::HeaderSet;
    use crate::types::ResponseBody;

    #[test]
    fn parses_in_document_order() {
        let specs = parse_request_list(
            r#"[
                {"method":"GET","relativeUrl":"/a","additionalHeaders":[]},
                {"method":"POST","relativeUrl":"/b","additionalHeaders":[],"body":{"x":1}},
                {"method":"DELETE","relativeUrl":"/c"}
            ]"#,
        )
        .unwrap();
        let urls: Vec<_> = specs.iter().map(|s| s.relative_url.as_str()).collect();
        assert_eq!(urls, vec!["/a", "/b", "/c"]);
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let specs = parse_request_list("\n\t  []  \r\n").unwrap();
        assert!(specs.is_empty());
    }

    #[test]
    fn rejects_non_json() {
        let err = parse_request_list("not json").unwrap_err();
        assert!(matches!(err, BatchError::Parse(_)));
    }

    #[test]
    fn rejects_top_level_object() {
        let err = parse_request_list(r#"{"method":"GET","relativeUrl":"/ping"}"#).unwrap_err();
        assert!(matches!(err, BatchError::Parse(_)));
    }

    #[test]
    fn one_bad_element_fails_the_whole_list() {
        let err = parse_request_list(
            r#"[{"method":"GET","relativeUrl":"/ok"},{"method":"GET"}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, BatchError::Parse(_)));
    }

    #[test]
    fn rejects_invalid_utf8() {
        let err = parse_request_bytes(&[b'[', 0xff, b']']).unwrap_err();
        match err {
            BatchError::Parse(msg) => assert!(msg.contains("UTF-8")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn encodes_empty_list() {
        assert_eq!(encode_response_list(&[]).unwrap(), "[]");
    }

    #[test]
    fn encoding_is_deterministic() {
        let responses = vec![ResponseSpec {
            status_code: 200,
            headers: HeaderSet::new(),
            body: ResponseBody::Json(serde_json::json!({"b": 2, "a": 1})),
        }];
        assert_eq!(
            encode_response_list(&responses).unwrap(),
            encode_response_list(&responses).unwrap()
        );
    }
}
