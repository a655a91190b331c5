//! The Request Body Parser (C3, §4.3): turns a raw request body into a `serde_json::Value`
//! when the content type and route configuration agree it should, leaving `parsedBody` as
//! `None` otherwise so the resolver knows to merge query params only.
//!
//! Grounded on the teacher's `handler/body.rs` for the idea of a content-type-gated decode
//! step; the actual urlencoded-vs-json dispatch follows the `Content-Type` sniffing pattern
//! used in `mendes`'s `application.rs` (`serde_urlencoded::from_bytes` gated on the header).

use crate::config::BodyParsersConfig;
use crate::error::GatewayError;
use serde_json::Value;

/// Decodes `body` according to its `content_type` header value and the route's parser
/// configuration. Returns `Ok(None)` when no parser applies (empty body, unrecognised or
/// disabled content type) and `Err` only when a parser was selected but decoding failed.
pub fn parse_body(
    content_type: Option<&str>,
    body: &[u8],
    config: &BodyParsersConfig,
) -> Result<Option<Value>, GatewayError> {
    if body.is_empty() {
        return Ok(None);
    }

    let mime = content_type
        .and_then(|raw| raw.split(';').next())
        .map(str::trim)
        .unwrap_or("");

    match mime {
        "application/json" if config.json_enabled() => serde_json::from_slice(body)
            .map(Some)
            .map_err(|err| GatewayError::invalid_request_body(body, err)),
        "application/x-www-form-urlencoded" if config.urlencoded_enabled() => {
            let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
                .map_err(|err| GatewayError::invalid_request_body(body, err))?;
            let mut map = serde_json::Map::new();
            for (key, value) in pairs {
                map.insert(key, Value::String(value));
            }
            Ok(Some(Value::Object(map)))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserSwitch;

    fn enabled(json: bool, urlencoded: bool) -> BodyParsersConfig {
        BodyParsersConfig::Enabled {
            json: if json { ParserSwitch::On } else { ParserSwitch::Off },
            urlencoded: if urlencoded {
                ParserSwitch::On
            } else {
                ParserSwitch::Off
            },
        }
    }

    #[test]
    fn empty_body_parses_to_none_regardless_of_content_type() {
        let result = parse_body(Some("application/json"), b"", &BodyParsersConfig::Default);
        assert_eq!(result.unwrap(), None);
    }

    #[test]
    fn well_formed_json_decodes_when_enabled() {
        let result = parse_body(
            Some("application/json"),
            br#"{"a":1}"#,
            &BodyParsersConfig::Default,
        )
        .unwrap();
        assert_eq!(result, Some(serde_json::json!({"a": 1})));
    }

    #[test]
    fn json_content_type_with_charset_suffix_still_matches() {
        let result = parse_body(
            Some("application/json; charset=utf-8"),
            br#"{"a":1}"#,
            &BodyParsersConfig::Default,
        )
        .unwrap();
        assert_eq!(result, Some(serde_json::json!({"a": 1})));
    }

    #[test]
    fn malformed_json_is_a_gateway_error() {
        let err = parse_body(Some("application/json"), b"{not json", &BodyParsersConfig::Default)
            .unwrap_err();
        assert_eq!(err.code, 400);
        assert_eq!(err.name, "InvalidRequestBodyError");
    }

    #[test]
    fn json_is_ignored_when_disabled() {
        let result = parse_body(Some("application/json"), br#"{"a":1}"#, &BodyParsersConfig::Disabled)
            .unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn urlencoded_decodes_into_a_flat_object_when_enabled() {
        let result = parse_body(
            Some("application/x-www-form-urlencoded"),
            b"a=1&b=two",
            &enabled(false, true),
        )
        .unwrap();
        assert_eq!(result, Some(serde_json::json!({"a": "1", "b": "two"})));
    }

    #[test]
    fn urlencoded_is_ignored_by_default() {
        let result = parse_body(
            Some("application/x-www-form-urlencoded"),
            b"a=1",
            &BodyParsersConfig::Default,
        )
        .unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn unrecognised_content_type_is_skipped() {
        let result = parse_body(Some("text/plain"), b"hello", &enabled(true, true)).unwrap();
        assert_eq!(result, None);
    }
}
