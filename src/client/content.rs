//! Classification and decoding of response bodies.
//!
//! Providers are inconsistent about what they send back. Some label their bodies correctly, some
//! answer a json document with `text/plain`, and OAuth 1.0a token endpoints commonly use form
//! encoding. The content type is therefore taken from the headers when they are conclusive and
//! guessed from the body otherwise. A body that fits no known format is returned as text, never as
//! an error.
use serde_json::Value;

use crate::error::{Error, Result};
use crate::primitives::codec::{parse_query_string, Params};
use crate::primitives::token::Token;
use crate::transport::HttpResponse;

/// Serialization of a response body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentType {
    /// `application/json`
    Json,
    /// `application/x-www-form-urlencoded`
    UrlEncoded,
    /// `application/xml` or `text/xml`
    Xml,
    /// Not determined.
    Auto,
}

/// Classify by the `Content-Type` header.
///
/// Header names are compared case insensitively and `content_type` is accepted as an alias. The
/// value is matched by substring, so parameters such as a charset do not matter. Anything
/// unrecognized, including a missing header, yields `Auto`.
pub fn determine_content_type_by_headers(headers: &[(String, String)]) -> ContentType {
    let value = headers.iter().find_map(|(name, value)| {
        if name.eq_ignore_ascii_case("content-type") || name.eq_ignore_ascii_case("content_type") {
            Some(value.to_ascii_lowercase())
        } else {
            None
        }
    });

    match value {
        Some(ref value) if value.contains("json") => ContentType::Json,
        Some(ref value) if value.contains("urlencoded") => ContentType::UrlEncoded,
        Some(ref value) if value.contains("xml") => ContentType::Xml,
        _ => ContentType::Auto,
    }
}

/// Guess the classification from the body itself.
///
/// Json and xml markers are checked before the form encoding heuristic, so that `key=value`
/// fragments inside a document do not count. A body is considered form encoded when every
/// `&`-separated segment is a `key=value` pair with a non-empty key and value and no further `=`.
pub fn determine_content_type_by_raw(raw: &str) -> ContentType {
    let raw = raw.trim();
    if raw.is_empty() {
        return ContentType::Auto;
    }

    if (raw.starts_with('{') && raw.ends_with('}')) || (raw.starts_with('[') && raw.ends_with(']')) {
        ContentType::Json
    } else if raw.starts_with('<') && raw.ends_with('>') {
        ContentType::Xml
    } else if raw.split('&').all(is_form_pair) {
        ContentType::UrlEncoded
    } else {
        ContentType::Auto
    }
}

fn is_form_pair(pair: &str) -> bool {
    let mut parts = pair.splitn(2, '=');
    match (parts.next(), parts.next()) {
        (Some(key), Some(value)) => {
!key.is_empty() && !value.is_empty() && !value.contains('=')
        }
        _ => false,
    }
}

/// A response body decoded according to its content type.
#[derive(Clone, Debug, PartialEq)]
pub enum Decoded {
    /// A json document.
    Json(Value),
    /// Form encoded parameters.
    UrlEncoded(Params),
    /// Xml, returned as text for the caller to parse.
    Xml(String),
    /// The body of unknown format, or one that failed to parse as its declared format.
    Raw(String),
}

impl Decoded {
    /// Decode with the given content type.
    pub fn decode(content_type: ContentType, body: &str) -> Self {
        let content_type = match content_type {
            ContentType::Auto => determine_content_type_by_raw(body),
            known => known,
        };

        match content_type {
            ContentType::Json => match serde_json::from_str(body) {
                Ok(value) => Decoded::Json(value),
                Err(_) => Decoded::Raw(body.to_string()),
            },
            ContentType::UrlEncoded => Decoded::UrlEncoded(parse_query_string(body.trim())),
            ContentType::Xml => Decoded::Xml(body.to_string()),
            ContentType::Auto => Decoded::Raw(body.to_string()),
        }
    }

    /// Decode a response, classifying by headers first and by the body second.
    pub fn from_response(response: &HttpResponse) -> Self {
        Decoded::decode(
            determine_content_type_by_headers(&response.headers),
            &response.text(),
        )
    }

    /// Look up a top level scalar field of a json object or a form parameter.
    pub fn field(&self, key: &str) -> Option<String> {
        match self {
            Decoded::Json(Value::Object(object)) => match object.get(key)? {
                Value::String(string) => Some(string.clone()),
                Value::Number(number) => Some(number.to_string()),
                Value::Bool(flag) => Some(flag.to_string()),
                _ => None,
            },
            Decoded::UrlEncoded(params) => params.get(key).map(str::to_string),
            _ => None,
        }
    }

    /// The json document, if this is one.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Decoded::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The form parameters, if this is form encoded.
    pub fn as_params(&self) -> Option<&Params> {
        match self {
            Decoded::UrlEncoded(params) => Some(params),
            _ => None,
        }
    }

    /// Interpret the body as issued credentials.
    pub fn into_token(self) -> Result<Token> {
        match self {
            Decoded::Json(value) => Token::from_json(&value),
            Decoded::UrlEncoded(params) => Token::from_params(params),
            Decoded::Xml(_) => Err(Error::Response("xml token responses are not supported".into())),
            Decoded::Raw(raw) => Err(Error::Response(format!("unrecognized token response `{}`", raw))),
        }
    }

    /// The provider error carried by the body, as described in RFC 6749 section 5.2.
    pub fn provider_error(&self) -> Option<Error> {
        let error = self.field("error")?;
        Some(Error::Provider {
            error,
            description: self.field("error_description"),
        })
    }
}
