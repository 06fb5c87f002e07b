//! Request builder: turns a role-tagged request into a `RequestDescriptor`.
//!
//! # Design
//! One pass collects what each field contributes; the URL, headers and body
//! are assembled afterwards so that resolution rules do not depend on field
//! order beyond what is documented:
//! - the first path template, method, custom URL and body win;
//! - path parameters replace every `{name}` token, absent values become
//!   the literal `nil`, and unmatched tokens are left in place;
//! - the resolved path is always appended below the base URL's path, and a
//!   parameter value stays inside its segment (it may not become `.` or
//!   `..`);
//! - query names and values are percent-encoded, so a space is `%20`;
//! - a custom URL keeps its own query parameters and only gains query
//!   items whose names it does not already carry;
//! - headers are last-write-wins and are applied after the cookie header,
//!   so an explicit `Cookie` header replaces the rendered cookies;
//! - a body's content type is applied only when no `Content-Type` header
//!   was set explicitly;
//! - every header must fit on one wire line, otherwise building fails.

use std::collections::HashSet;

use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS, NON_ALPHANUMERIC};
use tracing::{debug, trace};
use url::Url;

use crate::cookie::{self, Cookie};
use crate::error::ApiError;
use crate::field::{Request, RequestRole};
use crate::format::EncodedBody;
use crate::http::{validate_header, HttpMethod, RequestDescriptor};

/// Characters escaped when a path parameter is substituted into a segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Characters escaped in query names and values: everything but the
/// unreserved set.
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// Placeholder written for path parameters without a value.
const NIL_TOKEN: &str = "nil";

#[derive(Default)]
struct Collected<'a> {
    template: Option<&'a str>,
    parameters: Vec<(&'a str, Option<String>)>,
    query: Vec<(&'a str, String)>,
    headers: Vec<(&'a str, String)>,
    cookies: Vec<&'a Cookie>,
    method: Option<HttpMethod>,
    custom_url: Option<&'a str>,
    body: Option<EncodedBody>,
}

/// Builds the descriptor for `request` relative to `base_url`.
///
/// The path template is appended below `base_url`'s path whether or not
/// that path ends with `/`.
pub fn encode<R: Request + ?Sized>(base_url: &Url, request: &R) -> Result<RequestDescriptor, ApiError> {
    let fields = request.fields();
    let mut collected = Collected::default();

    for field in &fields {
        trace!(field = field.name, "visiting request field");
        match &field.role {
            RequestRole::Path(template) => {
                collected.template.get_or_insert(*template);
            }
            RequestRole::PathParameter { name, value } => {
                collected.parameters.push((name.unwrap_or(field.name), value.clone()));
            }
            RequestRole::Query { name, items } => {
                let name = name.unwrap_or(field.name);
                for value in items.clone().into_vec() {
                    collected.query.push((name, value));
                }
            }
            RequestRole::Header { name, value } => {
                if let Some(value) = value {
                    collected.headers.push((name.unwrap_or(field.name), value.clone()));
                }
            }
            RequestRole::Cookies(cookies) => collected.cookies.extend(cookies.iter()),
            RequestRole::Method(method) => {
                collected.method.get_or_insert(*method);
            }
            RequestRole::Url(url) => {
                if collected.custom_url.is_none() {
                    collected.custom_url = *url;
                }
            }
            RequestRole::Body(body) => {
                if collected.body.is_none() {
                    collected.body = Some(body.payload.encode_body(&body.format)?);
                }
            }
        }
    }

    let url = match collected.custom_url {
        Some(custom) => custom_url(custom, &collected.query)?,
        None => resolve_url(base_url, &collected)?,
    };

    let method = collected.method.unwrap_or_default();
    let mut descriptor = RequestDescriptor::new(method, url);

    let cookies: Vec<Cookie> = collected.cookies.iter().map(|c| (*c).clone()).collect();
    if let Some(value) = cookie::header_value(&cookies) {
        validate_header("Cookie", &value)?;
        descriptor.set_header("Cookie", value);
    }
    for (name, value) in collected.headers {
        validate_header(name, &value)?;
        descriptor.set_header(name, value);
    }

    if let Some(body) = collected.body {
        if !descriptor.has_header_ignore_case("content-type") {
            validate_header("Content-Type", &body.content_type)?;
            descriptor.set_header("Content-Type", body.content_type);
        }
        descriptor.body = Bytes::from(body.bytes);
    }

    debug!(method = %descriptor.method, url = %descriptor.url, "built request");
    Ok(descriptor)
}

/// Substitutes every `{name}` token of one path segment with its
/// parameter value.
fn substitute(segment: &str, parameters: &[(&str, Option<String>)]) -> Result<String, ApiError> {
    let mut resolved = segment.to_string();
    for (name, value) in parameters {
        let token = format!("{{{name}}}");
        let replacement = match value {
            Some(value) => utf8_percent_encode(value, PATH_SEGMENT).to_string(),
            None => NIL_TOKEN.to_string(),
        };
        resolved = resolved.replace(&token, &replacement);
    }
    if resolved != segment && matches!(resolved.as_str(), "." | "..") {
        return Err(ApiError::InvalidUrl(format!(
            "path segment `{segment}` resolves to the dot segment `{resolved}`"
        )));
    }
    Ok(resolved)
}

fn resolve_url(base_url: &Url, collected: &Collected<'_>) -> Result<Url, ApiError> {
    if base_url.cannot_be_a_base() {
        return Err(ApiError::InvalidUrl(format!("{base_url} cannot be a base url")));
    }
    let template = collected.template.unwrap_or("");
    let segments = template
        .trim_start_matches('/')
        .split('/')
        .map(|segment| substitute(segment, &collected.parameters))
        .collect::<Result<Vec<_>, _>>()?;

    let mut path = base_url.path().to_string();
    if !path.ends_with('/') {
        path.push('/');
    }
    path.push_str(&segments.join("/"));

    let mut url = base_url.clone();
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    append_query(&mut url, collected.query.iter().map(|(name, value)| (*name, value.as_str())));
    Ok(url)
}

fn custom_url(custom: &str, query: &[(&str, String)]) -> Result<Url, ApiError> {
    let mut url = Url::parse(custom).map_err(|e| ApiError::InvalidUrl(format!("{custom}: {e}")))?;
    let existing: HashSet<String> = url.query_pairs().map(|(name, _)| name.into_owned()).collect();
    let additions = query
        .iter()
        .filter(|(name, _)| !existing.contains(*name))
        .map(|(name, value)| (*name, value.as_str()));
    append_query(&mut url, additions);
    Ok(url)
}

/// Appends `name=value` items after any query the URL already has.
fn append_query<'a>(url: &mut Url, items: impl Iterator<Item = (&'a str, &'a str)>) {
    let mut query = url.query().unwrap_or_default().to_string();
    let before = query.len();
    for (name, value) in items {
        if !query.is_empty() {
            query.push('&');
        }
        query.extend(utf8_percent_encode(name, QUERY_COMPONENT));
        query.push('=');
        query.extend(utf8_percent_encode(value, QUERY_COMPONENT));
    }
    if query.len() != before {
        url.set_query(Some(&query));
    }
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    use super::*;
    use crate::error::EncodeError;
    use crate::field::{EmptyResponse, Field};
    use crate::format::{Binary, Format, KeyCasing, Payload, TextEncoding};

    fn base() -> Url {
        Url::parse("https://api.example.local/v1/").unwrap()
    }

    struct Listed<F: Fn() -> Vec<Field<'static>>>(F);

    impl<F: Fn() -> Vec<Field<'static>>> Request for Listed<F> {
        type Response = EmptyResponse;

        fn fields(&self) -> Vec<Field<'_>> {
            (self.0)()
        }
    }

    fn build(fields: impl Fn() -> Vec<Field<'static>>) -> Result<RequestDescriptor, ApiError> {
        encode(&base(), &Listed(fields))
    }

    #[derive(Serialize)]
    struct NewTodo {
        title_text: String,
    }

    impl Payload for NewTodo {
        fn format() -> Format {
            Format::json_with(KeyCasing::CamelCase, Default::default())
        }
    }

    struct CreateTodo {
        body: NewTodo,
        trace_id: Option<String>,
    }

    impl Request for CreateTodo {
        type Response = EmptyResponse;

        fn fields(&self) -> Vec<Field<'_>> {
            vec![
                Field::path("path", "/todos"),
                Field::method("method", HttpMethod::Post),
                Field::header("trace_id", &self.trace_id).named("X-Trace-Id"),
                Field::body("body", &self.body),
            ]
        }
    }

    #[test]
    fn path_parameter_replaces_every_occurrence() {
        let req = build(|| {
            vec![
                Field::path("path", "/some/{id}/and/more/{id}/later"),
                Field::path_parameter("id", &123),
            ]
        })
        .unwrap();
        assert_eq!(req.url.path(), "/v1/some/123/and/more/123/later");
    }

    #[test]
    fn named_parameter_uses_override_token_only() {
        let req = build(|| {
            vec![
                Field::path("path", "/items/{custom_id}/{id}"),
                Field::path_parameter("id", &"abc").named("custom_id"),
            ]
        })
        .unwrap();
        assert_eq!(req.url.path(), "/v1/items/abc/%7Bid%7D");
    }

    #[test]
    fn absent_parameter_writes_nil() {
        let req = build(|| vec![Field::path("path", "/users/{id}"), Field::path_parameter("id", &None::<u32>)]).unwrap();
        assert_eq!(req.url.path(), "/v1/users/nil");
    }

    #[test]
    fn parameter_values_are_escaped_within_segment() {
        let req = build(|| vec![Field::path("path", "/files/{name}"), Field::path_parameter("name", &"a b/c")]).unwrap();
        assert_eq!(req.url.path(), "/v1/files/a%20b%2Fc");
    }

    #[test]
    fn colon_in_first_segment_stays_below_base() {
        let base = Url::parse("http://h/api/v1").unwrap();
        let req = encode(&base, &Listed(|| vec![Field::path("path", "{id}/detail"), Field::path_parameter("id", &"user:42")])).unwrap();
        assert_eq!(req.url.as_str(), "http://h/api/v1/user:42/detail");

        let req = encode(&base, &Listed(|| vec![Field::path("path", "things:batchGet")])).unwrap();
        assert_eq!(req.url.as_str(), "http://h/api/v1/things:batchGet");
    }

    #[test]
    fn dot_segment_parameters_are_rejected() {
        for value in [".", ".."] {
            let err = build(move || vec![Field::path("path", "/users/{id}/profile"), Field::path_parameter("id", &value)]).unwrap_err();
            assert!(matches!(err, ApiError::InvalidUrl(_)), "{value}");
        }
        let req = build(|| vec![Field::path("path", "/users/{id}"), Field::path_parameter("id", &"v..1")]).unwrap();
        assert_eq!(req.url.path(), "/v1/users/v..1");
    }

    #[test]
    fn backslash_in_parameter_stays_in_segment() {
        let req = build(|| vec![Field::path("path", "/files/{name}"), Field::path_parameter("name", &"a\\b")]).unwrap();
        assert_eq!(req.url.path(), "/v1/files/a%5Cb");
    }

    #[test]
    fn header_with_line_break_is_rejected() {
        let err = build(|| vec![Field::header("note", &"a\r\nX-Injected: 1").named("X-Note")]).unwrap_err();
        assert!(matches!(err, ApiError::Encoding(EncodeError::InvalidHeader { .. })));

        static COOKIES: std::sync::LazyLock<Vec<Cookie>> =
            std::sync::LazyLock::new(|| vec![Cookie::new("a", "1\r\nX-Injected: 1")]);
        let err = build(|| vec![Field::cookies("cookies", &COOKIES)]).unwrap_err();
        assert!(matches!(err, ApiError::Encoding(EncodeError::InvalidHeader { .. })));
    }

    #[test]
    fn query_items_skip_absent_and_repeat_collections() {
        let req = build(|| {
            vec![
                Field::path("path", "todos"),
                Field::query("tag", &vec!["red", "blue"]),
                Field::query("page", &None::<u32>),
                Field::query("q", &"a&b c"),
            ]
        })
        .unwrap();
        assert_eq!(req.url.as_str(), "https://api.example.local/v1/todos?tag=red&tag=blue&q=a%26b%20c");
    }

    #[test]
    fn no_query_leaves_url_without_question_mark() {
        let req = build(|| vec![Field::path("path", "todos"), Field::query("page", &None::<u32>)]).unwrap();
        assert_eq!(req.url.as_str(), "https://api.example.local/v1/todos");
    }

    #[test]
    fn custom_url_keeps_existing_query_names() {
        let req = build(|| {
            vec![
                Field::url("url", Some("https://x.local?field1=value1")),
                Field::query("field2", &"value2"),
            ]
        })
        .unwrap();
        assert_eq!(req.url.as_str(), "https://x.local/?field1=value1&field2=value2");

        let req = build(|| {
            vec![
                Field::url("url", Some("https://x.local?field1=value1")),
                Field::query("field1", &"value2"),
            ]
        })
        .unwrap();
        assert_eq!(req.url.as_str(), "https://x.local/?field1=value1");
    }

    #[test]
    fn custom_url_skips_path_template() {
        let req = build(|| vec![Field::path("path", "/ignored"), Field::url("url", Some("https://other.local/exact"))]).unwrap();
        assert_eq!(req.url.as_str(), "https://other.local/exact");
    }

    #[test]
    fn absent_custom_url_falls_back_to_base() {
        let req = build(|| vec![Field::url("url", None), Field::path("path", "todos")]).unwrap();
        assert_eq!(req.url.as_str(), "https://api.example.local/v1/todos");
    }

    #[test]
    fn malformed_custom_url_is_invalid_url() {
        let err = build(|| vec![Field::url("url", Some("not a url"))]).unwrap_err();
        assert!(matches!(err, ApiError::InvalidUrl(_)));
    }

    #[test]
    fn first_method_wins_and_default_is_get() {
        let req = build(|| vec![Field::method("a", HttpMethod::Put), Field::method("b", HttpMethod::Delete)]).unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        let req = build(Vec::new).unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url.as_str(), "https://api.example.local/v1/");
    }

    #[test]
    fn headers_are_last_write_wins_and_absent_is_omitted() {
        let req = build(|| {
            vec![
                Field::header("accept", &"text/plain").named("Accept"),
                Field::header("flag", &true).named("X-Flag"),
                Field::header("accept_again", &"application/json").named("Accept"),
                Field::header("missing", &None::<String>),
            ]
        })
        .unwrap();
        assert_eq!(
            req.headers,
            vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("X-Flag".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn explicit_cookie_header_overrides_cookie_list() {
        static COOKIES: std::sync::LazyLock<Vec<Cookie>> =
            std::sync::LazyLock::new(|| vec![Cookie::new("a", "1"), Cookie::new("b", "2")]);

        let req = build(|| vec![Field::cookies("cookies", &COOKIES)]).unwrap();
        assert_eq!(req.header("Cookie"), Some("a=1; b=2"));

        let req = build(|| {
            vec![
                Field::cookies("cookies", &COOKIES),
                Field::header("cookie", &"c=3").named("Cookie"),
            ]
        })
        .unwrap();
        assert_eq!(req.header("Cookie"), Some("c=3"));
        assert_eq!(req.headers.len(), 1);
    }

    #[test]
    fn body_sets_content_type_unless_explicit() {
        let request = CreateTodo {
            body: NewTodo {
                title_text: "ship it".to_string(),
            },
            trace_id: Some("t-1".to_string()),
        };
        let req = encode(&base(), &request).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        assert_eq!(req.header("X-Trace-Id"), Some("t-1"));
        assert_eq!(&req.body[..], br#"{"titleText":"ship it"}"#);

        struct RawBody {
            text: String,
        }

        impl Request for RawBody {
            type Response = EmptyResponse;

            fn fields(&self) -> Vec<Field<'_>> {
                vec![
                    Field::header("content_type", &"application/vnd.custom+json").named("content-type"),
                    Field::body("body", &self.text),
                ]
            }
        }

        let req = encode(&base(), &RawBody { text: "raw".to_string() }).unwrap();
        assert_eq!(req.header("content-type"), Some("application/vnd.custom+json"));
        assert!(req.header("Content-Type").is_none());
        assert_eq!(&req.body[..], b"raw");
    }

    #[test]
    fn body_encoding_failure_carries_encoding() {
        #[derive(Serialize)]
        struct Note(String);

        impl Payload for Note {
            fn format() -> Format {
                Format::plain_text(TextEncoding::Ascii)
            }
        }

        struct SendNote {
            note: Note,
        }

        impl Request for SendNote {
            type Response = EmptyResponse;

            fn fields(&self) -> Vec<Field<'_>> {
                vec![Field::body("note", &self.note)]
            }
        }

        let request = SendNote {
            note: Note("ünïcode".to_string()),
        };
        let err = encode(&base(), &request).unwrap_err();
        assert!(matches!(
            err,
            ApiError::Encoding(EncodeError::Text {
                encoding: TextEncoding::Ascii
            })
        ));
    }

    #[test]
    fn multipart_body_uses_generated_boundary() {
        #[derive(Serialize)]
        struct Upload {
            file: Binary,
        }

        impl Payload for Upload {
            fn format() -> Format {
                Format::multipart(TextEncoding::Utf8)
            }
        }

        struct SendUpload {
            upload: Upload,
        }

        impl Request for SendUpload {
            type Response = EmptyResponse;

            fn fields(&self) -> Vec<Field<'_>> {
                vec![Field::method("method", HttpMethod::Post), Field::body("upload", &self.upload)]
            }
        }

        let request = SendUpload {
            upload: Upload {
                file: Binary(b"%PDF".to_vec()),
            },
        };
        let req = encode(&base(), &request).unwrap();
        let content_type = req.header("Content-Type").unwrap();
        let boundary = content_type.strip_prefix("multipart/form-data; boundary=").unwrap();
        let body = String::from_utf8(req.body.to_vec()).unwrap();
        assert!(body.starts_with(&format!("--{boundary}\r\n")));
        assert!(body.contains("filename=\"file.pdf\"\r\nContent-Type: application/pdf"));
        assert!(body.ends_with(&format!("--{boundary}--\r\n")));
    }
}
