//! Minimal SOAP-style envelope construction and response scanning.
//!
//! The appliance RPC surface is XML-over-HTTP-POST. The dispatch core treats
//! payloads as opaque text; only these helpers know the envelope shape, and
//! they deliberately stop at the small subset the appliance emits (flat
//! parameter elements, `<item>` lists, a `<result>` scalar).

/// One named RPC parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcParam {
    pub name: String,
    pub value: RpcValue,
}

/// Parameter payloads the appliance methods accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcValue {
    Str(String),
    Int(i64),
    /// Repeated `<item>` children (argv vectors, data chunks).
    Items(Vec<String>),
}

impl RpcParam {
    pub fn str(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: RpcValue::Str(value.into()),
        }
    }

    pub fn int(name: &str, value: i64) -> Self {
        Self {
            name: name.to_string(),
            value: RpcValue::Int(value),
        }
    }

    pub fn items(name: &str, values: impl IntoIterator<Item = String>) -> Self {
        Self {
            name: name.to_string(),
            value: RpcValue::Items(values.into_iter().collect()),
        }
    }
}

const ENVELOPE_OPEN: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">"#,
    r#"<SOAP-ENV:Body>"#
);
const ENVELOPE_CLOSE: &str = "</SOAP-ENV:Body></SOAP-ENV:Envelope>";

/// Build a request envelope for one method call.
pub fn build_envelope(method: &str, params: &[RpcParam]) -> String {
    let mut body = String::with_capacity(256);
    body.push_str(ENVELOPE_OPEN);
    body.push('<');
    body.push_str(method);
    body.push('>');
    for param in params {
        body.push('<');
        body.push_str(&param.name);
        body.push('>');
        match &param.value {
            RpcValue::Str(value) => body.push_str(&escape_xml(value)),
            RpcValue::Int(value) => body.push_str(&value.to_string()),
            RpcValue::Items(values) => {
                for value in values {
                    body.push_str("<item>");
                    body.push_str(&escape_xml(value));
                    body.push_str("</item>");
                }
            }
        }
        body.push_str("</");
        body.push_str(&param.name);
        body.push('>');
    }
    body.push_str("</");
    body.push_str(method);
    body.push('>');
    body.push_str(ENVELOPE_CLOSE);
    body
}

/// Extract the text contents of every `<item>` element, in document order.
pub fn extract_items(xml: &str) -> Vec<String> {
    extract_all_tag_text(xml, "item")
}

/// Extract the text of the first `<result>` element, if present.
pub fn extract_result(xml: &str) -> Option<String> {
    extract_all_tag_text(xml, "result").into_iter().next()
}

fn extract_all_tag_text(xml: &str, tag: &str) -> Vec<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let mut out = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find(&open) {
        let after_open = &rest[start + open.len()..];
        let Some(end) = after_open.find(&close) else {
            break;
        };
        out.push(unescape_xml(&after_open[..end]));
        rest = &after_open[end + close.len()..];
    }
    out
}

fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_xml(value: &str) -> String {
    // Entity replacement in reverse order of escaping; `&amp;` last so the
    // others cannot be double-decoded.
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
