// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Minimal SOAP 1.1 envelopes for the EJBCA web service.
//!
//! Requests use a `tns:` prefixed operation wrapper with unqualified
//! children, which is what EJBCA (`elementFormDefault="unqualified"`)
//! expects. Responses are scanned by local name only; namespace prefixes
//! vary between server versions and carry no information we need.

use std::fmt::Write as _;

use crate::error::{CertManagerError, Result};

/// Namespace of the EJBCA web service operations.
pub const EJBCA_NAMESPACE: &str = "http://ws.protocol.core.ejbca.org/";

/// SOAP 1.1 envelope namespace.
pub const SOAP_ENV_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Content type of SOAP 1.1 requests.
pub const CONTENT_TYPE_XML: &str = "text/xml; charset=utf-8";

/// One operation call.
#[derive(Debug, Clone)]
pub struct SoapRequest {
    operation: &'static str,
    args: Vec<(&'static str, String)>,
}

impl SoapRequest {
    /// Start a call to `operation`.
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            args: Vec::new(),
        }
    }

    /// Append an argument. Arguments are emitted in insertion order.
    pub fn arg(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.args.push((name, value.into()));
        self
    }

    /// Operation name.
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Serialize the full envelope.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(256);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        let _ = write!(
            xml,
            r#"<soap:Envelope xmlns:soap="{SOAP_ENV_NAMESPACE}"><soap:Body>"#
        );
        let _ = write!(
            xml,
            r#"<tns:{} xmlns:tns="{}">"#,
            self.operation, EJBCA_NAMESPACE
        );
        for (name, value) in &self.args {
            let _ = write!(xml, "<{name}>{}</{name}>", escape(value));
        }
        let _ = write!(xml, "</tns:{}>", self.operation);
        xml.push_str("</soap:Body></soap:Envelope>");
        xml
    }
}

/// Escape text for use in element content or attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Resolve entity and character references.
pub fn unescape(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let semi = rest
            .find(';')
            .ok_or_else(|| CertManagerError::protocol("unterminated entity reference"))?;
        let entity = &rest[1..semi];
        match entity {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse().ok()
                } else {
                    None
                };
                let c = code.and_then(char::from_u32).ok_or_else(|| {
                    CertManagerError::protocol(format!("unknown entity &{entity};"))
                })?;
                out.push(c);
            }
        }
        rest = &rest[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// An element located in a response document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element<'a> {
    name: &'a str,
    content: &'a str,
}

impl<'a> Element<'a> {
    /// Local name, without prefix.
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Raw markup between the start and end tags.
    pub fn content(&self) -> &'a str {
        self.content
    }

    /// First descendant with the given local name.
    pub fn child(&self, local_name: &str) -> Result<Option<Element<'a>>> {
        Ok(find_elements(self.content, local_name)?.into_iter().next())
    }

    /// Character data with references resolved.
    ///
    /// CDATA sections are taken verbatim; nested markup is dropped.
    pub fn text(&self) -> Result<String> {
        let mut out = String::new();
        let mut rest = self.content;

        while let Some(lt) = rest.find('<') {
            out.push_str(&unescape(&rest[..lt])?);
            rest = &rest[lt..];
            if let Some(body) = rest.strip_prefix("<![CDATA[") {
                let end = body
                    .find("]]>")
                    .ok_or_else(|| CertManagerError::protocol("unterminated CDATA section"))?;
                out.push_str(&body[..end]);
                rest = &body[end + 3..];
            } else {
                let end = skip_markup(rest)?;
                rest = &rest[end..];
            }
        }
        out.push_str(&unescape(rest)?);
        Ok(out)
    }
}

fn local_name(qname: &str) -> &str {
    qname.rsplit_once(':').map_or(qname, |(_, local)| local)
}

/// Length of the markup construct at the start of `s` (which begins with `<`).
fn skip_markup(s: &str) -> Result<usize> {
    let (terminator, skip) = if s.starts_with("<!--") {
        ("-->", 4)
    } else if s.starts_with("<![CDATA[") {
        ("]]>", 9)
    } else {
        return tag_end(s).map(|end| end + 1);
    };

    s[skip..]
        .find(terminator)
        .map(|i| skip + i + terminator.len())
        .ok_or_else(|| CertManagerError::protocol("unterminated markup"))
}

/// Index of the `>` closing the tag at the start of `s`, ignoring quoted `>`.
fn tag_end(s: &str) -> Result<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices().skip(1) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '>') => return Ok(i),
            _ => {}
        }
    }
    Err(CertManagerError::protocol("unterminated tag"))
}

/// All elements whose local name is `local_name`, in order of their end tags.
///
/// The document must be well nested; a stray or unclosed tag is a protocol
/// error.
pub fn find_elements<'a>(xml: &'a str, local_name_wanted: &str) -> Result<Vec<Element<'a>>> {
    let mut found = Vec::new();
    // (qualified name, content start, wanted)
    let mut open: Vec<(&str, usize, bool)> = Vec::new();
    let mut pos = 0;

    while let Some(offset) = xml[pos..].find('<') {
        let start = pos + offset;
        let rest = &xml[start..];

        if rest.starts_with("<!") || rest.starts_with("<?") {
            pos = start + skip_markup(rest)?;
            continue;
        }

        let end = tag_end(rest)?;
        let tag = &rest[1..end];
        pos = start + end + 1;

        if let Some(closing) = tag.strip_prefix('/') {
            let closing = closing.trim();
            let (qname, content_start, wanted) = open.pop().ok_or_else(|| {
                CertManagerError::protocol(format!("unexpected closing tag </{closing}>"))
            })?;
            if qname != closing {
                return Err(CertManagerError::protocol(format!(
                    "mismatched closing tag: expected </{qname}>, found </{closing}>"
                )));
            }
            if wanted {
                found.push(Element {
                    name: local_name(qname),
                    content: &xml[content_start..start],
                });
            }
        } else {
            let self_closing = tag.ends_with('/');
            let qname = tag
                .trim_end_matches('/')
                .split(|c: char| c.is_ascii_whitespace())
                .next()
                .unwrap_or_default();
            if qname.is_empty() {
                return Err(CertManagerError::protocol("empty tag name"));
            }
            let wanted = local_name(qname) == local_name_wanted;

            if self_closing {
                if wanted {
                    found.push(Element {
                        name: local_name(qname),
                        content: "",
                    });
                }
            } else {
                open.push((qname, pos, wanted));
            }
        }
    }

    if let Some((qname, _, _)) = open.last() {
        return Err(CertManagerError::protocol(format!(
            "unclosed element <{qname}>"
        )));
    }

    Ok(found)
}

/// The `<operation>Response` element inside `Envelope/Body`.
///
/// Anything else in a successful reply (an empty body, an HTML page from a
/// proxy) is a protocol error, never an empty result.
pub fn response_element<'a>(xml: &'a str, operation: &str) -> Result<Element<'a>> {
    let envelope = find_elements(xml, "Envelope")?
        .into_iter()
        .next()
        .ok_or_else(|| CertManagerError::protocol(format!("{operation}: not a SOAP envelope")))?;
    let body = envelope
        .child("Body")?
        .ok_or_else(|| CertManagerError::protocol(format!("{operation}: SOAP envelope has no Body")))?;

    let wanted = format!("{operation}Response");
    body.child(&wanted)?
        .ok_or_else(|| CertManagerError::protocol(format!("{operation}: missing {wanted} element")))
}

/// Turn a SOAP fault in `xml` into an error.
pub fn check_fault(xml: &str) -> Result<()> {
    let Some(fault) = find_elements(xml, "Fault")?.into_iter().next() else {
        return Ok(());
    };

    let message = match fault.child("faultstring")? {
        Some(s) => s.text()?,
        None => "no faultstring".to_string(),
    };
    let code = match fault.child("faultcode")? {
        Some(c) => c.text()?,
        None => String::new(),
    };

    Err(CertManagerError::protocol(format!(
        "SOAP fault {}: {}",
        code.trim(),
        message.trim()
    )))
}
