//! Stylesheet fetching and byte decoding.

use crate::error::{Result, StyleError};
use base64::Engine;
use encoding_rs::{Encoding, UTF_8};
use log::debug;
use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use url::Url;

/// Raw bytes of a fetched resource plus its `Content-Type`, if known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResource {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl FetchedResource {
    pub fn new(bytes: Vec<u8>, content_type: Option<String>) -> Self {
        Self {
            bytes,
            content_type,
        }
    }
}

/// Blocking fetch of a stylesheet URL.
pub trait ResourceLoader {
    fn fetch(&self, url: &Url) -> Result<FetchedResource>;
}

/// Handles `data:` and `file:` URLs. Anything else is a fetch error.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultLoader;

impl ResourceLoader for DefaultLoader {
    fn fetch(&self, url: &Url) -> Result<FetchedResource> {
        match url.scheme() {
            "data" => decode_data_url(url),
            "file" => {
                let path = url.to_file_path().map_err(|_| StyleError::Fetch {
                    url: url.to_string(),
                    reason: "not a local path".to_string(),
                })?;
                let bytes = std::fs::read(&path).map_err(|e| StyleError::Fetch {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
                let content_type = path
                    .extension()
                    .filter(|ext| ext.eq_ignore_ascii_case("css"))
                    .map(|_| "text/css".to_string());
                Ok(FetchedResource::new(bytes, content_type))
            }
            scheme => Err(StyleError::Fetch {
                url: url.to_string(),
                reason: format!("unsupported scheme {:?}", scheme),
            }),
        }
    }
}

/// In-memory loader keyed by absolute URL string, falling back to [`DefaultLoader`].
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    resources: HashMap<String, FetchedResource>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(mut self, url: &str, content_type: Option<&str>, bytes: &[u8]) -> Self {
        self.resources.insert(
            url.to_string(),
            FetchedResource::new(bytes.to_vec(), content_type.map(str::to_string)),
        );
        self
    }
}

impl ResourceLoader for MemoryLoader {
    fn fetch(&self, url: &Url) -> Result<FetchedResource> {
        match self.resources.get(url.as_str()) {
            Some(resource) => Ok(resource.clone()),
            None => DefaultLoader.fetch(url),
        }
    }
}

/// Decodes a `data:` URL following RFC 2397. The fragment is not part of the payload.
fn decode_data_url(url: &Url) -> Result<FetchedResource> {
    let fail = |reason: &str| StyleError::Fetch {
        url: url.to_string(),
        reason: reason.to_string(),
    };
    let (metadata, data) = url
        .path()
        .split_once(',')
        .ok_or_else(|| fail("missing comma in data URL"))?;

    let mut params = metadata.split(';');
    let media_type = params.next().unwrap_or("").trim();
    let mut is_base64 = false;
    let mut content_type = if media_type.is_empty() {
        "text/plain".to_string()
    } else {
        media_type.to_string()
    };
    for param in params.map(str::trim).filter(|p| !p.is_empty()) {
        if param.eq_ignore_ascii_case("base64") {
            is_base64 = true;
        } else {
            content_type.push(';');
            content_type.push_str(param);
        }
    }

    let decoded: Vec<u8> = percent_decode_str(data).collect();
    let bytes = if is_base64 {
        let cleaned: Vec<u8> = decoded
            .into_iter()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        base64::engine::general_purpose::STANDARD
            .decode(cleaned)
            .map_err(|e| fail(&format!("invalid base64: {}", e)))?
    } else {
        decoded
    };
    Ok(FetchedResource::new(bytes, Some(content_type)))
}

/// Decodes stylesheet bytes. A BOM always wins; otherwise the explicit label,
/// then the `Content-Type` charset, then a leading `@charset` rule, then UTF-8.
/// Malformed byte sequences are a decode error rather than replacement characters.
pub fn decode_stylesheet(
    url: &str,
    bytes: &[u8],
    content_type: Option<&str>,
    explicit_encoding: Option<&str>,
) -> Result<String> {
    let decode_error = |reason: String| StyleError::Decode {
        url: url.to_string(),
        reason,
    };

    let (encoding, body) = if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        (encoding, &bytes[bom_len..])
    } else if let Some(label) = explicit_encoding {
        let encoding = Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| decode_error(format!("unknown encoding {:?}", label)))?;
        (encoding, bytes)
    } else if let Some(encoding) = content_type
        .and_then(charset_from_content_type)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
    {
        (encoding, bytes)
    } else if let Some(encoding) = sniff_charset_rule(bytes) {
        (encoding, bytes)
    } else {
        (UTF_8, bytes)
    };

    debug!("decoding {} as {}", url, encoding.name());
    let (text, had_errors) = encoding.decode_without_bom_handling(body);
    if had_errors {
        return Err(decode_error(format!(
            "malformed {} byte sequence",
            encoding.name()
        )));
    }
    Ok(text.into_owned())
}

fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim().trim_matches('"').trim_matches('\'');
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// `@charset "label";` must be the very first bytes of the sheet.
fn sniff_charset_rule(bytes: &[u8]) -> Option<&'static Encoding> {
    let rest = bytes.strip_prefix(b"@charset \"")?;
    let end = rest.iter().position(|&b| b == b'"')?;
    if rest.get(end + 1) != Some(&b';') {
        return None;
    }
    let encoding = Encoding::for_label(&rest[..end])?;
    // UTF-16 labels in an ASCII-compatible @charset mean UTF-8.
    if encoding == encoding_rs::UTF_16BE || encoding == encoding_rs::UTF_16LE {
        return Some(UTF_8);
    }
    Some(encoding)
}
