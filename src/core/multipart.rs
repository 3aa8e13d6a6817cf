//! Multipart response decoding
//!
//! The translation service answers a multipart request with a multipart body,
//! one part per translated library. The boundary is only known once the
//! response headers arrive, so it is read from `content-type` at runtime.

use regex::Regex;
use tracing::trace;

use crate::core::errors::{ElmError, Result};

/// Compiled patterns used to pick a multipart body apart
#[derive(Debug, Clone)]
pub struct MultipartPatterns {
    boundary: Regex,
    disposition_param: Regex,
}

/// One decoded part of a multipart body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPart {
    /// Header lines as `(name, value)` in arrival order
    pub headers: Vec<(String, String)>,
    /// Declared name from `Content-Disposition`
    pub name: Option<String>,
    /// Content following the blank line, without the trailing line break
    pub body: String,
}

impl MultipartPart {
    /// First header value matching `name`, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The body when it looks like a JSON document
    pub fn json_content(&self) -> Option<&str> {
        json_like(&self.body)
    }
}

impl MultipartPatterns {
    pub fn new() -> Result<Self> {
        let boundary = Regex::new(
            r#"(?i)^\s*multipart/[\w.+-]+\s*;(?:.*;)?\s*boundary\s*=\s*(?:"([^"]+)"|([^;,\s]+))"#,
        )
        .map_err(|e| ElmError::ConfigError {
            message: format!("boundary pattern: {}", e),
        })?;

        let disposition_param =
            Regex::new(r#"(?i)(?:^|;)\s*(name|filename)\s*=\s*(?:"([^"]*)"|([^;\s]+))"#)
                .map_err(|e| ElmError::ConfigError {
                    message: format!("disposition pattern: {}", e),
                })?;

        Ok(Self {
            boundary,
            disposition_param,
        })
    }

    /// Boundary token of a `multipart/*` content type
    pub fn extract_boundary(&self, content_type: &str) -> Option<String> {
        let captures = self.boundary.captures(content_type)?;
        captures
            .get(1)
            .or_else(|| captures.get(2))
            .map(|m| m.as_str().to_string())
    }

    /// Split delimiter for a response; empty when no boundary is declared
    pub fn delimiter(&self, content_type: Option<&str>) -> String {
        content_type
            .and_then(|value| self.extract_boundary(value))
            .map(|token| format!("--{}", token))
            .unwrap_or_default()
    }

    /// JSON payload of a raw segment, if it has one
    pub fn extract_json_content<'a>(&self, segment: &'a str) -> Option<&'a str> {
        let (_, body) = split_head(strip_leading_break(segment))?;
        json_like(body)
    }

    /// Declared part name of a raw segment
    pub fn extract_part_name(&self, segment: &str) -> Option<String> {
        let (head, _) = split_head(strip_leading_break(segment))?;
        let headers = parse_headers(head);
        self.disposition_name(&headers)
    }

    /// Decode one segment; `None` for framing such as preamble or the `--` tail
    pub fn parse_part(&self, segment: &str) -> Option<MultipartPart> {
        let (head, body) = split_head(strip_leading_break(segment))?;
        let headers = parse_headers(head);
        let name = self.disposition_name(&headers);

        Some(MultipartPart {
            headers,
            name,
            body: strip_trailing_break(body).to_string(),
        })
    }

    /// Split `body` on `delimiter` and decode every segment that is a part
    pub fn parse_parts(&self, body: &str, delimiter: &str) -> Vec<MultipartPart> {
        let segments: Vec<&str> = if delimiter.is_empty() {
            vec![body]
        } else {
            body.split(delimiter).collect()
        };

        segments
            .into_iter()
            .filter_map(|segment| {
                let part = self.parse_part(segment);
                if part.is_none() {
                    trace!("Skipping multipart framing segment ({} bytes)", segment.len());
                }
                part
            })
            .collect()
    }

    fn disposition_name(&self, headers: &[(String, String)]) -> Option<String> {
        let value = headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("content-disposition"))
            .map(|(_, value)| value.as_str())?;

        let mut filename = None;
        for captures in self.disposition_param.captures_iter(value) {
            let param = captures[1].to_ascii_lowercase();
            let found = captures
                .get(2)
                .or_else(|| captures.get(3))
                .map(|m| m.as_str().to_string());
            match param.as_str() {
                "name" => return found,
                _ => filename = filename.or(found),
            }
        }

        filename
    }
}

fn json_like(body: &str) -> Option<&str> {
    let trimmed = body.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        Some(trimmed)
    } else {
        None
    }
}

fn strip_leading_break(segment: &str) -> &str {
    segment
        .strip_prefix("\r\n")
        .or_else(|| segment.strip_prefix('\n'))
        .unwrap_or(segment)
}

fn strip_trailing_break(body: &str) -> &str {
    body.strip_suffix("\r\n")
        .or_else(|| body.strip_suffix('\n'))
        .unwrap_or(body)
}

/// Split at the first blank line into header block and content
fn split_head(segment: &str) -> Option<(&str, &str)> {
    if let Some(rest) = segment.strip_prefix("\r\n") {
        return Some(("", rest));
    }
    if let Some(rest) = segment.strip_prefix('\n') {
        return Some(("", rest));
    }

    let crlf = segment.find("\r\n\r\n").map(|i| (i, i + 4));
    let lf = segment.find("\n\n").map(|i| (i, i + 2));
    let (head_end, body_start) = match (crlf, lf) {
        (Some(a), Some(b)) => {
            if a.0 <= b.0 {
                a
            } else {
                b
            }
        }
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };

    Some((&segment[..head_end], &segment[body_start..]))
}

fn parse_headers(head: &str) -> Vec<(String, String)> {
    head.lines()
        .filter_map(|line| {
            let (name, value) = line.split_once(':')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> MultipartPatterns {
        MultipartPatterns::new().unwrap()
    }

    #[test]
    fn test_extract_boundary() {
        let p = patterns();
        assert_eq!(
            p.extract_boundary("multipart/form-data;boundary=Boundary_1"),
            Some("Boundary_1".to_string())
        );
        assert_eq!(
            p.extract_boundary("multipart/form-data; charset=utf-8; boundary=\"a b\""),
            Some("a b".to_string())
        );
        assert_eq!(p.extract_boundary("application/json"), None);
    }

    #[test]
    fn test_delimiter() {
        let p = patterns();
        assert_eq!(
            p.delimiter(Some("multipart/form-data;boundary=Boundary_1")),
            "--Boundary_1"
        );
        assert_eq!(p.delimiter(None), "");
        assert_eq!(p.delimiter(Some("text/plain")), "");
    }

    #[test]
    fn test_extract_part_name_prefers_name() {
        let p = patterns();
        let segment = "\r\nContent-Type: application/elm+json\r\nContent-Disposition: form-data; filename=\"Helper.json\"; name=\"Helper\"\r\n\r\n{}\r\n";
        assert_eq!(p.extract_part_name(segment), Some("Helper".to_string()));

        let segment = "\r\nContent-Disposition: attachment; filename=main\r\n\r\n{}\r\n";
        assert_eq!(p.extract_part_name(segment), Some("main".to_string()));
    }

    #[test]
    fn test_extract_json_content() {
        let p = patterns();
        let segment = "\r\nContent-Disposition: form-data; name=\"main\"\r\n\r\n{\"library\":{}}\r\n";
        assert_eq!(p.extract_json_content(segment), Some("{\"library\":{}}"));

        let segment = "\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nplain text\r\n";
        assert_eq!(p.extract_json_content(segment), None);
    }

    #[test]
    fn test_parse_parts_skips_framing() {
        let p = patterns();
        let body = "preamble\r\n--B1\r\nContent-Disposition: form-data; name=\"main\"\r\n\r\n{\"a\":1}\r\n--B1\r\nContent-Disposition: form-data; name=\"Helper\"\r\n\r\n{\"b\":2}\r\n--B1--\r\n";
        let parts = p.parse_parts(body, "--B1");

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name.as_deref(), Some("main"));
        assert_eq!(parts[0].json_content(), Some("{\"a\":1}"));
        assert_eq!(parts[1].name.as_deref(), Some("Helper"));
        assert_eq!(
            parts[1].header("content-disposition"),
            Some("form-data; name=\"Helper\"")
        );
    }

    #[test]
    fn test_parse_parts_without_delimiter() {
        let p = patterns();
        let body = "Content-Disposition: form-data; name=\"main\"\n\n{\"a\":1}\n";
        let parts = p.parse_parts(body, "");
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].name.as_deref(), Some("main"));

        let parts = p.parse_parts("{\"a\":1}", "");
        assert!(parts.is_empty());
    }
}
