//! Turning a rendered page into a [`Record`] and its assets.
//!
//! Extraction reads a settled [`Session`] in two passes:
//!
//! 1. Observed responses whose URL (or MIME type) names an `.svg` or `.png`
//!    and that carry a body become [`Asset`]s.
//! 2. A fixed DOM query pulls three anchors out of the page: the owner, the
//!    generation and the ordered gene list.
//!
//! Any missing anchor or malformed gene list fails the whole extraction. A
//! partial record is never produced.

use serde_json::Value;
use tracing::debug;

use crate::render::{ObservedResponse, Session};
use crate::{Asset, AssetKind, ExtractError, Record, Result};

/// Script evaluated against the settled page.
///
/// The details panel is a `.list-unstyled` list: the first item holds the
/// owner, the third the generation, and a nested `ul` holds one gene segment
/// per item. Missing elements come back as `null` rather than throwing.
pub const DOM_QUERY: &str = r"(() => {
  const panel = document.querySelector('.list-unstyled');
  const field = (index) => {
    const item = panel ? panel.children[index] : null;
    const value = item ? item.children[0] : null;
    return value ? value.innerHTML : null;
  };
  const list = panel ? panel.querySelector('ul') : null;
  const genes = list
    ? Array.from(list.children).map((item) => (item.children[0] ? item.children[0].innerHTML : ''))
    : null;
  return JSON.stringify({ owner: field(0), gen: field(2), genes });
})()";

/// Result of a successful extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Structured metadata.
    pub record: Record,
    /// Binary side-resources captured during the page load.
    pub assets: Vec<Asset>,
}

/// Extract the record and assets from a session that has finished navigating.
///
/// # Errors
///
/// Returns [`Error::Extract`](crate::Error::Extract) when the page does not
/// hold a well-formed record, or the session's own error when evaluating the
/// query fails.
pub async fn extract(session: &mut dyn Session) -> Result<Extraction> {
    let assets = capture_assets(session.observed_responses());
    let raw = session.evaluate(DOM_QUERY).await?;
    let record = parse_query_result(raw)?;
    debug!(assets = assets.len(), owner = %record.owner, "extracted record");
    Ok(Extraction { record, assets })
}

/// Collect image and vector responses that carry a body.
///
/// The URL decides the kind when it names one; the MIME type is the fallback.
pub fn capture_assets(responses: &[ObservedResponse]) -> Vec<Asset> {
    responses
        .iter()
        .filter(|r| r.is_success())
        .filter_map(|r| {
            let kind = AssetKind::from_url(&r.url).or_else(|| AssetKind::from_mime(&r.mime_type))?;
            let bytes = r.body.as_ref().filter(|b| !b.is_empty())?;
            Some(Asset {
                kind,
                source_url: r.url.clone(),
                bytes: bytes.clone(),
            })
        })
        .collect()
}

/// Interpret the DOM query's result.
///
/// Accepts the JSON text the query returns as well as an already-decoded
/// object.
pub fn parse_query_result(raw: Value) -> std::result::Result<Record, ExtractError> {
    let value = match raw {
        Value::String(text) => serde_json::from_str::<Value>(&text)
            .map_err(|e| ExtractError::UnexpectedShape(format!("not JSON: {e}")))?,
        other => other,
    };
    let fields = match value {
        Value::Object(fields) => fields,
        other => {
            return Err(ExtractError::UnexpectedShape(format!(
                "expected an object, got {other}"
            )));
        },
    };

    let owner = text_anchor(fields.get("owner"), "owner")?;
    let generation = text_anchor(fields.get("gen"), "generation")?;

    let genes = match fields.get("genes") {
        None | Some(Value::Null) => return Err(ExtractError::MissingAnchor { anchor: "genes" }),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.as_str()),
                other => Err(ExtractError::UnexpectedShape(format!(
                    "gene segment is not text: {other}"
                ))),
            })
            .collect::<std::result::Result<Vec<_>, _>>()?,
        Some(other) => {
            return Err(ExtractError::UnexpectedShape(format!(
                "gene list is not an array: {other}"
            )));
        },
    };

    Ok(Record {
        owner,
        genome_hex: assemble_genome(&genes)?,
        generation,
    })
}

fn text_anchor(
    value: Option<&Value>,
    anchor: &'static str,
) -> std::result::Result<String, ExtractError> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::String(_) | Value::Null) | None => Err(ExtractError::MissingAnchor { anchor }),
        Some(other) => Err(ExtractError::UnexpectedShape(format!(
            "{anchor} is not text: {other}"
        ))),
    }
}

/// Build a `0x`-prefixed genome from ordered gene segments.
///
/// Segments are trimmed, must be non-empty hex, and must all have the same
/// width.
///
/// ```rust
/// use kittydex_core::assemble_genome;
///
/// assert_eq!(assemble_genome(&["aa", "bb", "cc"]).unwrap(), "0xaabbcc");
/// assert!(assemble_genome::<&str>(&[]).is_err());
/// ```
pub fn assemble_genome<S: AsRef<str>>(segments: &[S]) -> std::result::Result<String, ExtractError> {
    if segments.is_empty() {
        return Err(ExtractError::MalformedGenome("gene list is empty".into()));
    }

    let mut width = None;
    let mut genome = String::from("0x");
    for (index, segment) in segments.iter().enumerate() {
        let gene = segment.as_ref().trim();
        if gene.is_empty() || !gene.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ExtractError::MalformedGenome(format!(
                "segment {index} is not hex: {gene:?}"
            )));
        }
        match width {
            None => width = Some(gene.len()),
            Some(w) if w != gene.len() => {
                return Err(ExtractError::MalformedGenome(format!(
                    "segment {index} has width {}, expected {w}",
                    gene.len()
                )));
            },
            Some(_) => {},
        }
        genome.push_str(gene);
    }
    Ok(genome)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(url: &str, mime: &str, body: Option<&[u8]>) -> ObservedResponse {
        ObservedResponse {
            url: url.to_string(),
            status: 200,
            mime_type: mime.to_string(),
            body: body.map(<[u8]>::to_vec),
        }
    }

    #[test]
    fn test_assemble_genome_concatenates_in_order() {
        assert_eq!(assemble_genome(&["aa", "bb", "cc"]).unwrap(), "0xaabbcc");
        assert_eq!(assemble_genome(&[" 1f ", "\n0a"]).unwrap(), "0x1f0a");
    }

    #[test]
    fn test_assemble_genome_rejects_bad_segments() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            assemble_genome(&empty),
            Err(ExtractError::MalformedGenome(_))
        ));
        assert!(assemble_genome(&["aa", "zz"]).is_err());
        assert!(assemble_genome(&["aa", ""]).is_err());
        assert!(assemble_genome(&["aa", "bbb"]).is_err());
    }

    #[test]
    fn test_parse_string_result() {
        let raw = Value::String(
            r#"{"owner":"  0xABC ","gen":"5","genes":["1a","2b","3c"]}"#.to_string(),
        );
        let record = parse_query_result(raw).unwrap();
        assert_eq!(
            record,
            Record {
                owner: "0xABC".to_string(),
                genome_hex: "0x1a2b3c".to_string(),
                generation: "5".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_object_result_with_numeric_generation() {
        let raw = json!({"owner": "alice", "gen": 12, "genes": ["ff"]});
        let record = parse_query_result(raw).unwrap();
        assert_eq!(record.generation, "12");
        assert_eq!(record.genome_hex, "0xff");
    }

    #[test]
    fn test_missing_anchors() {
        let cases = [
            (json!({"owner": null, "gen": "1", "genes": ["aa"]}), "owner"),
            (json!({"owner": "bob", "genes": ["aa"]}), "generation"),
            (json!({"owner": "bob", "gen": "1", "genes": null}), "genes"),
            (json!({"owner": "  ", "gen": "1", "genes": ["aa"]}), "owner"),
        ];
        for (raw, expected) in cases {
            assert_eq!(
                parse_query_result(raw),
                Err(ExtractError::MissingAnchor { anchor: expected })
            );
        }
    }

    #[test]
    fn test_empty_gene_list_is_malformed() {
        let raw = json!({"owner": "bob", "gen": "1", "genes": []});
        assert!(matches!(
            parse_query_result(raw),
            Err(ExtractError::MalformedGenome(_))
        ));
    }

    #[test]
    fn test_unexpected_shapes() {
        assert!(matches!(
            parse_query_result(json!([1, 2, 3])),
            Err(ExtractError::UnexpectedShape(_))
        ));
        assert!(matches!(
            parse_query_result(Value::String("<html>".into())),
            Err(ExtractError::UnexpectedShape(_))
        ));
        assert!(matches!(
            parse_query_result(json!({"owner": "bob", "gen": "1", "genes": "aabb"})),
            Err(ExtractError::UnexpectedShape(_))
        ));
    }

    #[test]
    fn test_capture_assets_filters_by_kind_and_body() {
        let responses = vec![
            response("https://img.example.com/7.svg", "image/svg+xml", Some(b"<svg/>")),
            response("https://img.example.com/7.png", "image/png", Some(&[0x89, b'P'])),
            response("https://img.example.com/blob", "image/png", Some(&[1, 2])),
            response("https://example.com/app.js", "text/javascript", Some(b"x")),
            response("https://img.example.com/8.svg", "image/svg+xml", None),
            response("https://img.example.com/9.svg", "image/svg+xml", Some(b"")),
        ];
        let assets = capture_assets(&responses);
        let kinds: Vec<AssetKind> = assets.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![AssetKind::Vector, AssetKind::Image, AssetKind::Image]
        );
        assert_eq!(assets[0].bytes, b"<svg/>");
    }

    #[test]
    fn test_capture_assets_ignores_error_statuses() {
        let mut missing = response("https://img.example.com/7.svg", "image/svg+xml", Some(b"nf"));
        missing.status = 404;
        assert!(capture_assets(&[missing]).is_empty());
    }
}
