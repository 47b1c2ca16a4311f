//! Compliance export serialization.
//!
//! Exports produce a standalone snapshot of the chain for external review:
//! entries in strict sequence order, filtered by an inclusive time range,
//! as JSON or CSV. Signatures are redacted unless the export explicitly
//! requests them for re-verification. Exporting never mutates the chain.

use serde::Serialize;

use arbiter_contracts::{
    audit::{AuditEntry, ExportFormat, ExportOptions},
    error::{ArbiterError, ArbiterResult},
};

/// One exported entry; `signature` is omitted when redacted.
#[derive(Serialize)]
struct ExportedEntry<'a> {
    sequence: u64,
    event_type: &'a str,
    payload: &'a serde_json::Value,
    correlation_ids: &'a [String],
    timestamp: String,
    prev_hash: &'a str,
    hash: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<&'a str>,
}

/// Serialize the in-range entries according to `options`.
pub fn render(entries: &[AuditEntry], options: &ExportOptions) -> ArbiterResult<Vec<u8>> {
    let in_range: Vec<&AuditEntry> = entries
        .iter()
        .filter(|e| options.start.is_none_or(|s| e.timestamp >= s))
        .filter(|e| options.end.is_none_or(|end| e.timestamp <= end))
        .collect();

    match options.format {
        ExportFormat::Json => render_json(&in_range, options.include_signatures),
        ExportFormat::Csv => Ok(render_csv(&in_range, options.include_signatures)),
    }
}

fn render_json(entries: &[&AuditEntry], include_signatures: bool) -> ArbiterResult<Vec<u8>> {
    let exported: Vec<ExportedEntry<'_>> = entries
        .iter()
        .map(|e| ExportedEntry {
            sequence: e.sequence,
            event_type: e.event_type.as_str(),
            payload: &e.payload,
            correlation_ids: &e.correlation_ids,
            timestamp: e.timestamp.to_rfc3339(),
            prev_hash: &e.prev_hash,
            hash: &e.hash,
            signature: include_signatures.then_some(e.signature.as_str()),
        })
        .collect();

    serde_json::to_vec_pretty(&exported).map_err(|e| ArbiterError::AuditWrite {
        reason: format!("failed to serialize audit export: {}", e),
    })
}

fn render_csv(entries: &[&AuditEntry], include_signatures: bool) -> Vec<u8> {
    let mut out = String::new();

    out.push_str("sequence,event_type,timestamp,correlation_ids,payload,prev_hash,hash");
    if include_signatures {
        out.push_str(",signature");
    }
    out.push('\n');

    for e in entries {
        let fields = [
            e.sequence.to_string(),
            e.event_type.as_str().to_string(),
            e.timestamp.to_rfc3339(),
            e.correlation_ids.join(";"),
            e.payload.to_string(),
            e.prev_hash.clone(),
            e.hash.clone(),
        ];
        let mut row: Vec<String> = fields.iter().map(|f| csv_escape(f)).collect();
        if include_signatures {
            row.push(csv_escape(&e.signature));
        }
        out.push_str(&row.join(","));
        out.push('\n');
    }

    out.into_bytes()
}

/// RFC 4180 quoting: wrap fields containing a comma, quote, or newline,
/// doubling embedded quotes.
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
