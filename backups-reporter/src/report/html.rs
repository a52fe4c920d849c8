//! HTML rendering of the inventory.

use super::{format_size, Report, ReportContext};
use crate::inventory::BackupEntry;

const STYLE: &str = r#"
        body { font-family: Arial, sans-serif; margin: 20px; }
        h1 { color: #333; }
        table { border-collapse: collapse; width: 100%; margin-top: 20px; }
        th, td { border: 1px solid #ddd; padding: 12px; text-align: left; }
        th { background-color: #f2f2f2; font-weight: bold; }
        tr:nth-child(even) { background-color: #f9f9f9; }
        .archive-snapshot { color: #0066cc; }
        .object { color: #ff6600; }
        .timestamp { font-family: monospace; }
        .size { text-align: right; }
"#;

/// Render entries, in the order given, as a self-contained HTML document
pub fn render(entries: &[BackupEntry], context: &ReportContext) -> Report {
    let mut rows = String::new();
    for entry in entries {
        rows.push_str(&row(entry));
    }

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Backups Report</title>
    <style>{style}</style>
</head>
<body>
    <h1>Backups Report</h1>
    <p>Generated on: {generated_at} by {host}</p>
    <p>Total entries: {total}</p>

    <table>
        <thead>
            <tr>
                <th>Source</th>
                <th>Name</th>
                <th>Timestamp (UTC)</th>
                <th>Size</th>
                <th>Type</th>
            </tr>
        </thead>
        <tbody>
{rows}        </tbody>
    </table>
</body>
</html>
"#,
        style = STYLE,
        generated_at = context.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        host = escape(&context.host),
        total = entries.len(),
        rows = rows,
    );

    Report {
        subject: format!(
            "Backups Report - {}",
            context.generated_at.format("%Y-%m-%d %H:%M")
        ),
        html,
        entry_count: entries.len(),
    }
}

fn row(entry: &BackupEntry) -> String {
    format!(
        r#"            <tr>
                <td class="{class}">{source}</td>
                <td>{name}</td>
                <td class="timestamp">{timestamp}</td>
                <td class="size">{size}</td>
                <td>{kind}</td>
            </tr>
"#,
        class = entry.kind.as_str(),
        source = escape(&entry.source_id),
        name = escape(&entry.name),
        timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
        size = format_size(entry.size),
        kind = entry.kind,
    )
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
