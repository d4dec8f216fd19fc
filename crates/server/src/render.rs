#![forbid(unsafe_code)]

use std::fmt::Write as _;
use vu_core::{Evidence, HistoryView, ProviderSummary, Receipt};

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Percent-encodes a query parameter value.
fn encode_query(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}

pub struct VerifyPage<'a> {
    pub cert_id: &'a str,
    pub evidence: &'a Evidence,
    pub history: &'a HistoryView,
    /// Rows to display; the full history when no filter is active.
    pub rows: &'a [&'a Receipt],
    pub query: &'a str,
}

impl VerifyPage<'_> {
    pub fn render(&self) -> String {
        let cert = escape_html(self.cert_id);
        let mut html = String::with_capacity(4096);
        let _ = write!(
            html,
            "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>Verify {cert}</title>\n<link rel=\"stylesheet\" href=\"/static/verify.css\">\n\
             </head>\n<body>\n<main>\n<h1>Certificate <code>{cert}</code></h1>\n"
        );
        self.render_summary(&mut html);
        self.render_evidence(&mut html);
        self.render_history(&mut html);
        html.push_str("</main>\n</body>\n</html>\n");
        html
    }

    fn render_summary(&self, html: &mut String) {
        html.push_str("<section class=\"summary\">\n");
        summary_card(html, "Timestamp (TSA)", &self.history.tsa);
        summary_card(html, "Chain anchor", &self.history.chain);
        html.push_str("</section>\n");
    }

    fn render_evidence(&self, html: &mut String) {
        let ev = self.evidence;
        html.push_str("<section class=\"evidence\">\n<h2>Evidence</h2>\n");
        if ev.is_empty() {
            html.push_str("<p class=\"muted\">No evidence recorded for this certificate.</p>\n</section>\n");
            return;
        }
        html.push_str("<dl>\n");
        for (label, value) in [
            ("Title", &ev.title),
            ("Owner", &ev.owner),
            ("File", &ev.file_path),
            ("SHA-256", &ev.sha256),
            ("C2PA claim", &ev.c2pa_claim),
            ("C2PA signer", &ev.c2pa_signed_by),
            ("TSA URL", &ev.tsa_url),
            ("Sepolia tx", &ev.sepolia_txhash),
            ("Recorded", &ev.created_at),
        ] {
            if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
                let _ = writeln!(
                    html,
                    "<dt>{label}</dt><dd><code>{}</code></dd>",
                    escape_html(value)
                );
            }
        }
        if ev.tsq_b64.as_deref().is_some_and(|v| !v.is_empty()) {
            html.push_str("<dt>TSA query</dt><dd>stored</dd>\n");
        }
        if ev.tsr_b64.as_deref().is_some_and(|v| !v.is_empty()) {
            html.push_str("<dt>TSA response</dt><dd>stored</dd>\n");
        }
        html.push_str("</dl>\n</section>\n");
    }

    fn render_history(&self, html: &mut String) {
        let cert_q = encode_query(self.cert_id);
        let query = escape_html(self.query);
        let mut export = format!("/api/receipts/export?cert_id={cert_q}");
        if !self.query.trim().is_empty() {
            let _ = write!(export, "&q={}", encode_query(self.query));
        }
        let _ = write!(
            html,
            "<section class=\"history\">\n<h2>Receipts</h2>\n\
             <form method=\"get\">\n<input type=\"search\" name=\"q\" value=\"{query}\" \
             placeholder=\"provider:tsa status:ok txid:0x\">\n<button type=\"submit\">Filter</button>\n\
             <a class=\"export\" href=\"{}\">Export CSV</a>\n</form>\n",
            escape_html(&export)
        );
        if let Some(source) = self.history.source.as_deref() {
            let _ = writeln!(
                html,
                "<p class=\"muted\">Source: {}</p>",
                escape_html(source)
            );
        }
        if self.rows.is_empty() {
            html.push_str("<p class=\"muted\">No receipts.</p>\n</section>\n");
            return;
        }
        html.push_str(
            "<table>\n<thead><tr><th>#</th><th>Provider</th><th>Status</th><th>TXID</th>\
             <th>Time</th></tr></thead>\n<tbody>\n",
        );
        for (index, receipt) in self.rows.iter().enumerate() {
            let _ = writeln!(
                html,
                "<tr><td>{}</td><td>{}</td><td class=\"status-{}\">{}</td><td><code>{}</code></td><td>{}</td></tr>",
                index + 1,
                escape_html(receipt.provider.as_str()),
                status_class(&receipt.status),
                escape_html(&receipt.status),
                escape_html(receipt.txid_str()),
                escape_html(&receipt.created_at),
            );
        }
        html.push_str("</tbody>\n</table>\n</section>\n");
    }
}

fn summary_card(html: &mut String, title: &str, summary: &ProviderSummary) {
    let status = summary.status.as_deref().unwrap_or("none");
    let txid = summary.txid.as_deref().unwrap_or("-");
    let _ = write!(
        html,
        "<div class=\"card\">\n<h3>{title}</h3>\n<p class=\"status-{}\">{}</p>\n\
         <p><code>{}</code></p>\n</div>\n",
        status_class(status),
        escape_html(status),
        escape_html(txid)
    );
}

fn status_class(status: &str) -> &'static str {
    match status.to_ascii_lowercase().as_str() {
        "ok" | "success" | "confirmed" => "ok",
        "pending" | "submitted" => "pending",
        "error" | "failed" | "fail" => "error",
        _ => "other",
    }
}
