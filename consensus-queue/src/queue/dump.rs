//! Operator-facing dumps of the queue contents.

use std::fmt::Write;

use crate::operation::OpPayload;
use crate::queue::Inner;
use crate::queue::PeerMessageQueue;

impl PeerMessageQueue {
    /// Append a line-oriented dump of the watermarks map and the messages
    /// buffer to `lines`.
    pub fn dump_to_strings(&self, lines: &mut Vec<String>) {
        let inner = self.inner.lock();
        Self::dump_to_strings_locked(&inner, lines);
    }

    fn dump_to_strings_locked(inner: &Inner, lines: &mut Vec<String>) {
        lines.push("Watermarks:".to_string());
        for (peer, watermarks) in &inner.watermarks {
            lines.push(format!("Peer: {} Watermark: {}", peer, watermarks));
        }

        lines.push("Messages:".to_string());
        for (counter, (id, ost)) in inner.messages.iter().enumerate() {
            let operation = ost.operation();
            match operation.payload() {
                OpPayload::Replicate { .. } => lines.push(format!(
                    "Message[{}] {} : REPLICATE. Size: {}, Status: {}",
                    counter,
                    id,
                    operation.byte_size(),
                    ost
                )),
                OpPayload::Commit { committed_op_id, .. } => lines.push(format!(
                    "Message[{}] {} : COMMIT. Committed OpId: {} Size: {}, Status: {}",
                    counter,
                    id,
                    committed_op_id,
                    operation.byte_size(),
                    ost
                )),
            }
        }
    }

    /// Render the watermarks map and the messages buffer as HTML tables with
    /// escaped cells.
    pub fn dump_to_html<W: Write>(&self, out: &mut W) -> std::fmt::Result {
        let inner = self.inner.lock();

        writeln!(out, "<h3>Watermarks</h3>")?;
        writeln!(out, "<table>")?;
        writeln!(out, "  <tr><th>Peer</th><th>Watermark</th></tr>")?;
        for (peer, watermarks) in &inner.watermarks {
            writeln!(
                out,
                "  <tr><td>{}</td><td>{}</td></tr>",
                escape_html(peer),
                escape_html(&watermarks.to_string())
            )?;
        }
        writeln!(out, "</table>")?;

        writeln!(out, "<h3>Messages</h3>")?;
        writeln!(out, "<table>")?;
        writeln!(out, "<tr><th>Entry</th><th>OpId</th><th>Type</th><th>Size</th><th>Status</th></tr>")?;
        for (counter, (id, ost)) in inner.messages.iter().enumerate() {
            let operation = ost.operation();
            let kind = match operation.payload() {
                OpPayload::Replicate { .. } => "REPLICATE".to_string(),
                OpPayload::Commit { committed_op_id, .. } => format!("COMMIT {}", committed_op_id),
            };
            writeln!(
                out,
                "<tr><th>{}</th><th>{}</th><td>{}</td><td>{}</td><td>{}</td></tr>",
                counter,
                id,
                kind,
                operation.byte_size(),
                escape_html(&ost.to_string())
            )?;
        }
        writeln!(out, "</table>")?;

        Ok(())
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
