//! Human-readable rendering of operation trees.

use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};

use fsdiff_common::normalize;

use crate::operation::{Operation, Reason, ReasonKind, Witness};

/// Renders the operation tree without reasons.
pub fn print(op: &Operation) -> String {
    render(op, 0, true, false)
}

/// Renders the operation tree with reason annotations.
pub fn explain(op: &Operation) -> String {
    render(op, 0, true, true)
}

fn render(op: &Operation, level: usize, is_last: bool, with_reasons: bool) -> String {
    if op.is_noop() {
        return "Noop".to_string();
    }

    let mut out = format!("{}{}: {}", prefix(level, is_last), op.operand, op.relative_path);
    if with_reasons {
        if let Some(reason) = op.effective_reason() {
            out.push_str(" — ");
            out.push_str(&format_reason(reason));
        }
    }
    let children = op.children();
    for (idx, child) in children.iter().enumerate() {
        out.push('\n');
        out.push_str(&render(child, level + 1, idx + 1 == children.len(), with_reasons));
    }
    out
}

fn prefix(level: usize, is_last: bool) -> String {
    if level == 0 {
        return String::new();
    }
    let mut out = "│   ".repeat(level - 1);
    out.push_str(if is_last { "└── " } else { "├── " });
    out
}

/// One-line rendering of a reason, as used by [`explain`].
pub fn format_reason(reason: &Reason) -> String {
    match reason.kind {
        ReasonKind::ContentChanged => match (reason.before.len(), reason.after.len()) {
            (Some(before), Some(after)) => {
                format!("content differs (len before {}, after {})", before, after)
            }
            _ => "content differs".to_string(),
        },
        ReasonKind::ModeChanged => format!(
            "mode changed ({} → {})",
            witness_text(&reason.before),
            witness_text(&reason.after)
        ),
        ReasonKind::SizeChanged => format!(
            "size changed ({} → {})",
            witness_text(&reason.before),
            witness_text(&reason.after)
        ),
        ReasonKind::MTimeChanged => format!(
            "mtime changed ({} → {})",
            witness_text(&reason.before),
            witness_text(&reason.after)
        ),
        ReasonKind::TypeChanged => format!(
            "type changed ({} → {})",
            witness_text(&reason.before),
            witness_text(&reason.after)
        ),
        ReasonKind::Missing => format!("missing ({})", witness_text(&reason.before)),
        ReasonKind::Because => format!(
            "because: {} → {}",
            witness_text(&reason.before),
            witness_text(&reason.after)
        ),
    }
}

fn witness_text(witness: &Witness) -> String {
    match witness {
        Witness::None => "none".to_string(),
        Witness::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        Witness::Text(text) => text.clone(),
        Witness::Mode(mode) => format!("0o{:o}", mode),
        Witness::Int(value) => value.to_string(),
        Witness::Time(time) => rfc3339(time),
        Witness::Summary(summary) => match &summary.digest_prefix {
            Some(prefix) => format!("{} bytes ({}…)", summary.size, prefix),
            None => format!("{} bytes", summary.size),
        },
        Witness::Kind(kind) => kind.as_str().to_string(),
        Witness::Globs(globs) => format!("[{}]", globs.join(", ")),
    }
}

/// RFC3339 UTC with second precision.
pub(crate) fn rfc3339(time: &SystemTime) -> String {
    DateTime::<Utc>::from(*time).to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Fully-qualified relative paths of every non-noop leaf operation,
/// excluding the root `.`, in depth-first order.
pub fn collect_paths(op: &Operation) -> Vec<String> {
    let mut out = Vec::new();
    collect(op, "", true, &mut out);
    out
}

fn collect(op: &Operation, prefix: &str, is_root: bool, out: &mut Vec<String>) {
    if op.is_noop() {
        return;
    }
    let path = if is_root {
        String::new()
    } else {
        normalize(prefix, &op.relative_path)
    };
    let children = op.children();
    if children.is_empty() {
        if !is_root && op.relative_path != "." {
            out.push(path);
        }
        return;
    }
    for child in children {
        collect(child, &path, false, out);
    }
}
