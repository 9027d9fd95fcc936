use chrono::FixedOffset;
use companion_core::Message;

/// Timestamp rendering used in every export block.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `[<timestamp>] <role label>: <content>`
pub(crate) fn block(message: &Message, offset: &FixedOffset) -> String {
    format!(
        "[{}] {}: {}",
        message
            .timestamp
            .with_timezone(offset)
            .format(TIMESTAMP_FORMAT),
        message.role.label(),
        message.content
    )
}

/// Blocks in transcript order, separated by one blank line.
pub(crate) fn render(messages: &[Message], offset: &FixedOffset) -> String {
    let mut out = messages
        .iter()
        .map(|m| block(m, offset))
        .collect::<Vec<_>>()
        .join("\n\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}
