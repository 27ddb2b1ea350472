//! System prompt for the bookmark assistant
//!
//! Hands the stored items to the model and asks it to close every reply with
//! a reference block the [`crate::refs`] scanner understands.

use crate::refs::{CLOSE_TAG, OPEN_TAG};
use crate::types::Snapshot;
use tracing::warn;

/// Render the assistant instructions around the snapshot's items.
///
/// With no snapshot the items render as `null`.
pub fn build_system_prompt(snapshot: Option<&Snapshot>) -> String {
    let items = snapshot
        .map(|s| serde_json::to_string_pretty(&s.items))
        .transpose()
        .unwrap_or_else(|e| {
            warn!("Failed to render snapshot items: {e}");
            None
        })
        .unwrap_or_else(|| "null".to_string());

    format!(
        "You are a helpful assistant that knows about the user's saved bookmarks. \
Here are their most recent bookmarks:

{items}

Use this information to answer questions about their bookmarks. Be concise and helpful. \
Do not mention item ids in the message.

IMPORTANT: At the very end of every response, you MUST include a line listing the ids of \
any bookmarks you referenced in your response. Use this exact format on its own line:
{OPEN_TAG}id1,id2,id3{CLOSE_TAG}

If no bookmarks are relevant, output {OPEN_TAG}{CLOSE_TAG} with nothing between the tags. \
Never skip this line."
    )
}
