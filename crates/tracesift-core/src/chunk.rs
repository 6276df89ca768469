//! Boundary-aware chunking of event views

use crate::types::{Chunk, EventView, Role};

/// Whether cutting between `prev` and `next` would split a bound pair
pub fn should_extend(prev: &EventView, next: &EventView) -> bool {
    matches!(
        (prev.role, next.role),
        (Role::ToolCall, Role::ToolResult)
            | (Role::ToolResult, Role::Assistant)
            | (Role::User, Role::Assistant)
    )
}

/// Split `views` into windows of `window` events overlapping by `overlap`
///
/// A window grows by one event when its last view and the next one form a
/// bound pair. The next window starts `overlap` events before the previous
/// window's (possibly extended) end. Overlap is clamped to `window - 1`.
pub fn chunk_views(views: &[EventView], window: usize, overlap: usize) -> Vec<Chunk> {
    if views.is_empty() || window == 0 {
        return Vec::new();
    }

    let overlap = overlap.min(window - 1);
    let n = views.len();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < n {
        let mut end = (start + window).min(n);
        let mut extended = false;
        if end < n && should_extend(&views[end - 1], &views[end]) {
            end += 1;
            extended = true;
        }

        let slice = &views[start..end];
        chunks.push(Chunk {
            chunk_id: format!("chunk:{}", chunks.len()),
            start_i: slice[0].i,
            end_i: slice[slice.len() - 1].i,
            start,
            end,
            extended,
            views: slice.to_vec(),
        });

        if end >= n {
            break;
        }
        start = end - overlap;
    }

    chunks
}
