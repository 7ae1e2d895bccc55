//! ASCII rendering of a feed's topology, for the node's `--debug-tree` flag.
//!
//! A text debug aid only — not the excluded HTML visualizer.

use tinyssb_codec::constants::FID_SIZE;

use crate::{error::ReplicateError, manager::FeedManager};

/// Render `fid` and its descendants (children, recursively) as an indented
/// ASCII tree, one line per feed: `<short-fid> (<len> packets)`.
pub fn render_tree(manager: &FeedManager, fid: &[u8; FID_SIZE]) -> Result<String, ReplicateError> {
    let mut out = String::new();
    render_into(manager, fid, 0, &mut out)?;
    Ok(out)
}

fn render_into(
    manager: &FeedManager,
    fid: &[u8; FID_SIZE],
    depth: usize,
    out: &mut String,
) -> Result<(), ReplicateError> {
    let feed = manager.store().open(fid)?;
    let indent = "  ".repeat(depth);
    let marker = if depth == 0 { "" } else { "\\- " };
    out.push_str(&format!("{indent}{marker}{} ({} packets)\n", &hex::encode(fid)[..12], feed.len()));

    for child in manager.store().children_of(fid)? {
        render_into(manager, &child, depth + 1, out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn renders_parent_then_indented_child() {
        let dir = tempdir().unwrap();
        let manager =
            FeedManager::open(dir.path().join("_feeds"), dir.path().join("_blobs")).unwrap();

        let parent_fid = manager.generate_keypair();
        manager.create_feed(parent_fid, manager.key_for(&parent_fid), None).unwrap();
        let child_fid = manager.generate_keypair();
        manager
            .create_child_feed(parent_fid, child_fid, manager.key_for(&child_fid).unwrap())
            .unwrap();

        let tree = render_tree(&manager, &parent_fid).unwrap();
        let mut lines = tree.lines();
        assert!(lines.next().unwrap().contains("packets"));
        assert!(lines.next().unwrap().trim_start().starts_with("\\-"));
    }
}
