use std::collections::{HashMap, HashSet};

use crate::api::{Comment, CommentId};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommentNode {
    pub comment: Comment,

    /// Loaded direct replies, in the order the backend sent them
    pub reply_children: Vec<CommentNode>,
}

impl CommentNode {
    pub fn new(comment: Comment) -> CommentNode {
        CommentNode {
            comment,
            reply_children: Vec::new(),
        }
    }

    pub fn id(&self) -> CommentId {
        self.comment.comment_id
    }

    /// Whether the backend knows of direct replies that are not loaded yet
    pub fn has_more_replies(&self) -> bool {
        self.reply_children.len() < self.comment.reply_count as usize
    }

    pub fn find_in<'a>(
        forest: &'a mut [CommentNode],
        id: &CommentId,
    ) -> Option<&'a mut CommentNode> {
        for c in forest.iter_mut() {
            if c.comment.comment_id == *id {
                return Some(c);
            }
            if let Some(res) = CommentNode::find_in(&mut c.reply_children, id) {
                return Some(res);
            }
        }
        None
    }

    pub fn find<'a>(forest: &'a [CommentNode], id: &CommentId) -> Option<&'a CommentNode> {
        for c in forest.iter() {
            if c.comment.comment_id == *id {
                return Some(c);
            }
            if let Some(res) = CommentNode::find(&c.reply_children, id) {
                return Some(res);
            }
        }
        None
    }

    /// Attach a reply the viewer just posted
    pub fn add_reply(&mut self, reply: Comment) {
        self.reply_children.push(CommentNode::new(reply));
        self.comment.reply_count += 1;
    }

    /// Remove a comment and everything under it, keeping the parent's
    /// `reply_count` in sync
    pub fn remove_from(forest: &mut Vec<CommentNode>, id: &CommentId) -> Option<CommentNode> {
        if let Some(pos) = forest.iter().position(|c| c.comment.comment_id == *id) {
            return Some(forest.remove(pos));
        }
        for c in forest.iter_mut() {
            if let Some(removed) = CommentNode::remove_from(&mut c.reply_children, id) {
                if removed.comment.parent_comment_id == Some(c.comment.comment_id) {
                    c.comment.reply_count = c.comment.reply_count.saturating_sub(1);
                }
                return Some(removed);
            }
        }
        None
    }

    /// Depth-first walk, yielding each node with its nesting depth
    pub fn walk<'a>(forest: &'a [CommentNode]) -> Vec<(usize, &'a CommentNode)> {
        fn go<'a>(forest: &'a [CommentNode], depth: usize, res: &mut Vec<(usize, &'a CommentNode)>) {
            for c in forest {
                res.push((depth, c));
                go(&c.reply_children, depth + 1, res);
            }
        }
        let mut res = Vec::new();
        go(forest, 0, &mut res);
        res
    }
}

/// Nest the flat `records` under `parent` (`None` for the comments attached
/// directly to the post).
///
/// Order among siblings is the order of `records`. Records whose parent is
/// not reachable from `parent` inside `records` are left out: attaching them
/// to nodes loaded by earlier fetches is the caller's job. Each comment id is
/// placed at most once, so duplicated or cyclic records cannot loop.
pub fn build_comment_tree(
    records: impl IntoIterator<Item = Comment>,
    parent: Option<CommentId>,
) -> Vec<CommentNode> {
    let mut slots = Vec::new();
    let mut children: HashMap<Option<CommentId>, Vec<usize>> = HashMap::new();
    for (i, c) in records.into_iter().enumerate() {
        children.entry(c.parent_comment_id).or_default().push(i);
        slots.push(Some(c));
    }

    let mut placed = HashSet::new();
    placed.extend(parent);
    let res = assemble(&mut slots, &children, &mut placed, parent);

    let left_out = slots.iter().filter(|s| s.is_some()).count();
    if left_out > 0 {
        tracing::debug!(?parent, left_out, "comments not reachable from the requested parent");
    }
    res
}

fn assemble(
    slots: &mut [Option<Comment>],
    children: &HashMap<Option<CommentId>, Vec<usize>>,
    placed: &mut HashSet<CommentId>,
    parent: Option<CommentId>,
) -> Vec<CommentNode> {
    let mut res = Vec::new();
    for &i in children.get(&parent).map(|v| v.as_slice()).unwrap_or(&[]) {
        let comment = match slots[i].take() {
            Some(c) => c,
            None => continue,
        };
        if !placed.insert(comment.comment_id) {
            tracing::warn!(id = ?comment.comment_id, "comment appears twice in one fetch");
            continue;
        }
        let reply_children = assemble(slots, children, placed, Some(comment.comment_id));
        res.push(CommentNode {
            comment,
            reply_children,
        });
    }
    res
}
