use std::{fmt::Debug, hash::Hash};

use crate::{
    api::{Comment, CommentId, Post, PostId, Topic, TopicId},
    CommentNode,
};

/// Anything that can sit in a paginated list: pages are de-duplicated on
/// `key`, so two items with the same key are the same item
pub trait Identified {
    type Key: Clone + Debug + Eq + Hash;

    fn key(&self) -> Self::Key;
}

impl Identified for Post {
    type Key = PostId;

    fn key(&self) -> PostId {
        self.post_id
    }
}

impl Identified for Topic {
    type Key = TopicId;

    fn key(&self) -> TopicId {
        self.topic_id
    }
}

impl Identified for Comment {
    type Key = CommentId;

    fn key(&self) -> CommentId {
        self.comment_id
    }
}

impl Identified for CommentNode {
    type Key = CommentId;

    fn key(&self) -> CommentId {
        self.comment.comment_id
    }
}
