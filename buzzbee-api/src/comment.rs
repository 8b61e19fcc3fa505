use serde::Deserialize;

use crate::{Error, PostId, Time, UserId, VoteCounts, VoteId, VoteType, DEFAULT_PAGE_LIMIT};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CommentId(pub i64);

/// One comment, flat, exactly as the backend sends it
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub comment_id: CommentId,

    /// `None` for a comment attached directly to its post
    #[serde(deserialize_with = "Option::deserialize")]
    pub parent_comment_id: Option<CommentId>,

    /// Direct replies the backend knows about, loaded or not
    pub reply_count: u32,

    pub post_id: PostId,
    pub user_id: UserId,
    pub username: String,
    pub display_name: String,
    pub image_name: String,
    pub content: String,
    pub created_date: Time,

    pub vote_id: Option<VoteId>,
    pub upvote_count: i64,
    pub downvote_count: i64,
    pub sum_votes: i64,
    pub vote_status: i8,
}

impl Comment {
    pub fn viewer_vote(&self) -> Option<(VoteId, VoteType)> {
        self.vote_id
            .zip(VoteType::from_status(self.vote_status))
    }

    pub fn counts(&self) -> VoteCounts {
        VoteCounts {
            upvote_count: self.upvote_count,
            downvote_count: self.downvote_count,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentSort {
    /// Most voted first, then most replied, then newest
    #[default]
    Buzzing,
    New,
}

impl CommentSort {
    pub fn as_param(&self) -> &'static str {
        match self {
            CommentSort::Buzzing => "buzzing",
            CommentSort::New => "new",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommentQuery {
    pub viewer: UserId,
    pub post: PostId,
    pub sort: CommentSort,
    pub limit: u32,
}

impl CommentQuery {
    pub fn for_post(viewer: UserId, post: PostId) -> CommentQuery {
        CommentQuery {
            viewer,
            post,
            sort: CommentSort::default(),
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewComment {
    pub post_id: PostId,
    pub user_id: UserId,
    pub parent_comment_id: Option<CommentId>,
    pub content: String,
}

impl NewComment {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_comment_text(&self.content)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CommentUpdate {
    pub comment_id: CommentId,
    pub content: String,
}

impl CommentUpdate {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_comment_text(&self.content)
    }
}
