use std::convert::TryFrom;

use crate::{CommentId, PostId};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct VoteId(pub i64);

/// Serialized the way the backend stores it: 1 for up, -1 for down
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum VoteType {
    Up,
    Down,
}

impl VoteType {
    /// Decode a record's `vote_status`, where 0 means the viewer has not voted
    pub fn from_status(status: i8) -> Option<VoteType> {
        VoteType::try_from(status).ok()
    }
}

impl TryFrom<i8> for VoteType {
    type Error = String;

    fn try_from(v: i8) -> Result<VoteType, String> {
        match v {
            1 => Ok(VoteType::Up),
            -1 => Ok(VoteType::Down),
            v => Err(format!("invalid vote type {v}, expected 1 or -1")),
        }
    }
}

impl From<VoteType> for i8 {
    fn from(v: VoteType) -> i8 {
        match v {
            VoteType::Up => 1,
            VoteType::Down => -1,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum VoteTarget {
    Post(PostId),
    Comment(CommentId),
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct VoteCounts {
    pub upvote_count: i64,
    pub downvote_count: i64,
}

/// Answer to a brand new vote: the fresh tallies plus the id of the vote row
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CastVote {
    #[serde(flatten)]
    pub counts: VoteCounts,

    #[serde(alias = "post_vote_id", alias = "comment_vote_id")]
    pub vote_id: VoteId,
}
