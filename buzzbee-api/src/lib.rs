use chrono::Utc;

mod comment;
pub use comment::{Comment, CommentId, CommentQuery, CommentSort, CommentUpdate, NewComment};

mod error;
pub use error::Error;

mod page;
pub use page::{Cursor, Page};

mod post;
pub use post::{slugify, BookmarkId, NewPost, Post, PostId, PostQuery, PostScope, PostSort, PostUpdate};

mod topic;
pub use topic::{Topic, TopicId, TopicQuery, TopicSort};

mod user;
pub use user::{
    AuthToken, LoginResponse, SignIn, SignUp, TokenInfo, User, UserExists, UserId, PASSWORD_LEN,
    USERNAME_LEN,
};

mod vote;
pub use vote::{CastVote, VoteCounts, VoteId, VoteTarget, VoteType};

pub type Time = chrono::DateTime<Utc>;

/// Page size the web client asks for when the caller does not choose one
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

pub const MAX_COMMENT_LEN: usize = 3000;

// The backend stores text in postgres, which rejects NUL bytes, so refuse them
// client-side before sending anything
pub fn validate_string(s: &str) -> Result<(), Error> {
    if s.contains('\0') {
        return Err(Error::NullByteInString(String::from(s)));
    }
    Ok(())
}

pub fn validate_comment_text(s: &str) -> Result<(), Error> {
    validate_string(s)?;
    if s.trim().is_empty() {
        return Err(Error::EmptyText);
    }
    let len = s.chars().count();
    if len > MAX_COMMENT_LEN {
        return Err(Error::TextTooLong {
            len,
            max: MAX_COMMENT_LEN,
        });
    }
    Ok(())
}
