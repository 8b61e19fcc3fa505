mod age;
pub use age::relative_age;

mod backend;
pub use backend::Backend;

mod comment;
pub use comment::{build_comment_tree, CommentNode};

mod error;
pub use error::Error;

mod feed;
pub use feed::{search_everything, Feed, FeedQuery, LoadOutcome, PageRequest};

mod identity;
pub use identity::Identified;

mod paginated;
pub use paginated::{reconcile_page, Paginated};

mod post;

mod session;
pub use session::{MemoryStore, Session, SessionStore, StoredSession};

mod thread;
pub use thread::{CommentThread, ReplyRequest, ReplyState, ThreadQuery};

mod vote;
pub use vote::{toggle_bookmark, BookmarkAction, VoteAction, VoteState};

pub mod api {
    pub use buzzbee_api::*;
}

pub mod prelude {
    pub use crate::{Backend, FeedQuery, Identified, SessionStore};
}
