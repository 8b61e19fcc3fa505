use async_trait::async_trait;

use crate::{
    api::{
        AuthToken, BookmarkId, CastVote, Comment, CommentId, CommentQuery, CommentUpdate, Cursor,
        NewComment, NewPost, Page, Post, PostId, PostQuery, PostUpdate, SignIn, SignUp, TokenInfo,
        Topic, TopicQuery, User, UserId, VoteCounts, VoteId, VoteTarget, VoteType,
    },
    Error,
};

/// The remote service doing the actual work: ranking, tallying, storage.
///
/// Writes take the session token; reads take the viewer inside the query so
/// that per-viewer fields (`vote_status`, `is_bookmarked`, ...) come back
/// filled in.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn sign_up(&self, payload: &SignUp) -> Result<UserId, Error>;
    async fn user_exists(&self, username: &str) -> Result<bool, Error>;
    async fn sign_in(&self, payload: &SignIn) -> Result<AuthToken, Error>;
    async fn verify_token(&self, token: &AuthToken) -> Result<TokenInfo, Error>;
    async fn fetch_user(&self, token: &AuthToken, user: UserId) -> Result<User, Error>;

    async fn fetch_post(&self, viewer: UserId, post: PostId) -> Result<Post, Error>;
    async fn fetch_posts(&self, query: &PostQuery, cursor: Option<&Cursor>)
        -> Result<Page<Post>, Error>;
    async fn fetch_topics(
        &self,
        query: &TopicQuery,
        cursor: Option<&Cursor>,
    ) -> Result<Page<Topic>, Error>;
    async fn fetch_comments(
        &self,
        query: &CommentQuery,
        cursor: Option<&Cursor>,
    ) -> Result<Page<Comment>, Error>;

    /// Every currently known descendant of `parent`, flat
    async fn fetch_replies(&self, viewer: UserId, parent: CommentId) -> Result<Vec<Comment>, Error>;

    async fn add_post(&self, token: &AuthToken, post: &NewPost) -> Result<Post, Error>;
    async fn update_post(&self, token: &AuthToken, update: &PostUpdate) -> Result<PostUpdate, Error>;
    async fn delete_post(&self, token: &AuthToken, post: PostId) -> Result<(), Error>;

    async fn add_comment(&self, token: &AuthToken, comment: &NewComment) -> Result<Comment, Error>;
    async fn update_comment(
        &self,
        token: &AuthToken,
        update: &CommentUpdate,
    ) -> Result<Comment, Error>;
    async fn delete_comment(&self, token: &AuthToken, comment: CommentId) -> Result<(), Error>;

    async fn cast_vote(
        &self,
        token: &AuthToken,
        user: UserId,
        target: VoteTarget,
        vote: VoteType,
    ) -> Result<CastVote, Error>;
    async fn change_vote(
        &self,
        token: &AuthToken,
        target: VoteTarget,
        vote_id: VoteId,
        vote: VoteType,
    ) -> Result<VoteCounts, Error>;
    async fn remove_vote(
        &self,
        token: &AuthToken,
        target: VoteTarget,
        vote_id: VoteId,
    ) -> Result<VoteCounts, Error>;

    async fn add_bookmark(
        &self,
        token: &AuthToken,
        user: UserId,
        post: PostId,
    ) -> Result<BookmarkId, Error>;
    async fn remove_bookmark(&self, token: &AuthToken, bookmark: BookmarkId) -> Result<(), Error>;
}
