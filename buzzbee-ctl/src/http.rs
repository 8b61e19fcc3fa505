use anyhow::Context;
use async_trait::async_trait;
use buzzbee_client::{
    api::{
        self, AuthToken, BookmarkId, CastVote, Comment, CommentId, CommentQuery, CommentUpdate,
        Cursor, LoginResponse, NewComment, NewPost, Page, Post, PostId, PostQuery, PostScope,
        PostUpdate, SignIn, SignUp, TokenInfo, Topic, TopicQuery, User, UserExists, UserId,
        VoteCounts, VoteId, VoteTarget, VoteType,
    },
    Backend, Error,
};
use reqwest::{Method, RequestBuilder};

/// The forum's REST API, spoken over HTTP.
///
/// Every call is a single attempt; failed requests are reported as-is.
pub struct HttpBackend {
    client: reqwest::Client,
    host: String,

    /// Sent along with the feeds that are computed from the viewer's follows
    token: Option<AuthToken>,
}

#[derive(serde::Serialize)]
struct VoteBody {
    vote_type: VoteType,
}

#[derive(serde::Serialize)]
struct ContentBody<'a> {
    content: &'a str,
}

#[derive(serde::Serialize)]
struct UsernameBody<'a> {
    username: &'a str,
}

/// The update endpoint echoes the new text back, but not the post id
#[derive(serde::Deserialize)]
struct UpdatedPost {
    title: String,
    content: String,
}

fn vote_path(target: VoteTarget) -> &'static str {
    match target {
        VoteTarget::Post(_) => "postVotes",
        VoteTarget::Comment(_) => "commentVotes",
    }
}

impl HttpBackend {
    pub fn new(host: String) -> HttpBackend {
        HttpBackend {
            client: reqwest::Client::new(),
            host: String::from(host.trim_end_matches('/')),
            token: None,
        }
    }

    pub fn set_token(&mut self, token: Option<AuthToken>) {
        self.token = token;
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/api/{}", self.host, path))
    }

    fn posts_request(&self, q: &PostQuery, cursor: Option<&Cursor>) -> Result<RequestBuilder, Error> {
        let viewer = q.viewer.0;
        let path = match (q.scope, q.topic) {
            (PostScope::All, None) => format!("posts/allPostsByFilter/{viewer}"),
            (PostScope::All, Some(t)) => format!("posts/allPostsByTopic/{}/{viewer}", t.0),
            (PostScope::Following, _) => format!("posts/getPostsByFollow/{viewer}"),
            (PostScope::Personalized, _) => {
                format!("posts/getPostsByPopularityAndFollow/{viewer}")
            }
        };
        let mut req = self
            .request(Method::POST, &path)
            .query(&[("limit", q.limit.to_string()), ("search", q.search.clone())]);
        if let Some(s) = q.sort.as_param() {
            req = req.query(&[("sortBy", s)]);
        }
        if let Some(c) = cursor {
            req = req.query(&[("cursor", c.as_str())]);
        }
        if q.scope != PostScope::All {
            let token = self.token.as_ref().ok_or_else(Error::permission_denied)?;
            req = req.bearer_auth(&token.0);
        }
        Ok(req)
    }

    fn topics_request(&self, q: &TopicQuery, cursor: Option<&Cursor>) -> RequestBuilder {
        let mut req = self
            .request(Method::POST, &format!("topics/GetAllTopics/{}", q.viewer.0))
            .query(&[("limit", q.limit.to_string()), ("search", q.search.clone())]);
        if let Some(s) = q.sort.as_param() {
            req = req.query(&[("sortBy", s)]);
        }
        if let Some(c) = cursor {
            req = req.query(&[("cursor", c.as_str())]);
        }
        req
    }

    fn comments_request(&self, q: &CommentQuery, cursor: Option<&Cursor>) -> RequestBuilder {
        let path = format!("comments/GetCommentsByPostID/{}/{}", q.viewer.0, q.post.0);
        let mut req = self.request(Method::POST, &path).query(&[
            ("limit", q.limit.to_string()),
            ("sortBy", String::from(q.sort.as_param())),
        ]);
        if let Some(c) = cursor {
            req = req.query(&[("cursor", c.as_str())]);
        }
        req
    }

    fn add_post_request(&self, token: &AuthToken, p: &NewPost) -> RequestBuilder {
        let path = format!("posts/addPost/{}/{}", p.topic_id.0, p.user_id.0);
        self.request(Method::POST, &path)
            .bearer_auth(&token.0)
            .json(p)
    }

    fn add_comment_request(&self, token: &AuthToken, c: &NewComment) -> RequestBuilder {
        let parent = match c.parent_comment_id {
            Some(p) => p.0.to_string(),
            None => String::from("null"),
        };
        let path = format!(
            "comments/AddNewComment/{}/{}/{parent}",
            c.user_id.0, c.post_id.0
        );
        self.request(Method::POST, &path)
            .bearer_auth(&token.0)
            .json(&ContentBody {
                content: &c.content,
            })
    }

    async fn send<R>(&self, req: RequestBuilder) -> Result<R, Error>
    where
        R: for<'de> serde::Deserialize<'de>,
    {
        let resp = req.send().await.context("sending request to backend")?;
        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .context("reading response from backend")?;
        if !status.is_success() {
            let err = api::Error::parse(status, &body)
                .with_context(|| format!("backend answered {status} with an unreadable body"))?;
            tracing::warn!(%status, error = %err, "backend refused request");
            return Err(err.into());
        }
        Ok(serde_json::from_slice(&body)?)
    }

    async fn send_empty(&self, req: RequestBuilder) -> Result<(), Error> {
        self.send::<serde_json::Value>(req).await.map(|_| ())
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn sign_up(&self, payload: &SignUp) -> Result<UserId, Error> {
        payload.validate()?;
        self.send(self.request(Method::POST, "users/signup").json(payload))
            .await
    }

    async fn user_exists(&self, username: &str) -> Result<bool, Error> {
        let res: UserExists = self
            .send(
                self.request(Method::POST, "users/checkUserExists")
                    .json(&UsernameBody { username }),
            )
            .await?;
        Ok(res.exists)
    }

    async fn sign_in(&self, payload: &SignIn) -> Result<AuthToken, Error> {
        payload.validate()?;
        let res: LoginResponse = self
            .send(self.request(Method::POST, "users/login").json(payload))
            .await?;
        Ok(res.token)
    }

    async fn verify_token(&self, token: &AuthToken) -> Result<TokenInfo, Error> {
        self.send(self.request(Method::POST, "verifyToken").bearer_auth(&token.0))
            .await
    }

    async fn fetch_user(&self, token: &AuthToken, user: UserId) -> Result<User, Error> {
        let req = self
            .request(Method::POST, &format!("users/{}", user.0))
            .bearer_auth(&token.0);
        self.send(req).await
    }

    async fn fetch_post(&self, viewer: UserId, post: PostId) -> Result<Post, Error> {
        let path = format!("posts/getPostByID/{}/{}", viewer.0, post.0);
        self.send(self.request(Method::POST, &path)).await
    }

    async fn fetch_posts(
        &self,
        query: &PostQuery,
        cursor: Option<&Cursor>,
    ) -> Result<Page<Post>, Error> {
        self.send(self.posts_request(query, cursor)?).await
    }

    async fn fetch_topics(
        &self,
        query: &TopicQuery,
        cursor: Option<&Cursor>,
    ) -> Result<Page<Topic>, Error> {
        self.send(self.topics_request(query, cursor)).await
    }

    async fn fetch_comments(
        &self,
        query: &CommentQuery,
        cursor: Option<&Cursor>,
    ) -> Result<Page<Comment>, Error> {
        self.send(self.comments_request(query, cursor)).await
    }

    async fn fetch_replies(&self, viewer: UserId, parent: CommentId) -> Result<Vec<Comment>, Error> {
        let path = format!("comments/GetReplyByCommentID/{}/{}", viewer.0, parent.0);
        self.send(self.request(Method::POST, &path)).await
    }

    async fn add_post(&self, token: &AuthToken, post: &NewPost) -> Result<Post, Error> {
        post.validate()?;
        self.send(self.add_post_request(token, post)).await
    }

    async fn update_post(&self, token: &AuthToken, update: &PostUpdate) -> Result<PostUpdate, Error> {
        update.validate()?;
        let req = self
            .request(Method::PUT, &format!("posts/updatePost/{}", update.post_id.0))
            .bearer_auth(&token.0)
            .json(update);
        let res: UpdatedPost = self.send(req).await?;
        Ok(PostUpdate {
            post_id: update.post_id,
            title: res.title,
            content: res.content,
        })
    }

    async fn delete_post(&self, token: &AuthToken, post: PostId) -> Result<(), Error> {
        let req = self
            .request(Method::DELETE, &format!("posts/deletePost/{}", post.0))
            .bearer_auth(&token.0);
        self.send_empty(req).await
    }

    async fn add_comment(&self, token: &AuthToken, comment: &NewComment) -> Result<Comment, Error> {
        comment.validate()?;
        self.send(self.add_comment_request(token, comment)).await
    }

    async fn update_comment(
        &self,
        token: &AuthToken,
        update: &CommentUpdate,
    ) -> Result<Comment, Error> {
        update.validate()?;
        let req = self
            .request(
                Method::PUT,
                &format!("comments/UpdateComment/{}", update.comment_id.0),
            )
            .bearer_auth(&token.0)
            .json(&ContentBody {
                content: &update.content,
            });
        self.send(req).await
    }

    async fn delete_comment(&self, token: &AuthToken, comment: CommentId) -> Result<(), Error> {
        let req = self
            .request(Method::DELETE, &format!("comments/DeleteComment/{}", comment.0))
            .bearer_auth(&token.0);
        self.send_empty(req).await
    }

    async fn cast_vote(
        &self,
        token: &AuthToken,
        user: UserId,
        target: VoteTarget,
        vote: VoteType,
    ) -> Result<CastVote, Error> {
        let target_id = match target {
            VoteTarget::Post(p) => p.0,
            VoteTarget::Comment(c) => c.0,
        };
        let path = format!("{}/addVote/{}/{target_id}", vote_path(target), user.0);
        let req = self
            .request(Method::POST, &path)
            .bearer_auth(&token.0)
            .json(&VoteBody { vote_type: vote });
        self.send(req).await
    }

    async fn change_vote(
        &self,
        token: &AuthToken,
        target: VoteTarget,
        vote_id: VoteId,
        vote: VoteType,
    ) -> Result<VoteCounts, Error> {
        let path = format!("{}/updateVote/{}", vote_path(target), vote_id.0);
        let req = self
            .request(Method::PUT, &path)
            .bearer_auth(&token.0)
            .json(&VoteBody { vote_type: vote });
        self.send(req).await
    }

    async fn remove_vote(
        &self,
        token: &AuthToken,
        target: VoteTarget,
        vote_id: VoteId,
    ) -> Result<VoteCounts, Error> {
        let path = format!("{}/deleteVote/{}", vote_path(target), vote_id.0);
        self.send(self.request(Method::DELETE, &path).bearer_auth(&token.0))
            .await
    }

    async fn add_bookmark(
        &self,
        token: &AuthToken,
        user: UserId,
        post: PostId,
    ) -> Result<BookmarkId, Error> {
        let path = format!("postBookmarks/addBookmark/{}/{}", user.0, post.0);
        self.send(self.request(Method::POST, &path).bearer_auth(&token.0))
            .await
    }

    async fn remove_bookmark(&self, token: &AuthToken, bookmark: BookmarkId) -> Result<(), Error> {
        let path = format!("postBookmarks/deleteBookmark/{}", bookmark.0);
        self.send_empty(self.request(Method::DELETE, &path).bearer_auth(&token.0))
            .await
    }
}
