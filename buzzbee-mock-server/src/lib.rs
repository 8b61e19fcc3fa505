use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use buzzbee_client::{
    api::{
        self, AuthToken, BookmarkId, CastVote, Comment, CommentId, CommentQuery, CommentSort,
        CommentUpdate, Cursor, NewComment, NewPost, Page, Post, PostId, PostQuery, PostScope,
        PostSort, PostUpdate, SignIn, SignUp, Time, TokenInfo, Topic, TopicId, TopicQuery,
        TopicSort, User, UserId, VoteCounts, VoteId, VoteTarget, VoteType,
    },
    Backend, Error,
};
use tokio::sync::{Mutex, MutexGuard};

/// Listings are sorted ascending on this, most relevant first
type SortKey = (i64, i64, i64, String, i64);

/// Above this many top-level comments, replies are left out of comment pages
pub const INLINE_REPLIES_THRESHOLD: usize = 10;

/// In-memory stand-in for the forum backend
pub struct MockServer(Mutex<Forum>);

impl MockServer {
    pub fn new() -> MockServer {
        MockServer(Mutex::new(Forum::new()))
    }

    pub async fn lock(&self) -> MutexGuard<'_, Forum> {
        self.0.lock().await
    }
}

impl Default for MockServer {
    fn default() -> MockServer {
        MockServer::new()
    }
}

impl From<Forum> for MockServer {
    fn from(f: Forum) -> MockServer {
        MockServer(Mutex::new(f))
    }
}

#[derive(Debug)]
struct DbUser {
    user: User,
    pass: String,
}

#[derive(Debug)]
struct DbVote {
    owner: UserId,
    target: VoteTarget,
    vote: VoteType,
}

#[derive(Debug)]
pub struct Forum {
    users: BTreeMap<UserId, DbUser>,
    sessions: HashMap<AuthToken, UserId>,
    topics: BTreeMap<TopicId, Topic>,
    posts: BTreeMap<PostId, Post>,
    comments: BTreeMap<CommentId, Comment>,
    votes: BTreeMap<VoteId, DbVote>,
    bookmarks: BTreeMap<BookmarkId, (UserId, PostId)>,
    follows: HashSet<(UserId, TopicId)>,
    last_id: i64,
    epoch: Time,
    failures: Vec<api::Error>,
    page_overlap: bool,
    reads: usize,
}

impl Default for Forum {
    fn default() -> Forum {
        Forum::new()
    }
}

impl Forum {
    pub fn new() -> Forum {
        Forum {
            users: BTreeMap::new(),
            sessions: HashMap::new(),
            topics: BTreeMap::new(),
            posts: BTreeMap::new(),
            comments: BTreeMap::new(),
            votes: BTreeMap::new(),
            bookmarks: BTreeMap::new(),
            follows: HashSet::new(),
            last_id: 0,
            epoch: chrono::Utc::now(),
            failures: Vec::new(),
            page_overlap: false,
            reads: 0,
        }
    }

    /// Ids are shared across all tables, and each new record is one minute
    /// younger than the previous one
    fn next_id(&mut self) -> (i64, Time) {
        self.last_id += 1;
        (
            self.last_id,
            self.epoch + chrono::Duration::minutes(self.last_id),
        )
    }

    /// Return name & pass for user number `id`
    pub fn test_get_user_info(&self, id: usize) -> (&str, &str) {
        let u = self
            .users
            .values()
            .nth(id)
            .unwrap_or_else(|| panic!("getting user {id} among {}", self.users.len()));
        (&u.user.username, &u.pass)
    }

    pub fn test_num_users(&self) -> usize {
        self.users.len()
    }

    /// Make the next backend call fail with `err`
    pub fn test_fail_next(&mut self, err: api::Error) {
        self.failures.insert(0, err);
    }

    /// Repeat the last item of the previous page at the start of each
    /// continuation page, like a backend with a loose cursor boundary
    pub fn test_set_page_overlap(&mut self, overlap: bool) {
        self.page_overlap = overlap;
    }

    /// Number of listing fetches served so far
    pub fn test_num_reads(&self) -> usize {
        self.reads
    }

    pub fn test_comments(&self) -> impl Iterator<Item = &Comment> {
        self.comments.values()
    }

    fn take_failure(&mut self) -> Result<(), api::Error> {
        match self.failures.pop() {
            Some(e) => {
                tracing::debug!(error = %e, "injecting failure");
                Err(e)
            }
            None => Ok(()),
        }
    }

    pub fn admin_create_user(&mut self, name: &str, password: &str) -> Result<UserId, api::Error> {
        self.insert_user(
            &SignUp {
                username: String::from(name),
                password: String::from(password),
                display_name: None,
                bio: None,
                image_id: 0,
            },
            String::from("default.png"),
        )
    }

    fn insert_user(&mut self, s: &SignUp, image_name: String) -> Result<UserId, api::Error> {
        api::validate_string(&s.username)?;
        if self.username_taken(&s.username) {
            return Err(api::Error::NameAlreadyUsed(s.username.clone()));
        }
        let (id, now) = self.next_id();
        let user = User {
            user_id: UserId(id),
            username: s.username.clone(),
            display_name: s.display_name.clone(),
            bio: s.bio.clone(),
            image_name,
            created_date: now,
        };
        self.users.insert(
            user.user_id,
            DbUser {
                user,
                pass: s.password.clone(),
            },
        );
        Ok(UserId(id))
    }

    fn username_taken(&self, name: &str) -> bool {
        self.users.values().any(|u| u.user.username == name)
    }

    pub fn admin_create_topic(
        &mut self,
        owner: UserId,
        name: &str,
        description: &str,
        category: &str,
    ) -> Result<TopicId, api::Error> {
        api::validate_string(name)?;
        api::validate_string(description)?;
        if self.topics.values().any(|t| t.topic_name == name) {
            return Err(api::Error::NameAlreadyUsed(String::from(name)));
        }
        let author = self.user(owner)?.clone();
        let (id, now) = self.next_id();
        self.topics.insert(
            TopicId(id),
            Topic {
                topic_id: TopicId(id),
                topic_user_id: owner,
                username: author.username,
                display_name: author.display_name.unwrap_or_default(),
                image_name: author.image_name,
                topic_name: String::from(name),
                topic_url: name.to_lowercase().replace(' ', "-"),
                description: String::from(description),
                visibility: String::from("public"),
                created_date: now,
                category_name: String::from(category),
                category_icon: format!("{}.svg", category.to_lowercase()),
                followers_count: 0,
                posts_count: 0,
                is_following: false,
            },
        );
        Ok(TopicId(id))
    }

    /// Insert a post without going through a session; its url is derived
    /// from the title
    pub fn admin_create_post(
        &mut self,
        owner: UserId,
        topic: TopicId,
        title: &str,
        content: &str,
    ) -> Result<PostId, api::Error> {
        self.insert_post(owner, topic, title, content, None)
    }

    fn insert_post(
        &mut self,
        owner: UserId,
        topic: TopicId,
        title: &str,
        content: &str,
        url: Option<&str>,
    ) -> Result<PostId, api::Error> {
        api::validate_string(title)?;
        api::validate_string(content)?;
        let author = self.user(owner)?.clone();
        let t = self
            .topics
            .get(&topic)
            .ok_or_else(|| api::Error::NotFound(format!("topic {}", topic.0)))?
            .clone();
        if let Some(u) = url {
            if self.posts.values().any(|p| p.post_url == u) {
                return Err(api::Error::NameAlreadyUsed(String::from(u)));
            }
        }
        let (id, now) = self.next_id();
        self.posts.insert(
            PostId(id),
            Post {
                post_id: PostId(id),
                post_url: match url {
                    Some(u) => String::from(u),
                    None => format!("{}-{id}", api::slugify(title)),
                },
                user_id: owner,
                username: author.username,
                display_name: author.display_name.unwrap_or_default(),
                user_image: author.image_name,
                topic_id: topic,
                topic_name: t.topic_name,
                topic_url: t.topic_url,
                category_icon: t.category_icon,
                tag_name: None,
                tag_icon: None,
                tag_description: None,
                title: String::from(title),
                content: String::from(content),
                created_date: now,
                vote_id: None,
                upvote_count: 0,
                downvote_count: 0,
                sum_votes: 0,
                vote_status: 0,
                comment_count: 0,
                bookmark_id: None,
                is_bookmarked: false,
                is_following: None,
            },
        );
        Ok(PostId(id))
    }

    pub fn admin_follow(&mut self, user: UserId, topic: TopicId) -> Result<(), api::Error> {
        self.user(user)?;
        if !self.topics.contains_key(&topic) {
            return Err(api::Error::NotFound(format!("topic {}", topic.0)));
        }
        self.follows.insert((user, topic));
        Ok(())
    }

    /// Insert a comment without going through a session
    pub fn admin_add_comment(&mut self, new: &NewComment) -> Result<CommentId, api::Error> {
        new.validate()?;
        let author = self.user(new.user_id)?.clone();
        if !self.posts.contains_key(&new.post_id) {
            return Err(api::Error::NotFound(format!("post {}", new.post_id.0)));
        }
        if let Some(p) = &new.parent_comment_id {
            match self.comments.get(p) {
                Some(parent) if parent.post_id == new.post_id => (),
                Some(_) => {
                    return Err(api::Error::InvalidRequest(String::from(
                        "parent comment is on another post",
                    )))
                }
                None => return Err(api::Error::NotFound(format!("comment {}", p.0))),
            }
        }
        let (id, now) = self.next_id();
        self.comments.insert(
            CommentId(id),
            Comment {
                comment_id: CommentId(id),
                parent_comment_id: new.parent_comment_id,
                reply_count: 0,
                post_id: new.post_id,
                user_id: new.user_id,
                username: author.username,
                display_name: author.display_name.unwrap_or_default(),
                image_name: author.image_name,
                content: new.content.clone(),
                created_date: now,
                vote_id: None,
                upvote_count: 0,
                downvote_count: 0,
                sum_votes: 0,
                vote_status: 0,
            },
        );
        Ok(CommentId(id))
    }

    pub fn admin_vote(
        &mut self,
        user: UserId,
        target: VoteTarget,
        vote: VoteType,
    ) -> Result<VoteId, api::Error> {
        self.user(user)?;
        self.check_target(target)?;
        if self.viewer_vote(user, target).is_some() {
            return Err(api::Error::NameAlreadyUsed(String::from("vote")));
        }
        let (id, _) = self.next_id();
        self.votes.insert(
            VoteId(id),
            DbVote {
                owner: user,
                target,
                vote,
            },
        );
        Ok(VoteId(id))
    }

    fn user(&self, id: UserId) -> Result<&User, api::Error> {
        self.users
            .get(&id)
            .map(|u| &u.user)
            .ok_or_else(|| api::Error::NotFound(format!("user {}", id.0)))
    }

    fn resolve(&self, tok: &AuthToken) -> Result<UserId, api::Error> {
        self.sessions
            .get(tok)
            .copied()
            .ok_or(api::Error::PermissionDenied)
    }

    fn check_target(&self, target: VoteTarget) -> Result<(), api::Error> {
        let exists = match target {
            VoteTarget::Post(p) => self.posts.contains_key(&p),
            VoteTarget::Comment(c) => self.comments.contains_key(&c),
        };
        match exists {
            true => Ok(()),
            false => Err(api::Error::NotFound(format!("{target:?}"))),
        }
    }

    fn counts(&self, target: VoteTarget) -> VoteCounts {
        let mut res = VoteCounts::default();
        for v in self.votes.values().filter(|v| v.target == target) {
            match v.vote {
                VoteType::Up => res.upvote_count += 1,
                VoteType::Down => res.downvote_count += 1,
            }
        }
        res
    }

    fn viewer_vote(&self, viewer: UserId, target: VoteTarget) -> Option<(VoteId, VoteType)> {
        self.votes
            .iter()
            .find(|(_, v)| v.owner == viewer && v.target == target)
            .map(|(id, v)| (*id, v.vote))
    }

    fn owned_vote(
        &self,
        user: UserId,
        target: VoteTarget,
        id: VoteId,
    ) -> Result<(), api::Error> {
        match self.votes.get(&id) {
            Some(v) if v.target != target => Err(api::Error::NotFound(format!("vote {}", id.0))),
            Some(v) if v.owner != user => Err(api::Error::PermissionDenied),
            Some(_) => Ok(()),
            None => Err(api::Error::NotFound(format!("vote {}", id.0))),
        }
    }

    fn reply_count(&self, id: CommentId) -> u32 {
        self.comments
            .values()
            .filter(|c| c.parent_comment_id == Some(id))
            .count() as u32
    }

    fn comment_for(&self, viewer: UserId, c: &Comment) -> Comment {
        let target = VoteTarget::Comment(c.comment_id);
        let counts = self.counts(target);
        let vote = self.viewer_vote(viewer, target);
        Comment {
            reply_count: self.reply_count(c.comment_id),
            vote_id: vote.map(|(id, _)| id),
            vote_status: vote.map(|(_, v)| i8::from(v)).unwrap_or(0),
            upvote_count: counts.upvote_count,
            downvote_count: counts.downvote_count,
            sum_votes: counts.upvote_count - counts.downvote_count,
            ..c.clone()
        }
    }

    fn post_for(&self, viewer: UserId, p: &Post) -> Post {
        let target = VoteTarget::Post(p.post_id);
        let counts = self.counts(target);
        let vote = self.viewer_vote(viewer, target);
        let bookmark = self
            .bookmarks
            .iter()
            .find(|(_, (u, post))| *u == viewer && *post == p.post_id)
            .map(|(id, _)| *id);
        Post {
            vote_id: vote.map(|(id, _)| id),
            vote_status: vote.map(|(_, v)| i8::from(v)).unwrap_or(0),
            upvote_count: counts.upvote_count,
            downvote_count: counts.downvote_count,
            sum_votes: counts.upvote_count - counts.downvote_count,
            comment_count: self
                .comments
                .values()
                .filter(|c| c.post_id == p.post_id)
                .count() as u32,
            bookmark_id: bookmark,
            is_bookmarked: bookmark.is_some(),
            is_following: match viewer.is_anonymous() {
                true => None,
                false => Some(self.follows.contains(&(viewer, p.topic_id))),
            },
            ..p.clone()
        }
    }

    fn topic_for(&self, viewer: UserId, t: &Topic) -> Topic {
        Topic {
            followers_count: self
                .follows
                .iter()
                .filter(|(_, topic)| *topic == t.topic_id)
                .count() as u32,
            posts_count: self
                .posts
                .values()
                .filter(|p| p.topic_id == t.topic_id)
                .count() as u32,
            is_following: self.follows.contains(&(viewer, t.topic_id)),
            ..t.clone()
        }
    }

    /// Keyset pagination: fetch one more row than asked to know whether a
    /// cursor is needed
    fn page_of<T>(
        &mut self,
        mut rows: Vec<(SortKey, T)>,
        cursor: Option<&Cursor>,
        limit: u32,
    ) -> Result<Page<T>, api::Error> {
        self.reads += 1;
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        let after = cursor.map(decode_cursor).transpose()?;
        let overlap = self.page_overlap;
        let mut rows = rows
            .into_iter()
            .filter(|(k, _)| match &after {
                None => true,
                Some(a) if overlap => k >= a,
                Some(a) => k > a,
            })
            .collect::<Vec<_>>();
        let limit = limit.max(1) as usize;
        let cursor = match rows.len() > limit {
            true => {
                rows.truncate(limit);
                rows.last().map(|(k, _)| encode_cursor(k)).transpose()?
            }
            false => None,
        };
        Ok(Page::new(rows.into_iter().map(|(_, t)| t).collect(), cursor))
    }

    fn list_posts(&mut self, q: &PostQuery, cursor: Option<&Cursor>) -> Result<Page<Post>, api::Error> {
        if q.scope != PostScope::All {
            self.user(q.viewer).map_err(|_| api::Error::PermissionDenied)?;
        }
        if let Some(t) = &q.topic {
            if !self.topics.contains_key(t) {
                return Err(api::Error::NotFound(format!("topic {}", t.0)));
            }
        }
        let search = q.search.to_lowercase();
        let rows = self
            .posts
            .values()
            .filter(|p| q.topic.map_or(true, |t| p.topic_id == t))
            .filter(|p| {
                p.title.to_lowercase().contains(&search) || p.content.to_lowercase().contains(&search)
            })
            .filter(|p| {
                q.scope != PostScope::Following || self.follows.contains(&(q.viewer, p.topic_id))
            })
            .map(|p| self.post_for(q.viewer, p))
            .map(|p| {
                let created = -p.created_date.timestamp();
                let followed = self.follows.contains(&(q.viewer, p.topic_id));
                let key = match (q.scope, q.sort) {
                    (PostScope::Personalized, _) => {
                        (!followed as i64, -p.sum_votes, created, String::new(), -p.post_id.0)
                    }
                    (_, PostSort::Buzzing) => {
                        (-p.sum_votes, -p.upvote_count, created, String::new(), -p.post_id.0)
                    }
                    (_, PostSort::New) => (created, 0, 0, String::new(), -p.post_id.0),
                    (_, PostSort::Alpha) => (0, 0, 0, p.title.to_lowercase(), p.post_id.0),
                };
                (key, p)
            })
            .collect();
        self.page_of(rows, cursor, q.limit)
    }

    fn list_topics(
        &mut self,
        q: &TopicQuery,
        cursor: Option<&Cursor>,
    ) -> Result<Page<Topic>, api::Error> {
        let search = q.search.to_lowercase();
        let rows = self
            .topics
            .values()
            .filter(|t| {
                t.topic_name.to_lowercase().contains(&search)
                    || t.description.to_lowercase().contains(&search)
            })
            .map(|t| self.topic_for(q.viewer, t))
            .map(|t| {
                let created = -t.created_date.timestamp();
                let key = match q.sort {
                    TopicSort::Buzzing => (
                        -(t.followers_count as i64),
                        -(t.posts_count as i64),
                        created,
                        String::new(),
                        -t.topic_id.0,
                    ),
                    TopicSort::New => (created, 0, 0, String::new(), -t.topic_id.0),
                    TopicSort::Alpha => (0, 0, 0, t.topic_name.to_lowercase(), t.topic_id.0),
                };
                (key, t)
            })
            .collect();
        self.page_of(rows, cursor, q.limit)
    }

    fn list_comments(
        &mut self,
        q: &CommentQuery,
        cursor: Option<&Cursor>,
    ) -> Result<Page<Comment>, api::Error> {
        if !self.posts.contains_key(&q.post) {
            return Err(api::Error::NotFound(format!("post {}", q.post.0)));
        }
        let on_post = self.comments.values().filter(|c| c.post_id == q.post);
        let top_level = on_post
            .clone()
            .filter(|c| c.parent_comment_id.is_none())
            .count();
        let with_replies = top_level <= INLINE_REPLIES_THRESHOLD;
        let rows = on_post
            .filter(|c| with_replies || c.parent_comment_id.is_none())
            .map(|c| self.comment_for(q.viewer, c))
            .map(|c| {
                let created = -c.created_date.timestamp();
                let replies = -(c.reply_count as i64);
                let key = match q.sort {
                    CommentSort::Buzzing => {
                        (-c.sum_votes, replies, created, String::new(), -c.comment_id.0)
                    }
                    CommentSort::New => (created, -c.sum_votes, replies, String::new(), -c.comment_id.0),
                };
                (key, c)
            })
            .collect();
        self.page_of(rows, cursor, q.limit)
    }

    /// All descendants of `parent`, oldest first
    fn list_replies(&mut self, viewer: UserId, parent: CommentId) -> Result<Vec<Comment>, api::Error> {
        if !self.comments.contains_key(&parent) {
            return Err(api::Error::NotFound(format!("comment {}", parent.0)));
        }
        self.reads += 1;
        let mut found = HashSet::new();
        let mut frontier = vec![parent];
        while let Some(p) = frontier.pop() {
            for c in self.comments.values() {
                if c.parent_comment_id == Some(p) && found.insert(c.comment_id) {
                    frontier.push(c.comment_id);
                }
            }
        }
        let mut res = self
            .comments
            .values()
            .filter(|c| found.contains(&c.comment_id))
            .map(|c| self.comment_for(viewer, c))
            .collect::<Vec<_>>();
        res.sort_by_key(|c| (c.created_date, c.comment_id));
        Ok(res)
    }

    fn owned_post(&self, user: UserId, post: PostId) -> Result<(), api::Error> {
        match self.posts.get(&post) {
            Some(p) if p.user_id == user => Ok(()),
            Some(_) => Err(api::Error::PermissionDenied),
            None => Err(api::Error::NotFound(format!("post {}", post.0))),
        }
    }

    fn delete_post_with_everything(&mut self, id: PostId) {
        let comments = self
            .comments
            .values()
            .filter(|c| c.post_id == id)
            .map(|c| c.comment_id)
            .collect::<HashSet<_>>();
        self.comments.retain(|c, _| !comments.contains(c));
        self.votes.retain(|_, v| match v.target {
            VoteTarget::Post(p) => p != id,
            VoteTarget::Comment(c) => !comments.contains(&c),
        });
        self.bookmarks.retain(|_, (_, p)| *p != id);
        self.posts.remove(&id);
    }

    fn delete_comment_tree(&mut self, id: CommentId) {
        let children = self
            .comments
            .values()
            .filter(|c| c.parent_comment_id == Some(id))
            .map(|c| c.comment_id)
            .collect::<Vec<_>>();
        for c in children {
            self.delete_comment_tree(c);
        }
        self.comments.remove(&id);
        self.votes
            .retain(|_, v| v.target != VoteTarget::Comment(id));
    }
}

fn encode_cursor(k: &SortKey) -> Result<Cursor, api::Error> {
    let json = serde_json::to_vec(k).map_err(|e| api::Error::Unknown(e.to_string()))?;
    Ok(Cursor(base64::encode(json)))
}

fn decode_cursor(c: &Cursor) -> Result<SortKey, api::Error> {
    let malformed = || api::Error::InvalidRequest(format!("malformed cursor {:?}", c.as_str()));
    let json = base64::decode(c.as_str()).map_err(|_| malformed())?;
    serde_json::from_slice(&json).map_err(|_| malformed())
}

#[async_trait]
impl Backend for MockServer {
    async fn sign_up(&self, payload: &SignUp) -> Result<UserId, Error> {
        let mut f = self.lock().await;
        f.take_failure()?;
        payload.validate()?;
        let image = format!("profile-{}.png", payload.image_id);
        Ok(f.insert_user(payload, image)?)
    }

    async fn user_exists(&self, username: &str) -> Result<bool, Error> {
        let mut f = self.lock().await;
        f.take_failure()?;
        Ok(f.username_taken(username))
    }

    async fn sign_in(&self, payload: &SignIn) -> Result<AuthToken, Error> {
        let mut f = self.lock().await;
        f.take_failure()?;
        payload.validate()?;
        let user = f
            .users
            .values()
            .find(|u| u.user.username == payload.username && u.pass == payload.password)
            .map(|u| u.user.user_id)
            .ok_or(api::Error::PermissionDenied)?;
        let (n, _) = f.next_id();
        let tok = AuthToken(format!("mock-token-{n}"));
        f.sessions.insert(tok.clone(), user);
        Ok(tok)
    }

    async fn verify_token(&self, token: &AuthToken) -> Result<TokenInfo, Error> {
        let mut f = self.lock().await;
        f.take_failure()?;
        Ok(TokenInfo {
            user_id: f.resolve(token)?,
        })
    }

    async fn fetch_user(&self, token: &AuthToken, user: UserId) -> Result<User, Error> {
        let mut f = self.lock().await;
        f.take_failure()?;
        f.resolve(token)?;
        Ok(f.user(user)?.clone())
    }

    async fn fetch_post(&self, viewer: UserId, post: PostId) -> Result<Post, Error> {
        let mut f = self.lock().await;
        f.take_failure()?;
        let p = f
            .posts
            .get(&post)
            .ok_or_else(|| Error::not_found(format!("post {}", post.0)))?;
        Ok(f.post_for(viewer, p))
    }

    async fn fetch_posts(
        &self,
        query: &PostQuery,
        cursor: Option<&Cursor>,
    ) -> Result<Page<Post>, Error> {
        let mut f = self.lock().await;
        f.take_failure()?;
        Ok(f.list_posts(query, cursor)?)
    }

    async fn fetch_topics(
        &self,
        query: &TopicQuery,
        cursor: Option<&Cursor>,
    ) -> Result<Page<Topic>, Error> {
        let mut f = self.lock().await;
        f.take_failure()?;
        Ok(f.list_topics(query, cursor)?)
    }

    async fn fetch_comments(
        &self,
        query: &CommentQuery,
        cursor: Option<&Cursor>,
    ) -> Result<Page<Comment>, Error> {
        let mut f = self.lock().await;
        f.take_failure()?;
        Ok(f.list_comments(query, cursor)?)
    }

    async fn fetch_replies(&self, viewer: UserId, parent: CommentId) -> Result<Vec<Comment>, Error> {
        let mut f = self.lock().await;
        f.take_failure()?;
        Ok(f.list_replies(viewer, parent)?)
    }

    async fn add_post(&self, token: &AuthToken, post: &NewPost) -> Result<Post, Error> {
        let mut f = self.lock().await;
        f.take_failure()?;
        if f.resolve(token)? != post.user_id {
            return Err(Error::permission_denied());
        }
        post.validate()?;
        let id = f.insert_post(
            post.user_id,
            post.topic_id,
            &post.title,
            &post.content,
            Some(&post.post_url),
        )?;
        let created = f
            .posts
            .get(&id)
            .ok_or_else(|| Error::not_found(format!("post {}", id.0)))?;
        Ok(f.post_for(post.user_id, created))
    }

    async fn update_post(&self, token: &AuthToken, update: &PostUpdate) -> Result<PostUpdate, Error> {
        let mut f = self.lock().await;
        f.take_failure()?;
        let user = f.resolve(token)?;
        update.validate()?;
        f.owned_post(user, update.post_id)?;
        if let Some(p) = f.posts.get_mut(&update.post_id) {
            p.title = update.title.clone();
            p.content = update.content.clone();
        }
        Ok(update.clone())
    }

    async fn delete_post(&self, token: &AuthToken, post: PostId) -> Result<(), Error> {
        let mut f = self.lock().await;
        f.take_failure()?;
        let user = f.resolve(token)?;
        f.owned_post(user, post)?;
        f.delete_post_with_everything(post);
        Ok(())
    }

    async fn add_comment(&self, token: &AuthToken, comment: &NewComment) -> Result<Comment, Error> {
        let mut f = self.lock().await;
        f.take_failure()?;
        if f.resolve(token)? != comment.user_id {
            return Err(Error::permission_denied());
        }
        let id = f.admin_add_comment(comment)?;
        let created = f
            .comments
            .get(&id)
            .ok_or_else(|| Error::not_found(format!("comment {}", id.0)))?;
        Ok(f.comment_for(comment.user_id, created))
    }

    async fn update_comment(
        &self,
        token: &AuthToken,
        update: &CommentUpdate,
    ) -> Result<Comment, Error> {
        let mut f = self.lock().await;
        f.take_failure()?;
        let user = f.resolve(token)?;
        update.validate()?;
        let c = f
            .comments
            .get_mut(&update.comment_id)
            .ok_or_else(|| Error::not_found(format!("comment {}", update.comment_id.0)))?;
        if c.user_id != user {
            return Err(Error::permission_denied());
        }
        c.content = update.content.clone();
        let c = c.clone();
        Ok(f.comment_for(user, &c))
    }

    async fn delete_comment(&self, token: &AuthToken, comment: CommentId) -> Result<(), Error> {
        let mut f = self.lock().await;
        f.take_failure()?;
        let user = f.resolve(token)?;
        match f.comments.get(&comment) {
            Some(c) if c.user_id == user => (),
            Some(_) => return Err(Error::permission_denied()),
            None => return Err(Error::not_found(format!("comment {}", comment.0))),
        }
        f.delete_comment_tree(comment);
        Ok(())
    }

    async fn cast_vote(
        &self,
        token: &AuthToken,
        user: UserId,
        target: VoteTarget,
        vote: VoteType,
    ) -> Result<CastVote, Error> {
        let mut f = self.lock().await;
        f.take_failure()?;
        if f.resolve(token)? != user {
            return Err(Error::permission_denied());
        }
        let vote_id = f.admin_vote(user, target, vote)?;
        Ok(CastVote {
            counts: f.counts(target),
            vote_id,
        })
    }

    async fn change_vote(
        &self,
        token: &AuthToken,
        target: VoteTarget,
        vote_id: VoteId,
        vote: VoteType,
    ) -> Result<VoteCounts, Error> {
        let mut f = self.lock().await;
        f.take_failure()?;
        let user = f.resolve(token)?;
        f.owned_vote(user, target, vote_id)?;
        if let Some(v) = f.votes.get_mut(&vote_id) {
            v.vote = vote;
        }
        Ok(f.counts(target))
    }

    async fn remove_vote(
        &self,
        token: &AuthToken,
        target: VoteTarget,
        vote_id: VoteId,
    ) -> Result<VoteCounts, Error> {
        let mut f = self.lock().await;
        f.take_failure()?;
        let user = f.resolve(token)?;
        f.owned_vote(user, target, vote_id)?;
        f.votes.remove(&vote_id);
        Ok(f.counts(target))
    }

    async fn add_bookmark(
        &self,
        token: &AuthToken,
        user: UserId,
        post: PostId,
    ) -> Result<BookmarkId, Error> {
        let mut f = self.lock().await;
        f.take_failure()?;
        if f.resolve(token)? != user {
            return Err(Error::permission_denied());
        }
        if !f.posts.contains_key(&post) {
            return Err(Error::not_found(format!("post {}", post.0)));
        }
        if f.bookmarks.values().any(|b| *b == (user, post)) {
            return Err(api::Error::NameAlreadyUsed(String::from("bookmark")).into());
        }
        let (id, _) = f.next_id();
        f.bookmarks.insert(BookmarkId(id), (user, post));
        Ok(BookmarkId(id))
    }

    async fn remove_bookmark(&self, token: &AuthToken, bookmark: BookmarkId) -> Result<(), Error> {
        let mut f = self.lock().await;
        f.take_failure()?;
        let user = f.resolve(token)?;
        match f.bookmarks.get(&bookmark) {
            Some((owner, _)) if *owner == user => (),
            Some(_) => return Err(Error::permission_denied()),
            None => return Err(Error::not_found(format!("bookmark {}", bookmark.0))),
        }
        f.bookmarks.remove(&bookmark);
        Ok(())
    }
}
