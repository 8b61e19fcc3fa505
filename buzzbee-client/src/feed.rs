use std::fmt::Debug;

use async_trait::async_trait;

use crate::{
    api::{
        Comment, CommentQuery, Cursor, Page, Post, PostQuery, PostScope, Topic, TopicQuery, UserId,
    },
    Backend, Error, Identified, Paginated,
};

/// A listing the backend pages through with a cursor
#[async_trait]
pub trait FeedQuery: Clone + Debug + PartialEq + Send + Sync {
    type Item: Identified + Send;

    async fn fetch_page<B: Backend + ?Sized>(
        &self,
        backend: &B,
        cursor: Option<&Cursor>,
    ) -> Result<Page<Self::Item>, Error>;
}

#[async_trait]
impl FeedQuery for PostQuery {
    type Item = Post;

    async fn fetch_page<B: Backend + ?Sized>(
        &self,
        backend: &B,
        cursor: Option<&Cursor>,
    ) -> Result<Page<Post>, Error> {
        if self.scope != PostScope::All && self.viewer.is_anonymous() {
            return Err(Error::permission_denied());
        }
        backend.fetch_posts(self, cursor).await
    }
}

#[async_trait]
impl FeedQuery for TopicQuery {
    type Item = Topic;

    async fn fetch_page<B: Backend + ?Sized>(
        &self,
        backend: &B,
        cursor: Option<&Cursor>,
    ) -> Result<Page<Topic>, Error> {
        backend.fetch_topics(self, cursor).await
    }
}

#[async_trait]
impl FeedQuery for CommentQuery {
    type Item = Comment;

    async fn fetch_page<B: Backend + ?Sized>(
        &self,
        backend: &B,
        cursor: Option<&Cursor>,
    ) -> Result<Page<Comment>, Error> {
        backend.fetch_comments(self, cursor).await
    }
}

/// A page fetch that was started and not yet finished
#[derive(Clone, Debug)]
pub struct PageRequest<Q> {
    pub query: Q,
    pub cursor: Option<Cursor>,

    /// First page since the last reset: the answer replaces the list
    pub reset: bool,

    generation: u64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoadOutcome {
    /// The page was merged in, adding this many new items
    Loaded(usize),

    /// Another fetch for this feed is still in flight
    Busy,

    /// The backend said there is nothing after the last page
    Exhausted,

    /// The feed was reset while the fetch was in flight; the answer was dropped
    Stale,
}

/// One listing on screen: its query, what is loaded so far, and whether a
/// fetch is in flight
#[derive(Debug)]
pub struct Feed<Q: FeedQuery> {
    query: Q,
    list: Paginated<Q::Item>,
    generation: u64,
    fresh: bool,
    in_flight: bool,
}

impl<Q: FeedQuery> Feed<Q> {
    pub fn new(query: Q) -> Feed<Q> {
        Feed {
            query,
            list: Paginated::new(),
            generation: 0,
            fresh: true,
            in_flight: false,
        }
    }

    pub fn query(&self) -> &Q {
        &self.query
    }

    pub fn items(&self) -> &[Q::Item] {
        self.list.items()
    }

    pub fn items_mut(&mut self) -> &mut Vec<Q::Item> {
        self.list.items_mut()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight
    }

    pub fn find_mut(&mut self, key: &<Q::Item as Identified>::Key) -> Option<&mut Q::Item> {
        self.list.find_mut(key)
    }

    /// Show `item` first without refetching. `false` if it is already listed.
    pub fn prepend(&mut self, item: Q::Item) -> bool {
        self.list.insert_front(item)
    }

    pub fn remove(&mut self, key: &<Q::Item as Identified>::Key) -> Option<Q::Item> {
        self.list.remove(key)
    }

    /// Whether a "load more" makes sense: nothing loaded yet, or the last
    /// page came with a cursor
    pub fn has_more(&self) -> bool {
        self.fresh || self.list.has_more()
    }

    /// Start over with a new filter, sort or search text.
    ///
    /// Answers to fetches started before this are dropped when they arrive.
    pub fn reset(&mut self, query: Q) {
        self.query = query;
        self.list.clear();
        self.generation += 1;
        self.fresh = true;
        self.in_flight = false;
    }

    pub fn begin_load(&mut self) -> Option<PageRequest<Q>> {
        if self.in_flight || !self.has_more() {
            return None;
        }
        self.in_flight = true;
        Some(PageRequest {
            query: self.query.clone(),
            cursor: match self.fresh {
                true => None,
                false => self.list.cursor().cloned(),
            },
            reset: self.fresh,
            generation: self.generation,
        })
    }

    /// Apply the answer to `req`. On error nothing changes besides the
    /// loading flag, so the same page can be asked for again.
    pub fn finish_load(
        &mut self,
        req: PageRequest<Q>,
        res: Result<Page<Q::Item>, Error>,
    ) -> Result<LoadOutcome, Error> {
        if req.generation != self.generation {
            tracing::debug!(
                query = ?req.query,
                "dropping page fetched for a feed that was since reset"
            );
            return Ok(LoadOutcome::Stale);
        }
        self.in_flight = false;
        let page = res?;
        let before = match req.reset {
            true => 0,
            false => self.list.len(),
        };
        self.list.merge_page(page, req.reset);
        self.fresh = false;
        Ok(LoadOutcome::Loaded(self.list.len() - before))
    }

    pub async fn load_more<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
    ) -> Result<LoadOutcome, Error> {
        let req = match self.begin_load() {
            Some(req) => req,
            None if self.in_flight => return Ok(LoadOutcome::Busy),
            None => return Ok(LoadOutcome::Exhausted),
        };
        let res = req.query.fetch_page(backend, req.cursor.as_ref()).await;
        self.finish_load(req, res)
    }
}

/// First page of both topics and posts matching `text`, for the search box.
/// Fails as a whole if either fetch fails.
pub async fn search_everything<B: Backend + ?Sized>(
    backend: &B,
    viewer: UserId,
    text: &str,
    limit: u32,
) -> Result<(Page<Topic>, Page<Post>), Error> {
    let topics = TopicQuery {
        limit,
        ..TopicQuery::search(viewer, text)
    };
    let posts = PostQuery {
        limit,
        ..PostQuery::search(viewer, text)
    };
    futures::try_join!(
        backend.fetch_topics(&topics, None),
        backend.fetch_posts(&posts, None),
    )
}
