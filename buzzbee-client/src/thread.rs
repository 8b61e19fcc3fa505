use std::collections::HashMap;

use async_trait::async_trait;

use crate::{
    api::{
        Comment, CommentId, CommentQuery, CommentSort, CommentUpdate, Cursor, NewComment, Page,
        UserId,
    },
    build_comment_tree, Backend, CommentNode, Error, Feed, FeedQuery, LoadOutcome, PageRequest,
    Session, SessionStore,
};

/// Root comments of a post, each page nested before being merged
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ThreadQuery(pub CommentQuery);

#[async_trait]
impl FeedQuery for ThreadQuery {
    type Item = CommentNode;

    async fn fetch_page<B: Backend + ?Sized>(
        &self,
        backend: &B,
        cursor: Option<&Cursor>,
    ) -> Result<Page<CommentNode>, Error> {
        backend
            .fetch_comments(&self.0, cursor)
            .await
            .map(nest_page)
    }
}

fn nest_page(page: Page<Comment>) -> Page<CommentNode> {
    Page {
        result: build_comment_tree(page.result, None),
        cursor: page.cursor,
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReplyState {
    /// Some direct replies are known to the backend but not loaded
    Collapsed,

    /// A reply fetch is in flight
    Expanding,

    /// Nothing more to fetch
    Expanded,
}

/// A reply fetch that was started and not yet finished
#[derive(Clone, Debug)]
pub struct ReplyRequest {
    pub viewer: UserId,
    pub parent: CommentId,
    loaded: usize,
    generation: u64,
}

/// The comment section of one post
#[derive(Debug)]
pub struct CommentThread {
    roots: Feed<ThreadQuery>,
    expansions: HashMap<CommentId, ReplyState>,
    generation: u64,
}

impl CommentThread {
    pub fn new(query: CommentQuery) -> CommentThread {
        CommentThread {
            roots: Feed::new(ThreadQuery(query)),
            expansions: HashMap::new(),
            generation: 0,
        }
    }

    pub fn query(&self) -> &CommentQuery {
        &self.roots.query().0
    }

    pub fn roots(&self) -> &[CommentNode] {
        self.roots.items()
    }

    pub fn find(&self, id: &CommentId) -> Option<&CommentNode> {
        CommentNode::find(self.roots.items(), id)
    }

    pub fn has_more(&self) -> bool {
        self.roots.has_more()
    }

    pub fn is_loading(&self) -> bool {
        self.roots.is_loading()
    }

    /// Reload from the first page, e.g. after the sort changed
    pub fn reset(&mut self, sort: CommentSort) {
        let query = CommentQuery {
            sort,
            ..self.query().clone()
        };
        self.roots.reset(ThreadQuery(query));
        self.expansions.clear();
        self.generation += 1;
    }

    pub fn begin_page(&mut self) -> Option<PageRequest<ThreadQuery>> {
        self.roots.begin_load()
    }

    pub fn finish_page(
        &mut self,
        req: PageRequest<ThreadQuery>,
        res: Result<Page<Comment>, Error>,
    ) -> Result<LoadOutcome, Error> {
        self.roots.finish_load(req, res.map(nest_page))
    }

    pub async fn load_more<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
    ) -> Result<LoadOutcome, Error> {
        self.roots.load_more(backend).await
    }

    /// `None` when no loaded comment has this id
    pub fn reply_state(&self, id: &CommentId) -> Option<ReplyState> {
        let node = self.find(id)?;
        Some(match self.expansions.get(id) {
            Some(s) => *s,
            None if node.has_more_replies() => ReplyState::Collapsed,
            None => ReplyState::Expanded,
        })
    }

    /// Start a "view more replies" fetch for `id`, if it is collapsed and
    /// nothing is in flight for it
    pub fn begin_expand(&mut self, id: CommentId) -> Option<ReplyRequest> {
        if self.reply_state(&id)? != ReplyState::Collapsed {
            return None;
        }
        let loaded = self.find(&id)?.reply_children.len();
        self.expansions.insert(id, ReplyState::Expanding);
        Some(ReplyRequest {
            viewer: self.query().viewer,
            parent: id,
            loaded,
            generation: self.generation,
        })
    }

    /// Apply the answer to `req`: the fetched descendants replace the node's
    /// replies wholesale.
    ///
    /// Returns the node's new state, or `None` if the answer was dropped
    /// because the thread was reset or the comment deleted meanwhile. On
    /// error the node is collapsed again and nothing else changes.
    pub fn finish_expand(
        &mut self,
        req: ReplyRequest,
        res: Result<Vec<Comment>, Error>,
    ) -> Result<Option<ReplyState>, Error> {
        if req.generation != self.generation
            || self.expansions.get(&req.parent) != Some(&ReplyState::Expanding)
        {
            tracing::debug!(parent = ?req.parent, "dropping replies fetched before a reset");
            return Ok(None);
        }
        let records = match res {
            Ok(records) => records,
            Err(e) => {
                self.expansions.insert(req.parent, ReplyState::Collapsed);
                return Err(e);
            }
        };
        let node = match CommentNode::find_in(self.roots.items_mut(), &req.parent) {
            Some(node) => node,
            None => {
                self.expansions.remove(&req.parent);
                return Ok(None);
            }
        };

        let replaced = CommentNode::walk(&node.reply_children)
            .into_iter()
            .map(|(_, d)| d.id())
            .collect::<Vec<_>>();
        node.reply_children = build_comment_tree(records, Some(req.parent));
        let progressed = node.reply_children.len() > req.loaded;
        let state = match node.has_more_replies() && progressed {
            true => ReplyState::Collapsed,
            false => ReplyState::Expanded,
        };
        if node.has_more_replies() && !progressed {
            tracing::warn!(
                parent = ?req.parent,
                loaded = node.reply_children.len(),
                reply_count = node.comment.reply_count,
                "reply fetch brought nothing new, giving up on the missing replies"
            );
        }

        // forget what was known of the replaced descendants, unless a fetch
        // is still in flight for them
        for id in replaced {
            if self.expansions.get(&id) != Some(&ReplyState::Expanding) {
                self.expansions.remove(&id);
            }
        }
        self.expansions.insert(req.parent, state);
        Ok(Some(state))
    }

    pub async fn expand_replies<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        id: CommentId,
    ) -> Result<Option<ReplyState>, Error> {
        let req = match self.begin_expand(id) {
            Some(req) => req,
            None => return Ok(self.reply_state(&id)),
        };
        let res = backend.fetch_replies(req.viewer, req.parent).await;
        self.finish_expand(req, res)
    }

    /// Post `content` under `parent` (`None` for a comment on the post
    /// itself) and attach the result at the end of its siblings
    pub async fn post_comment<B: Backend + ?Sized, S: SessionStore>(
        &mut self,
        backend: &B,
        session: &Session<S>,
        parent: Option<CommentId>,
        content: &str,
    ) -> Result<CommentId, Error> {
        let (token, user) = session.credentials()?;
        let new = NewComment {
            post_id: self.query().post,
            user_id: user,
            parent_comment_id: parent,
            content: String::from(content),
        };
        new.validate()?;
        if let Some(p) = &parent {
            if self.find(p).is_none() {
                return Err(Error::not_found(format!("comment {}", p.0)));
            }
        }

        let created = backend.add_comment(token, &new).await?;
        let id = created.comment_id;
        match parent {
            None => self.roots.items_mut().push(CommentNode::new(created)),
            Some(p) => match CommentNode::find_in(self.roots.items_mut(), &p) {
                Some(node) => node.add_reply(created),
                None => {
                    tracing::warn!(parent = ?p, "parent vanished while posting a reply")
                }
            },
        }
        Ok(id)
    }

    pub async fn edit_comment<B: Backend + ?Sized, S: SessionStore>(
        &mut self,
        backend: &B,
        session: &Session<S>,
        id: CommentId,
        content: &str,
    ) -> Result<(), Error> {
        let (token, _) = session.credentials()?;
        let update = CommentUpdate {
            comment_id: id,
            content: String::from(content),
        };
        update.validate()?;
        let updated = backend.update_comment(token, &update).await?;
        if let Some(node) = CommentNode::find_in(self.roots.items_mut(), &id) {
            node.comment.content = updated.content;
        }
        Ok(())
    }

    pub async fn delete_comment<B: Backend + ?Sized, S: SessionStore>(
        &mut self,
        backend: &B,
        session: &Session<S>,
        id: CommentId,
    ) -> Result<(), Error> {
        let (token, _) = session.credentials()?;
        backend.delete_comment(token, id).await?;
        if let Some(removed) = CommentNode::remove_from(self.roots.items_mut(), &id) {
            for (_, d) in CommentNode::walk(std::slice::from_ref(&removed)) {
                self.expansions.remove(&d.id());
            }
        }
        Ok(())
    }
}
