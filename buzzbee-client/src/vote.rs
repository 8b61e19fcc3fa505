use crate::{
    api::{BookmarkId, Comment, Post, VoteCounts, VoteId, VoteTarget, VoteType},
    Backend, Error, Session, SessionStore,
};

/// What clicking a vote button asks the backend for
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VoteAction {
    Cast(VoteType),
    Change(VoteId, VoteType),
    Remove(VoteId),
}

impl VoteAction {
    pub fn decide(current: Option<(VoteId, VoteType)>, clicked: VoteType) -> VoteAction {
        match current {
            None => VoteAction::Cast(clicked),
            Some((id, v)) if v == clicked => VoteAction::Remove(id),
            Some((id, _)) => VoteAction::Change(id, clicked),
        }
    }
}

/// The viewer's vote on one post or comment, with the tallies shown next to it
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VoteState {
    pub target: VoteTarget,
    pub current: Option<(VoteId, VoteType)>,
    pub counts: VoteCounts,
}

impl VoteState {
    pub fn of_post(post: &Post) -> VoteState {
        VoteState {
            target: VoteTarget::Post(post.post_id),
            current: post.viewer_vote(),
            counts: post.counts(),
        }
    }

    pub fn of_comment(comment: &Comment) -> VoteState {
        VoteState {
            target: VoteTarget::Comment(comment.comment_id),
            current: comment.viewer_vote(),
            counts: comment.counts(),
        }
    }

    pub fn score(&self) -> i64 {
        self.counts.upvote_count - self.counts.downvote_count
    }

    fn status(&self) -> i8 {
        self.current.map(|(_, v)| i8::from(v)).unwrap_or(0)
    }

    /// Send the vote `clicked` implies and take the backend's tallies.
    /// Nothing changes if the backend refuses.
    pub async fn click<B: Backend + ?Sized, S: SessionStore>(
        &mut self,
        backend: &B,
        session: &Session<S>,
        clicked: VoteType,
    ) -> Result<VoteAction, Error> {
        let (token, user) = session.credentials()?;
        let action = VoteAction::decide(self.current, clicked);
        match action {
            VoteAction::Cast(v) => {
                let res = backend.cast_vote(token, user, self.target, v).await?;
                self.current = Some((res.vote_id, v));
                self.counts = res.counts;
            }
            VoteAction::Change(id, v) => {
                self.counts = backend.change_vote(token, self.target, id, v).await?;
                self.current = Some((id, v));
            }
            VoteAction::Remove(id) => {
                self.counts = backend.remove_vote(token, self.target, id).await?;
                self.current = None;
            }
        }
        tracing::debug!(vote_target = ?self.target, ?action, counts = ?self.counts, "voted");
        Ok(action)
    }

    pub fn apply_to_post(&self, post: &mut Post) {
        post.vote_id = self.current.map(|(id, _)| id);
        post.vote_status = self.status();
        post.upvote_count = self.counts.upvote_count;
        post.downvote_count = self.counts.downvote_count;
        post.sum_votes = self.score();
    }

    pub fn apply_to_comment(&self, comment: &mut Comment) {
        comment.vote_id = self.current.map(|(id, _)| id);
        comment.vote_status = self.status();
        comment.upvote_count = self.counts.upvote_count;
        comment.downvote_count = self.counts.downvote_count;
        comment.sum_votes = self.score();
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BookmarkAction {
    Add,
    Remove(BookmarkId),
}

impl BookmarkAction {
    pub fn decide(post: &Post) -> BookmarkAction {
        match post.bookmark_id {
            Some(id) if post.is_bookmarked => BookmarkAction::Remove(id),
            _ => BookmarkAction::Add,
        }
    }
}

pub async fn toggle_bookmark<B: Backend + ?Sized, S: SessionStore>(
    backend: &B,
    session: &Session<S>,
    post: &mut Post,
) -> Result<BookmarkAction, Error> {
    let (token, user) = session.credentials()?;
    let action = BookmarkAction::decide(post);
    match action {
        BookmarkAction::Add => {
            post.bookmark_id = Some(backend.add_bookmark(token, user, post.post_id).await?);
            post.is_bookmarked = true;
        }
        BookmarkAction::Remove(id) => {
            backend.remove_bookmark(token, id).await?;
            post.bookmark_id = None;
            post.is_bookmarked = false;
        }
    }
    Ok(action)
}
