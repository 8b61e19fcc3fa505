use rand::{distributions::Alphanumeric, Rng};

use crate::{
    api::{NewPost, Post, PostId, PostQuery, PostScope, PostUpdate, TopicId},
    Backend, Error, Feed, Session, SessionStore,
};

const URL_SUFFIX_LEN: usize = 5;

fn url_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(URL_SUFFIX_LEN)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect()
}

/// Whether a post created just now belongs at the head of a feed with this
/// query. Only unscoped listings qualify, as follows are not known here.
fn lists(query: &PostQuery, post: &Post) -> bool {
    let search = query.search.to_lowercase();
    query.scope == PostScope::All
        && query.topic.map_or(true, |t| t == post.topic_id)
        && (post.title.to_lowercase().contains(&search)
            || post.content.to_lowercase().contains(&search))
}

impl Feed<PostQuery> {
    /// Post a new buzz in `topic` and show it first if this feed would list it
    pub async fn create_post<B: Backend + ?Sized, S: SessionStore>(
        &mut self,
        backend: &B,
        session: &Session<S>,
        topic: TopicId,
        title: &str,
        content: &str,
    ) -> Result<PostId, Error> {
        let (token, user) = session.credentials()?;
        let new = NewPost::new(topic, user, title, content, &url_suffix());
        new.validate()?;
        let created = backend.add_post(token, &new).await?;
        let id = created.post_id;
        tracing::debug!(post = ?id, url = %created.post_url, "created post");
        if lists(self.query(), &created) {
            self.prepend(created);
        }
        Ok(id)
    }

    pub async fn edit_post<B: Backend + ?Sized, S: SessionStore>(
        &mut self,
        backend: &B,
        session: &Session<S>,
        id: PostId,
        title: &str,
        content: &str,
    ) -> Result<(), Error> {
        let (token, _) = session.credentials()?;
        let update = PostUpdate {
            post_id: id,
            title: String::from(title),
            content: String::from(content),
        };
        update.validate()?;
        let updated = backend.update_post(token, &update).await?;
        if let Some(p) = self.find_mut(&id) {
            p.title = updated.title;
            p.content = updated.content;
        }
        Ok(())
    }

    /// Delete a post along with its comments, votes and bookmarks
    pub async fn delete_post<B: Backend + ?Sized, S: SessionStore>(
        &mut self,
        backend: &B,
        session: &Session<S>,
        id: PostId,
    ) -> Result<(), Error> {
        let (token, _) = session.credentials()?;
        backend.delete_post(token, id).await?;
        self.remove(&id);
        Ok(())
    }
}
