use crate::{Error, Time, TopicId, UserId, VoteCounts, VoteId, VoteType, DEFAULT_PAGE_LIMIT};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct PostId(pub i64);

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct BookmarkId(pub i64);

/// A "buzz", as listed in feeds and shown on its own page
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Post {
    pub post_id: PostId,
    pub post_url: String,

    pub user_id: UserId,
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    pub user_image: String,

    pub topic_id: TopicId,
    pub topic_name: String,
    pub topic_url: String,
    pub category_icon: String,

    pub tag_name: Option<String>,
    pub tag_icon: Option<String>,
    pub tag_description: Option<String>,

    pub title: String,
    pub content: String,
    pub created_date: Time,

    pub vote_id: Option<VoteId>,
    pub upvote_count: i64,
    pub downvote_count: i64,
    pub sum_votes: i64,
    pub vote_status: i8,

    pub comment_count: u32,
    pub bookmark_id: Option<BookmarkId>,
    pub is_bookmarked: bool,

    /// Only sent by the personalized feed
    #[serde(default)]
    pub is_following: Option<bool>,
}

impl Post {
    pub fn viewer_vote(&self) -> Option<(VoteId, VoteType)> {
        self.vote_id.zip(VoteType::from_status(self.vote_status))
    }

    pub fn counts(&self) -> VoteCounts {
        VoteCounts {
            upvote_count: self.upvote_count,
            downvote_count: self.downvote_count,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PostSort {
    #[default]
    Buzzing,
    Alpha,
    New,
}

impl PostSort {
    /// `sortBy` query value; buzzing is the backend default and is not sent
    pub fn as_param(&self) -> Option<&'static str> {
        match self {
            PostSort::Buzzing => None,
            PostSort::Alpha => Some("alpha"),
            PostSort::New => Some("new"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum PostScope {
    /// Every post, filtered by the search text
    #[default]
    All,

    /// Posts from what the viewer follows
    Following,

    /// Followed and related topics first, then popular posts; signed-in only
    Personalized,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PostQuery {
    pub viewer: UserId,
    pub search: String,
    pub sort: PostSort,
    pub scope: PostScope,
    pub topic: Option<TopicId>,
    pub limit: u32,
}

impl PostQuery {
    pub fn all(viewer: UserId) -> PostQuery {
        PostQuery {
            viewer,
            search: String::new(),
            sort: PostSort::default(),
            scope: PostScope::All,
            topic: None,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }

    pub fn in_topic(viewer: UserId, topic: TopicId) -> PostQuery {
        PostQuery {
            topic: Some(topic),
            ..PostQuery::all(viewer)
        }
    }

    pub fn search(viewer: UserId, text: &str) -> PostQuery {
        PostQuery {
            search: String::from(text),
            ..PostQuery::all(viewer)
        }
    }
}

/// Lowercase ASCII words of `title` joined by dashes, as post urls start
pub fn slugify(title: &str) -> String {
    title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

fn validate_post_text(s: &str) -> Result<(), Error> {
    crate::validate_string(s)?;
    if s.trim().is_empty() {
        return Err(Error::EmptyText);
    }
    Ok(())
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewPost {
    pub topic_id: TopicId,
    pub user_id: UserId,
    pub title: String,
    pub content: String,

    /// Where the post will be reachable; unique across the forum
    pub post_url: String,
}

impl NewPost {
    /// `suffix` keeps two posts with the same title apart
    pub fn new(topic_id: TopicId, user_id: UserId, title: &str, content: &str, suffix: &str) -> NewPost {
        let slug = match slugify(title) {
            s if s.is_empty() => String::from("buzz"),
            s => s,
        };
        NewPost {
            topic_id,
            user_id,
            title: String::from(title),
            content: String::from(content),
            post_url: format!("{slug}-{suffix}"),
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        validate_post_text(&self.title)?;
        validate_post_text(&self.content)?;
        crate::validate_string(&self.post_url)?;
        if self.post_url.is_empty() {
            return Err(Error::InvalidRequest(String::from("post url must not be empty")));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PostUpdate {
    pub post_id: PostId,
    pub title: String,
    pub content: String,
}

impl PostUpdate {
    pub fn validate(&self) -> Result<(), Error> {
        validate_post_text(&self.title)?;
        validate_post_text(&self.content)
    }
}
