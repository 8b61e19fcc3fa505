use crate::{Time, UserId, DEFAULT_PAGE_LIMIT};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct TopicId(pub i64);

/// A "hive": a topic posts are filed under
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Topic {
    pub topic_id: TopicId,
    pub topic_user_id: UserId,
    pub username: String,
    pub display_name: String,
    pub image_name: String,

    pub topic_name: String,
    pub topic_url: String,
    pub description: String,
    pub visibility: String,
    pub created_date: Time,

    pub category_name: String,
    pub category_icon: String,

    pub followers_count: u32,
    pub posts_count: u32,
    pub is_following: bool,
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicSort {
    /// Most followed first
    #[default]
    Buzzing,
    Alpha,
    New,
}

impl TopicSort {
    pub fn as_param(&self) -> Option<&'static str> {
        match self {
            TopicSort::Buzzing => None,
            TopicSort::Alpha => Some("alpha"),
            TopicSort::New => Some("new"),
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TopicQuery {
    pub viewer: UserId,
    pub search: String,
    pub sort: TopicSort,
    pub limit: u32,
}

impl TopicQuery {
    pub fn search(viewer: UserId, text: &str) -> TopicQuery {
        TopicQuery {
            viewer,
            search: String::from(text),
            sort: TopicSort::default(),
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}
