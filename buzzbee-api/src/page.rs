use serde::Deserialize;

/// Opaque position token handed out by the backend; `None` next to a page
/// means there is nothing after it
#[derive(Clone, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Cursor(pub String);

impl Cursor {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Page<T> {
    pub result: Vec<T>,

    // `Option::deserialize` makes the key mandatory: a page that forgets its
    // cursor is a backend bug, not the last page
    #[serde(deserialize_with = "Option::deserialize")]
    pub cursor: Option<Cursor>,
}

impl<T> Page<T> {
    pub fn new(result: Vec<T>, cursor: Option<Cursor>) -> Page<T> {
        Page { result, cursor }
    }

    pub fn last(result: Vec<T>) -> Page<T> {
        Page {
            result,
            cursor: None,
        }
    }
}
