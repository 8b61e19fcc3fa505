use std::collections::HashSet;

use crate::{
    api::{Cursor, Page},
    Identified,
};

/// Client-side copy of a cursor-paginated listing
///
/// Items are unique by `Identified::key` and kept in arrival order: a page
/// only ever appends to the tail.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Paginated<T> {
    items: Vec<T>,
    cursor: Option<Cursor>,
}

impl<T> Default for Paginated<T> {
    fn default() -> Self {
        Paginated {
            items: Vec::new(),
            cursor: None,
        }
    }
}

impl<T: Identified> Paginated<T> {
    pub fn new() -> Paginated<T> {
        Paginated::default()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut Vec<T> {
        &mut self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.cursor = None;
    }

    pub fn find_mut(&mut self, key: &T::Key) -> Option<&mut T> {
        self.items.iter_mut().find(|i| i.key() == *key)
    }

    /// Put `item` at the head, e.g. one the viewer just created. Returns
    /// `false`, changing nothing, if its key is already held.
    pub fn insert_front(&mut self, item: T) -> bool {
        let key = item.key();
        if self.items.iter().any(|i| i.key() == key) {
            return false;
        }
        self.items.insert(0, item);
        true
    }

    pub fn remove(&mut self, key: &T::Key) -> Option<T> {
        let pos = self.items.iter().position(|i| i.key() == *key)?;
        Some(self.items.remove(pos))
    }

    /// Fold a freshly fetched page in.
    ///
    /// With `reset`, the page replaces everything. Otherwise its items are
    /// appended in page order, skipping any whose key is already held, which
    /// covers a backend repeating the boundary item and two fetches racing on
    /// one cursor. The cursor is always the page's.
    pub fn merge_page(&mut self, page: Page<T>, reset: bool) {
        let fetched = page.result.len();
        if reset {
            self.items = page.result;
        } else {
            let mut known = self.items.iter().map(|i| i.key()).collect::<HashSet<_>>();
            self.items.extend(
                page.result
                    .into_iter()
                    .filter(|i| known.insert(i.key())),
            );
        }
        self.cursor = page.cursor;
        tracing::debug!(
            reset,
            fetched,
            held = self.items.len(),
            has_more = self.cursor.is_some(),
            "merged page"
        );
    }
}

/// Functional form of `Paginated::merge_page`
pub fn reconcile_page<T: Identified>(current: Vec<T>, page: Page<T>, reset: bool) -> Paginated<T> {
    let mut res = Paginated {
        items: current,
        cursor: None,
    };
    res.merge_page(page, reset);
    res
}
