use serde::{Deserialize, Serialize};

/// Sort direction for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

impl Direction {
    /// The SQL keyword for this direction.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Listing parameters forwarded to repositories and the users directory.
///
/// `name` is an optional substring filter; `order` names a column the
/// repository recognizes (repositories append their own stable tiebreakers).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageMetadata {
    pub offset: u64,
    pub limit: u64,
    pub name: Option<String>,
    pub order: Option<String>,
    pub dir: Direction,
}

impl PageMetadata {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self {
            offset,
            limit,
            ..Self::default()
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(total: u64, pm: &PageMetadata, items: Vec<T>) -> Self {
        Self {
            total,
            offset: pm.offset,
            limit: pm.limit,
            items,
        }
    }

    pub fn empty(pm: &PageMetadata) -> Self {
        Self::new(0, pm, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_sql() {
        assert_eq!(Direction::Asc.as_sql(), "ASC");
        assert_eq!(Direction::Desc.as_sql(), "DESC");
    }

    #[test]
    fn test_page_carries_metadata() {
        let pm = PageMetadata::new(20, 10);
        let page = Page::new(42, &pm, vec![1, 2, 3]);
        assert_eq!(page.total, 42);
        assert_eq!(page.offset, 20);
        assert_eq!(page.limit, 10);
        assert_eq!(page.items.len(), 3);
    }
}
