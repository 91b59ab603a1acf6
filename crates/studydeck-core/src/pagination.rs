//! Compressed page-marker sequences for the flashcard deck.
//!
//! For large decks the sequence collapses runs of pages into a single
//! ellipsis so its length stays bounded no matter how many cards exist.

use serde::{Serialize, Serializer};

/// Pages shown on each side of the current page.
pub const DEFAULT_SIBLING_COUNT: usize = 1;

/// Decks up to this size always show every page.
const ALWAYS_EXPAND: usize = 7;

/// One marker in a pagination sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    /// A 1-based page number.
    Page(usize),
    /// A collapsed run of pages.
    Ellipsis,
}

impl PageItem {
    pub fn page(&self) -> Option<usize> {
        match self {
            PageItem::Page(n) => Some(*n),
            PageItem::Ellipsis => None,
        }
    }
}

impl Serialize for PageItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PageItem::Page(n) => serializer.serialize_u64(*n as u64),
            PageItem::Ellipsis => serializer.serialize_str("..."),
        }
    }
}

fn pages(start: usize, end: usize) -> impl Iterator<Item = PageItem> {
    (start..=end).map(PageItem::Page)
}

/// Compute the page markers for `total_count` pages with `current_page` (1-based) selected.
pub fn paginate(total_count: usize, current_page: usize, sibling_count: usize) -> Vec<PageItem> {
    let total_page_numbers = sibling_count + 5;
    if total_count <= ALWAYS_EXPAND || total_page_numbers >= total_count {
        return pages(1, total_count).collect();
    }

    let left_sibling = current_page.saturating_sub(sibling_count).max(1);
    let right_sibling = (current_page + sibling_count).min(total_count);

    let show_left_ellipsis = left_sibling > 2;
    let show_right_ellipsis = right_sibling < total_count - 2;
    let edge_item_count = (3 + 2 * sibling_count).min(total_count);

    match (show_left_ellipsis, show_right_ellipsis) {
        (false, true) => pages(1, edge_item_count)
            .chain([PageItem::Ellipsis, PageItem::Page(total_count)])
            .collect(),
        (true, false) => [PageItem::Page(1), PageItem::Ellipsis]
            .into_iter()
            .chain(pages(total_count + 1 - edge_item_count, total_count))
            .collect(),
        (true, true) => [PageItem::Page(1), PageItem::Ellipsis]
            .into_iter()
            .chain(pages(left_sibling, right_sibling))
            .chain([PageItem::Ellipsis, PageItem::Page(total_count)])
            .collect(),
        (false, false) => pages(1, total_count).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use PageItem::{Ellipsis, Page};

    #[test]
    fn test_small_decks_show_every_page() {
        for total in 0..=7 {
            for current in 1..=total.max(1) {
                let seq = paginate(total, current, DEFAULT_SIBLING_COUNT);
                assert_eq!(seq.len(), total);
                assert!(!seq.contains(&Ellipsis));
            }
        }
    }

    #[test]
    fn test_both_ellipses() {
        assert_eq!(
            paginate(20, 10, 1),
            vec![Page(1), Ellipsis, Page(9), Page(10), Page(11), Ellipsis, Page(20)]
        );
    }

    #[test]
    fn test_right_ellipsis_only() {
        assert_eq!(
            paginate(15, 1, 1),
            vec![Page(1), Page(2), Page(3), Page(4), Page(5), Ellipsis, Page(15)]
        );
        assert_eq!(
            paginate(15, 3, 1),
            vec![Page(1), Page(2), Page(3), Page(4), Page(5), Ellipsis, Page(15)]
        );
    }

    #[test]
    fn test_left_ellipsis_only() {
        assert_eq!(
            paginate(15, 15, 1),
            vec![Page(1), Ellipsis, Page(11), Page(12), Page(13), Page(14), Page(15)]
        );
        assert_eq!(
            paginate(15, 13, 1),
            vec![Page(1), Ellipsis, Page(11), Page(12), Page(13), Page(14), Page(15)]
        );
    }

    #[test]
    fn test_wider_siblings() {
        assert_eq!(
            paginate(30, 15, 2),
            vec![
                Page(1),
                Ellipsis,
                Page(13),
                Page(14),
                Page(15),
                Page(16),
                Page(17),
                Ellipsis,
                Page(30)
            ]
        );
        // Span covers the whole deck
        assert_eq!(paginate(8, 4, 3).len(), 8);
    }

    #[test]
    fn test_serializes_ellipsis_as_dots() {
        let json = serde_json::to_string(&paginate(20, 10, 1)).unwrap();
        assert_eq!(json, r#"[1,"...",9,10,11,"...",20]"#);
    }

    proptest! {
        #[test]
        fn prop_pure_and_bounded(total in 0usize..500, current_seed in 0usize..500) {
            let current = if total == 0 { 1 } else { current_seed % total + 1 };
            let first = paginate(total, current, DEFAULT_SIBLING_COUNT);
            let second = paginate(total, current, DEFAULT_SIBLING_COUNT);
            prop_assert_eq!(&first, &second);
            prop_assert!(first.len() <= 7);
        }

        #[test]
        fn prop_contains_current_and_edges(total in 8usize..500, current_seed in 0usize..500) {
            let current = current_seed % total + 1;
            let seq = paginate(total, current, DEFAULT_SIBLING_COUNT);
            prop_assert!(seq.contains(&Page(current)));
            prop_assert_eq!(seq.first(), Some(&Page(1)));
            prop_assert_eq!(seq.last(), Some(&Page(total)));

            let numbers: Vec<usize> = seq.iter().filter_map(PageItem::page).collect();
            prop_assert!(numbers.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
