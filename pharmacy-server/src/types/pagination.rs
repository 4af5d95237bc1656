//! Offset/take windows for list endpoints that group rows in memory

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Resolved window: how many rows to return starting where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub take: usize,
    pub offset: usize,
}

impl Window {
    /// Clamp raw query values: `take` into `1..=max` (default when absent),
    /// `offset` to non-negative.
    pub fn resolve(take: Option<i64>, offset: Option<i64>, default: usize, max: usize) -> Self {
        let take = take
            .map(|t| usize::try_from(t.max(1)).unwrap_or(max).min(max))
            .unwrap_or(default);
        let offset = offset
            .map(|o| usize::try_from(o.max(0)).unwrap_or(0))
            .unwrap_or(0);
        Self { take, offset }
    }

    /// Cut `rows` to this window and report the totals.
    pub fn apply<T>(&self, rows: Vec<T>) -> (Vec<T>, WindowInfo) {
        let total = rows.len();
        let page = rows.into_iter().skip(self.offset).take(self.take).collect();
        let info = WindowInfo {
            total,
            offset: self.offset,
            take: self.take,
            has_more: self.offset.saturating_add(self.take) < total,
        };
        (page, info)
    }
}

/// Window metadata returned next to the rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WindowInfo {
    pub total: usize,
    pub offset: usize,
    pub take: usize,
    pub has_more: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_defaults() {
        let window = Window::resolve(None, None, 50, 200);
        assert_eq!(window, Window { take: 50, offset: 0 });
    }

    #[test]
    fn test_window_clamping() {
        assert_eq!(Window::resolve(Some(0), Some(-5), 50, 200), Window { take: 1, offset: 0 });
        assert_eq!(Window::resolve(Some(10_000), Some(3), 50, 200), Window { take: 200, offset: 3 });
    }

    #[test]
    fn test_apply_reports_has_more() {
        let window = Window::resolve(Some(2), Some(1), 50, 200);
        let (rows, info) = window.apply(vec![1, 2, 3, 4]);
        assert_eq!(rows, vec![2, 3]);
        assert_eq!(info.total, 4);
        assert!(info.has_more);

        let (rows, info) = Window::resolve(Some(2), Some(2), 50, 200).apply(vec![1, 2, 3, 4]);
        assert_eq!(rows, vec![3, 4]);
        assert!(!info.has_more);
    }

    #[test]
    fn test_offset_past_end_is_empty() {
        let (rows, info) = Window::resolve(Some(5), Some(10), 50, 200).apply(vec![1, 2]);
        assert!(rows.is_empty());
        assert_eq!(info.total, 2);
        assert!(!info.has_more);
    }
}
