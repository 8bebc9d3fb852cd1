use serde::Deserialize;

pub const MAX_LIMIT: i64 = 100;
const DEFAULT_LIMIT: i64 = 100;
pub const DEFAULT_SEARCH_LIMIT: i64 = 20;

/// `?skip=&limit=` query parameters.
#[derive(Deserialize, Debug, Clone, Copy, Default)]
pub struct PageParams {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

impl PageParams {
    pub fn page(self) -> Page {
        self.page_with_default(DEFAULT_LIMIT)
    }

    pub fn page_with_default(self, default_limit: i64) -> Page {
        Page {
            offset: self.skip.unwrap_or(0).max(0),
            limit: self.limit.unwrap_or(default_limit).clamp(0, MAX_LIMIT),
        }
    }
}

#[cfg(test)]
impl Page {
    /// Applies the window to an in-memory slice.
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_clamping() {
        assert_eq!(PageParams::default().page(), Page { offset: 0, limit: 100 });
        let params = PageParams { skip: Some(-4), limit: Some(500) };
        assert_eq!(params.page(), Page { offset: 0, limit: MAX_LIMIT });
        let params = PageParams { skip: Some(3), limit: Some(-1) };
        assert_eq!(params.page_with_default(DEFAULT_SEARCH_LIMIT), Page { offset: 3, limit: 0 });
        assert_eq!(PageParams::default().page_with_default(DEFAULT_SEARCH_LIMIT).limit, 20);
    }

    #[test]
    fn slice_windows_items() {
        let page = Page { offset: 1, limit: 2 };
        assert_eq!(page.slice(&[1, 2, 3, 4]), vec![2, 3]);
    }
}
