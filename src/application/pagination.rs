//! Numbered page windows over post listings.
//!
//! A listing is split into fixed-size pages addressed by a 1-based `page`
//! query parameter. Requests never fail on a bad page number: unparseable input
//! selects the first page and out-of-range numbers clamp to the nearest page
//! that exists. An empty listing still has one (empty) page.

use std::future::Future;
use std::num::IntErrorKind;

use serde::Serialize;

/// Posts per listing page.
pub const PAGE_SIZE: u64 = 10;

/// A page request decoded from the raw query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageParam {
    /// A concrete 1-based page number, possibly past the end.
    Number(u64),
    /// A number too large to represent; always the last page.
    Last,
}

impl PageParam {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim) else {
            return PageParam::Number(1);
        };
        match raw.parse::<i64>() {
            Ok(value) if value < 1 => PageParam::Number(1),
            Ok(value) => PageParam::Number(value as u64),
            Err(err) if *err.kind() == IntErrorKind::PosOverflow => PageParam::Last,
            Err(_) => PageParam::Number(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    per_page: u64,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(PAGE_SIZE)
    }
}

impl Paginator {
    pub fn new(per_page: u64) -> Self {
        Self {
            per_page: per_page.max(1),
        }
    }

    pub fn num_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.per_page).max(1)
    }

    /// Clamp the request onto `1..=num_pages`.
    pub fn resolve(&self, total: u64, param: PageParam) -> u64 {
        let last = self.num_pages(total);
        match param {
            PageParam::Number(number) => number.clamp(1, last),
            PageParam::Last => last,
        }
    }

    /// Window over an in-memory, already ordered sequence.
    pub fn paginate<T: Clone>(&self, items: &[T], param: PageParam) -> PageWindow<T> {
        let total = items.len() as u64;
        let number = self.resolve(total, param);
        let start = ((number - 1) * self.per_page) as usize;
        let end = (start + self.per_page as usize).min(items.len());
        let slice = items.get(start..end).unwrap_or_default().to_vec();
        PageWindow::new(slice, number, total, self.per_page)
    }

    /// Window fetched from storage: count first, then load `(offset, limit)` only.
    pub async fn paginate_with<T, F, Fut, E>(
        &self,
        total: u64,
        param: PageParam,
        fetch: F,
    ) -> Result<PageWindow<T>, E>
    where
        F: FnOnce(u64, u64) -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>>,
    {
        let number = self.resolve(total, param);
        let offset = (number - 1) * self.per_page;
        let items = if total == 0 {
            Vec::new()
        } else {
            fetch(offset, self.per_page).await?
        };
        Ok(PageWindow::new(items, number, total, self.per_page))
    }
}

/// One page of a listing plus the navigation metadata templates render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageWindow<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub total_count: u64,
    pub per_page: u64,
}

impl<T> PageWindow<T> {
    fn new(items: Vec<T>, number: u64, total_count: u64, per_page: u64) -> Self {
        let num_pages = total_count.div_ceil(per_page).max(1);
        Self {
            items,
            number,
            num_pages,
            total_count,
            per_page,
        }
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_other_pages(&self) -> bool {
        self.has_next() || self.has_previous()
    }

    pub fn next_page_number(&self) -> Option<u64> {
        self.has_next().then_some(self.number + 1)
    }

    pub fn previous_page_number(&self) -> Option<u64> {
        self.has_previous().then_some(self.number - 1)
    }

    /// 1-based index of the first item on this page, 0 for an empty listing.
    pub fn start_index(&self) -> u64 {
        if self.total_count == 0 {
            0
        } else {
            (self.number - 1) * self.per_page + 1
        }
    }

    pub fn end_index(&self) -> u64 {
        if self.number == self.num_pages {
            self.total_count
        } else {
            self.number * self.per_page
        }
    }

    pub fn page_range(&self) -> std::ops::RangeInclusive<u64> {
        1..=self.num_pages
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageWindow<U> {
        PageWindow {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            total_count: self.total_count,
            per_page: self.per_page,
        }
    }
}
