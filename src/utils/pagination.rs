use std::num::IntErrorKind;

/// Page number used when the query string carries none or garbage
pub const DEFAULT_PAGE: i64 = 1;

/// Read the raw `?page=` value
///
/// Missing and non-numeric values fall back to the first page. Numbers too
/// large for `i64` saturate, so range problems are all left to [`Page::new`].
pub fn parse_page(raw: Option<&str>) -> i64 {
    let Some(value) = raw else {
        return DEFAULT_PAGE;
    };

    match value.trim().parse::<i64>() {
        Ok(page) => page,
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => i64::MAX,
            IntErrorKind::NegOverflow => i64::MIN,
            _ => DEFAULT_PAGE,
        },
    }
}

/// One page of an already filtered and ordered collection
///
/// Requests never fail on range: anything below 1 is page 1, anything past
/// the end is the last page. An empty collection still has one (empty) page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Page {
    pub fn new(requested: i64, limit: i64, total: i64) -> Self {
        let limit = limit.max(1);
        let total = total.max(0);
        let total_pages = ((total + limit - 1) / limit).max(1);

        Page {
            number: requested.clamp(1, total_pages),
            limit,
            total,
            total_pages,
        }
    }

    /// Rows to skip before this page
    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.limit
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }
}
