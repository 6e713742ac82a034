//! Query request and page response models.

use serde::{Deserialize, Serialize};

use crate::models::Publication;

/// Page size used when neither the caller nor the library picks one
pub const DEFAULT_PER_PAGE: usize = 25;

/// Number of pages needed to cover `total` items with pages of `per_page`.
///
/// Returns 0 for an empty result set. A `per_page` of zero is never valid
/// once fetching begins and also yields 0.
pub fn rounds_needed(total: usize, per_page: usize) -> usize {
    if per_page == 0 {
        return 0;
    }
    total.div_ceil(per_page)
}

/// A query split into fixed-size pages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Free-text query string
    pub query: String,

    /// Zero-based page index
    pub page: usize,

    /// Page size, 0 while unresolved
    pub per_page: usize,

    /// Number of pages needed to cover the result set
    pub max_page: usize,
}

impl Request {
    /// Create a new request for the first page with an unresolved page size
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            page: 0,
            per_page: 0,
            max_page: 0,
        }
    }

    /// Set the page size
    pub fn per_page(mut self, per_page: usize) -> Self {
        self.per_page = per_page;
        self
    }

    /// Index of the first item of this page within the full result set
    pub fn offset(&self) -> usize {
        self.page * self.per_page
    }

    /// Resolve pagination parameters for a result set of `total` items.
    ///
    /// An unresolved page size is replaced by `default_per_page`.
    pub fn resolve(&self, default_per_page: usize, total: usize) -> Self {
        let per_page = if self.per_page == 0 {
            default_per_page.max(1)
        } else {
            self.per_page
        };

        Self {
            query: self.query.clone(),
            page: 0,
            per_page,
            max_page: rounds_needed(total, per_page),
        }
    }

    /// Clone this request for page `page`
    pub fn for_page(&self, page: usize) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }

    /// One request per page, in page order
    pub fn pages(&self) -> impl Iterator<Item = Request> + '_ {
        (0..self.max_page).map(move |page| self.for_page(page))
    }
}

/// The publications returned for one page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// The request that produced this page
    pub request: Request,

    /// Publications in backend order
    pub literature: Vec<Publication>,
}

impl Response {
    pub fn new(request: Request, literature: Vec<Publication>) -> Self {
        Self {
            request,
            literature,
        }
    }

    pub fn len(&self) -> usize {
        self.literature.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literature.is_empty()
    }
}
