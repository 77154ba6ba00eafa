//! Cursor-paginated list responses

use serde::{Deserialize, Serialize};
use url::Url;

/// Query parameter carrying the page position in `next`/`previous` URLs
pub const CURSOR_PARAM: &str = "cursor";

/// One page of a list endpoint: `{next, previous, results}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResponse<T> {
    /// URL of the following page, absent or empty on the last page
    #[serde(default)]
    pub next: Option<String>,
    /// URL of the preceding page, absent or empty on the first page
    #[serde(default)]
    pub previous: Option<String>,
    /// Items on this page
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

impl<T> PageResponse<T> {
    /// Create a page
    pub fn new(next: Option<&str>, previous: Option<&str>, results: Vec<T>) -> Self {
        Self {
            next: next.map(str::to_string),
            previous: previous.map(str::to_string),
            results,
        }
    }

    /// The `next` URL, treating an empty string as absent
    pub fn next_url(&self) -> Option<&str> {
        non_empty(self.next.as_deref())
    }

    /// The `previous` URL, treating an empty string as absent
    pub fn previous_url(&self) -> Option<&str> {
        non_empty(self.previous.as_deref())
    }
}

fn non_empty(url: Option<&str>) -> Option<&str> {
    url.filter(|u| !u.is_empty())
}

/// Extract the `cursor` query value from a page URL
///
/// Relative URLs are accepted. Returns `None` for an unparsable URL or one
/// without a cursor.
pub fn extract_cursor(page_url: &str) -> Option<String> {
    if page_url.is_empty() {
        return None;
    }

    let url = Url::parse(page_url)
        .or_else(|_| Url::parse("http://localhost/").and_then(|base| base.join(page_url)))
        .ok()?;

    url.query_pairs()
        .find(|(key, _)| key == CURSOR_PARAM)
        .map(|(_, value)| value.into_owned())
}
