//! Pagination drivers.
//!
//! The drivers only loop and decide when to stop; the caller's fetch
//! function performs the I/O (and is expected to go through the retry
//! policy and the appropriate throttler). Pages are fetched strictly one
//! after another, in the order the server hands out cursors.

use std::future::Future;

use tracing::debug;

use crate::cancel::CancellationToken;
use crate::error::{Error, ErrorKind, Result};

/// Where the next page starts.
///
/// `token == None && !has_more` is the terminal state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageCursor {
    pub token: Option<String>,
    pub has_more: bool,
}

impl PageCursor {
    /// A cursor pointing at a further page.
    pub fn next(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            has_more: true,
        }
    }

    /// The terminal cursor.
    pub fn end() -> Self {
        Self::default()
    }
}

/// One page from a cursor-style endpoint.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: PageCursor,
}

/// One page from a link-header-style endpoint.
#[derive(Debug, Clone)]
pub struct LinkPage<T> {
    pub items: Vec<T>,
    /// Raw value of the response's `Link` header, if any.
    pub link_header: Option<String>,
}

/// Fetch every page of a cursor-paginated collection.
///
/// `fetch_page` receives `None` for the first page and the previous page's
/// cursor token afterwards.
pub async fn paginate_cursor<T, F, Fut>(cancel: &CancellationToken, mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut all_items = Vec::new();
    let mut token: Option<String> = None;
    let mut page_number = 0u32;

    loop {
        cancel.check()?;
        page_number += 1;

        let page = fetch_page(token.take()).await?;
        debug!(page = page_number, items = page.items.len(), has_more = page.next.has_more, "Fetched page");
        all_items.extend(page.items);

        if !page.next.has_more {
            break;
        }
        match page.next.token {
            Some(next) => token = Some(next),
            None => {
                return Err(Error::new(ErrorKind::Pagination(format!(
                    "page {page_number} reported more pages without a cursor"
                ))))
            }
        }
    }

    Ok(all_items)
}

/// Fetch every page of a collection paginated through `Link` headers.
///
/// `fetch_page` receives a query string (without the leading `?`): first
/// `initial_query`, then the query of each response's `rel="next"` link.
/// Stops when there is no next link or a page comes back empty.
pub async fn paginate_link_header<T, F, Fut>(
    cancel: &CancellationToken,
    initial_query: impl Into<String>,
    mut fetch_page: F,
) -> Result<Vec<T>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<LinkPage<T>>>,
{
    let mut all_items = Vec::new();
    let mut query = initial_query.into();
    let mut page_number = 0u32;

    loop {
        cancel.check()?;
        page_number += 1;

        let page = fetch_page(std::mem::take(&mut query)).await?;
        debug!(page = page_number, items = page.items.len(), "Fetched page");

        if page.items.is_empty() {
            break;
        }
        all_items.extend(page.items);

        match page.link_header.as_deref().and_then(next_page_query) {
            Some(next) => query = next,
            None => break,
        }
    }

    Ok(all_items)
}

/// One entry of a `Link` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: String,
    pub rel: String,
}

/// Parse a `Link` header: a comma-separated list of `<url>; rel="..."`.
///
/// Commas inside `<...>` or quoted parameter values belong to the entry.
/// Malformed entries are skipped.
pub fn parse_link_header(value: &str) -> Vec<Link> {
    let mut links = Vec::new();
    let mut rest = value;

    while let Some(open) = rest.find('<') {
        let Some(close) = rest[open..].find('>').map(|i| open + i) else {
            break;
        };
        let url = rest[open + 1..close].trim();
        let after = &rest[close + 1..];

        let params_end = top_level_comma(after).unwrap_or(after.len());
        let rel = after[..params_end].split(';').find_map(|param| {
            let (key, value) = param.split_once('=')?;
            if key.trim().eq_ignore_ascii_case("rel") {
                Some(value.trim().trim_matches('"').to_string())
            } else {
                None
            }
        });

        if let Some(rel) = rel {
            links.push(Link {
                url: url.to_string(),
                rel,
            });
        }

        rest = after.get(params_end + 1..).unwrap_or("");
    }

    links
}

/// Byte offset of the first comma outside a quoted string.
fn top_level_comma(params: &str) -> Option<usize> {
    let mut quoted = false;
    for (i, c) in params.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => return Some(i),
            _ => {}
        }
    }
    None
}

/// The query string of the `rel="next"` link, if present.
pub fn next_page_query(link_header: &str) -> Option<String> {
    let link = parse_link_header(link_header)
        .into_iter()
        .find(|link| link.rel.split_whitespace().any(|rel| rel == "next"))?;

    let query = match url::Url::parse(&link.url) {
        Ok(url) => url.query().map(str::to_string),
        Err(_) => link.url.split_once('?').map(|(_, query)| query.to_string()),
    };
    query.filter(|q| !q.is_empty())
}
