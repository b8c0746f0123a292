//! Keyset pagination over entity IDs.
//!
//! The page token is the last ID the caller saw; the next page holds IDs
//! strictly greater than it. Tokens are compared, never looked up, so a
//! token naming a deleted row is still valid.

use forge_db::Page;
use forge_types::api::PageQuery;

pub fn page_from_query(query: &PageQuery) -> Page {
    Page {
        after: (!query.page_token.is_empty()).then(|| query.page_token.clone()),
        limit: u32::try_from(query.page_size).ok().filter(|n| *n > 0),
    }
}

/// ID of the last item, or empty when there is none.
pub fn next_page_token<T>(items: &[T], id: impl Fn(&T) -> &str) -> String {
    items.last().map(|item| id(item).to_string()).unwrap_or_default()
}

/// Run `fetch` for the page described by `query` and pair the rows with
/// the token for the following page.
pub fn paginate<T, E>(
    query: &PageQuery,
    fetch: impl FnOnce(&Page) -> Result<Vec<T>, E>,
    id: impl Fn(&T) -> &str,
) -> Result<(Vec<T>, String), E> {
    let items = fetch(&page_from_query(query))?;
    let token = next_page_token(&items, id);
    Ok((items, token))
}
