//! Lazy traversal of paginated collections.

use std::collections::HashSet;
use std::future::Future;

use futures_util::stream::{self, Stream, TryStreamExt};
use tracing::warn;

use super::{Page, PageCursor};
use crate::bitbucket::error::BitbucketError;

/// Turns a page fetcher into a lazy stream of items.
///
/// The first page is requested on first poll; each following page only when
/// the previous one is drained. The stream ends after a page without a
/// `next` link, at a `next` link already followed, or at the first error.
///
/// # Example
///
/// ```
/// use bbpr::bitbucket::gateway::{Page, PageCursor, paginate};
/// use futures_util::TryStreamExt;
///
/// # block_on(async {
/// let items: Vec<u32> = paginate(|cursor: PageCursor| async move {
///     Ok(match cursor {
///         PageCursor::First => Page {
///             items: vec![1, 2],
///             next: Some("https://api.bitbucket.org/2.0/x?page=2".parse().unwrap()),
///         },
///         PageCursor::Next(_) => Page { items: vec![3], next: None },
///     })
/// })
/// .try_collect()
/// .await
/// .unwrap();
/// assert_eq!(items, vec![1, 2, 3]);
/// # });
/// # fn block_on(future: impl std::future::Future<Output = ()>) {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(future);
/// # }
/// ```
pub fn paginate<'a, T, F, Fut>(mut fetch: F) -> impl Stream<Item = Result<T, BitbucketError>> + 'a
where
    T: 'a,
    F: FnMut(PageCursor) -> Fut + 'a,
    Fut: Future<Output = Result<Page<T>, BitbucketError>> + 'a,
{
    let start = (Some(PageCursor::First), HashSet::new());
    stream::try_unfold(start, move |(cursor, mut visited)| {
        let request = cursor.map(&mut fetch);
        async move {
            let Some(pending) = request else {
                return Ok(None);
            };
            let page = pending.await?;
            let following = page
                .next
                .filter(|link| {
                    let unseen = visited.insert(link.clone());
                    if !unseen {
                        warn!(%link, "pagination link repeats a fetched page, stopping");
                    }
                    unseen
                })
                .map(PageCursor::Next);
            let items = stream::iter(page.items.into_iter().map(Ok::<T, BitbucketError>));
            Ok(Some((items, (following, visited))))
        }
    })
    .try_flatten()
}

/// Drains every page into a vector.
///
/// # Errors
///
/// Returns the first error raised while fetching a page.
pub async fn collect_all<T, S>(items: S) -> Result<Vec<T>, BitbucketError>
where
    S: Stream<Item = Result<T, BitbucketError>>,
{
    items.try_collect().await
}
