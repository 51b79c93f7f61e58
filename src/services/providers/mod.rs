/// Game library data source abstraction
///
/// The aggregation engine only sees this trait, so the Steam client can be
/// swapped for a scripted source in tests. Implementations own retries and
/// rate limiting; a returned error is final from the caller's point of view.
use crate::{
    error::AppResult,
    models::{Item, MemberId},
};

pub mod steam;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    /// Friends of the primary user, in the order the platform returns them
    async fn list_members(&self) -> AppResult<Vec<MemberId>>;

    /// Games owned by `member`, or by the primary user when `None`
    async fn list_owned_items(&self, member: Option<MemberId>) -> AppResult<Vec<Item>>;

    /// Games recently played by `member`, or by the primary user when `None`
    async fn list_recent_items(&self, member: Option<MemberId>) -> AppResult<Vec<Item>>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}
