//! Record collection seam.
//!
//! The roster controller only talks to the collection through [`RecordStore`], so the
//! same controller runs against the local SQLite collection or a remote one over HTTP.

mod http;

pub use http::HttpStore;

use async_trait::async_trait;

use crate::errors::AppError;
use crate::models::{Member, NewMember};

/// A remote collection of member records with list/insert/delete semantics.
///
/// No method retries. Every failure is returned to the caller as-is.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All records, newest first when the backend can order them.
    async fn list(&self) -> Result<Vec<Member>, AppError>;

    /// Insert one record and return it with its assigned id and `created_at`.
    async fn insert(&self, member: &NewMember) -> Result<Member, AppError>;

    /// Delete a record by id.
    async fn remove(&self, id: &str) -> Result<(), AppError>;
}
