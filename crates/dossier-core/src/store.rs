//! The `ResourceStore` trait and supporting types.
//!
//! The trait is implemented by storage backends (e.g.
//! `dossier-store-sqlite`). [`crate::service::ResourceService`] depends on
//! this abstraction, not on any concrete backend.
//!
//! Every mutating method is atomic: it either commits entirely or leaves the
//! store untouched. Mutating methods re-check ownership and activity of the
//! row they touch inside their own transaction and return `None` when the
//! check fails.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::resource::{NewResource, Resource, ResourceKind};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Error type of a [`ResourceStore`] backend.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// `true` if the failure was a violated natural-key uniqueness constraint,
  /// i.e. a concurrent writer claimed the same key first.
  fn is_conflict(&self) -> bool { false }
}

// ─── Query and result types ──────────────────────────────────────────────────

/// Owner filter for [`ResourceStore::find_by_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScope {
  /// Only rows belonging to this owner.
  Owner(Uuid),
  /// Rows of every owner except this one.
  ExcludingOwner(Uuid),
  /// Rows of every owner.
  All,
}

/// Result of [`ResourceStore::deactivate`].
#[derive(Debug, Clone)]
pub struct Deactivation<K: ResourceKind> {
  /// The deactivated row, already inactive and non-default.
  pub resource: Resource<K>,
  /// The sibling promoted to default because `resource` was the default.
  pub promoted: Option<Resource<K>>,
}

/// Result of [`ResourceStore::update`] on an owned, active row.
#[derive(Debug, Clone)]
pub enum UpdateOutcome<K: ResourceKind> {
  /// The payload was written; carries the refreshed row.
  Updated(Resource<K>),
  /// The row was modified after the caller read it. Nothing was written.
  Stale,
}

/// Result of [`ResourceStore::set_active_many`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
  /// Rows whose `is_active` flag actually changed.
  pub changed:  Vec<Uuid>,
  /// The row promoted to default because the previous default was
  /// deactivated.
  pub promoted: Option<Uuid>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a backend holding resources of kind `K`.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait ResourceStore<K: ResourceKind>: Send + Sync {
  type Error: StoreError;

  // ── Ownership guard ───────────────────────────────────────────────────

  /// `true` if `id` exists, belongs to `owner_id` and, when `active_only`,
  /// has not been soft-deleted. Missing and foreign rows yield `false`.
  fn is_owned_by(
    &self,
    id: Uuid,
    owner_id: Uuid,
    active_only: bool,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Retrieve a row by id regardless of owner or activity.
  fn get(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Resource<K>>, Self::Error>> + Send + '_;

  /// The owner's rows, default first, then by creation time.
  fn list(
    &self,
    owner_id: Uuid,
    include_inactive: bool,
  ) -> impl Future<Output = Result<Vec<Resource<K>>, Self::Error>> + Send + '_;

  /// The owner's active default row, if any.
  fn get_default(
    &self,
    owner_id: Uuid,
  ) -> impl Future<Output = Result<Option<Resource<K>>, Self::Error>> + Send + '_;

  /// Active rows whose normalised natural key equals `key`.
  fn find_by_key<'a>(
    &'a self,
    key: &'a str,
    scope: KeyScope,
  ) -> impl Future<Output = Result<Vec<Resource<K>>, Self::Error>> + Send + 'a;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Insert an active row. If `input.is_default`, the owner's other rows are
  /// cleared in the same transaction.
  fn insert(
    &self,
    owner_id: Uuid,
    input: NewResource<K>,
  ) -> impl Future<Output = Result<Resource<K>, Self::Error>> + Send + '_;

  /// The exclusivity transaction: clear `is_default` on every other row of
  /// the owner and set it on `id`, atomically. Returns the refreshed row.
  ///
  /// Callers must have checked ownership with [`Self::is_owned_by`].
  fn make_default(
    &self,
    id: Uuid,
    owner_id: Uuid,
  ) -> impl Future<Output = Result<Option<Resource<K>>, Self::Error>> + Send + '_;

  /// Replace the payload of `id` and refresh `updated_at`; with
  /// `make_default`, also run the exclusivity transaction on it.
  ///
  /// `read_at` is the `updated_at` the caller saw when it read the payload.
  /// If the row has changed since, nothing is written and
  /// [`UpdateOutcome::Stale`] is returned.
  fn update(
    &self,
    id: Uuid,
    owner_id: Uuid,
    read_at: DateTime<Utc>,
    payload: K::Payload,
    make_default: bool,
  ) -> impl Future<Output = Result<Option<UpdateOutcome<K>>, Self::Error>> + Send + '_;

  /// Soft-delete `id`. If it was the default, promote the owner's earliest
  /// created remaining active row in the same transaction.
  fn deactivate(
    &self,
    id: Uuid,
    owner_id: Uuid,
  ) -> impl Future<Output = Result<Option<Deactivation<K>>, Self::Error>> + Send + '_;

  /// Set `is_active` on exactly those `ids` owned by `owner_id`; other rows
  /// are never modified except for default succession, which follows the
  /// same rule as [`Self::deactivate`]. Reactivated rows are never default.
  fn set_active_many(
    &self,
    owner_id: Uuid,
    ids: Vec<Uuid>,
    active: bool,
  ) -> impl Future<Output = Result<BulkOutcome, Self::Error>> + Send + '_;
}
