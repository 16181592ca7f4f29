//! The generic owned resource and the kind descriptor it is parameterised by.
//!
//! Addresses and phone numbers share one lifecycle: owned by exactly one
//! owner, soft-deleted through `is_active`, and at most one active row per
//! owner flagged `is_default`. Everything that differs between kinds lives
//! behind [`ResourceKind`].

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::Result;

// ─── Kind descriptor ─────────────────────────────────────────────────────────

/// Describes one kind of owned resource: where it is stored, what its payload
/// looks like, and which uniqueness rule applies to it.
pub trait ResourceKind: Debug + Clone + Send + Sync + 'static {
  /// Singular human-readable name, used in errors and log fields.
  const NAME: &'static str;

  /// Backing table name. Must be a trusted identifier; it is interpolated
  /// into SQL.
  const TABLE: &'static str;

  type Payload: Debug
    + Clone
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static;

  /// A partial edit of [`Self::Payload`]; `None` fields are left unchanged.
  type Patch: Debug + Clone + Default + Send + 'static;

  /// Reject payloads that are missing required fields.
  fn validate(payload: &Self::Payload) -> Result<()>;

  /// Normalise a raw natural-key value (e.g. a user-typed phone number) so it
  /// can be compared with stored keys.
  fn normalize_key(raw: &str) -> String;

  /// The normalised natural key of `payload`. One active row per owner may
  /// hold a given key.
  fn natural_key(payload: &Self::Payload) -> String;

  /// Apply `patch` to `payload` in place.
  fn apply_patch(payload: &mut Self::Payload, patch: Self::Patch);
}

// ─── Resource ────────────────────────────────────────────────────────────────

/// A stored resource of kind `K`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
  serialize = "K::Payload: Serialize",
  deserialize = "K::Payload: DeserializeOwned"
))]
pub struct Resource<K: ResourceKind> {
  pub id:         Uuid,
  pub owner_id:   Uuid,
  pub payload:    K::Payload,
  pub is_default: bool,
  /// `false` once soft-deleted. Inactive rows are never default.
  pub is_active:  bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input to [`crate::service::ResourceService::create`]. The id, owner and
/// timestamps are assigned by the service and the store.
#[derive(Debug, Clone)]
pub struct NewResource<K: ResourceKind> {
  pub payload:    K::Payload,
  pub is_default: bool,
}

impl<K: ResourceKind> NewResource<K> {
  /// A non-default resource carrying `payload`.
  pub fn new(payload: K::Payload) -> Self {
    Self { payload, is_default: false }
  }

  pub fn as_default(mut self) -> Self {
    self.is_default = true;
    self
  }
}

/// Input to [`crate::service::ResourceService::update`].
///
/// There is no way to clear the default flag through a patch: the default
/// only moves when another resource is designated or the default is deleted.
#[derive(Debug, Clone)]
pub struct ResourcePatch<K: ResourceKind> {
  pub fields:       K::Patch,
  /// Designate the resource as the owner's default.
  pub make_default: bool,
}

impl<K: ResourceKind> Default for ResourcePatch<K> {
  fn default() -> Self {
    Self { fields: K::Patch::default(), make_default: false }
  }
}

impl<K: ResourceKind> ResourcePatch<K> {
  pub fn fields(fields: K::Patch) -> Self {
    Self { fields, make_default: false }
  }

  pub fn and_make_default(mut self) -> Self {
    self.make_default = true;
    self
  }
}

/// Require a non-blank string field.
pub(crate) fn require(field: &str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(crate::Error::validation(format!("{field} is required")));
  }
  Ok(())
}
