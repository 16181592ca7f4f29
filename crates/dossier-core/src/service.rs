//! [`ResourceService`] — lifecycle operations over a [`ResourceStore`].
//!
//! The service validates input, enforces per-owner uniqueness of natural keys
//! and turns failed ownership checks into [`Error::NotFound`]. Every change to
//! a default flag is routed through the store's exclusivity transaction.

use std::{marker::PhantomData, sync::Arc};

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  Error, Result,
  phone::PhoneKind,
  resource::{NewResource, Resource, ResourceKind, ResourcePatch},
  store::{BulkOutcome, KeyScope, ResourceStore, StoreError, UpdateOutcome},
};

/// Read-modify-write attempts before giving up with [`Error::Contended`].
const MAX_WRITE_ATTEMPTS: usize = 5;

/// Lifecycle operations for resources of kind `K`, backed by store `S`.
///
/// Stateless between calls; cloning is cheap.
pub struct ResourceService<S, K> {
  store: Arc<S>,
  _kind: PhantomData<fn() -> K>,
}

impl<S, K> Clone for ResourceService<S, K> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), _kind: PhantomData }
  }
}

impl<S, K> ResourceService<S, K>
where
  S: ResourceStore<K>,
  K: ResourceKind,
{
  pub fn new(store: Arc<S>) -> Self {
    Self { store, _kind: PhantomData }
  }

  // ── Queries ───────────────────────────────────────────────────────────

  /// The owner's resources, default first, then oldest first.
  pub async fn list(
    &self,
    owner_id: Uuid,
    include_inactive: bool,
  ) -> Result<Vec<Resource<K>>> {
    debug!(kind = K::NAME, %owner_id, include_inactive, "listing resources");
    self
      .store
      .list(owner_id, include_inactive)
      .await
      .map_err(store_error)
  }

  /// The owner's default resource, or `None` if no active resource is
  /// designated.
  pub async fn get_default(&self, owner_id: Uuid) -> Result<Option<Resource<K>>> {
    self.store.get_default(owner_id).await.map_err(store_error)
  }

  /// A single resource owned by `owner_id`, including soft-deleted ones.
  pub async fn get(&self, id: Uuid, owner_id: Uuid) -> Result<Resource<K>> {
    match self.store.get(id).await.map_err(store_error)? {
      Some(r) if r.owner_id == owner_id => Ok(r),
      _ => Err(Error::NotFound(id)),
    }
  }

  /// Active resources whose natural key matches `raw_key` after
  /// normalisation, optionally ignoring one owner's rows.
  pub async fn find_by_key(
    &self,
    raw_key: &str,
    exclude_owner: Option<Uuid>,
  ) -> Result<Vec<Resource<K>>> {
    let key = K::normalize_key(raw_key);
    let scope = exclude_owner.map_or(KeyScope::All, KeyScope::ExcludingOwner);
    self.store.find_by_key(&key, scope).await.map_err(store_error)
  }

  // ── Lifecycle ─────────────────────────────────────────────────────────

  /// Create an active resource for `owner_id`.
  ///
  /// When `input.is_default` is set the new resource becomes the owner's
  /// only default.
  pub async fn create(
    &self,
    owner_id: Uuid,
    input: NewResource<K>,
  ) -> Result<Resource<K>> {
    if owner_id.is_nil() {
      return Err(Error::validation("owner id is required"));
    }
    K::validate(&input.payload)?;

    let key = K::natural_key(&input.payload);
    self.ensure_key_free(owner_id, &key, None).await?;

    let is_default = input.is_default;
    let created = self
      .store
      .insert(owner_id, input)
      .await
      .map_err(|e| key_error::<K, _>(e, &key))?;

    info!(
      kind = K::NAME,
      %owner_id,
      resource_id = %created.id,
      is_default,
      "resource created"
    );
    Ok(created)
  }

  /// Edit a resource. `patch.make_default` routes through the same path as
  /// [`Self::set_default`].
  pub async fn update(
    &self,
    id: Uuid,
    owner_id: Uuid,
    patch: ResourcePatch<K>,
  ) -> Result<Resource<K>> {
    self.guard(id, owner_id).await?;
    let ResourcePatch { fields, make_default } = patch;
    let updated = self
      .rewrite(id, owner_id, make_default, move |payload| {
        K::apply_patch(payload, fields.clone());
        Ok(())
      })
      .await?;

    if make_default {
      info!(kind = K::NAME, %owner_id, resource_id = %id, "default designated");
    }
    Ok(updated)
  }

  /// Designate `id` as the owner's default, clearing any previous default.
  /// Idempotent.
  pub async fn set_default(&self, id: Uuid, owner_id: Uuid) -> Result<Resource<K>> {
    self.guard(id, owner_id).await?;
    let resource = self
      .store
      .make_default(id, owner_id)
      .await
      .map_err(store_error)?
      .ok_or(Error::NotFound(id))?;

    info!(kind = K::NAME, %owner_id, resource_id = %id, "default designated");
    Ok(resource)
  }

  /// Soft-delete `id`. If it was the default, the owner's oldest remaining
  /// active resource is promoted; with none left the owner has no default.
  pub async fn soft_delete(&self, id: Uuid, owner_id: Uuid) -> Result<bool> {
    self.guard(id, owner_id).await?;
    let deactivation = self
      .store
      .deactivate(id, owner_id)
      .await
      .map_err(store_error)?
      .ok_or(Error::NotFound(id))?;

    match &deactivation.promoted {
      Some(successor) => info!(
        kind = K::NAME,
        %owner_id,
        resource_id = %id,
        successor_id = %successor.id,
        "default deleted, successor promoted"
      ),
      None => info!(kind = K::NAME, %owner_id, resource_id = %id, "resource deleted"),
    }
    Ok(true)
  }

  /// Activate or deactivate the listed resources of `owner_id`. Ids that are
  /// unknown or belong to another owner are ignored; resources outside `ids`
  /// are left untouched apart from default succession.
  pub async fn bulk_set_active(
    &self,
    owner_id: Uuid,
    ids: &[Uuid],
    active: bool,
  ) -> Result<BulkOutcome> {
    if ids.is_empty() {
      return Ok(BulkOutcome::default());
    }
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    let keys = if active {
      self.ensure_reactivation_keys_free(owner_id, &ids).await?
    } else {
      Vec::new()
    };

    let outcome = self
      .store
      .set_active_many(owner_id, ids, active)
      .await
      .map_err(|e| key_error::<K, _>(e, &keys.join(", ")))?;

    info!(
      kind = K::NAME,
      %owner_id,
      active,
      changed = outcome.changed.len(),
      promoted = ?outcome.promoted,
      "bulk status change"
    );
    Ok(outcome)
  }

  // ── Helpers ───────────────────────────────────────────────────────────

  /// The ownership guard, mapped to [`Error::NotFound`].
  async fn guard(&self, id: Uuid, owner_id: Uuid) -> Result<()> {
    let owned = self
      .store
      .is_owned_by(id, owner_id, true)
      .await
      .map_err(store_error)?;
    if owned { Ok(()) } else { Err(Error::NotFound(id)) }
  }

  /// Fetch an active resource of `owner_id` for modification. Run after
  /// [`Self::guard`]; the row may have changed in between.
  async fn load_owned(&self, id: Uuid, owner_id: Uuid) -> Result<Resource<K>> {
    match self.store.get(id).await.map_err(store_error)? {
      Some(r) if r.owner_id == owner_id && r.is_active => Ok(r),
      _ => Err(Error::NotFound(id)),
    }
  }

  /// Read the current payload, apply `edit`, validate and write it back.
  ///
  /// The write only lands if the row is unchanged since the read; otherwise
  /// the whole cycle starts again from a fresh read, so edits committed by
  /// other writers in between are kept.
  async fn rewrite<F>(
    &self,
    id: Uuid,
    owner_id: Uuid,
    make_default: bool,
    mut edit: F,
  ) -> Result<Resource<K>>
  where
    F: FnMut(&mut K::Payload) -> Result<()>,
  {
    for attempt in 1..=MAX_WRITE_ATTEMPTS {
      let current = self.load_owned(id, owner_id).await?;
      let mut payload = current.payload;
      edit(&mut payload)?;
      K::validate(&payload)?;

      let key = K::natural_key(&payload);
      self.ensure_key_free(owner_id, &key, Some(id)).await?;

      let outcome = self
        .store
        .update(id, owner_id, current.updated_at, payload, make_default)
        .await
        .map_err(|e| key_error::<K, _>(e, &key))?
        .ok_or(Error::NotFound(id))?;

      match outcome {
        UpdateOutcome::Updated(resource) => return Ok(resource),
        UpdateOutcome::Stale => {
          debug!(kind = K::NAME, %owner_id, resource_id = %id, attempt, "stale read, retrying");
        }
      }
    }
    Err(Error::Contended(id))
  }

  async fn ensure_key_free(
    &self,
    owner_id: Uuid,
    key: &str,
    except: Option<Uuid>,
  ) -> Result<()> {
    let holders = self
      .store
      .find_by_key(key, KeyScope::Owner(owner_id))
      .await
      .map_err(store_error)?;
    if holders.iter().any(|r| Some(r.id) != except) {
      return Err(Error::Duplicate { kind: K::NAME, key: key.to_owned() });
    }
    Ok(())
  }

  /// Reject a reactivation that would give the owner two active rows with
  /// the same natural key, either with an active sibling or within `ids`.
  /// Returns the keys being reclaimed.
  async fn ensure_reactivation_keys_free(
    &self,
    owner_id: Uuid,
    ids: &[Uuid],
  ) -> Result<Vec<String>> {
    let mut claimed: Vec<String> = Vec::new();
    for id in ids {
      let Some(r) = self.store.get(*id).await.map_err(store_error)? else {
        continue;
      };
      if r.owner_id != owner_id || r.is_active {
        continue;
      }
      let key = K::natural_key(&r.payload);
      if claimed.contains(&key) {
        return Err(Error::Duplicate { kind: K::NAME, key });
      }
      self.ensure_key_free(owner_id, &key, None).await?;
      claimed.push(key);
    }
    Ok(claimed)
  }
}

impl<S> ResourceService<S, PhoneKind>
where
  S: ResourceStore<PhoneKind>,
{
  /// Mark a phone number as verified now. The number verified is the one
  /// stored at the time of the write.
  pub async fn verify(&self, id: Uuid, owner_id: Uuid) -> Result<Resource<PhoneKind>> {
    self.guard(id, owner_id).await?;
    let verified = self
      .rewrite(id, owner_id, false, |phone| {
        phone.mark_verified(Utc::now());
        Ok(())
      })
      .await?;

    info!(%owner_id, resource_id = %id, "phone number verified");
    Ok(verified)
  }
}

fn store_error<E: StoreError>(e: E) -> Error { Error::Store(Box::new(e)) }

/// Map a write failure, reporting a lost race on the natural key as a
/// duplicate.
fn key_error<K: ResourceKind, E: StoreError>(e: E, key: &str) -> Error {
  if e.is_conflict() {
    Error::Duplicate { kind: K::NAME, key: key.to_owned() }
  } else {
    store_error(e)
  }
}
