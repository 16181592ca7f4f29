//! [`SqliteStore`] — the SQLite implementation of [`ResourceStore`].

use std::{path::Path, time::Duration};

use chrono::{DateTime, Utc};
use dossier_core::{
  NewResource, Resource, ResourceKind,
  store::{BulkOutcome, Deactivation, KeyScope, ResourceStore, UpdateOutcome},
};
use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{COLUMNS, RawResource, decode_uuid, encode_dt, encode_payload, encode_uuid},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// How long a writer waits for another connection's transaction to finish.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A Dossier resource store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. All calls
/// are executed one at a time on the connection's thread; mutations that span
/// several statements run in an `IMMEDIATE` transaction.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let shown = path.as_ref().display().to_string();
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    tracing::debug!(path = %shown, "opened sqlite store");
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Statement helpers ───────────────────────────────────────────────────────
//
// These run on the connection thread, usually inside an open transaction.

fn select_one(
  conn: &Connection,
  table: &str,
  id: &str,
) -> rusqlite::Result<Option<RawResource>> {
  conn
    .query_row(
      &format!("SELECT {COLUMNS} FROM {table} WHERE resource_id = ?1"),
      rusqlite::params![id],
      RawResource::from_row,
    )
    .optional()
}

/// The ownership guard as run inside a mutating transaction: the row must
/// exist, belong to `owner` and be active.
fn select_owned_active(
  conn: &Connection,
  table: &str,
  id: &str,
  owner: &str,
) -> rusqlite::Result<Option<RawResource>> {
  conn
    .query_row(
      &format!(
        "SELECT {COLUMNS} FROM {table}
         WHERE resource_id = ?1 AND owner_id = ?2 AND is_active = 1"
      ),
      rusqlite::params![id, owner],
      RawResource::from_row,
    )
    .optional()
}

/// The exclusivity primitive: clear every other default of `owner`, then set
/// `id`. Both statements must run in the caller's transaction.
///
/// The clear is not restricted to active rows. Rows already in the target
/// state are left alone so repeated calls do not refresh `updated_at`.
fn promote(
  conn: &Connection,
  table: &str,
  id: &str,
  owner: &str,
  now: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    &format!(
      "UPDATE {table} SET is_default = 0, updated_at = ?3
       WHERE owner_id = ?1 AND resource_id != ?2 AND is_default = 1"
    ),
    rusqlite::params![owner, id, now],
  )?;
  conn.execute(
    &format!(
      "UPDATE {table} SET is_default = 1, updated_at = ?2
       WHERE resource_id = ?1 AND is_default = 0"
    ),
    rusqlite::params![id, now],
  )?;
  Ok(())
}

/// The successor picked when the default goes away: the earliest created
/// active row, ties broken by insertion order.
fn oldest_active(
  conn: &Connection,
  table: &str,
  owner: &str,
) -> rusqlite::Result<Option<String>> {
  conn
    .query_row(
      &format!(
        "SELECT resource_id FROM {table}
         WHERE owner_id = ?1 AND is_active = 1
         ORDER BY created_at ASC, rowid ASC
         LIMIT 1"
      ),
      rusqlite::params![owner],
      |r| r.get(0),
    )
    .optional()
}

fn decode_all<K: ResourceKind>(raws: Vec<RawResource>) -> Result<Vec<Resource<K>>> {
  raws.into_iter().map(RawResource::into_resource).collect()
}

// ─── ResourceStore impl ──────────────────────────────────────────────────────

impl<K: ResourceKind> ResourceStore<K> for SqliteStore {
  type Error = Error;

  // ── Ownership guard ───────────────────────────────────────────────────────

  async fn is_owned_by(&self, id: Uuid, owner_id: Uuid, active_only: bool) -> Result<bool> {
    let table     = K::TABLE;
    let id_str    = encode_uuid(id);
    let owner_str = encode_uuid(owner_id);

    let is_active: Option<bool> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT is_active FROM {table} WHERE resource_id = ?1 AND owner_id = ?2"
              ),
              rusqlite::params![id_str, owner_str],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    Ok(is_active.is_some_and(|active| active || !active_only))
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get(&self, id: Uuid) -> Result<Option<Resource<K>>> {
    let table  = K::TABLE;
    let id_str = encode_uuid(id);

    let raw = self
      .conn
      .call(move |conn| Ok(select_one(conn, table, &id_str)?))
      .await?;

    raw.map(RawResource::into_resource).transpose()
  }

  async fn list(&self, owner_id: Uuid, include_inactive: bool) -> Result<Vec<Resource<K>>> {
    let table     = K::TABLE;
    let owner_str = encode_uuid(owner_id);

    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {COLUMNS} FROM {table}
           WHERE owner_id = ?1 AND (?2 OR is_active = 1)
           ORDER BY is_default DESC, created_at ASC, rowid ASC"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![owner_str, include_inactive],
            RawResource::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    decode_all(raws)
  }

  async fn get_default(&self, owner_id: Uuid) -> Result<Option<Resource<K>>> {
    let table     = K::TABLE;
    let owner_str = encode_uuid(owner_id);

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {COLUMNS} FROM {table}
                 WHERE owner_id = ?1 AND is_default = 1 AND is_active = 1"
              ),
              rusqlite::params![owner_str],
              RawResource::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawResource::into_resource).transpose()
  }

  async fn find_by_key(&self, key: &str, scope: KeyScope) -> Result<Vec<Resource<K>>> {
    let table = K::TABLE;
    let key   = key.to_owned();
    let (owner_cond, owner_str) = match scope {
      KeyScope::Owner(o) => ("owner_id = ?2", Some(encode_uuid(o))),
      KeyScope::ExcludingOwner(o) => ("owner_id != ?2", Some(encode_uuid(o))),
      KeyScope::All => ("?2 IS NULL", None),
    };

    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {COLUMNS} FROM {table}
           WHERE natural_key = ?1 AND is_active = 1 AND {owner_cond}
           ORDER BY created_at ASC, rowid ASC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![key, owner_str], RawResource::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    decode_all(raws)
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn insert(&self, owner_id: Uuid, input: NewResource<K>) -> Result<Resource<K>> {
    let table        = K::TABLE;
    let id           = Uuid::new_v4();
    let id_str       = encode_uuid(id);
    let owner_str    = encode_uuid(owner_id);
    let key          = K::natural_key(&input.payload);
    let payload_json = encode_payload::<K>(&input.payload)?;
    let now          = encode_dt(Utc::now());
    let as_default   = input.is_default;

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
          &format!(
            "INSERT INTO {table} (
               resource_id, owner_id, natural_key, payload_json,
               is_default, is_active, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, 0, 1, ?5, ?5)"
          ),
          rusqlite::params![id_str, owner_str, key, payload_json, now],
        )?;
        if as_default {
          promote(&tx, table, &id_str, &owner_str, &now)?;
        }
        let raw = select_one(&tx, table, &id_str)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.ok_or(Error::MissingRow(id))?.into_resource()
  }

  async fn make_default(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Resource<K>>> {
    let table     = K::TABLE;
    let id_str    = encode_uuid(id);
    let owner_str = encode_uuid(owner_id);
    let now       = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if select_owned_active(&tx, table, &id_str, &owner_str)?.is_none() {
          return Ok(None);
        }
        promote(&tx, table, &id_str, &owner_str, &now)?;
        let raw = select_one(&tx, table, &id_str)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.map(RawResource::into_resource).transpose()
  }

  async fn update(
    &self,
    id: Uuid,
    owner_id: Uuid,
    read_at: DateTime<Utc>,
    payload: K::Payload,
    make_default: bool,
  ) -> Result<Option<UpdateOutcome<K>>> {
    let table        = K::TABLE;
    let id_str       = encode_uuid(id);
    let owner_str    = encode_uuid(owner_id);
    let read_at      = encode_dt(read_at);
    let key          = K::natural_key(&payload);
    let payload_json = encode_payload::<K>(&payload)?;
    let now          = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let Some(current) = select_owned_active(&tx, table, &id_str, &owner_str)? else {
          return Ok(None);
        };
        // Outer `Some`: the row is owned and active. Inner `None`: it changed
        // after the caller read it.
        if current.updated_at != read_at {
          return Ok(Some(None));
        }
        tx.execute(
          &format!(
            "UPDATE {table}
             SET payload_json = ?2, natural_key = ?3, updated_at = ?4
             WHERE resource_id = ?1"
          ),
          rusqlite::params![id_str, payload_json, key, now],
        )?;
        if make_default {
          promote(&tx, table, &id_str, &owner_str, &now)?;
        }
        let raw = select_one(&tx, table, &id_str)?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;

    match raw {
      None => Ok(None),
      Some(None) => Ok(Some(UpdateOutcome::Stale)),
      Some(Some(raw)) => Ok(Some(UpdateOutcome::Updated(raw.into_resource()?))),
    }
  }

  async fn deactivate(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Deactivation<K>>> {
    let table     = K::TABLE;
    let id_str    = encode_uuid(id);
    let owner_str = encode_uuid(owner_id);
    let now       = encode_dt(Utc::now());

    let raws = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let Some(current) = select_owned_active(&tx, table, &id_str, &owner_str)? else {
          return Ok(None);
        };
        tx.execute(
          &format!(
            "UPDATE {table} SET is_active = 0, is_default = 0, updated_at = ?2
             WHERE resource_id = ?1"
          ),
          rusqlite::params![id_str, now],
        )?;

        let mut promoted = None;
        if current.is_default
          && let Some(successor) = oldest_active(&tx, table, &owner_str)?
        {
          promote(&tx, table, &successor, &owner_str, &now)?;
          promoted = select_one(&tx, table, &successor)?;
        }

        let deactivated = select_one(&tx, table, &id_str)?;
        tx.commit()?;
        Ok(deactivated.map(|d| (d, promoted)))
      })
      .await?;

    let Some((deactivated, promoted)) = raws else {
      return Ok(None);
    };
    Ok(Some(Deactivation {
      resource: deactivated.into_resource()?,
      promoted: promoted.map(RawResource::into_resource).transpose()?,
    }))
  }

  async fn set_active_many(
    &self,
    owner_id: Uuid,
    ids: Vec<Uuid>,
    active: bool,
  ) -> Result<BulkOutcome> {
    let table     = K::TABLE;
    let owner_str = encode_uuid(owner_id);
    let id_strs   = ids.into_iter().map(encode_uuid).collect::<Vec<_>>();
    let now       = encode_dt(Utc::now());

    let (changed, promoted): (Vec<String>, Option<String>) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut changed = Vec::new();
        let mut lost_default = false;
        {
          // Scoped by both owner and id: rows outside `ids` are never
          // selected here.
          let mut select = tx.prepare(&format!(
            "SELECT is_active, is_default FROM {table}
             WHERE resource_id = ?1 AND owner_id = ?2"
          ))?;
          let mut flip = tx.prepare(&format!(
            "UPDATE {table} SET is_active = ?2, is_default = 0, updated_at = ?3
             WHERE resource_id = ?1"
          ))?;

          for id in id_strs {
            let state: Option<(bool, bool)> = select
              .query_row(rusqlite::params![id, owner_str], |r| Ok((r.get(0)?, r.get(1)?)))
              .optional()?;
            let Some((is_active, is_default)) = state else { continue };
            if is_active == active {
              continue;
            }
            lost_default |= is_default;
            flip.execute(rusqlite::params![id, active, now])?;
            changed.push(id);
          }
        }

        let mut promoted = None;
        if lost_default && let Some(successor) = oldest_active(&tx, table, &owner_str)? {
          promote(&tx, table, &successor, &owner_str, &now)?;
          promoted = Some(successor);
        }

        tx.commit()?;
        Ok((changed, promoted))
      })
      .await?;

    Ok(BulkOutcome {
      changed:  changed.iter().map(|s| decode_uuid(s)).collect::<Result<_>>()?,
      promoted: promoted.as_deref().map(decode_uuid).transpose()?,
    })
  }
}
