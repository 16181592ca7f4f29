//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with a fixed nine-digit fraction
//! and a `Z` suffix, so lexical order equals chronological order. Payloads are
//! stored as compact JSON. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use dossier_core::{Resource, ResourceKind};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Payload ─────────────────────────────────────────────────────────────────

pub fn encode_payload<K: ResourceKind>(payload: &K::Payload) -> Result<String> {
  Ok(serde_json::to_string(payload)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawResource::from_row`].
pub const COLUMNS: &str =
  "resource_id, owner_id, payload_json, is_default, is_active, created_at, updated_at";

/// Raw values read directly from a resource row.
pub struct RawResource {
  pub resource_id:  String,
  pub owner_id:     String,
  pub payload_json: String,
  pub is_default:   bool,
  pub is_active:    bool,
  pub created_at:   String,
  pub updated_at:   String,
}

impl RawResource {
  /// Read a row selected with [`COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      resource_id:  row.get(0)?,
      owner_id:     row.get(1)?,
      payload_json: row.get(2)?,
      is_default:   row.get(3)?,
      is_active:    row.get(4)?,
      created_at:   row.get(5)?,
      updated_at:   row.get(6)?,
    })
  }

  pub fn into_resource<K: ResourceKind>(self) -> Result<Resource<K>> {
    Ok(Resource {
      id:         decode_uuid(&self.resource_id)?,
      owner_id:   decode_uuid(&self.owner_id)?,
      payload:    serde_json::from_str(&self.payload_json)?,
      is_default: self.is_default,
      is_active:  self.is_active,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}
