//! SQL schema for the Dossier SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.
//!
//! Every resource table has the same shape so the store can address any kind
//! through [`dossier_core::ResourceKind::TABLE`]. Two partial unique indexes
//! back the service-level rules: at most one active default per owner, and
//! one active row per natural key per owner.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Rows are never physically deleted; soft deletion clears is_active.
CREATE TABLE IF NOT EXISTS addresses (
    resource_id  TEXT PRIMARY KEY,
    owner_id     TEXT NOT NULL,
    natural_key  TEXT NOT NULL,    -- normalised label
    payload_json TEXT NOT NULL,
    is_default   INTEGER NOT NULL DEFAULT 0 CHECK (is_default IN (0, 1)),
    is_active    INTEGER NOT NULL DEFAULT 1 CHECK (is_active IN (0, 1)),
    created_at   TEXT NOT NULL,    -- RFC 3339 UTC, fixed nanosecond width
    updated_at   TEXT NOT NULL,
    CHECK (is_active = 1 OR is_default = 0)
);

CREATE TABLE IF NOT EXISTS phone_numbers (
    resource_id  TEXT PRIMARY KEY,
    owner_id     TEXT NOT NULL,
    natural_key  TEXT NOT NULL,    -- digits with optional leading '+'
    payload_json TEXT NOT NULL,
    is_default   INTEGER NOT NULL DEFAULT 0 CHECK (is_default IN (0, 1)),
    is_active    INTEGER NOT NULL DEFAULT 1 CHECK (is_active IN (0, 1)),
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    CHECK (is_active = 1 OR is_default = 0)
);

CREATE INDEX IF NOT EXISTS addresses_owner_idx
    ON addresses(owner_id, is_active, created_at);
CREATE UNIQUE INDEX IF NOT EXISTS addresses_one_default
    ON addresses(owner_id) WHERE is_default = 1 AND is_active = 1;
CREATE UNIQUE INDEX IF NOT EXISTS addresses_natural_key_uniq
    ON addresses(owner_id, natural_key) WHERE is_active = 1;
CREATE INDEX IF NOT EXISTS addresses_key_idx
    ON addresses(natural_key);

CREATE INDEX IF NOT EXISTS phone_numbers_owner_idx
    ON phone_numbers(owner_id, is_active, created_at);
CREATE UNIQUE INDEX IF NOT EXISTS phone_numbers_one_default
    ON phone_numbers(owner_id) WHERE is_default = 1 AND is_active = 1;
CREATE UNIQUE INDEX IF NOT EXISTS phone_numbers_natural_key_uniq
    ON phone_numbers(owner_id, natural_key) WHERE is_active = 1;
CREATE INDEX IF NOT EXISTS phone_numbers_key_idx
    ON phone_numbers(natural_key);

PRAGMA user_version = 1;
";
