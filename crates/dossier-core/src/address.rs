//! Postal addresses.

use serde::{Deserialize, Serialize};

use crate::{Result, resource::{ResourceKind, require}};

/// Kind descriptor for postal addresses. Labels are unique per owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressKind;

/// A postal address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
  /// Owner-chosen name such as "Home" or "Office".
  pub label:        String,
  pub recipient:    String,
  pub street:       String,
  /// Apartment, suite, floor.
  pub street_extra: Option<String>,
  /// City or locality.
  pub locality:     String,
  /// State, province, or region.
  pub region:       Option<String>,
  pub postal_code:  String,
  pub country:      String,
  /// Contact number for deliveries to this address.
  pub phone:        Option<String>,
}

/// A partial edit of an [`Address`]. Setting an optional field to
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct AddressPatch {
  pub label:        Option<String>,
  pub recipient:    Option<String>,
  pub street:       Option<String>,
  pub street_extra: Option<Option<String>>,
  pub locality:     Option<String>,
  pub region:       Option<Option<String>>,
  pub postal_code:  Option<String>,
  pub country:      Option<String>,
  pub phone:        Option<Option<String>>,
}

impl ResourceKind for AddressKind {
  type Patch = AddressPatch;
  type Payload = Address;

  const NAME: &'static str = "address";
  const TABLE: &'static str = "addresses";

  fn validate(a: &Address) -> Result<()> {
    require("label", &a.label)?;
    require("recipient", &a.recipient)?;
    require("street", &a.street)?;
    require("locality", &a.locality)?;
    require("postal_code", &a.postal_code)?;
    require("country", &a.country)?;
    Ok(())
  }

  fn normalize_key(raw: &str) -> String { raw.trim().to_lowercase() }

  fn natural_key(a: &Address) -> String { Self::normalize_key(&a.label) }

  fn apply_patch(a: &mut Address, p: AddressPatch) {
    if let Some(v) = p.label {
      a.label = v;
    }
    if let Some(v) = p.recipient {
      a.recipient = v;
    }
    if let Some(v) = p.street {
      a.street = v;
    }
    if let Some(v) = p.street_extra {
      a.street_extra = v;
    }
    if let Some(v) = p.locality {
      a.locality = v;
    }
    if let Some(v) = p.region {
      a.region = v;
    }
    if let Some(v) = p.postal_code {
      a.postal_code = v;
    }
    if let Some(v) = p.country {
      a.country = v;
    }
    if let Some(v) = p.phone {
      a.phone = v;
    }
  }
}
