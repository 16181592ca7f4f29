//! Phone numbers.
//!
//! Numbers are compared in a normalised form (digits with an optional leading
//! `+`), so `+1 (555) 010-0000` and `+15550100000` are the same number.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{Error, Result, resource::ResourceKind};

/// Minimum number of digits for a plausible phone number.
const MIN_DIGITS: usize = 4;

/// Kind descriptor for phone numbers. A number is unique per owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhoneKind;

/// The line type of a phone number.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PhoneType {
  #[default]
  Mobile,
  Home,
  Work,
  Fax,
  Other,
}

/// A phone number owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phone {
  /// The number as entered.
  pub number:      String,
  pub label:       Option<String>,
  pub phone_type:  PhoneType,
  /// Set by [`crate::service::ResourceService::verify`]; reset whenever the
  /// number changes.
  #[serde(default)]
  pub is_verified: bool,
  #[serde(default)]
  pub verified_at: Option<DateTime<Utc>>,
}

impl Phone {
  /// An unverified number.
  pub fn new(number: impl Into<String>, phone_type: PhoneType) -> Self {
    Self {
      number: number.into(),
      label: None,
      phone_type,
      is_verified: false,
      verified_at: None,
    }
  }

  pub fn with_label(mut self, label: impl Into<String>) -> Self {
    self.label = Some(label.into());
    self
  }

  pub(crate) fn mark_verified(&mut self, at: DateTime<Utc>) {
    self.is_verified = true;
    self.verified_at = Some(at);
  }
}

/// A partial edit of a [`Phone`]. Verification state cannot be patched.
#[derive(Debug, Clone, Default)]
pub struct PhonePatch {
  pub number:     Option<String>,
  pub label:      Option<Option<String>>,
  pub phone_type: Option<PhoneType>,
}

impl ResourceKind for PhoneKind {
  type Patch = PhonePatch;
  type Payload = Phone;

  const NAME: &'static str = "phone number";
  const TABLE: &'static str = "phone_numbers";

  fn validate(p: &Phone) -> Result<()> {
    let number = p.number.trim();
    if number.is_empty() {
      return Err(Error::validation("number is required"));
    }
    if let Some(c) = number
      .chars()
      .find(|&c| !c.is_ascii_digit() && !matches!(c, '+' | ' ' | '-' | '(' | ')' | '.'))
    {
      return Err(Error::validation(format!(
        "number contains invalid character {c:?}"
      )));
    }
    if number.chars().skip(1).any(|c| c == '+') {
      return Err(Error::validation("'+' is only allowed as the first character"));
    }
    let digits = number.chars().filter(char::is_ascii_digit).count();
    if digits < MIN_DIGITS {
      return Err(Error::validation(format!(
        "number must contain at least {MIN_DIGITS} digits"
      )));
    }
    Ok(())
  }

  fn normalize_key(raw: &str) -> String {
    let raw = raw.trim();
    let mut key = String::with_capacity(raw.len());
    if raw.starts_with('+') {
      key.push('+');
    }
    key.extend(raw.chars().filter(char::is_ascii_digit));
    key
  }

  fn natural_key(p: &Phone) -> String { Self::normalize_key(&p.number) }

  fn apply_patch(p: &mut Phone, patch: PhonePatch) {
    if let Some(number) = patch.number {
      if Self::normalize_key(&number) != Self::normalize_key(&p.number) {
        p.is_verified = false;
        p.verified_at = None;
      }
      p.number = number;
    }
    if let Some(label) = patch.label {
      p.label = label;
    }
    if let Some(phone_type) = patch.phone_type {
      p.phone_type = phone_type;
    }
  }
}
