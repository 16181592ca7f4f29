//! Sub-commands and their execution against a [`ResourceService`].
//!
//! Every command prints its result as pretty JSON on stdout.

use std::sync::Arc;

use anyhow::Context as _;
use clap::{Args, Subcommand};
use dossier_core::{
  Address, AddressKind, AddressPatch, NewResource, Phone, PhoneKind, PhonePatch,
  PhoneType, ResourceKind, ResourcePatch, ResourceService,
};
use dossier_store_sqlite::SqliteStore;
use serde::Serialize;
use uuid::Uuid;

// ─── Command tree ─────────────────────────────────────────────────────────────

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Manage postal addresses.
  Address {
    #[command(subcommand)]
    action: AddressAction,
  },
  /// Manage phone numbers.
  Phone {
    #[command(subcommand)]
    action: PhoneAction,
  },
}

/// Identifies one resource of one owner.
#[derive(Args, Debug)]
pub struct Target {
  #[arg(long)]
  owner: Uuid,
  #[arg(long)]
  id:    Uuid,
}

/// Actions shared by every resource kind.
#[derive(Subcommand, Debug)]
pub enum CommonAction {
  /// List an owner's resources, default first.
  List {
    #[arg(long)]
    owner: Uuid,
    /// Include soft-deleted resources.
    #[arg(long)]
    all:   bool,
  },
  /// Show an owner's default resource.
  Default {
    #[arg(long)]
    owner: Uuid,
  },
  /// Show a single resource.
  Show(Target),
  /// Find active resources by natural key (label or number).
  Find {
    key:           String,
    /// Ignore this owner's resources.
    #[arg(long)]
    exclude_owner: Option<Uuid>,
  },
  /// Make a resource the owner's default.
  SetDefault(Target),
  /// Soft-delete a resource; a deleted default is succeeded automatically.
  Delete(Target),
  /// Reactivate several resources at once.
  Activate {
    #[arg(long)]
    owner: Uuid,
    #[arg(long, value_delimiter = ',', required = true)]
    ids:   Vec<Uuid>,
  },
  /// Deactivate several resources at once.
  Deactivate {
    #[arg(long)]
    owner: Uuid,
    #[arg(long, value_delimiter = ',', required = true)]
    ids:   Vec<Uuid>,
  },
}

// ─── Addresses ────────────────────────────────────────────────────────────────

#[derive(Args, Debug, Default)]
pub struct AddressFields {
  #[arg(long)]
  label:        Option<String>,
  #[arg(long)]
  recipient:    Option<String>,
  #[arg(long)]
  street:       Option<String>,
  #[arg(long)]
  street_extra: Option<String>,
  #[arg(long)]
  locality:     Option<String>,
  #[arg(long)]
  region:       Option<String>,
  #[arg(long)]
  postal_code:  Option<String>,
  #[arg(long)]
  country:      Option<String>,
  #[arg(long)]
  phone:        Option<String>,
}

impl AddressFields {
  /// Missing required fields become empty strings and are rejected by
  /// validation.
  fn into_payload(self) -> Address {
    Address {
      label:        self.label.unwrap_or_default(),
      recipient:    self.recipient.unwrap_or_default(),
      street:       self.street.unwrap_or_default(),
      street_extra: self.street_extra,
      locality:     self.locality.unwrap_or_default(),
      region:       self.region,
      postal_code:  self.postal_code.unwrap_or_default(),
      country:      self.country.unwrap_or_default(),
      phone:        self.phone,
    }
  }
}

impl From<AddressFields> for AddressPatch {
  fn from(f: AddressFields) -> Self {
    AddressPatch {
      label:        f.label,
      recipient:    f.recipient,
      street:       f.street,
      street_extra: f.street_extra.map(Some),
      locality:     f.locality,
      region:       f.region.map(Some),
      postal_code:  f.postal_code,
      country:      f.country,
      phone:        f.phone.map(Some),
    }
  }
}

#[derive(Subcommand, Debug)]
pub enum AddressAction {
  /// Add an address.
  Add {
    #[arg(long)]
    owner:   Uuid,
    /// Make it the owner's default.
    #[arg(long)]
    default: bool,
    #[command(flatten)]
    fields:  AddressFields,
  },
  /// Edit an address; only the given fields change.
  Edit {
    #[command(flatten)]
    target:  Target,
    #[arg(long)]
    default: bool,
    #[command(flatten)]
    fields:  AddressFields,
  },
  #[command(flatten)]
  Common(CommonAction),
}

// ─── Phone numbers ────────────────────────────────────────────────────────────

#[derive(Args, Debug, Default)]
pub struct PhoneFields {
  #[arg(long)]
  number:     Option<String>,
  #[arg(long)]
  label:      Option<String>,
  /// mobile, home, work, fax or other.
  #[arg(long = "type")]
  phone_type: Option<PhoneType>,
}

impl From<PhoneFields> for PhonePatch {
  fn from(f: PhoneFields) -> Self {
    PhonePatch {
      number:     f.number,
      label:      f.label.map(Some),
      phone_type: f.phone_type,
    }
  }
}

#[derive(Subcommand, Debug)]
pub enum PhoneAction {
  /// Add a phone number.
  Add {
    #[arg(long)]
    owner:   Uuid,
    #[arg(long)]
    default: bool,
    #[command(flatten)]
    fields:  PhoneFields,
  },
  /// Edit a phone number; changing the number resets verification.
  Edit {
    #[command(flatten)]
    target:  Target,
    #[arg(long)]
    default: bool,
    #[command(flatten)]
    fields:  PhoneFields,
  },
  /// Mark a phone number as verified.
  Verify(Target),
  #[command(flatten)]
  Common(CommonAction),
}

// ─── Execution ────────────────────────────────────────────────────────────────

pub async fn run(command: Command, store: Arc<SqliteStore>) -> anyhow::Result<()> {
  match command {
    Command::Address { action } => run_address(ResourceService::new(store), action).await,
    Command::Phone { action } => run_phone(ResourceService::new(store), action).await,
  }
}

async fn run_address(
  svc: ResourceService<SqliteStore, AddressKind>,
  action: AddressAction,
) -> anyhow::Result<()> {
  match action {
    AddressAction::Add { owner, default, fields } => {
      let mut input = NewResource::new(fields.into_payload());
      input.is_default = default;
      print_json(&svc.create(owner, input).await?)
    }
    AddressAction::Edit { target, default, fields } => {
      let patch = ResourcePatch::<AddressKind> {
        fields:       fields.into(),
        make_default: default,
      };
      print_json(&svc.update(target.id, target.owner, patch).await?)
    }
    AddressAction::Common(action) => run_common(&svc, action).await,
  }
}

async fn run_phone(
  svc: ResourceService<SqliteStore, PhoneKind>,
  action: PhoneAction,
) -> anyhow::Result<()> {
  match action {
    PhoneAction::Add { owner, default, fields } => {
      let payload = Phone {
        number:      fields.number.unwrap_or_default(),
        label:       fields.label,
        phone_type:  fields.phone_type.unwrap_or_default(),
        is_verified: false,
        verified_at: None,
      };
      let mut input = NewResource::new(payload);
      input.is_default = default;
      print_json(&svc.create(owner, input).await?)
    }
    PhoneAction::Edit { target, default, fields } => {
      let patch = ResourcePatch::<PhoneKind> {
        fields:       fields.into(),
        make_default: default,
      };
      print_json(&svc.update(target.id, target.owner, patch).await?)
    }
    PhoneAction::Verify(target) => print_json(&svc.verify(target.id, target.owner).await?),
    PhoneAction::Common(action) => run_common(&svc, action).await,
  }
}

async fn run_common<K: ResourceKind>(
  svc: &ResourceService<SqliteStore, K>,
  action: CommonAction,
) -> anyhow::Result<()> {
  match action {
    CommonAction::List { owner, all } => print_json(&svc.list(owner, all).await?),
    CommonAction::Default { owner } => print_json(&svc.get_default(owner).await?),
    CommonAction::Show(t) => print_json(&svc.get(t.id, t.owner).await?),
    CommonAction::Find { key, exclude_owner } => {
      print_json(&svc.find_by_key(&key, exclude_owner).await?)
    }
    CommonAction::SetDefault(t) => print_json(&svc.set_default(t.id, t.owner).await?),
    CommonAction::Delete(t) => {
      let deleted = svc.soft_delete(t.id, t.owner).await?;
      print_json(&serde_json::json!({ "id": t.id, "deleted": deleted }))
    }
    CommonAction::Activate { owner, ids } => {
      print_json(&svc.bulk_set_active(owner, &ids, true).await?)
    }
    CommonAction::Deactivate { owner, ids } => {
      print_json(&svc.bulk_set_active(owner, &ids, false).await?)
    }
  }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
  let out = serde_json::to_string_pretty(value).context("failed to encode output")?;
  println!("{out}");
  Ok(())
}
