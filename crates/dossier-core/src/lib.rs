//! Core types and trait definitions for the Dossier resource store.
//!
//! An owner keeps collections of interchangeable resources (postal addresses,
//! phone numbers). At most one active resource per owner and kind is the
//! default. This crate holds the domain model, the [`store::ResourceStore`]
//! abstraction and the lifecycle service built on top of it; it is free of
//! database dependencies.

pub mod address;
pub mod error;
pub mod phone;
pub mod resource;
pub mod service;
pub mod store;

pub use address::{Address, AddressKind, AddressPatch};
pub use error::{Error, Result};
pub use phone::{Phone, PhoneKind, PhonePatch, PhoneType};
pub use resource::{NewResource, Resource, ResourceKind, ResourcePatch};
pub use service::ResourceService;
