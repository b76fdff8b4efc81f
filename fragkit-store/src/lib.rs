//! Record store for fragkit.
//!
//! The [`Store`] ties the layers together: it loads and creates records
//! through the cascading cache, hands out identity-stable [`Record`]
//! instances, and implements the fragment field accessors.
//!
//! # Fragment fields
//!
//! - [`Store::fragment`] materializes (or reuses) the instance bound to the
//!   derived identity of `owner.field`; null reads return `None`.
//! - [`Store::set_fragment`] takes a [`FragmentValue`]: `null`, a plain
//!   object, or a live fragment instance to move into the slot.
//! - [`Store::current_value`] returns a fragment's plain snapshot.
//! - [`Store::fragment_owner`] reads the read-only back-reference.
//!
//! What happens to an instance whose slot is set to null is chosen by
//! [`DetachedFragmentPolicy`] in [`StoreConfig`].
//!
//! # Example
//!
//! ```
//! use fragkit_model::{EntitySchema, FieldSchema, SchemaRegistry};
//! use fragkit_store::Store;
//! use fragkit_types::ResourceData;
//! use serde_json::json;
//!
//! let schema = SchemaRegistry::new()
//!     .with(EntitySchema::record("person").with_field(FieldSchema::fragment("name", "name")))?
//!     .with(
//!         EntitySchema::fragment("name")
//!             .with_field(FieldSchema::attribute("first"))
//!             .with_field(FieldSchema::attribute("last")),
//!     )?;
//! let mut store = Store::new(schema)?;
//!
//! let person = store.push(ResourceData::from_attributes(
//!     "person",
//!     "1",
//!     json!({"name": {"first": "Tyrion", "last": "Lannister"}}),
//! )?)?;
//! let name = store.fragment(&person, "name")?.expect("name is set");
//! assert_eq!(store.attr(&name, "first")?, Some(json!("Tyrion")));
//! assert!(!store.has_dirty_attributes(&person));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod config;
mod error;
mod fragment;
mod instances;
mod record;
mod snapshot;
mod store;

pub use config::{DetachedFragmentPolicy, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use fragment::FragmentValue;
pub use instances::InstanceCache;
pub use record::{LifecycleState, Record};
pub use store::Store;

pub use fragkit_cache::{AttributeChange, ChangedAttributes};
