//! Auto-discovery of catalog entries using the inventory crate
//!
//! Each crate that owns bindable types submits a [`CatalogRegistration`]
//! and [`TypeCatalog::discover`](crate::TypeCatalog::discover) runs them
//! all, so configuration assets can name types from any linked crate.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::rc::Rc;
//! use tagbind_di::{CatalogRegistration, Implementation};
//!
//! inventory::submit! {
//!     CatalogRegistration::new("audio", |catalog| {
//!         catalog.register(
//!             Implementation::builder::<Speaker>("Speaker")
//!                 .provides::<dyn Audio>(|s| s as Rc<dyn Audio>)
//!                 .factory(|_| Speaker::default())
//!                 .build(),
//!         )?;
//!         catalog.alias::<dyn Audio>("IAudio");
//!         Ok(())
//!     })
//! }
//! ```

use tracing::{debug, info};

use crate::catalog::TypeCatalog;
use crate::DiResult;

/// A catalog registration collected via inventory
pub struct CatalogRegistration {
    /// Name of the registration group (e.g. "audio", "logging")
    pub name: &'static str,

    /// Adds implementations and aliases to the catalog
    pub register_fn: fn(&mut TypeCatalog) -> DiResult<()>,

    /// Registration order (lower = earlier, default = 100)
    pub priority: u32,
}

impl CatalogRegistration {
    pub const fn new(name: &'static str, register_fn: fn(&mut TypeCatalog) -> DiResult<()>) -> Self {
        Self {
            name,
            register_fn,
            priority: 100,
        }
    }

    pub const fn with_priority(
        name: &'static str,
        register_fn: fn(&mut TypeCatalog) -> DiResult<()>,
        priority: u32,
    ) -> Self {
        Self {
            name,
            register_fn,
            priority,
        }
    }
}

inventory::collect!(CatalogRegistration);

/// Run every discovered registration in priority order
///
/// Equal priorities keep their discovery order.
pub fn register_all_discovered(catalog: &mut TypeCatalog) -> DiResult<()> {
    let mut registrations: Vec<&CatalogRegistration> =
        inventory::iter::<CatalogRegistration>().collect();
    registrations.sort_by_key(|r| r.priority);

    info!(
        "Discovered {} catalog registrations via inventory",
        registrations.len()
    );

    for registration in registrations {
        debug!(
            "Registering catalog entries for '{}' (priority: {})",
            registration.name, registration.priority
        );
        (registration.register_fn)(catalog)?;
    }

    Ok(())
}

pub fn discovered_registration_count() -> usize {
    inventory::iter::<CatalogRegistration>().count()
}

pub fn list_discovered_registrations() -> Vec<&'static str> {
    inventory::iter::<CatalogRegistration>()
        .map(|r| r.name)
        .collect()
}
