//! # Authorization Policy
//!
//! Pure capability checks over `(actor, resource-or-resource-class)`.
//!
//! ## Decision Table
//! ```text
//! ┌──────────────────────────────┬─────────────────────────────────────────┐
//! │ Capability                   │ Allowed when                            │
//! ├──────────────────────────────┼─────────────────────────────────────────┤
//! │ create-product, create-sale  │ any authenticated actor                 │
//! │ view-any-product             │ any authenticated actor (rows scoped    │
//! │ view-any-sale                │   to the actor by the query itself)     │
//! │ view/update/delete-product   │ actor.id == product.owner_user_id       │
//! │ view/update/delete-sale      │ actor.id == line.user_id                │
//! │ manage-users, manage-roles   │ role == admin                           │
//! └──────────────────────────────┴─────────────────────────────────────────┘
//! ```
//!
//! Lookups are scoped to the actor *before* these checks run, so a foreign
//! row surfaces as not-found and never reaches a `Forbidden` here.

use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::types::{Actor, Product, Role, SaleLine};

/// Capabilities that do not depend on a specific resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    CreateProduct,
    CreateSale,
    ViewAnyProduct,
    ViewAnySale,
    ManageUsers,
    ManageRoles,
}

impl Capability {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Capability::CreateProduct => "create-product",
            Capability::CreateSale => "create-sale",
            Capability::ViewAnyProduct => "view-any-product",
            Capability::ViewAnySale => "view-any-sale",
            Capability::ManageUsers => "manage-users",
            Capability::ManageRoles => "manage-roles",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an actor wants to do with one owned resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ability {
    View,
    Update,
    Delete,
}

impl Ability {
    const fn verb(&self) -> &'static str {
        match self {
            Ability::View => "view",
            Ability::Update => "update",
            Ability::Delete => "delete",
        }
    }
}

// =============================================================================
// Decisions
// =============================================================================

/// Whether `actor` holds a resource-independent capability.
pub fn allows(actor: &Actor, capability: Capability) -> bool {
    match capability {
        Capability::CreateProduct
        | Capability::CreateSale
        | Capability::ViewAnyProduct
        | Capability::ViewAnySale => true,
        Capability::ManageUsers | Capability::ManageRoles => actor.role == Role::Admin,
    }
}

/// Whether `actor` may view/update/delete `product`. Ownership only: admins
/// get no catalog override.
pub fn allows_product(actor: &Actor, _ability: Ability, product: &Product) -> bool {
    actor.id == product.owner_user_id
}

/// Whether `actor` may view/update/delete `line`.
pub fn allows_sale(actor: &Actor, _ability: Ability, line: &SaleLine) -> bool {
    actor.id == line.user_id
}

// =============================================================================
// Gates
// =============================================================================

/// Like [`allows`], but as a `Forbidden` error.
pub fn authorize(actor: &Actor, capability: Capability) -> CoreResult<()> {
    if allows(actor, capability) {
        Ok(())
    } else {
        Err(CoreError::Forbidden {
            capability: capability.to_string(),
        })
    }
}

pub fn authorize_product(actor: &Actor, ability: Ability, product: &Product) -> CoreResult<()> {
    if allows_product(actor, ability, product) {
        Ok(())
    } else {
        Err(CoreError::Forbidden {
            capability: format!("{}-product", ability.verb()),
        })
    }
}

pub fn authorize_sale(actor: &Actor, ability: Ability, line: &SaleLine) -> CoreResult<()> {
    if allows_sale(actor, ability, line) {
        Ok(())
    } else {
        Err(CoreError::Forbidden {
            capability: format!("{}-sale", ability.verb()),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
