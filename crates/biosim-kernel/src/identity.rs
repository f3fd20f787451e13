//! Identity predicates.
//!
//! Every authorization decision in the kernel goes through one of the two
//! predicates below. Registries never compare principals directly.

use crate::ids::Principal;

/// Authorization policy consulted by every registry.
pub trait IdentityAuthority {
    /// True iff `principal` is the fixed administrator.
    fn is_administrator(&self, principal: &Principal) -> bool;

    /// True iff `principal` is the stored owner/creator `owner`.
    fn is_owner_of(&self, owner: &Principal, principal: &Principal) -> bool {
        owner == principal
    }
}

/// Single administrator configured at process start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedAdministrator {
    administrator: Principal,
}

impl FixedAdministrator {
    pub fn new(administrator: impl Into<Principal>) -> Self {
        Self {
            administrator: administrator.into(),
        }
    }

    pub fn administrator(&self) -> &Principal {
        &self.administrator
    }
}

impl IdentityAuthority for FixedAdministrator {
    fn is_administrator(&self, principal: &Principal) -> bool {
        *principal == self.administrator
    }
}

impl<A: IdentityAuthority + ?Sized> IdentityAuthority for &A {
    fn is_administrator(&self, principal: &Principal) -> bool {
        (**self).is_administrator(principal)
    }

    fn is_owner_of(&self, owner: &Principal, principal: &Principal) -> bool {
        (**self).is_owner_of(owner, principal)
    }
}
