//! Role-based capability policy.
//!
//! Roles map to capability sets through a table built once at startup and
//! queried by pure functions. Nothing here touches storage or the actor's
//! session; callers resolve the membership first and ask the policy second.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Role a member holds on a single group account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Member,
    Viewer,
}

/// A single permission on a group account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    View,
    ManageMembers,
    ManageSettings,
    Withdraw,
    ViewTransactions,
    DeleteAccount,
}

/// Role → capability table.
///
/// Constructed once (typically at service startup) and shared read-only.
#[derive(Debug, Clone)]
pub struct RolePolicy {
    grants: HashMap<Role, HashSet<Capability>>,
}

impl RolePolicy {
    /// The standard family-account policy.
    ///
    /// - Admin: everything, including account deletion.
    /// - Manager: everything except deleting the account.
    /// - Member: view + withdraw + transaction history.
    /// - Viewer: read-only.
    pub fn standard() -> Self {
        use Capability::*;

        let mut grants: HashMap<Role, HashSet<Capability>> = HashMap::new();
        grants.insert(
            Role::Admin,
            [
                View,
                ManageMembers,
                ManageSettings,
                Withdraw,
                ViewTransactions,
                DeleteAccount,
            ]
            .into(),
        );
        grants.insert(
            Role::Manager,
            [View, ManageMembers, ManageSettings, Withdraw, ViewTransactions].into(),
        );
        grants.insert(Role::Member, [View, Withdraw, ViewTransactions].into());
        grants.insert(Role::Viewer, [View, ViewTransactions].into());

        Self { grants }
    }

    /// Whether `role` grants `capability`.
    ///
    /// - No IO
    /// - No panics
    /// - No business logic (pure policy check)
    pub fn allows(&self, role: Role, capability: Capability) -> bool {
        self.grants
            .get(&role)
            .is_some_and(|caps| caps.contains(&capability))
    }

    /// All capabilities granted to `role`, for diagnostics/member listings.
    pub fn capabilities_of(&self, role: Role) -> Vec<Capability> {
        self.grants
            .get(&role)
            .map(|caps| caps.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl Default for RolePolicy {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_can_do_everything() {
        let policy = RolePolicy::standard();
        for cap in [
            Capability::View,
            Capability::ManageMembers,
            Capability::ManageSettings,
            Capability::Withdraw,
            Capability::ViewTransactions,
            Capability::DeleteAccount,
        ] {
            assert!(policy.allows(Role::Admin, cap), "admin missing {cap:?}");
        }
    }

    #[test]
    fn manager_cannot_delete_account() {
        let policy = RolePolicy::standard();
        assert!(policy.allows(Role::Manager, Capability::ManageMembers));
        assert!(!policy.allows(Role::Manager, Capability::DeleteAccount));
    }

    #[test]
    fn member_can_withdraw_but_not_manage() {
        let policy = RolePolicy::standard();
        assert!(policy.allows(Role::Member, Capability::Withdraw));
        assert!(!policy.allows(Role::Member, Capability::ManageMembers));
        assert!(!policy.allows(Role::Member, Capability::ManageSettings));
    }

    #[test]
    fn viewer_is_read_only() {
        let policy = RolePolicy::standard();
        assert!(policy.allows(Role::Viewer, Capability::View));
        assert!(policy.allows(Role::Viewer, Capability::ViewTransactions));
        assert!(!policy.allows(Role::Viewer, Capability::Withdraw));
        assert!(!policy.allows(Role::Viewer, Capability::DeleteAccount));
    }
}
