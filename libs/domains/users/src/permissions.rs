use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::User;

/// Actions gated by capability flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Enter the admin site at all
    AccessAdmin,
    ViewUser,
    AddUser,
    ChangeUser,
}

/// Whether `user` may perform `action`.
///
/// Inactive accounts can do nothing. Active superusers can do everything.
/// Active staff can reach the admin site and view users; changes are reserved
/// to superusers.
pub fn has_permission(user: &User, action: Permission) -> bool {
    if !user.is_active {
        return false;
    }
    if user.is_superuser {
        return true;
    }
    match action {
        Permission::AccessAdmin | Permission::ViewUser => user.is_staff,
        Permission::AddUser | Permission::ChangeUser => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserFields;

    fn user(is_active: bool, is_staff: bool, is_superuser: bool) -> User {
        User::new(
            "someone@example.com".into(),
            None,
            UserFields {
                is_active: Some(is_active),
                is_staff: Some(is_staff),
                is_superuser: Some(is_superuser),
                ..UserFields::default()
            },
        )
    }

    const ALL: [Permission; 4] = [
        Permission::AccessAdmin,
        Permission::ViewUser,
        Permission::AddUser,
        Permission::ChangeUser,
    ];

    #[test]
    fn test_superuser_has_every_permission() {
        let root = user(true, true, true);
        assert!(ALL.iter().all(|p| has_permission(&root, *p)));
    }

    #[test]
    fn test_staff_can_view_but_not_change() {
        let staff = user(true, true, false);
        assert!(has_permission(&staff, Permission::AccessAdmin));
        assert!(has_permission(&staff, Permission::ViewUser));
        assert!(!has_permission(&staff, Permission::AddUser));
        assert!(!has_permission(&staff, Permission::ChangeUser));
    }

    #[test]
    fn test_plain_user_has_no_permissions() {
        let plain = user(true, false, false);
        assert!(ALL.iter().all(|p| !has_permission(&plain, *p)));
    }

    #[test]
    fn test_inactive_superuser_has_no_permissions() {
        let disabled = user(false, true, true);
        assert!(ALL.iter().all(|p| !has_permission(&disabled, *p)));
    }
}
