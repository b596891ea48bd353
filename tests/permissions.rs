use bookwise::auth::{Permission, Role, check_permission, permissions::ADMIN_PERMISSIONS};

const ADMIN_MANAGEMENT: [Permission; 7] = [
    Permission::CreateAdmin,
    Permission::ListAdmins,
    Permission::GetAdmin,
    Permission::BlockAdmin,
    Permission::UnblockAdmin,
    Permission::UpdateAdmin,
    Permission::DeleteAdmin,
];

#[test]
fn owner_manages_admins() {
    for permission in ADMIN_MANAGEMENT {
        assert!(check_permission(Role::Owner, permission), "{permission}");
    }
}

#[test]
fn admins_hold_catalog_permissions_only() {
    for permission in ADMIN_PERMISSIONS {
        assert!(check_permission(Role::Admin, *permission), "{permission}");
        assert!(check_permission(Role::Owner, *permission), "{permission}");
    }
    for permission in ADMIN_MANAGEMENT {
        assert!(!check_permission(Role::Admin, permission), "{permission}");
    }
}

#[test]
fn members_hold_nothing() {
    for permission in ADMIN_PERMISSIONS.iter().copied().chain(ADMIN_MANAGEMENT) {
        assert!(!check_permission(Role::Member, permission), "{permission}");
    }
}

#[test]
fn permission_names_are_snake_case() {
    assert_eq!(Permission::ListExternalBooks.to_string(), "list_external_books");
    assert_eq!(Permission::UnblockAdmin.as_str(), "unblock_admin");
}
