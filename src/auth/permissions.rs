//! Roles and the static role to permission table.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Member,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            other => Err(format!("invalid role: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Permission {
    ListExternalBooks,
    GetExternalBook,
    CreateAuthor,
    ListAuthors,
    GetAuthor,
    DeleteAuthor,
    CreateBook,
    UpdateBook,
    PublishBook,
    UnpublishBook,
    DeleteBook,
    ListBook,
    GetBook,
    CreateAdmin,
    ListAdmins,
    GetAdmin,
    BlockAdmin,
    UnblockAdmin,
    UpdateAdmin,
    DeleteAdmin,
}

impl Permission {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ListExternalBooks => "list_external_books",
            Self::GetExternalBook => "get_external_book",
            Self::CreateAuthor => "create_author",
            Self::ListAuthors => "list_authors",
            Self::GetAuthor => "get_author",
            Self::DeleteAuthor => "delete_author",
            Self::CreateBook => "create_book",
            Self::UpdateBook => "update_book",
            Self::PublishBook => "publish_book",
            Self::UnpublishBook => "unpublish_book",
            Self::DeleteBook => "delete_book",
            Self::ListBook => "list_book",
            Self::GetBook => "get_book",
            Self::CreateAdmin => "create_admin",
            Self::ListAdmins => "list_admins",
            Self::GetAdmin => "get_admin",
            Self::BlockAdmin => "block_admin",
            Self::UnblockAdmin => "unblock_admin",
            Self::UpdateAdmin => "update_admin",
            Self::DeleteAdmin => "delete_admin",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog permissions granted to admins. Admin management stays with the owner.
pub const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::ListExternalBooks,
    Permission::GetExternalBook,
    Permission::CreateAuthor,
    Permission::ListAuthors,
    Permission::GetAuthor,
    Permission::DeleteAuthor,
    Permission::CreateBook,
    Permission::UpdateBook,
    Permission::PublishBook,
    Permission::UnpublishBook,
    Permission::DeleteBook,
    Permission::ListBook,
    Permission::GetBook,
];

pub const MEMBER_PERMISSIONS: &[Permission] = &[];

/// Whether `role` grants `permission`.
#[must_use]
pub fn check_permission(role: Role, permission: Permission) -> bool {
    match role {
        Role::Owner => true,
        Role::Admin => ADMIN_PERMISSIONS.contains(&permission),
        Role::Member => MEMBER_PERMISSIONS.contains(&permission),
    }
}
