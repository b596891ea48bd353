use super::handlers::{admins, auth, authors, books, categories, health, users};
use super::middleware::{require_permission, require_session};
use crate::auth::Permission;
use axum::middleware;
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Public routes carry no layer. Authenticated routes sit behind
/// `require_session`, and permission-gated routes additionally behind
/// `require_permission`, one group per permission.
/// Routes added outside (like `OPTIONS /health`) are intentionally not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    let public = OpenApiRouter::new()
        .routes(routes!(health::health))
        .routes(routes!(users::create_member))
        .routes(routes!(auth::member_sign_in))
        .routes(routes!(auth::admin_sign_in))
        .routes(routes!(auth::verify_link));

    let authenticated = OpenApiRouter::new()
        .routes(routes!(users::me))
        .routes(routes!(auth::sign_out))
        .routes(routes!(auth::list_sessions))
        .routes(routes!(categories::list_categories))
        .route_layer(middleware::from_fn(require_session));

    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .merge(public)
        .merge(authenticated)
        .merge(guarded(
            Permission::CreateAdmin,
            OpenApiRouter::new().routes(routes!(users::create_admin)),
        ))
        .merge(guarded(
            Permission::ListAdmins,
            OpenApiRouter::new().routes(routes!(admins::list_admins)),
        ))
        .merge(guarded(
            Permission::GetAdmin,
            OpenApiRouter::new().routes(routes!(admins::get_admin)),
        ))
        .merge(guarded(
            Permission::BlockAdmin,
            OpenApiRouter::new().routes(routes!(admins::block_admin)),
        ))
        .merge(guarded(
            Permission::UnblockAdmin,
            OpenApiRouter::new().routes(routes!(admins::unblock_admin)),
        ))
        .merge(guarded(
            Permission::UpdateAdmin,
            OpenApiRouter::new().routes(routes!(admins::update_admin)),
        ))
        .merge(guarded(
            Permission::DeleteAdmin,
            OpenApiRouter::new().routes(routes!(admins::delete_admin)),
        ))
        .merge(catalog_routes());

    router.get_openapi_mut().tags = Some(vec![
        tag("bookwise", "Book catalog and review platform API"),
        tag("health", "Service and dependency status"),
        tag("auth", "Magic-link sign-in and sessions"),
        tag("users", "Registration and profile"),
        tag("admins", "Admin management"),
        tag("authors", "Catalog authors"),
        tag("books", "Catalog books and publication"),
        tag("categories", "Book categories"),
    ]);

    router
}

fn catalog_routes() -> OpenApiRouter {
    OpenApiRouter::new()
        .merge(guarded(
            Permission::CreateAuthor,
            OpenApiRouter::new().routes(routes!(authors::create_author)),
        ))
        .merge(guarded(
            Permission::ListAuthors,
            OpenApiRouter::new()
                .routes(routes!(authors::list_authors))
                .routes(routes!(authors::list_author_summaries)),
        ))
        .merge(guarded(
            Permission::GetAuthor,
            OpenApiRouter::new().routes(routes!(authors::get_author)),
        ))
        .merge(guarded(
            Permission::DeleteAuthor,
            OpenApiRouter::new().routes(routes!(authors::delete_author)),
        ))
        .merge(guarded(
            Permission::CreateBook,
            OpenApiRouter::new().routes(routes!(books::create_book)),
        ))
        .merge(guarded(
            Permission::ListBook,
            OpenApiRouter::new().routes(routes!(books::list_books)),
        ))
        .merge(guarded(
            Permission::GetBook,
            OpenApiRouter::new().routes(routes!(books::get_book)),
        ))
        .merge(guarded(
            Permission::UpdateBook,
            OpenApiRouter::new().routes(routes!(books::update_book)),
        ))
        .merge(guarded(
            Permission::DeleteBook,
            OpenApiRouter::new().routes(routes!(books::delete_book)),
        ))
        .merge(guarded(
            Permission::PublishBook,
            OpenApiRouter::new().routes(routes!(books::publish_book)),
        ))
        .merge(guarded(
            Permission::UnpublishBook,
            OpenApiRouter::new().routes(routes!(books::unpublish_book)),
        ))
}

// `route_layer` runs the last layer added first, so the session is resolved
// before the permission check reads it.
fn guarded(permission: Permission, router: OpenApiRouter) -> OpenApiRouter {
    router
        .route_layer(middleware::from_fn_with_state(permission, require_permission))
        .route_layer(middleware::from_fn(require_session))
}

fn tag(name: &str, description: &str) -> Tag {
    let mut tag = Tag::new(name);
    tag.description = Some(description.to_string());
    tag
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    Some(value.trim()).filter(|trimmed| !trimmed.is_empty())
}

fn non_empty(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|value| !value.is_empty())
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, email)) => (non_empty(name), non_empty(email.trim_end_matches('>'))),
        None => (non_empty(author), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(
            spec.info.description.as_deref(),
            Some(env!("CARGO_PKG_DESCRIPTION"))
        );

        let contact = spec.info.contact;
        assert!(contact.is_some());
        if let Some(contact) = contact {
            assert_eq!(contact.name.as_deref(), Some("Team Bookwise"));
            assert_eq!(contact.email.as_deref(), Some("team@bookwise.dev"));
        }

        let license = spec.info.license;
        assert!(license.is_some());
        if let Some(license) = license {
            assert_eq!(license.name, "BSD-3-Clause");
            assert_eq!(license.identifier.as_deref(), Some("BSD-3-Clause"));
        }
    }

    #[test]
    fn openapi_tags_and_paths() {
        let spec = openapi();
        let tags = spec.tags.clone().unwrap_or_default();
        for name in [
            "bookwise",
            "health",
            "auth",
            "users",
            "admins",
            "authors",
            "books",
            "categories",
        ] {
            assert!(tags.iter().any(|tag| tag.name == name), "missing tag {name}");
        }
        for path in [
            "/health",
            "/v1/auth/member/sign-in",
            "/v1/auth/admin/sign-in",
            "/v1/auth/link",
            "/v1/auth/sign-out",
            "/v1/auth/sessions",
            "/v1/users/member",
            "/v1/users/admin",
            "/v1/users/me",
            "/v1/admins",
            "/v1/admins/{id}",
            "/v1/admins/{id}/block",
            "/v1/admins/{id}/unblock",
            "/v1/authors",
            "/v1/authors/lite",
            "/v1/authors/{id}",
            "/v1/categories",
            "/v1/books",
            "/v1/books/{id}",
            "/v1/books/{id}/publish",
            "/v1/books/{id}/unpublish",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing path {path}");
        }

        let admin = &spec.paths.paths["/v1/admins/{id}"];
        assert!(admin.get.is_some() && admin.patch.is_some() && admin.delete.is_some());
        let book = &spec.paths.paths["/v1/books/{id}"];
        assert!(book.get.is_some() && book.patch.is_some() && book.delete.is_some());
    }

    #[test]
    fn author_parsing() {
        assert_eq!(
            parse_author("Team Bookwise <team@bookwise.dev>"),
            (Some("Team Bookwise"), Some("team@bookwise.dev"))
        );
        assert_eq!(parse_author("Solo"), (Some("Solo"), None));
        assert_eq!(parse_author("<a@b.c>"), (None, Some("a@b.c")));
    }
}
