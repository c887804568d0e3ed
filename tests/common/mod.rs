//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use std::path::PathBuf;
use tempfile::TempDir;

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Declaration used across the integration tests: an admin section with a guarded users page,
/// a blog section, an order action map, a permission hierarchy and three roles.
#[allow(dead_code)]
pub const SAMPLE_DECLARATION: &str = r#"
[[site_map]]
key = "home"
title = "Home"
url = "/"

[[site_map]]
key = "admin"
title = "Administration"
url = "/admin"

[[site_map]]
key = "admin.users"
parent = "admin"
title = "Users"
url = "/admin/users"
required_permission = "users.manage"

[[site_map]]
key = "blog"
title = "Blog"
url = "/blog"

[[site_map]]
key = "blog.compose"
parent = "blog"
title = "Compose"
url = "/blog/new"
required_permission = "posts.write"

[[action_map]]
key = "orders"
title = "Orders"

[[action_map]]
key = "orders.refund"
parent = "orders"
title = "Refund"

[[permissions]]
key = "posts"
title = "Posts"

[[permissions]]
key = "posts.read"
parent = "posts"

[[permissions]]
key = "posts.write"
parent = "posts"

[[permissions]]
key = "users.manage"

[roles]
admin = ["users.manage", "orders.refund"]
editor = ["posts.write"]
viewer = ["posts.read"]
"#;

/// Write [SAMPLE_DECLARATION] to `security.toml` inside `temp_dir`.
#[allow(dead_code)]
pub fn write_sample_declaration(temp_dir: &TempDir) -> PathBuf {
    let path = temp_dir.path().join("security.toml");
    std::fs::write(&path, SAMPLE_DECLARATION).unwrap();
    path
}
