//! sitegate CLI tool
//!
//! Command-line interface for inspecting a security declaration file.
//!
//! ## Commands
//!
//! - `tree <config>`: Print one of the declared hierarchies
//! - `check <config>`: Expand roles and check them against a node or a permission list
//!
//! Both commands accept `--json` for machine-readable output.

use clap::{Parser, Subcommand, ValueEnum};
use sitegate_core::{
    access::{
        ActionMapNodeGuard, CallerContext, Decision, Identity, PermissionAccessor,
        PermissionGuard, PermissionNodeGuard, SiteMapNodeGuard,
    },
    config::{Security, SecurityConfig},
    SitegateError,
};
use std::{path::PathBuf, process::ExitCode};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "sitegate")]
#[command(author, version, about = "Inspect site-map, action-map and permission declarations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Map {
    Site,
    Action,
    Permission,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a declared hierarchy, one node per line
    Tree {
        /// Path to the declaration (TOML, or JSON with a .json extension)
        config: PathBuf,

        /// Which hierarchy to print
        #[arg(short, long, value_enum, default_value_t = Map::Site)]
        map: Map,

        /// Print the node entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decide whether a caller holding the given roles may reach a node or holds permissions
    Check {
        /// Path to the declaration (TOML, or JSON with a .json extension)
        config: PathBuf,

        /// Roles the caller signs in with
        #[arg(short, long = "role")]
        roles: Vec<String>,

        /// Node to check in the hierarchy selected by --map
        #[arg(short, long, conflicts_with = "permissions")]
        node: Option<String>,

        /// Hierarchy the node belongs to
        #[arg(short, long, value_enum, default_value_t = Map::Site)]
        map: Map,

        /// Permissions the caller must all hold
        #[arg(short, long = "permission")]
        permissions: Vec<String>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Print the decision and granted permissions as JSON
        #[arg(long)]
        json: bool,
    },
}

/// A node check goes through the guard of the selected hierarchy; without a node the caller must
/// hold every listed permission.
fn decide(
    security: &Security,
    accessor: &PermissionAccessor,
    caller: &CallerContext,
    node: Option<String>,
    map: Map,
    permissions: Vec<String>,
) -> Result<Decision, SitegateError> {
    Ok(match (node, map) {
        (Some(key), Map::Site) => {
            SiteMapNodeGuard::new(key).check(&security.site_map, accessor, caller)?
        }
        (Some(key), Map::Action) => {
            ActionMapNodeGuard::new(key).check(&security.action_map, accessor, caller)?
        }
        (Some(key), Map::Permission) => {
            PermissionNodeGuard::new(key).check(&security.permissions, accessor, caller)?
        }
        (None, _) => PermissionGuard::new(permissions).check(accessor, caller),
    })
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Tree { config, map, json } => {
            let security = SecurityConfig::from_path(&config)?.build()?;
            if json {
                let captured = SecurityConfig::capture(&security)?;
                let entries = match map {
                    Map::Site => captured.site_map,
                    Map::Action => captured.action_map,
                    Map::Permission => captured.permissions,
                };
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(ExitCode::SUCCESS);
            }
            let tree = match map {
                Map::Site => security.site_map.read().render_tree()?,
                Map::Action => security.action_map.read().render_tree()?,
                Map::Permission => security.permissions.read().render_tree()?,
            };
            print!("{tree}");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check {
            config,
            roles,
            node,
            map,
            permissions,
            verbose,
            json,
        } => {
            let security = SecurityConfig::from_path(&config)?.build()?;
            let accessor = PermissionAccessor::new();
            let mut caller = CallerContext::new(vec![Identity::authenticated("cli")]);

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let granted = runtime.block_on(async {
                let cancel = CancellationToken::new();
                accessor
                    .sign_in(&mut caller, &roles, &security.roles, &cancel)
                    .await
            })?;
            if verbose && !json {
                println!("Roles {roles:?} grant {granted:?}");
            }

            let decision = decide(&security, &accessor, &caller, node, map, permissions)?;
            if json {
                let report = serde_json::json!({ "decision": decision, "granted": granted });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{decision}");
            }
            Ok(match decision {
                Decision::Allow => ExitCode::SUCCESS,
                Decision::Deny => ExitCode::FAILURE,
            })
        }
    }
}
