//! `buxtonctl`: the Buxton command-line client — spec.md §6,
//! SPEC_FULL.md "CLI surface". Grounded in `src/cli/client.c`'s exit-code
//! discipline (0 on success, 1 on any failure, one-line reason on
//! stdout) and in `ochra-daemon::commands`'s dispatch-table idiom,
//! adapted here to `clap` derive subcommands instead of a hashmap.

mod types;

use clap::{Parser, Subcommand};

use buxton_backend::Backend;
use buxton_client::Client;
use buxton_core::{BackendRegistry, Resolver};
use buxton_daemon::config::{CliOverrides, DaemonConfig};
use buxton_policy::PolicyEngine;
use buxton_wire::{Key, TypeTag};

use types::{format_value, parse_value, CliType};

/// Identity used for every `--direct` call: `@` is always granted by the
/// built-in MAC precedence (spec.md §4.3), matching the original's
/// assumption that `--direct` runs as the daemon's own owning user.
const DIRECT_LABEL: &str = "@";

#[derive(Parser, Debug)]
#[command(name = "buxtonctl", about = "Command-line interface to buxtond")]
struct Cli {
    /// Bypass the daemon and operate on its database directly, in process.
    #[arg(long, global = true)]
    direct: bool,

    #[arg(long, global = true)]
    socket_path: Option<String>,
    #[arg(long, global = true)]
    config_file: Option<String>,
    #[arg(long, global = true)]
    module_dir: Option<String>,
    #[arg(long, global = true)]
    db_path: Option<String>,
    #[arg(long, global = true)]
    smack_load_file: Option<String>,

    #[command(subcommand)]
    command: Command,
}

impl From<&Cli> for CliOverrides {
    fn from(cli: &Cli) -> Self {
        CliOverrides {
            conf_file: cli.config_file.clone(),
            module_dir: cli.module_dir.clone(),
            db_path: cli.db_path.clone(),
            smack_load_file: cli.smack_load_file.clone(),
            socket_path: cli.socket_path.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a value; `--type` is an optional type hint, not a filter.
    Get {
        #[arg(long = "type", value_enum)]
        ty: Option<CliType>,
        /// Layer to read from; omit to resolve across all layers by priority.
        #[arg(long)]
        layer: Option<String>,
        group: String,
        name: String,
    },
    /// Write a value into exactly one layer.
    Set {
        #[arg(long = "type", value_enum)]
        ty: CliType,
        layer: String,
        group: String,
        name: String,
        value: String,
    },
    CreateGroup { layer: String, group: String },
    RemoveGroup { layer: String, group: String },
    /// Privileged: requires `--direct` (the wire op is always denied).
    SetLabel { layer: String, group: String, name: Option<String>, label: String },
    /// Privileged: no wire equivalent exists, so this always requires `--direct`.
    GetLabel { layer: String, group: String, name: Option<String> },
    ListKeys { layer: String },
    UnsetValue { layer: String, group: String, name: String },
}

fn main() {
    let cli = Cli::parse();
    let result = if cli.direct {
        run_direct(&cli)
    } else {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_io().build() {
            Ok(rt) => rt,
            Err(err) => fail(&format!("failed to start runtime: {err}")),
        };
        runtime.block_on(run_wire(&cli))
    };

    match result {
        Ok(line) => {
            println!("{line}");
            std::process::exit(0);
        }
        Err(err) => fail(&err.to_string()),
    }
}

fn fail(reason: &str) -> ! {
    println!("{reason}");
    std::process::exit(1);
}

// --- wire-connected path ---

async fn run_wire(cli: &Cli) -> anyhow::Result<String> {
    let config = DaemonConfig::load(CliOverrides::from(cli));
    let client = Client::open(&config.socket_path).await?;

    Ok(match &cli.command {
        Command::Get { ty, layer, group, name } => {
            let mut key = Key::new(group.as_str())?.with_name(name.as_str());
            if let Some(layer) = layer {
                key = key.with_layer(layer.as_str());
            }
            let expected: Option<TypeTag> = ty.map(|t| t.into());
            let value = client.get(&key, expected).await?;
            format_value(&value)
        }
        Command::Set { ty, layer, group, name, value } => {
            let key = Key::new(group.as_str())?.with_name(name.as_str()).with_layer(layer.as_str());
            let value = parse_value(*ty, value)?;
            client.set(&key, value).await?;
            "OK".to_string()
        }
        Command::CreateGroup { layer, group } => {
            client.create_group(layer, group).await?;
            "OK".to_string()
        }
        Command::RemoveGroup { layer, group } => {
            client.remove_group(layer, group).await?;
            "OK".to_string()
        }
        Command::SetLabel { layer, group, name, label } => {
            let mut key = Key::new(group.as_str())?.with_layer(layer.as_str());
            if let Some(name) = name {
                key = key.with_name(name.as_str());
            }
            client.set_label(&key, label).await?;
            "OK".to_string()
        }
        Command::GetLabel { .. } => {
            anyhow::bail!("get-label has no wire operation; re-run with --direct")
        }
        Command::ListKeys { layer } => client.list_keys(layer).await?.join("\n"),
        Command::UnsetValue { layer, group, name } => {
            let key = Key::new(group.as_str())?.with_name(name.as_str()).with_layer(layer.as_str());
            client.unset(&key).await?;
            "OK".to_string()
        }
    })
}

// --- in-process `--direct` path, spec.md §6 ---

fn run_direct(cli: &Cli) -> anyhow::Result<String> {
    let config = DaemonConfig::load(CliOverrides::from(cli));
    let layers = config.load_layers();
    let mut registry = BackendRegistry::new(config.db_path.clone());
    let policy = PolicyEngine::load(config.smack_load_file.clone());
    let uid = nix::unistd::getuid().as_raw();

    Ok(match &cli.command {
        Command::Get { ty, layer, group, name } => {
            let mut key = Key::new(group)?.with_name(name);
            if let Some(layer) = layer {
                key = key.with_layer(layer.clone());
            }
            let expected: Option<TypeTag> = ty.map(|t| t.into());
            let value = match &key.layer {
                Some(layer_name) => Resolver::get_value_for_layer(
                    &layers, &mut registry, &policy, layer_name, &key, DIRECT_LABEL, uid, expected,
                )?,
                None => Resolver::get_value(&layers, &mut registry, &policy, &key, DIRECT_LABEL, uid, expected)?.1,
            };
            format_value(&value)
        }
        Command::Set { ty, layer, group, name, value } => {
            let key = Key::new(group)?.with_name(name).with_layer(layer.clone());
            let value = parse_value(*ty, value)?;
            Resolver::set_value(&layers, &mut registry, &policy, layer, &key, value, DIRECT_LABEL, uid, true)?;
            "OK".to_string()
        }
        Command::CreateGroup { layer, group } => {
            Resolver::create_group(&layers, &mut registry, layer, group, DIRECT_LABEL, uid)?;
            "OK".to_string()
        }
        Command::RemoveGroup { layer, group } => {
            Resolver::remove_group(&layers, &mut registry, &policy, layer, group, DIRECT_LABEL, uid, true)?;
            "OK".to_string()
        }
        Command::SetLabel { layer, group, name, label } => {
            let mut key = Key::new(group)?.with_layer(layer.clone());
            if let Some(name) = name {
                key = key.with_name(name.clone());
            }
            Resolver::set_label(&layers, &mut registry, layer, &key, label, uid)?;
            "OK".to_string()
        }
        Command::GetLabel { layer, group, name } => {
            let layer_ref = layers.get(layer).ok_or_else(|| anyhow::anyhow!("unknown layer '{layer}'"))?;
            let backend = registry.get(layer_ref, uid)?;
            let entry = backend.get(group, name.as_deref())?;
            entry.label
        }
        Command::ListKeys { layer } => Resolver::list_keys(&layers, &mut registry, layer, uid)?.join("\n"),
        Command::UnsetValue { layer, group, name } => {
            let key = Key::new(group)?.with_name(name).with_layer(layer.clone());
            Resolver::unset_value(&layers, &mut registry, &policy, layer, &key, DIRECT_LABEL, uid, true)?;
            "OK".to_string()
        }
    })
}
