//! Configuration loading — SPEC_FULL.md §6, grounded byte-for-byte on the
//! original `src/shared/configurator.c` precedence loop and
//! `src/shared/backend.c::parse_layer`'s per-section layer format.

use std::path::{Path, PathBuf};

use ini::Ini;
use tracing::{info, warn};

use buxton_core::{BackendSelector, LayerTable, Scope};

const CONFIG_SECTION: &str = "Configuration";

const DEFAULT_CONF_FILE: &str = "/etc/buxton.conf";
const DEFAULT_MODULE_DIR: &str = "/usr/lib/buxton";
const DEFAULT_DB_PATH: &str = "/var/lib/buxton";
const DEFAULT_SMACK_LOAD_FILE: &str = "/etc/smack/accesses.d/buxton";
const DEFAULT_SOCKET_PATH: &str = "/run/buxton/socket";

/// Values a caller may supply on the command line, the highest-precedence
/// source (`configurator.c`'s `buxton_add_cmd_line`). Every field is
/// optional — an absent field falls through to the next source.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub conf_file: Option<String>,
    pub module_dir: Option<String>,
    pub db_path: Option<String>,
    pub smack_load_file: Option<String>,
    pub socket_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub conf_file: PathBuf,
    pub module_dir: PathBuf,
    pub db_path: PathBuf,
    pub smack_load_file: PathBuf,
    pub socket_path: PathBuf,
}

/// `cli > env var > config file value > compiled default`, one field at a
/// time — exactly `configurator.c::initialize`'s loop body.
fn resolve(cli: Option<String>, env_var: &str, ini: Option<&Ini>, ini_key: Option<&str>, default: &str) -> String {
    if let Some(value) = cli {
        return value;
    }
    if let Ok(value) = std::env::var(env_var) {
        return value;
    }
    if let (Some(ini), Some(key)) = (ini, ini_key) {
        if let Some(value) = ini.get_from(Some(CONFIG_SECTION), key) {
            return value.to_string();
        }
    }
    default.to_string()
}

impl DaemonConfig {
    /// Load the daemon's scalar configuration. The conf file path itself
    /// has no config-file source (a file cannot name itself), matching
    /// the original's `config_keys[CONFIG_CONF_FILE] == NULL`.
    pub fn load(cli: CliOverrides) -> Self {
        let conf_file = resolve(cli.conf_file, "BUXTON_CONF_FILE", None, None, DEFAULT_CONF_FILE);
        let conf_file = PathBuf::from(conf_file);

        let ini = match Ini::load_from_file(&conf_file) {
            Ok(ini) => Some(ini),
            Err(err) => {
                warn!(path = %conf_file.display(), %err, "failed to load buxton conf file");
                None
            }
        };

        let module_dir = resolve(cli.module_dir, "BUXTON_MODULE_DIR", ini.as_ref(), Some("ModuleDirectory"), DEFAULT_MODULE_DIR);
        let db_path = resolve(cli.db_path, "BUXTON_DB_PATH", ini.as_ref(), Some("DatabasePath"), DEFAULT_DB_PATH);
        let smack_load_file = resolve(cli.smack_load_file, "BUXTON_SMACK_LOAD_FILE", ini.as_ref(), Some("SmackLoadFile"), DEFAULT_SMACK_LOAD_FILE);
        let socket_path = resolve(cli.socket_path, "BUXTON_BUXTON_SOCKET", ini.as_ref(), Some("SocketPath"), DEFAULT_SOCKET_PATH);

        DaemonConfig {
            conf_file,
            module_dir: PathBuf::from(module_dir),
            db_path: PathBuf::from(db_path),
            smack_load_file: PathBuf::from(smack_load_file),
            socket_path: PathBuf::from(socket_path),
        }
    }

    /// Every section other than `[Configuration]` names a layer —
    /// `backend.c::buxton_init_layers`/`parse_layer`. Layers that fail to
    /// parse are skipped with a warning, matching the original's
    /// `continue` on a bad section rather than aborting the whole load.
    pub fn load_layers(&self) -> LayerTable {
        let mut table = LayerTable::new();
        let ini = match Ini::load_from_file(&self.conf_file) {
            Ok(ini) => ini,
            Err(err) => {
                warn!(path = %self.conf_file.display(), %err, "no layers defined in buxton conf file");
                return table;
            }
        };

        for (section, props) in ini.iter() {
            let Some(name) = section else { continue };
            if name == CONFIG_SECTION {
                continue;
            }
            match parse_layer(props) {
                Some((scope, backend, priority, description)) => {
                    table.insert(name, scope, backend, priority, description);
                    info!(layer = name, priority, "loaded layer");
                }
                None => warn!(layer = name, "failed to load layer"),
            }
        }
        table
    }
}

fn parse_layer(props: &ini::Properties) -> Option<(Scope, BackendSelector, i32, String)> {
    let type_str = props.get("type")?;
    let backend_str = props.get("backend")?;
    let priority: i32 = props.get("priority")?.parse().ok()?;
    let description = props.get("description").unwrap_or("").to_string();

    let scope = match type_str {
        "System" => Scope::System,
        "User" => Scope::User,
        _ => return None,
    };
    let backend = match backend_str {
        "gdbm" => BackendSelector::Persistent,
        "memory" => BackendSelector::Memory,
        _ => return None,
    };
    Some((scope, backend, priority, description))
}

/// Resolve `buxton.conf` at the compiled-in well-known path — used by
/// `--direct` callers that never go through `CliOverrides`.
pub fn default_conf_path() -> &'static Path {
    Path::new(DEFAULT_CONF_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_override_wins_over_default() {
        let value = resolve(Some("/tmp/custom.conf".to_string()), "BUXTON_CONF_FILE_TEST_UNUSED", None, None, DEFAULT_CONF_FILE);
        assert_eq!(value, "/tmp/custom.conf");
    }

    #[test]
    fn falls_back_to_default_with_nothing_else() {
        let value = resolve(None, "BUXTON_CONF_FILE_TEST_UNUSED_VAR", None, None, DEFAULT_CONF_FILE);
        assert_eq!(value, DEFAULT_CONF_FILE);
    }

    #[test]
    fn ini_value_used_when_no_cli_or_env() {
        let mut ini = Ini::new();
        ini.with_section(Some(CONFIG_SECTION)).set("DatabasePath", "/srv/buxton-db");
        let value = resolve(None, "BUXTON_DB_PATH_TEST_UNUSED", Some(&ini), Some("DatabasePath"), DEFAULT_DB_PATH);
        assert_eq!(value, "/srv/buxton-db");
    }

    #[test]
    fn layer_parsing_rejects_unknown_backend() {
        let mut ini = Ini::new();
        ini.with_section(Some("base")).set("type", "System").set("backend", "postgres").set("priority", "0");
        let props = ini.section(Some("base")).unwrap();
        assert!(parse_layer(props).is_none());
    }

    #[test]
    fn layer_parsing_succeeds_on_well_formed_section() {
        let mut ini = Ini::new();
        ini.with_section(Some("memory"))
            .set("type", "System")
            .set("backend", "memory")
            .set("priority", "0")
            .set("description", "transient layer");
        let props = ini.section(Some("memory")).unwrap();
        let (scope, backend, priority, description) = parse_layer(props).unwrap();
        assert_eq!(scope, Scope::System);
        assert_eq!(backend, BackendSelector::Memory);
        assert_eq!(priority, 0);
        assert_eq!(description, "transient layer");
    }
}
