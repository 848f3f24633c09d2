//! Mapping between the CLI's `--type <name>` flag and `buxton_wire::Value`
//! — spec.md §6, grounded in `src/cli/client.c`'s per-type parsing
//! (`strtof`/`strtod`, `"true"`/`"false"` for booleans).

use clap::ValueEnum;

use buxton_wire::{TypeTag, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliType {
    String,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Float32,
    Float64,
    Bool,
}

impl From<CliType> for TypeTag {
    fn from(t: CliType) -> TypeTag {
        match t {
            CliType::String => TypeTag::String,
            CliType::Int32 => TypeTag::Int32,
            CliType::Int64 => TypeTag::Int64,
            CliType::Uint32 => TypeTag::Uint32,
            CliType::Uint64 => TypeTag::Uint64,
            CliType::Float32 => TypeTag::Float32,
            CliType::Float64 => TypeTag::Float64,
            CliType::Bool => TypeTag::Bool,
        }
    }
}

/// Parse a command-line value string into the `Value` its `--type` names.
pub fn parse_value(ty: CliType, raw: &str) -> anyhow::Result<Value> {
    Ok(match ty {
        CliType::String => Value::Str(raw.to_string()),
        CliType::Int32 => Value::Int32(raw.parse()?),
        CliType::Int64 => Value::Int64(raw.parse()?),
        CliType::Uint32 => Value::Uint32(raw.parse()?),
        CliType::Uint64 => Value::Uint64(raw.parse()?),
        CliType::Float32 => Value::Float32(raw.parse()?),
        CliType::Float64 => Value::Float64(raw.parse()?),
        CliType::Bool => match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            other => anyhow::bail!("accepted values are [true] [false], got '{other}'"),
        },
    })
}

/// Render a `Value` the way a one-line CLI reply should look.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        Value::Int32(v) => v.to_string(),
        Value::Int64(v) => v.to_string(),
        Value::Uint32(v) => v.to_string(),
        Value::Uint64(v) => v.to_string(),
        Value::Float32(v) => v.to_string(),
        Value::Float64(v) => v.to_string(),
        Value::Bool(v) => v.to_string(),
        Value::Unset => "<unset>".to_string(),
    }
}
