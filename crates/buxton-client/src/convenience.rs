//! Process-global "current group/layer" affordance — spec.md §4.8:
//! "a strict superset of no-op value... offered only as an application
//! affordance." Every function here is a thin wrapper resolving the
//! implicit group/layer and delegating to [`crate::Client`]; there is no
//! independent logic beyond that delegation.
//!
//! State is `thread_local!`, not process-global in the literal sense —
//! the spec's "current group/layer" is inherently single-caller, and a
//! `thread_local!` gives every thread its own without forcing a `Mutex`
//! onto callers who never touch it from more than one thread.

use std::cell::RefCell;
use std::path::Path;

use buxton_wire::{Key, TypeTag, Value};

use crate::client::Client;
use crate::error::{ClientError, Result};

#[derive(Default)]
struct ConvenienceState {
    client: Option<Client>,
    runtime: Option<tokio::runtime::Runtime>,
    group: Option<String>,
    layer: Option<String>,
}

thread_local! {
    static STATE: RefCell<ConvenienceState> = RefCell::new(ConvenienceState::default());
}

/// Open the daemon connection this thread's convenience calls will use.
/// Builds its own single-threaded tokio runtime so a caller with no
/// async runtime of its own can still use the synchronous surface below.
pub fn open(socket_path: impl AsRef<Path>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()
        .map_err(ClientError::Io)?;
    let client = runtime.block_on(Client::open(socket_path))?;
    STATE.with(|state| {
        let mut state = state.borrow_mut();
        state.runtime = Some(runtime);
        state.client = Some(client);
    });
    Ok(())
}

pub fn set_current_group(group: impl Into<String>) {
    STATE.with(|state| state.borrow_mut().group = Some(group.into()));
}

pub fn set_current_layer(layer: impl Into<String>) {
    STATE.with(|state| state.borrow_mut().layer = Some(layer.into()));
}

fn current_key(name: &str) -> Result<Key> {
    STATE.with(|state| {
        let state = state.borrow();
        let group = state
            .group
            .as_deref()
            .ok_or_else(|| ClientError::Invalid("no current group set; call set_current_group first".into()))?;
        let mut key = Key::new(group)?.with_name(name);
        if let Some(layer) = state.layer.as_deref() {
            key = key.with_layer(layer);
        }
        Ok(key)
    })
}

fn with_client<F, T>(f: F) -> Result<T>
where
    F: FnOnce(&Client, &tokio::runtime::Runtime) -> Result<T>,
{
    STATE.with(|state| {
        let state = state.borrow();
        let client = state
            .client
            .as_ref()
            .ok_or_else(|| ClientError::Invalid("buxton_client::convenience::open was never called".into()))?;
        let runtime = state
            .runtime
            .as_ref()
            .ok_or_else(|| ClientError::Invalid("buxton_client::convenience::open was never called".into()))?;
        f(client, runtime)
    })
}

fn get_typed(name: &str, expected: TypeTag) -> Result<Value> {
    let key = current_key(name)?;
    with_client(|client, runtime| runtime.block_on(client.get(&key, Some(expected))))
}

fn set_typed(name: &str, value: Value) -> Result<()> {
    let key = current_key(name)?;
    with_client(|client, runtime| runtime.block_on(client.set(&key, value)))
}

fn type_mismatch() -> ClientError {
    ClientError::Invalid("daemon returned a value of the wrong type".into())
}

pub fn get_string(name: &str) -> Result<String> {
    match get_typed(name, TypeTag::String)? {
        Value::Str(s) => Ok(s),
        _ => Err(type_mismatch()),
    }
}

pub fn set_string(name: &str, value: impl Into<String>) -> Result<()> {
    set_typed(name, Value::Str(value.into()))
}

pub fn get_int32(name: &str) -> Result<i32> {
    match get_typed(name, TypeTag::Int32)? {
        Value::Int32(v) => Ok(v),
        _ => Err(type_mismatch()),
    }
}

pub fn set_int32(name: &str, value: i32) -> Result<()> {
    set_typed(name, Value::Int32(value))
}

pub fn get_int64(name: &str) -> Result<i64> {
    match get_typed(name, TypeTag::Int64)? {
        Value::Int64(v) => Ok(v),
        _ => Err(type_mismatch()),
    }
}

pub fn set_int64(name: &str, value: i64) -> Result<()> {
    set_typed(name, Value::Int64(value))
}

pub fn get_uint32(name: &str) -> Result<u32> {
    match get_typed(name, TypeTag::Uint32)? {
        Value::Uint32(v) => Ok(v),
        _ => Err(type_mismatch()),
    }
}

pub fn set_uint32(name: &str, value: u32) -> Result<()> {
    set_typed(name, Value::Uint32(value))
}

pub fn get_uint64(name: &str) -> Result<u64> {
    match get_typed(name, TypeTag::Uint64)? {
        Value::Uint64(v) => Ok(v),
        _ => Err(type_mismatch()),
    }
}

pub fn set_uint64(name: &str, value: u64) -> Result<()> {
    set_typed(name, Value::Uint64(value))
}

pub fn get_float32(name: &str) -> Result<f32> {
    match get_typed(name, TypeTag::Float32)? {
        Value::Float32(v) => Ok(v),
        _ => Err(type_mismatch()),
    }
}

pub fn set_float32(name: &str, value: f32) -> Result<()> {
    set_typed(name, Value::Float32(value))
}

pub fn get_float64(name: &str) -> Result<f64> {
    match get_typed(name, TypeTag::Float64)? {
        Value::Float64(v) => Ok(v),
        _ => Err(type_mismatch()),
    }
}

pub fn set_float64(name: &str, value: f64) -> Result<()> {
    set_typed(name, Value::Float64(value))
}

pub fn get_bool(name: &str) -> Result<bool> {
    match get_typed(name, TypeTag::Bool)? {
        Value::Bool(v) => Ok(v),
        _ => Err(type_mismatch()),
    }
}

pub fn set_bool(name: &str, value: bool) -> Result<()> {
    set_typed(name, Value::Bool(value))
}

pub fn unset_value(name: &str) -> Result<()> {
    let key = current_key(name)?;
    with_client(|client, runtime| runtime.block_on(client.unset(&key)))
}
