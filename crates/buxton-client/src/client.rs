//! Async request/response core over the `buxton-wire` frame codec —
//! spec.md §4.8, SPEC_FULL.md §4.8. Grounded in `ochra-daemon::rpc`'s
//! id-correlated request/response shape, translated from JSON-RPC-over-
//! newline to the binary frame codec.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::{oneshot, Mutex as AsyncMutex};

use buxton_wire::{decode_frame, decode_header, Frame, Key, OpCode, Param, TypeTag, Value, HEADER_LEN};

use crate::error::{ClientError, Result};
use crate::response::Response;

type NotifyCallback = Box<dyn Fn(Key, Value) + Send + 'static>;

struct Shared {
    read_half: AsyncMutex<OwnedReadHalf>,
    write_half: AsyncMutex<OwnedWriteHalf>,
    read_buf: AsyncMutex<Vec<u8>>,
    next_id: AtomicU32,
    pending: Mutex<HashMap<u32, oneshot::Sender<Response>>>,
    notify_callbacks: Mutex<HashMap<String, NotifyCallback>>,
}

/// A connection to `buxtond` — spec.md §4.8: one `u32` message id per
/// in-flight call, correlated on reply. Cheap to clone; every clone
/// shares the same socket halves and callback tables.
#[derive(Clone)]
pub struct Client {
    shared: Arc<Shared>,
}

impl Client {
    pub async fn open(socket_path: impl AsRef<Path>) -> Result<Self> {
        let stream = UnixStream::connect(socket_path.as_ref()).await?;
        let (read_half, write_half) = stream.into_split();
        Ok(Client {
            shared: Arc::new(Shared {
                read_half: AsyncMutex::new(read_half),
                write_half: AsyncMutex::new(write_half),
                read_buf: AsyncMutex::new(Vec::new()),
                next_id: AtomicU32::new(1),
                pending: Mutex::new(HashMap::new()),
                notify_callbacks: Mutex::new(HashMap::new()),
            }),
        })
    }

    fn next_id(&self) -> u32 {
        self.shared.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn send_frame(&self, frame: &Frame) -> Result<()> {
        let mut write_half = self.shared.write_half.lock().await;
        write_half.write_all(&frame.encode()).await?;
        Ok(())
    }

    /// Issue a request and wait for its matching `STATUS` reply. Whichever
    /// of `rx` (another caller's concurrent read happened to resolve us)
    /// or `drive_until` (we do the reading ourselves) completes first
    /// wins — `drive_until` only ever returns on a genuine connection
    /// error, never a false "done", so there is no ambiguity about which
    /// branch represents success.
    async fn call(&self, op: OpCode, params: Vec<Param>) -> Result<Response> {
        let message_id = self.next_id();
        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().expect("pending mutex poisoned").insert(message_id, tx);

        if let Err(err) = self.send_frame(&Frame::new(op, message_id, params)).await {
            self.shared.pending.lock().expect("pending mutex poisoned").remove(&message_id);
            return Err(err);
        }

        tokio::select! {
            result = rx => result.map_err(|_| ClientError::Closed),
            result = self.drive_until_error() => result,
        }
    }

    /// Loops `handle_response` forever, dispatching whatever arrives.
    /// Returns only on a real I/O or codec error, in which case every
    /// still-pending call is failed (their senders are dropped, so each
    /// caller's `rx` resolves to `Closed`) rather than left to hang.
    async fn drive_until_error(&self) -> Result<Response> {
        loop {
            if let Err(err) = self.handle_response().await {
                self.shared.pending.lock().expect("pending mutex poisoned").clear();
                return Err(err);
            }
        }
    }

    /// Reads one batch of bytes from the socket and dispatches every
    /// complete frame found: a `STATUS` resolves its pending call by
    /// message id, a `CHANGED` push invokes whatever callback is
    /// registered for its key — spec §4.8. Safe to call directly from
    /// application code driving its own event loop instead of through
    /// the typed request helpers.
    pub async fn handle_response(&self) -> Result<usize> {
        let mut read_half = self.shared.read_half.lock().await;
        let mut chunk = [0u8; 4096];
        let n = read_half.read(&mut chunk).await?;
        drop(read_half);
        if n == 0 {
            return Err(ClientError::Closed);
        }

        let mut read_buf = self.shared.read_buf.lock().await;
        read_buf.extend_from_slice(&chunk[..n]);

        let mut dispatched = 0;
        loop {
            if read_buf.len() < HEADER_LEN {
                break;
            }
            let header = decode_header(&read_buf)?;
            if read_buf.len() < header.total_len() {
                break;
            }
            let frame = decode_frame(&read_buf[..header.total_len()])?;
            read_buf.drain(..header.total_len());
            self.dispatch(frame);
            dispatched += 1;
        }
        Ok(dispatched)
    }

    fn dispatch(&self, frame: Frame) {
        match frame.op {
            OpCode::Status => {
                let Ok(response) = Response::from_status_frame(&frame) else { return };
                if let Some(tx) = self.shared.pending.lock().expect("pending mutex poisoned").remove(&frame.message_id) {
                    let _ = tx.send(response);
                }
            }
            OpCode::Changed => {
                let Ok(key) = Key::from_params(&frame.params) else { return };
                let Some(param) = frame.params.get(3) else { return };
                let Ok(value) = param.into_value() else { return };
                let text = key.notification_text();
                if let Some(callback) = self.shared.notify_callbacks.lock().expect("notify mutex poisoned").get(&text) {
                    callback(key, value);
                }
            }
            _ => {}
        }
    }

    /// Register the callback invoked for every `CHANGED` push addressed
    /// to `key` — keyed by `key.notification_text()` since layer is never
    /// part of a registration (spec.md §3). Replaces any prior callback
    /// for the same key.
    pub fn on_change(&self, key: &Key, callback: impl Fn(Key, Value) + Send + 'static) {
        self.shared
            .notify_callbacks
            .lock()
            .expect("notify mutex poisoned")
            .insert(key.notification_text(), Box::new(callback));
    }

    pub fn clear_on_change(&self, key: &Key) {
        self.shared.notify_callbacks.lock().expect("notify mutex poisoned").remove(&key.notification_text());
    }

    // --- typed request helpers, spec.md §4.1/§6 ---

    pub async fn set(&self, key: &Key, value: Value) -> Result<()> {
        let mut params = key.to_params();
        params.push(Param::from_value(&value));
        self.call(OpCode::Set, params).await?.into_status()
    }

    pub async fn get(&self, key: &Key, expected: Option<TypeTag>) -> Result<Value> {
        let mut params = key.to_params();
        params.push(Param::from_value(&Value::Uint32(expected.unwrap_or(TypeTag::Unset).to_wire())));
        self.call(OpCode::Get, params).await?.into_value()
    }

    pub async fn get_type(&self, key: &Key) -> Result<TypeTag> {
        self.call(OpCode::GetType, key.to_params()).await?.into_type_tag()
    }

    pub async fn unset(&self, key: &Key) -> Result<()> {
        self.call(OpCode::Unset, key.to_params()).await?.into_status()
    }

    pub async fn create_group(&self, layer: &str, group: &str) -> Result<()> {
        let key = Key::new(group)?.with_layer(layer);
        self.call(OpCode::CreateGroup, key.to_params()).await?.into_status()
    }

    pub async fn remove_group(&self, layer: &str, group: &str) -> Result<()> {
        let key = Key::new(group)?.with_layer(layer);
        self.call(OpCode::RemoveGroup, key.to_params()).await?.into_status()
    }

    /// Always comes back `Denied` over the wire (spec.md §4.3: `SET_LABEL`
    /// is admitted only to the privileged in-process caller,
    /// `buxton-cli --direct`). Kept on the typed surface so the denial
    /// reaches the caller through the normal `Result` path rather than a
    /// missing method.
    pub async fn set_label(&self, key: &Key, label: &str) -> Result<()> {
        let mut params = key.to_params();
        params.push(Param::from_value(&Value::Str(label.to_string())));
        self.call(OpCode::SetLabel, params).await?.into_status()
    }

    pub async fn list_keys(&self, layer: &str) -> Result<Vec<String>> {
        let params = vec![Param::from_value(&Value::Str(layer.to_string()))];
        self.call(OpCode::List, params).await?.into_keys()
    }

    pub async fn notify(&self, key: &Key) -> Result<()> {
        self.call(OpCode::Notify, key.to_params()).await?.into_status()
    }

    pub async fn unnotify(&self, key: &Key) -> Result<()> {
        self.call(OpCode::Unnotify, key.to_params()).await?.into_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_is_send_and_sync() {
        fn assert_bounds<T: Send + Sync>() {}
        assert_bounds::<Client>();
    }
}
