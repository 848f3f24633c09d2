//! Frame dispatch — spec.md §4.6 steps 2-4 (decode already happened in
//! `Session::feed`; step 5, the actual socket write, is `main`'s job).
//!
//! `dispatch` is a synchronous function over `&mut DaemonState` — spec §5:
//! "a handler never awaits another handler." It never panics on
//! client-supplied bytes: every malformed-but-decodable request (wrong
//! parameter count, bad key) maps to `StatusCode::Invalid`, not a panic.

use tracing::debug;

use buxton_core::{CoreError, Resolver};
use buxton_wire::{Frame, Key, OpCode, Param, StatusCode, TypeTag, Value};

use crate::session::Session;
use crate::state::DaemonState;

/// A key change to push as a `CHANGED` frame to another session — built
/// here, turned into bytes and routed to that session's outbound channel
/// by `main`. `key` carries no layer (spec.md §3: notification
/// registrations are cross-layer), so it serializes as the empty-layer
/// triple `CHANGED` frames use.
pub struct Fired {
    pub session_id: u64,
    pub key: Key,
    pub value: Value,
}

pub struct DispatchResult {
    pub reply: Frame,
    pub fired: Vec<Fired>,
}

fn status_only(message_id: u32, code: StatusCode) -> Frame {
    Frame::new(OpCode::Status, message_id, vec![Param::from_value(&Value::Uint32(code.to_wire()))])
}

fn status_with(message_id: u32, code: StatusCode, mut extra: Vec<Param>) -> Frame {
    let mut params = vec![Param::from_value(&Value::Uint32(code.to_wire()))];
    params.append(&mut extra);
    Frame::new(OpCode::Status, message_id, params)
}

fn invalid(err: &str) -> CoreError {
    CoreError::Invalid(err.to_string())
}

pub fn dispatch(state: &mut DaemonState, session: &mut Session, frame: Frame) -> DispatchResult {
    debug!(session = session.id, op = ?frame.op, "dispatching frame");
    let message_id = frame.message_id;

    let outcome = run(state, session, &frame);
    match outcome {
        Ok((reply, fired)) => DispatchResult { reply, fired },
        Err(err) => DispatchResult { reply: status_only(message_id, err.status_code()), fired: Vec::new() },
    }
}

fn run(state: &mut DaemonState, session: &mut Session, frame: &Frame) -> Result<(Frame, Vec<Fired>), CoreError> {
    let message_id = frame.message_id;
    let uid = session.peer.uid;
    let label = session.label.clone();

    match frame.op {
        OpCode::Set => {
            let key = Key::from_params(&frame.params).map_err(|e| invalid(&e.to_string()))?;
            let layer_name = key.layer.clone().ok_or_else(|| invalid("SET requires a layer"))?;
            let value = frame.params.get(3).ok_or_else(|| invalid("SET requires a value parameter"))?.into_value().map_err(|e| invalid(&e.to_string()))?;

            Resolver::set_value(&state.layers, &mut state.registry, &state.policy, &layer_name, &key, value.clone(), &label, uid, false)?;

            let text = key.notification_text();
            let bare_key = Key { group: key.group.clone(), name: key.name.clone(), layer: None };
            let fired = state
                .notifications
                .on_set(&text, &value)
                .into_iter()
                .map(|(session_id, value)| Fired { session_id, key: bare_key.clone(), value })
                .collect();
            Ok((status_only(message_id, StatusCode::Ok), fired))
        }

        OpCode::SetLabel => {
            // Wire sessions never get the privileged path (spec.md §4.3,
            // SPEC_FULL.md §4.6) — only `buxton-cli --direct` may call
            // `Resolver::set_label` directly, in-process.
            Ok((status_only(message_id, StatusCode::Denied), Vec::new()))
        }

        OpCode::CreateGroup => {
            let key = Key::from_params(&frame.params).map_err(|e| invalid(&e.to_string()))?;
            let layer_name = key.layer.clone().ok_or_else(|| invalid("CREATE_GROUP requires a layer"))?;
            Resolver::create_group(&state.layers, &mut state.registry, &layer_name, &key.group, &label, uid)?;
            Ok((status_only(message_id, StatusCode::Ok), Vec::new()))
        }

        OpCode::RemoveGroup => {
            let key = Key::from_params(&frame.params).map_err(|e| invalid(&e.to_string()))?;
            let layer_name = key.layer.clone().ok_or_else(|| invalid("REMOVE_GROUP requires a layer"))?;
            Resolver::remove_group(&state.layers, &mut state.registry, &state.policy, &layer_name, &key.group, &label, uid, false)?;
            Ok((status_only(message_id, StatusCode::Ok), Vec::new()))
        }

        OpCode::Get => {
            let key = Key::from_params(&frame.params).map_err(|e| invalid(&e.to_string()))?;
            let expected = decode_expected_type(frame.params.get(3))?;
            let value = match &key.layer {
                Some(layer_name) => Resolver::get_value_for_layer(&state.layers, &mut state.registry, &state.policy, layer_name, &key, &label, uid, expected)?,
                None => Resolver::get_value(&state.layers, &mut state.registry, &state.policy, &key, &label, uid, expected)?.1,
            };
            Ok((status_with(message_id, StatusCode::Ok, vec![Param::from_value(&value)]), Vec::new()))
        }

        OpCode::GetType => {
            let key = Key::from_params(&frame.params).map_err(|e| invalid(&e.to_string()))?;
            let value = match &key.layer {
                Some(layer_name) => Resolver::get_value_for_layer(&state.layers, &mut state.registry, &state.policy, layer_name, &key, &label, uid, None)?,
                None => Resolver::get_value(&state.layers, &mut state.registry, &state.policy, &key, &label, uid, None)?.1,
            };
            let tag = Param::from_value(&Value::Uint32(value.type_tag().to_wire()));
            Ok((status_with(message_id, StatusCode::Ok, vec![tag]), Vec::new()))
        }

        OpCode::Unset => {
            let key = Key::from_params(&frame.params).map_err(|e| invalid(&e.to_string()))?;
            let layer_name = key.layer.clone().ok_or_else(|| invalid("UNSET requires a layer"))?;
            Resolver::unset_value(&state.layers, &mut state.registry, &state.policy, &layer_name, &key, &label, uid, false)?;
            Ok((status_only(message_id, StatusCode::Ok), Vec::new()))
        }

        OpCode::List => {
            let layer_param = frame.params.first().ok_or_else(|| invalid("LIST requires a layer parameter"))?;
            let layer_value = layer_param.into_value().map_err(|e| invalid(&e.to_string()))?;
            let Value::Str(layer_name) = layer_value else {
                return Err(invalid("LIST's layer parameter must be a string"));
            };
            let keys = Resolver::list_keys(&state.layers, &mut state.registry, &layer_name, uid)?;
            let params = keys.iter().map(|k| Param::from_value(&Value::Str(k.clone()))).collect();
            Ok((status_with(message_id, StatusCode::Ok, params), Vec::new()))
        }

        OpCode::Notify => {
            let key = Key::from_params(&frame.params).map_err(|e| invalid(&e.to_string()))?;
            // Registration is cross-layer (spec.md §3: "layer is not part
            // of the key for notification purposes"), so the current
            // value is always the effective multi-layer resolution,
            // regardless of any layer the request happened to carry.
            let lookup = Key { group: key.group.clone(), name: key.name.clone(), layer: None };
            let (_, value) = Resolver::get_value(&state.layers, &mut state.registry, &state.policy, &lookup, &label, uid, None)?;
            let text = key.notification_text();
            state.notifications.register(&text, session.id, value);
            session.notify_keys.insert(text);
            Ok((status_only(message_id, StatusCode::Ok), Vec::new()))
        }

        OpCode::Unnotify => {
            let key = Key::from_params(&frame.params).map_err(|e| invalid(&e.to_string()))?;
            let text = key.notification_text();
            state.notifications.unregister(&text, session.id);
            session.notify_keys.remove(&text);
            Ok((status_only(message_id, StatusCode::Ok), Vec::new()))
        }

        OpCode::Status | OpCode::Changed => Err(invalid("op is server-originated only")),
    }
}

fn decode_expected_type(param: Option<&Param>) -> Result<Option<TypeTag>, CoreError> {
    let Some(param) = param else { return Ok(None) };
    let value = param.into_value().map_err(|e| invalid(&e.to_string()))?;
    let Value::Uint32(tag) = value else {
        return Err(invalid("GET's type-hint parameter must be Uint32"));
    };
    let tag = TypeTag::from_wire(tag).map_err(|e| invalid(&e.to_string()))?;
    Ok(if tag == TypeTag::Unset { None } else { Some(tag) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CliOverrides, DaemonConfig};
    use crate::session::{PeerCreds, Session};
    use buxton_core::{BackendSelector, Scope};

    fn state_with_layer() -> DaemonState {
        let mut config = DaemonConfig::load(CliOverrides::default());
        config.smack_load_file = std::env::temp_dir().join("nonexistent-buxton-mac-mount/rules.load2");
        let mut state = DaemonState::new(&config);
        state.layers.insert("base", Scope::System, BackendSelector::Memory, 0, "");
        state
    }

    fn session() -> Session {
        Session::new(1, PeerCreds { uid: 0, pid: 1 }, "admin".to_string())
    }

    fn key_params(group: &str, name: &str, layer: &str) -> Vec<Param> {
        Key::new(group).unwrap().with_name(name).with_layer(layer).to_params()
    }

    #[test]
    fn create_group_then_set_then_get_round_trips() {
        let mut state = state_with_layer();
        let mut session = session();

        let frame = Frame::new(OpCode::CreateGroup, 1, key_params("demo", "", "base"));
        let result = dispatch(&mut state, &mut session, frame);
        assert_eq!(result.reply.op, OpCode::Status);

        let mut set_params = key_params("demo", "count", "base");
        set_params.push(Param::from_value(&Value::Int32(7)));
        let set_frame = Frame::new(OpCode::Set, 2, set_params);
        let result = dispatch(&mut state, &mut session, set_frame);
        let Value::Uint32(code) = result.reply.params[0].into_value().unwrap() else { unreachable!() };
        assert_eq!(code, StatusCode::Ok.to_wire());

        let get_frame = Frame::new(OpCode::Get, 3, key_params("demo", "count", "base"));
        let result = dispatch(&mut state, &mut session, get_frame);
        let value = result.reply.params[1].into_value().unwrap();
        assert_eq!(value, Value::Int32(7));
    }

    #[test]
    fn set_label_denied_over_the_wire() {
        let mut state = state_with_layer();
        let mut session = session();
        let mut params = key_params("demo", "count", "base");
        params.push(Param::from_value(&Value::Str("secret".into())));
        let frame = Frame::new(OpCode::SetLabel, 1, params);
        let result = dispatch(&mut state, &mut session, frame);
        let Value::Uint32(code) = result.reply.params[0].into_value().unwrap() else { unreachable!() };
        assert_eq!(code, StatusCode::Denied.to_wire());
    }

    #[test]
    fn get_missing_key_is_not_found() {
        let mut state = state_with_layer();
        let mut session = session();
        let frame = Frame::new(OpCode::Get, 1, key_params("demo", "ghost", "base"));
        let result = dispatch(&mut state, &mut session, frame);
        let Value::Uint32(code) = result.reply.params[0].into_value().unwrap() else { unreachable!() };
        assert_eq!(code, StatusCode::NotFound.to_wire());
    }

    #[test]
    fn notify_then_set_fires_changed() {
        let mut state = state_with_layer();
        let mut writer = session();
        writer.id = 1;
        let mut subscriber = session();
        subscriber.id = 2;

        let create = Frame::new(OpCode::CreateGroup, 1, key_params("demo", "", "base"));
        dispatch(&mut state, &mut writer, create);
        let mut set_params = key_params("demo", "count", "base");
        set_params.push(Param::from_value(&Value::Int32(1)));
        dispatch(&mut state, &mut writer, Frame::new(OpCode::Set, 2, set_params));

        let notify = Frame::new(OpCode::Notify, 3, key_params("demo", "count", ""));
        let result = dispatch(&mut state, &mut subscriber, notify);
        assert!(result.fired.is_empty());

        let mut set_params = key_params("demo", "count", "base");
        set_params.push(Param::from_value(&Value::Int32(2)));
        let result = dispatch(&mut state, &mut writer, Frame::new(OpCode::Set, 4, set_params));
        assert_eq!(result.fired.len(), 1);
        assert_eq!(result.fired[0].session_id, 2);
        assert_eq!(result.fired[0].value, Value::Int32(2));
    }
}
