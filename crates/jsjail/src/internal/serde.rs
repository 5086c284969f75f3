use rquickjs::{Type, Value, function::This};
use serde::{
    Serialize,
    ser::{SerializeMap, SerializeSeq},
};

const MAX_DEPTH: usize = 128;

/// Largest integer a double represents exactly (2^53 - 1).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A value whose `toJSON` hook has already been applied.
struct JsValue<'js>(Value<'js>, usize);

impl<'js> JsValue<'js> {
    const fn new(val: Value<'js>) -> Self {
        Self(val, MAX_DEPTH)
    }

    const fn child(&self, val: Value<'js>) -> Self {
        Self(val, self.1 - 1)
    }
}

/// Values `JSON.stringify` leaves out of objects and writes as `null` in
/// arrays.
fn is_skipped(v: &Value<'_>) -> bool {
    v.is_undefined() || v.is_function() || v.is_symbol()
}

/// Replace `val` by the result of its `toJSON(key)` method, if it has one.
fn apply_to_json<'js>(val: Value<'js>, key: &str) -> Result<Value<'js>, String> {
    let Some(obj) = val.as_object() else {
        return Ok(val);
    };
    let to_json: Value<'js> = obj.get("toJSON").map_err(|e| describe(&val, &e))?;
    let Some(func) = to_json.as_function() else {
        return Ok(val);
    };
    func.call((This(val.clone()), key))
        .map_err(|e| format!("toJSON threw: {}", describe(&val, &e)))
}

/// Message of an engine error, taking the pending exception if there is one.
fn describe(val: &Value<'_>, err: &rquickjs::Error) -> String {
    if !matches!(err, rquickjs::Error::Exception) {
        return err.to_string();
    }
    let caught = val.ctx().catch();
    caught
        .as_exception()
        .and_then(rquickjs::Exception::message)
        .unwrap_or_else(|| err.to_string())
}

impl Serialize for JsValue<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if self.1 == 0 {
            return Err(serde::ser::Error::custom(
                "maximum serialization depth exceeded, possible circular reference",
            ));
        }

        let v = &self.0;

        if v.is_null() || v.is_undefined() {
            serializer.serialize_none()
        } else if let Some(b) = v.as_bool() {
            serializer.serialize_bool(b)
        } else if let Some(i) = v.as_int() {
            serializer.serialize_i32(i)
        } else if v.is_number() {
            let f = v
                .as_number()
                .ok_or_else(|| serde::ser::Error::custom("value is not a number"))?;
            // QuickJS keeps results of float arithmetic as doubles even when
            // integral; render those like JSON.stringify does.
            if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER {
                #[allow(clippy::cast_possible_truncation)]
                let i = f as i64;
                serializer.serialize_i64(i)
            } else {
                serializer.serialize_f64(f)
            }
        } else if let Some(s) = v.as_string() {
            let s = s.to_string().map_err(serde::ser::Error::custom)?;
            serializer.serialize_str(&s)
        } else if v.is_function() || v.is_symbol() || v.type_of() == Type::BigInt {
            Err(serde::ser::Error::custom(format!(
                "non-serializable JS value type: {}",
                v.type_of().as_str()
            )))
        } else if let Some(arr) = v.as_array() {
            let len = arr.len();
            let mut seq = serializer.serialize_seq(Some(len))?;
            for i in 0..len {
                let elem: Value<'_> = arr.get(i).map_err(serde::ser::Error::custom)?;
                let elem = apply_to_json(elem, &i.to_string()).map_err(serde::ser::Error::custom)?;
                if is_skipped(&elem) {
                    seq.serialize_element(&())?;
                } else {
                    seq.serialize_element(&self.child(elem))?;
                }
            }
            seq.end()
        } else if let Some(obj) = v.as_object() {
            if let Some(buf) = obj.as_array_buffer()
                && let Some(bytes) = buf.as_bytes()
            {
                return serializer.serialize_bytes(bytes);
            }
            if let Some(ta) = obj.as_typed_array::<u8>()
                && let Some(bytes) = ta.as_bytes()
            {
                return serializer.serialize_bytes(bytes);
            }
            let props: Vec<(rquickjs::atom::Atom<'_>, Value<'_>)> = obj
                .own_props(rquickjs::object::Filter::new().string().enum_only())
                .collect::<rquickjs::Result<_>>()
                .map_err(serde::ser::Error::custom)?;
            let mut map = serializer.serialize_map(None)?;
            for (key, val) in props {
                let key_str: String = key.to_string().map_err(serde::ser::Error::custom)?;
                let val = apply_to_json(val, &key_str).map_err(serde::ser::Error::custom)?;
                if is_skipped(&val) {
                    continue;
                }
                map.serialize_entry(&key_str, &self.child(val))?;
            }
            map.end()
        } else {
            Err(serde::ser::Error::custom(format!(
                "non-serializable JS value type: {}",
                v.type_of().as_str()
            )))
        }
    }
}

/// Copy `val` out of the engine the way `JSON.stringify` sees it: `toJSON`
/// is honoured, key order is kept, and `undefined`, functions and symbols
/// are dropped from objects and written as `null` in arrays. At the top
/// level functions, symbols and `BigInt`s are rejected.
pub fn js_to_json(val: Value<'_>) -> Result<serde_json::Value, String> {
    let val = apply_to_json(val, "")?;
    JsValue::new(val)
        .serialize(serde_json::value::Serializer)
        .map_err(|e| e.to_string())
}
