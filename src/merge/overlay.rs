// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Structural "known fields" overlay on JSON documents.
//!
//! Only fields populated on the desired side are asserted. Absent and `null`
//! fields keep the live value, nested objects merge key by key, and lists of
//! named objects (containers, ports, volumes, webhooks...) merge element-wise
//! by `name`. Every other list is replaced wholesale.

use crate::constants::SYSTEM_METADATA_FIELDS;
use serde_json::{Map, Value};

/// Overlay `desired` onto `live` in place.
pub fn overlay(live: &mut Value, desired: &Value) {
    match (live, desired) {
        (_, Value::Null) => {}
        (Value::Object(live), Value::Object(desired)) => overlay_object(live, desired),
        (Value::Array(live), Value::Array(desired)) if is_named_list(desired) => {
            overlay_named_list(live, desired);
        }
        (live, desired) => *live = desired.clone(),
    }
}

fn overlay_object(live: &mut Map<String, Value>, desired: &Map<String, Value>) {
    for (key, value) in desired {
        if value.is_null() {
            continue;
        }
        match live.get_mut(key) {
            Some(existing) => overlay(existing, value),
            None => {
                live.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Whether every element is an object carrying a string `name`.
fn is_named_list(items: &[Value]) -> bool {
    !items.is_empty()
        && items
            .iter()
            .all(|item| item.get("name").is_some_and(Value::is_string))
}

fn overlay_named_list(live: &mut Vec<Value>, desired: &[Value]) {
    let merged = desired
        .iter()
        .map(|item| {
            let name = item.get("name");
            match live.iter().find(|existing| existing.get("name") == name) {
                Some(existing) => {
                    let mut existing = existing.clone();
                    overlay(&mut existing, item);
                    existing
                }
                None => item.clone(),
            }
        })
        .collect();
    *live = merged;
}

/// Copy server-populated metadata and type information from `live` onto `desired`.
pub fn copy_system_metadata(live: &Value, desired: &mut Value) {
    if !desired.is_object() {
        return;
    }
    for field in ["apiVersion", "kind"] {
        if let Some(value) = live.get(field) {
            desired[field] = value.clone();
        }
    }

    let Some(live_meta) = live.get("metadata").and_then(Value::as_object) else {
        return;
    };
    for field in SYSTEM_METADATA_FIELDS {
        if let Some(value) = live_meta.get(*field) {
            desired["metadata"][*field] = value.clone();
        }
    }
}

/// Split a JSON pointer into unescaped reference tokens.
fn pointer_tokens(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|token| token.replace("~1", "/").replace("~0", "~"))
        .collect()
}

/// Make `result` hold the same value as `live` at `pointer`.
///
/// Removes the field from `result` when `live` does not have it.
pub fn restore_pointer(result: &mut Value, live: &Value, pointer: &str) {
    let tokens = pointer_tokens(pointer);
    let Some((last, parents)) = tokens.split_last() else {
        return;
    };

    match live.pointer(pointer) {
        Some(value) => {
            let mut cursor = result;
            for token in parents {
                if !cursor.get(token).is_some_and(Value::is_object) {
                    cursor[token.as_str()] = Value::Object(Map::new());
                }
                cursor = &mut cursor[token.as_str()];
            }
            cursor[last.as_str()] = value.clone();
        }
        None => {
            let mut cursor = Some(result);
            for token in parents {
                cursor = cursor.and_then(|c| c.get_mut(token.as_str()));
            }
            if let Some(Value::Object(parent)) = cursor {
                parent.remove(last);
            }
        }
    }
}

#[cfg(test)]
#[path = "overlay_tests.rs"]
mod overlay_tests;
