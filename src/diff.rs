use std::collections::BTreeSet;

use serde_json::Value;

use crate::types::{DeviceSnapshot, Event};

pub(crate) fn diff_json(
    previous: &Value,
    current: &Value,
    path_prefix: &str,
    changes: &mut Vec<(String, Value, Value)>,
) {
    match (previous, current) {
        (Value::Object(prev_map), Value::Object(curr_map)) => {
            for (key, curr_val) in curr_map {
                let path = if path_prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{path_prefix}.{key}")
                };
                match prev_map.get(key) {
                    Some(prev_val) => diff_json(prev_val, curr_val, &path, changes),
                    None => {
                        if curr_val.is_object() {
                            diff_json(&Value::Object(serde_json::Map::new()), curr_val, &path, changes);
                        } else {
                            changes.push((path, Value::Null, curr_val.clone()));
                        }
                    }
                }
            }
            for (key, prev_val) in prev_map {
                if !curr_map.contains_key(key) {
                    let path = if path_prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{path_prefix}.{key}")
                    };
                    changes.push((path, prev_val.clone(), Value::Null));
                }
            }
        }
        (prev, curr) if prev != curr => {
            changes.push((path_prefix.to_string(), prev.clone(), curr.clone()));
        }
        _ => {}
    }
}

/// Events describing how `current` differs from the previously cached
/// snapshot of the same device.
pub(crate) fn diff_snapshots(previous: Option<&DeviceSnapshot>, current: &DeviceSnapshot) -> Vec<Event> {
    let device_id = &current.device_id;
    let prev = match previous {
        Some(p) => p,
        None => {
            return vec![Event::DeviceDiscovered {
                device_id: device_id.clone(),
                name: current.name.clone(),
            }];
        }
    };

    let mut events = Vec::new();

    if prev.name != current.name {
        events.push(Event::DeviceNameChanged {
            device_id: device_id.clone(),
            name: current.name.clone(),
        });
    }

    if prev.connection_status != current.connection_status {
        events.push(Event::ConnectionStatusChanged {
            device_id: device_id.clone(),
            status: current.connection_status.clone(),
        });
    }

    let names: BTreeSet<&String> = prev
        .parameters
        .keys()
        .chain(current.parameters.keys())
        .collect();
    for name in names {
        let old = prev.parameters.get(name);
        let new = current.parameters.get(name);
        if old != new {
            events.push(Event::ParameterChanged {
                device_id: device_id.clone(),
                name: name.clone(),
                old: old.cloned(),
                new: new.cloned(),
            });
        }
    }

    events
}
