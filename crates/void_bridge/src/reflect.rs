//! Type description queries for tooling
//!
//! Produces a JSON record of a script type's declared metadata:
//!
//! ```json
//! {"Name":"PlayerController","FullName":"Game.PlayerController",
//!  "BaseType":"VoidBridge.Entity","Fields":[...],"Methods":[...]}
//! ```

use crate::catalog::{TypeDescriptor, TypeResolver};

/// Build the descriptor reported for `type_name`.
///
/// Unknown names yield a record carrying only the requested name.
pub fn type_metadata(resolver: &dyn TypeResolver, type_name: &str) -> TypeDescriptor {
    match resolver.resolve(type_name) {
        Some(resolved) => resolved.entry.descriptor.clone(),
        None => TypeDescriptor {
            name: type_name.to_string(),
            full_name: type_name.to_string(),
            base_type: None,
            fields: Vec::new(),
            methods: Vec::new(),
        },
    }
}

/// JSON text for `type_name`
pub fn describe_type_json(resolver: &dyn TypeResolver, type_name: &str) -> String {
    let metadata = type_metadata(resolver, type_name);
    serde_json::to_string(&metadata).unwrap_or_else(|e| {
        log::error!("Failed to serialize metadata of '{}': {}", type_name, e);
        String::from("{}")
    })
}

/// Write the JSON description of `type_name` into `buffer` as a
/// NUL-terminated UTF-8 string.
///
/// Returns the size required for the complete text including the NUL.
/// With no buffer (or an empty one) nothing is written. A short buffer
/// receives a truncated, still NUL-terminated prefix.
pub fn describe_type(resolver: &dyn TypeResolver, type_name: &str, buffer: Option<&mut [u8]>) -> usize {
    let json = describe_type_json(resolver, type_name);
    let bytes = json.as_bytes();
    let required = bytes.len() + 1;

    if let Some(buffer) = buffer.filter(|b| !b.is_empty()) {
        let count = bytes.len().min(buffer.len() - 1);
        buffer[..count].copy_from_slice(&bytes[..count]);
        buffer[count] = 0;
    }

    required
}
