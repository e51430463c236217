//! Named-tensor checkpoint files.
//!
//! Layout: the 4-byte magic `ASKC`, a little-endian `u32` manifest length, a JSON
//! manifest listing `{name, shape, offset, len}` per tensor, then the raw
//! native-endian `f32` payload.

use crate::{MlError, Tensor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const MAGIC: &[u8; 4] = b"ASKC";

#[derive(Serialize, Deserialize)]
struct Entry {
    name: String,
    shape: Vec<usize>,
    offset: usize,
    len: usize,
}

pub fn save(path: &Path, tensors: &[(String, &Tensor)]) -> Result<(), MlError> {
    let mut entries = Vec::with_capacity(tensors.len());
    let mut payload: Vec<u8> = Vec::new();
    for (name, t) in tensors {
        entries.push(Entry {
            name: name.clone(),
            shape: t.shape.clone(),
            offset: payload.len(),
            len: t.data.len(),
        });
        payload.extend_from_slice(bytemuck::cast_slice(&t.data));
    }
    let manifest = serde_json::to_vec(&entries)?;
    let manifest_len = u32::try_from(manifest.len())
        .map_err(|_| MlError::Format("manifest too large".into()))?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut bytes = Vec::with_capacity(8 + manifest.len() + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&manifest_len.to_le_bytes());
    bytes.extend_from_slice(&manifest);
    bytes.extend_from_slice(&payload);
    fs::write(path, bytes)?;
    tracing::debug!(path = %path.display(), tensors = tensors.len(), "checkpoint written");
    Ok(())
}

pub fn load(path: &Path) -> Result<BTreeMap<String, Tensor>, MlError> {
    let bytes = fs::read(path)?;
    if bytes.len() < 8 || &bytes[..4] != MAGIC {
        return Err(MlError::Format(format!("{} is not a checkpoint", path.display())));
    }
    let manifest_len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let payload_start = 8 + manifest_len;
    if bytes.len() < payload_start {
        return Err(MlError::Format("truncated manifest".into()));
    }
    let entries: Vec<Entry> = serde_json::from_slice(&bytes[8..payload_start])?;
    let payload = &bytes[payload_start..];

    let mut out = BTreeMap::new();
    for e in entries {
        let bad_extent = || MlError::Format(format!("bad extent for `{}`", e.name));
        let start = e.offset;
        let end = e
            .len
            .checked_mul(std::mem::size_of::<f32>())
            .and_then(|bytes| start.checked_add(bytes))
            .ok_or_else(bad_extent)?;
        let elements = e.shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d));
        if end > payload.len() || elements != Some(e.len) {
            return Err(bad_extent());
        }
        let mut data = vec![0.0f32; e.len];
        bytemuck::cast_slice_mut::<f32, u8>(&mut data).copy_from_slice(&payload[start..end]);
        out.insert(e.name, Tensor::from_vec(e.shape, data));
    }
    Ok(out)
}

/// Loads `path` and copies each stored tensor into the target of the same name.
///
/// Targets keep their own ids so optimiser state keyed on them stays valid.
pub fn restore(path: &Path, targets: Vec<(String, &mut Tensor)>) -> Result<(), MlError> {
    let mut stored = load(path)?;
    for (name, target) in targets {
        let src = stored.remove(&name).ok_or_else(|| MlError::MissingParam(name.clone()))?;
        if src.shape != target.shape {
            return Err(MlError::ShapeMismatch {
                name,
                expected: target.shape.clone(),
                found: src.shape,
            });
        }
        target.data = src.data;
    }
    Ok(())
}
