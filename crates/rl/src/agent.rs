//! Saving and restoring policy parameters by run name.

use crate::error::RlError;
use crate::policy::Policy;
use ml::checkpoint;
use std::path::{Path, PathBuf};

pub fn checkpoint_path(dir: &Path, run_name: &str) -> PathBuf {
    dir.join(format!("{run_name}.ckpt"))
}

/// Writes `dir/run_name.ckpt` and returns its path.
pub fn save(policy: &dyn Policy, dir: &Path, run_name: &str) -> Result<PathBuf, RlError> {
    let path = checkpoint_path(dir, run_name);
    checkpoint::save(&path, &policy.named_params())?;
    tracing::info!(path = %path.display(), kind = %policy.kind(), "agent saved");
    Ok(path)
}

/// Restores every parameter of `policy` from `dir/run_name.ckpt`.
pub fn load(policy: &mut dyn Policy, dir: &Path, run_name: &str) -> Result<(), RlError> {
    let path = checkpoint_path(dir, run_name);
    checkpoint::restore(&path, policy.named_params_mut())?;
    tracing::info!(path = %path.display(), "agent loaded");
    Ok(())
}
