//! Merges receivers with the global defaults.

use tracing::debug;

use super::{GlobalConfig, Receiver};
use crate::error::Result;

/// Returns a copy of `receiver` with every unset field filled from `global`
/// and every integration config validated.
///
/// All integration configs are defaulted, including those after a failing
/// one, so URL normalization always happens. The first failure is returned.
///
/// # Errors
///
/// Returns `MissingConfig` if a required field has neither a receiver-level
/// nor a global value, or `BadData` if a config fails validation.
pub fn resolve_receiver(receiver: &Receiver, global: &GlobalConfig) -> Result<Receiver> {
    let mut resolved = receiver.clone();
    fill_defaults(&mut resolved, global)?;
    Ok(resolved)
}

/// Defaults and validates `receiver` in place, reporting the first failure.
pub(crate) fn fill_defaults(receiver: &mut Receiver, global: &GlobalConfig) -> Result<()> {
    let name = receiver.name.clone();
    let mut first = None;

    for (index, config) in receiver.configs_mut().into_iter().enumerate() {
        let checked = config.apply_defaults(global).and_then(|()| config.validate());
        if let Err(err) = checked {
            debug!(
                receiver = %name,
                kind = %config.kind(),
                index,
                error = %err,
                "receiver config rejected"
            );
            first.get_or_insert(err);
        }
    }

    first.map_or(Ok(()), Err)
}
