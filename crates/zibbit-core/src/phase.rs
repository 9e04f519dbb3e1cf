//! Reading and writing the authoritative [`GamePhase`].
//!
//! Only the scheduler writes the phase. Request handlers read it to gate
//! mutations; a missing record reads as [`GamePhase::default`] (cooldown).

use zibbit_store::{GameStore, StoreError, get_json, set_json};
use zibbit_types::GamePhase;

use crate::error::GameError;
use crate::keys;

/// Read the current phase.
pub async fn load(store: &dyn GameStore) -> Result<GamePhase, StoreError> {
    Ok(get_json(store, keys::PHASE).await?.unwrap_or_default())
}

/// Replace the current phase.
pub async fn save(store: &dyn GameStore, phase: &GamePhase) -> Result<(), StoreError> {
    set_json(store, keys::PHASE, phase, None).await
}

/// Fail with [`GameError::NotInPlay`] unless a game is running.
pub async fn require_in_play(store: &dyn GameStore) -> Result<(), GameError> {
    if load(store).await?.is_in_play() {
        Ok(())
    } else {
        Err(GameError::NotInPlay)
    }
}
