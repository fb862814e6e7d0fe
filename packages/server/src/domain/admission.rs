//! Admission rules for viewer connections.
//!
//! Pure functions, evaluated before the WebSocket upgrade.

use slalom_live_shared::protocol::EventStatus;

use super::error::UpgradeRejected;

/// Decide whether a viewer may join the room of an event.
///
/// # Arguments
///
/// * `status` - Status of the event, `None` if the event does not exist
/// * `room_size` - Current number of connections in the event's room
/// * `capacity` - Room capacity
pub fn check_admission(
    status: Option<EventStatus>,
    room_size: usize,
    capacity: usize,
) -> Result<(), UpgradeRejected> {
    match status {
        None | Some(EventStatus::Draft) => Err(UpgradeRejected::NotFound),
        Some(EventStatus::Official) => Err(UpgradeRejected::Gone),
        Some(_) if room_size >= capacity => Err(UpgradeRejected::OverCapacity { capacity }),
        Some(_) => Ok(()),
    }
}
