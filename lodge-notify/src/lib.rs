pub mod bus;
pub mod capacity;
pub mod countdown;
pub mod demand;
#[cfg(feature = "diagnostics")]
pub mod diagnostics;
pub mod presence;

pub use bus::NotificationBus;
pub use capacity::{AvailabilityState, CapacitySubscriber};
pub use countdown::{CountdownSettings, CountdownTick, ReservationCountdown};
pub use demand::HighDemandNotifier;
#[cfg(feature = "diagnostics")]
pub use diagnostics::{CacheSnapshot, Diagnostics, SyntheticLoad};
pub use presence::{tally, PresenceTracker};
