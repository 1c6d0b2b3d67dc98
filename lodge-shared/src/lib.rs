pub mod models;

pub use models::availability::PackageAvailability;
pub use models::events::{
    CapacityChangedEvent, HighDemandSignal, Notification, TicketPresenceUpdate,
};
pub use models::presence::{PresenceCounts, PresenceSample};
pub use models::reservation::ReservationRecord;
