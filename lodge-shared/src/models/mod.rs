pub mod availability;
pub mod events;
pub mod presence;
pub mod reservation;
