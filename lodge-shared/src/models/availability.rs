use serde::{Deserialize, Serialize};

/// Capacity snapshot for a package or ticket pool.
///
/// `sold + reserved <= max` is enforced by the backend; nothing here checks it.
/// Every push replaces the previous snapshot wholesale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageAvailability {
    pub available: i32,
    pub reserved: i32,
    pub sold: i32,
    pub max: i32,
}

impl PackageAvailability {
    pub fn new(available: i32, reserved: i32, sold: i32, max: i32) -> Self {
        Self { available, reserved, sold, max }
    }

    /// Seats that are either sold or provisionally held. Widened so counts
    /// near `i32::MAX` cannot overflow.
    pub fn taken(&self) -> i64 {
        i64::from(self.sold) + i64::from(self.reserved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taken_does_not_overflow() {
        let availability = PackageAvailability::new(1, 1, i32::MAX, i32::MAX);
        assert_eq!(availability.taken(), i64::from(i32::MAX) + 1);
    }
}
