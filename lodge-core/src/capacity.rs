use lodge_shared::PackageAvailability;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Percentage at or above which a package is shown as limited.
pub const LIMITED_THRESHOLD_PERCENT: i32 = 80;

pub const NO_CAPACITY_INFORMATION: &str = "No capacity information";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusLabel {
    #[serde(rename = "Sold Out")]
    SoldOut,
    #[serde(rename = "Limited Availability")]
    LimitedAvailability,
    #[serde(rename = "Available")]
    Available,
}

impl StatusLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusLabel::SoldOut => "Sold Out",
            StatusLabel::LimitedAvailability => "Limited Availability",
            StatusLabel::Available => "Available",
        }
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `round((sold + reserved) / max * 100)`, or 0 when `max` is not positive.
/// Halves round up.
pub fn capacity_percentage(availability: &PackageAvailability) -> i32 {
    if availability.max <= 0 {
        return 0;
    }
    let ratio = availability.taken() as f64 / availability.max as f64 * 100.0;
    (ratio + 0.5).floor() as i32
}

pub fn status_label(available: i32, capacity_percentage: i32) -> StatusLabel {
    if available <= 0 {
        StatusLabel::SoldOut
    } else if capacity_percentage >= LIMITED_THRESHOLD_PERCENT {
        StatusLabel::LimitedAvailability
    } else {
        StatusLabel::Available
    }
}

/// Render-ready projection of a capacity snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityView {
    /// `None` when the package reports no capacity (`max == 0`).
    pub status: Option<StatusLabel>,
    pub label: String,
    pub capacity_percentage: i32,
    pub bar_width: String,
    pub available_text: String,
}

impl AvailabilityView {
    pub fn has_capacity_information(&self) -> bool {
        self.status.is_some()
    }
}

impl From<&PackageAvailability> for AvailabilityView {
    fn from(availability: &PackageAvailability) -> Self {
        let available_text = format!("{} seats available", availability.available);

        if availability.max <= 0 {
            return Self {
                status: None,
                label: NO_CAPACITY_INFORMATION.to_string(),
                capacity_percentage: 0,
                bar_width: "0%".to_string(),
                available_text,
            };
        }

        let percentage = capacity_percentage(availability);
        let status = status_label(availability.available, percentage);
        Self {
            status: Some(status),
            label: status.as_str().to_string(),
            capacity_percentage: percentage,
            bar_width: format!("{}%", percentage),
            available_text,
        }
    }
}
