use chrono::{DateTime, TimeZone, Utc};
use lodge_shared::ReservationRecord;
use tracing::warn;

use crate::repository::ReservationCache;
use crate::CoreResult;

pub const RESERVATION_DATA_KEY: &str = "reservation_data";
pub const RESERVATION_EXPIRY_KEY: &str = "reservation_expiry";

/// Writes both cache entries. A newer reservation simply overwrites the old one.
pub async fn store_reservation(
    cache: &dyn ReservationCache,
    record: &ReservationRecord,
) -> CoreResult<()> {
    let data = serde_json::to_string(record)?;
    cache.set(RESERVATION_DATA_KEY, &data).await?;
    cache
        .set(RESERVATION_EXPIRY_KEY, &record.expires_at.timestamp_millis().to_string())
        .await
}

/// Reads the cached reservation. When `reservation_expiry` holds a valid
/// epoch-millis value it takes precedence over the record's own `expiresAt`.
pub async fn load_reservation(
    cache: &dyn ReservationCache,
) -> CoreResult<Option<ReservationRecord>> {
    let data = match cache.get(RESERVATION_DATA_KEY).await? {
        Some(data) => data,
        None => return Ok(None),
    };
    let mut record: ReservationRecord = serde_json::from_str(&data)?;

    if let Some(raw) = cache.get(RESERVATION_EXPIRY_KEY).await? {
        match parse_expiry(&raw) {
            Some(expires_at) => record.expires_at = expires_at,
            None => warn!("Ignoring malformed {} value: {}", RESERVATION_EXPIRY_KEY, raw),
        }
    }

    Ok(Some(record))
}

pub async fn clear_reservation(cache: &dyn ReservationCache) -> CoreResult<()> {
    cache.remove(RESERVATION_DATA_KEY).await?;
    cache.remove(RESERVATION_EXPIRY_KEY).await
}

fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let millis: i64 = raw.trim().parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}
