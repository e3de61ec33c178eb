use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

/// Request body for `POST /upload/prepare`.
#[derive(Debug, Clone, Serialize)]
pub struct PrepareUploadRequest {
    pub user_id: u32,
    pub lat: f64,
    pub lon: f64,
    pub geohash_level: u8,
}

/// Placement decision returned by the coordination API: where the payload must be PUT.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlacementReservation {
    pub bucket: String,
    pub object_key: String,
}

/// Guarded decode of a prepare-upload response body.
///
/// A malformed payload is a recoverable failure of the reservation step, reported to the
/// caller as an error value. Both fields must be present, strings, and non-empty before the
/// reservation may be used to construct a storage destination.
pub fn parse_reservation(body: &[u8]) -> anyhow::Result<PlacementReservation> {
    let reservation: PlacementReservation =
        serde_json::from_slice(body).context("Reservation response has an unexpected shape")?;

    if reservation.bucket.is_empty() {
        bail!("Reservation bucket name is empty");
    }
    if reservation.object_key.is_empty() {
        bail!("Reservation object key is empty");
    }

    Ok(reservation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn accepts_a_well_formed_reservation() {
        let reservation =
            parse_reservation(br#"{"bucket":"b1","object_key":"u/1700000000-1-0.ply"}"#).unwrap();

        assert_eq!(
            PlacementReservation {
                bucket: "b1".to_string(),
                object_key: "u/1700000000-1-0.ply".to_string(),
            },
            reservation
        );
    }

    #[test]
    fn rejects_a_missing_object_key() {
        assert!(parse_reservation(br#"{"bucket":"b1"}"#).is_err());
    }

    #[test]
    fn rejects_a_non_string_bucket() {
        assert!(parse_reservation(br#"{"bucket":7,"object_key":"k"}"#).is_err());
    }

    #[test]
    fn rejects_empty_fields() {
        assert!(parse_reservation(br#"{"bucket":"","object_key":"k"}"#).is_err());
        assert!(parse_reservation(br#"{"bucket":"b","object_key":""}"#).is_err());
    }

    #[test]
    fn rejects_a_body_that_is_not_json() {
        assert!(parse_reservation(b"<html>502 Bad Gateway</html>").is_err());
    }

    #[test]
    fn serialises_the_prepare_request() {
        let request = PrepareUploadRequest {
            user_id: 2,
            lat: 34.70011159734301,
            lon: 137.73557007483018,
            geohash_level: 8,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(2, value["user_id"]);
        assert_eq!(8, value["geohash_level"]);
    }
}
