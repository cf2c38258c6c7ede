//! Content fingerprints and duplicate removal for journeys.
//!
//! Different feeds describe the same physical trip with different
//! identifiers and bookkeeping. Two journeys are the same trip when their
//! functionally significant fields agree; the fingerprint is a SHA-256
//! digest over exactly those fields, in a fixed order.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use sha2::{Digest, Sha256};

use super::{AvailabilityRule, Journey};

/// Separates fields so that adjacent values can never run together.
const FIELD_SEPARATOR: [u8; 1] = [0x1f];

/// Digest over a journey's functionally significant fields.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Compute the fingerprint of `journey`.
    ///
    /// With `include_availability` set, the availability rules (match,
    /// secondary, exclude, condition) take part, so trips with the same
    /// calling pattern on different days stay distinct.
    pub fn of(journey: &Journey, include_availability: bool) -> Self {
        let mut hasher = FieldHasher::default();

        hasher.field(&journey.service_ref);
        hasher.field(&journey.destination_display);
        hasher.field(&journey.direction);
        hasher.time(Some(&journey.departure_time));

        if include_availability {
            for rule in journey.availability.rules() {
                hasher.rule(rule);
            }
        }

        for item in &journey.path {
            hasher.field(&item.origin_stop_ref);
            hasher.time(item.origin_arrival_time.as_ref());
            hasher.time(item.origin_departure_time.as_ref());
            hasher.field(&item.destination_stop_ref);
            hasher.time(item.destination_arrival_time.as_ref());
        }

        Fingerprint(hasher.finish())
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[derive(Default)]
struct FieldHasher(Sha256);

impl FieldHasher {
    fn field(&mut self, value: &str) {
        self.0.update(value.as_bytes());
        self.0.update(FIELD_SEPARATOR);
    }

    /// Times hash with their offset and full sub-second precision.
    fn time(&mut self, value: Option<&DateTime<FixedOffset>>) {
        match value {
            Some(t) => self.field(&t.to_rfc3339_opts(SecondsFormat::AutoSi, false)),
            None => self.field(""),
        }
    }

    fn rule(&mut self, rule: &AvailabilityRule) {
        self.field(&rule.kind);
        self.field(&rule.value);
        self.field(&rule.description);
    }

    fn finish(self) -> [u8; 32] {
        self.0.finalize().into()
    }
}

/// Drop journeys whose fingerprint has already been seen.
///
/// The first journey of each fingerprint is kept as-is, in input order;
/// later duplicates are discarded without merging any of their fields.
pub fn deduplicate(journeys: Vec<Journey>, include_availability: bool) -> Vec<Journey> {
    let mut seen = HashSet::new();
    journeys
        .into_iter()
        .filter(|journey| seen.insert(Fingerprint::of(journey, include_availability)))
        .collect()
}


#[cfg(test)]
mod proptests {
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    use super::*;
    use crate::domain::{AvailabilityRule, PathItem};

    fn base_time() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-03-15T06:00:00+00:00").unwrap()
    }

    prop_compose! {
        fn arb_journey()(
            service in "[A-Z0-9]{1,6}",
            destination in "[A-Za-z ]{0,12}",
            direction in prop::sample::select(vec!["inbound", "outbound", ""]),
            dep_offset in 0i64..1440,
            stops in prop::collection::vec("[A-Z]{1,3}", 2..6),
            rules in prop::collection::vec(("[A-Za-z]{1,8}", "[a-z0-9]{0,8}"), 0..4),
        ) -> Journey {
            let departure = base_time() + Duration::minutes(dep_offset);
            let mut journey = Journey::new("J", service, departure);
            journey.destination_display = destination;
            journey.direction = direction.to_string();
            journey.path = stops
                .windows(2)
                .enumerate()
                .map(|(i, pair)| PathItem {
                    origin_departure_time: Some(departure + Duration::minutes(i as i64 * 5)),
                    destination_arrival_time: Some(departure + Duration::minutes(i as i64 * 5 + 4)),
                    ..PathItem::between(pair[0].clone(), pair[1].clone())
                })
                .collect();
            journey.availability.condition = rules
                .into_iter()
                .map(|(kind, value)| AvailabilityRule::new(kind, value, ""))
                .collect();
            journey
        }
    }

    proptest! {
        /// Computing twice gives the same digest.
        #[test]
        fn deterministic(journey in arb_journey(), flag in any::<bool>()) {
            prop_assert_eq!(Fingerprint::of(&journey, flag), Fingerprint::of(&journey, flag));
        }

        /// Bookkeeping fields never participate.
        #[test]
        fn ignores_bookkeeping(journey in arb_journey(), flag in any::<bool>(), secs in 0i64..1_000_000) {
            let mut changed = journey.clone();
            changed.primary_identifier = "other".into();
            changed.creation_time = Utc.timestamp_opt(secs, 0).single();
            changed.modification_time = Utc.timestamp_opt(secs * 2, 0).single();
            changed.other_identifiers.push("alt-id".into());
            prop_assert_eq!(Fingerprint::of(&journey, flag), Fingerprint::of(&changed, flag));
        }

        /// Moving the departure always changes the digest.
        #[test]
        fn departure_is_significant(journey in arb_journey(), shift in 1i64..600, flag in any::<bool>()) {
            let mut changed = journey.clone();
            changed.departure_time += Duration::seconds(shift);
            prop_assert_ne!(Fingerprint::of(&journey, flag), Fingerprint::of(&changed, flag));
        }

        /// Any path stop or time change alters the digest.
        #[test]
        fn path_is_significant(journey in arb_journey(), flag in any::<bool>(), pick in any::<prop::sample::Index>()) {
            let idx = pick.index(journey.path.len());
            let mut stop_changed = journey.clone();
            stop_changed.path[idx].destination_stop_ref.push('X');
            prop_assert_ne!(Fingerprint::of(&journey, flag), Fingerprint::of(&stop_changed, flag));

            let mut time_changed = journey.clone();
            time_changed.path[idx].origin_arrival_time = Some(base_time());
            prop_assert_ne!(Fingerprint::of(&journey, flag), Fingerprint::of(&time_changed, flag));
        }

        /// Availability rules count only when the flag is set.
        #[test]
        fn availability_gated_by_flag(journey in arb_journey()) {
            let mut changed = journey.clone();
            changed.availability.exclude.push(AvailabilityRule::new("Holiday", "BoxingDay", ""));
            prop_assert_ne!(Fingerprint::of(&journey, true), Fingerprint::of(&changed, true));
            prop_assert_eq!(Fingerprint::of(&journey, false), Fingerprint::of(&changed, false));
        }
    }
}
