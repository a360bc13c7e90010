//! Property-based tests for bridge invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Uniqueness: request ids never collide, even in the same instant
//! - At-most-once: after one accepted result every submission fails
//! - Replay: a signed message is accepted once
//! - Batch skip: exactly one forward per non-zero address

use chrono::{TimeZone, Utc};
use oracle_bridge::{
    clock::ManualClock, Address, Bridge, ChannelSink, ComplianceStatus, Error, ForwardCommand,
    KeyPair, TransferId,
};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

/// Strategy for generating identities (zero included)
fn address_strategy() -> impl Strategy<Value = Address> {
    prop_oneof![
        1 => Just(Address::ZERO),
        4 => any::<[u8; 32]>().prop_map(Address::from_bytes),
    ]
}

/// Strategy for generating non-zero identities
fn subject_strategy() -> impl Strategy<Value = Address> {
    any::<[u8; 32]>()
        .prop_filter("non-zero", |b| b.iter().any(|x| *x != 0))
        .prop_map(Address::from_bytes)
}

/// Strategy for generating statuses
fn status_strategy() -> impl Strategy<Value = ComplianceStatus> {
    prop_oneof![
        Just(ComplianceStatus::Pending),
        Just(ComplianceStatus::Approved),
        Just(ComplianceStatus::Rejected),
    ]
}

/// Strategy for generating risk labels
fn risk_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("low".to_string()),
        Just("medium".to_string()),
        Just("high".to_string()),
        "[a-z]{0,12}",
    ]
}

/// Bridge with a frozen clock, so every request lands in the same instant
fn frozen_bridge(owner: &KeyPair) -> (Bridge, tokio::sync::mpsc::Receiver<ForwardCommand>) {
    let (sink, rx) = ChannelSink::channel(4096);
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
    ));
    let bridge = Bridge::new(owner.address(), Arc::new(sink))
        .unwrap()
        .with_clock(clock);
    (bridge, rx)
}

proptest! {
    #[test]
    fn prop_request_ids_unique(
        calls in prop::collection::vec((subject_strategy(), 0u64..4), 1..64)
    ) {
        let owner = KeyPair::from_seed(&[1u8; 32]);
        let (mut bridge, _rx) = frozen_bridge(&owner);
        let caller = Address::from_bytes([0xaa; 32]);

        let mut seen = HashSet::new();
        for (subject, transfer) in &calls {
            let id = bridge
                .request_screening(&caller, *subject, TransferId(*transfer))
                .unwrap();
            prop_assert!(!id.is_zero());
            prop_assert!(seen.insert(id), "duplicate request id {}", id);
        }
    }

    #[test]
    fn prop_repeated_identical_requests_unique(n in 2usize..32) {
        let owner = KeyPair::from_seed(&[1u8; 32]);
        let (mut bridge, _rx) = frozen_bridge(&owner);
        let caller = Address::from_bytes([0xaa; 32]);
        let subject = Address::from_bytes([0x42; 32]);

        let ids: HashSet<_> = (0..n)
            .map(|_| bridge.request_screening(&caller, subject, TransferId(42)).unwrap())
            .collect();
        prop_assert_eq!(ids.len(), n);
    }

    #[test]
    fn prop_completion_at_most_once(
        first in status_strategy(),
        first_risk in risk_strategy(),
        followups in prop::collection::vec((status_strategy(), risk_strategy(), any::<bool>()), 1..8)
    ) {
        let owner = KeyPair::from_seed(&[1u8; 32]);
        let operator = KeyPair::from_seed(&[2u8; 32]);
        let (mut bridge, mut rx) = frozen_bridge(&owner);
        bridge.authorize_oracle(&owner.address(), operator.address()).unwrap();

        let subject = Address::from_bytes([0x42; 32]);
        let id = bridge
            .request_screening(&owner.address(), subject, TransferId(1))
            .unwrap();

        let sig = operator.sign_result(&id, &subject, first, &first_risk);
        prop_assert!(bridge.submit_screening_result(id, first, &first_risk, &sig).is_ok());

        for (status, risk, direct) in followups {
            let result = if direct {
                bridge.submit_screening_result_direct(&operator.address(), id, status, &risk)
            } else {
                let sig = owner.sign_result(&id, &subject, status, &risk);
                bridge.submit_screening_result(id, status, &risk, &sig)
            };
            prop_assert!(
                matches!(result, Err(Error::ScreeningAlreadyCompleted(_))),
                "unexpected {:?}",
                result
            );
        }

        prop_assert!(bridge.is_screening_complete(&id));
        let outcome = bridge.get_screening_request(&id).outcome.unwrap();
        prop_assert_eq!(outcome.status, first);
        prop_assert_eq!(outcome.risk_level, first_risk);

        let mut forwards = 0;
        while rx.try_recv().is_ok() {
            forwards += 1;
        }
        prop_assert_eq!(forwards, 1);
    }

    #[test]
    fn prop_replay_rejected(status in status_strategy(), risk in risk_strategy()) {
        let owner = KeyPair::from_seed(&[1u8; 32]);
        let (mut bridge, _rx) = frozen_bridge(&owner);
        let subject = Address::from_bytes([0x42; 32]);
        let id = bridge
            .request_screening(&owner.address(), subject, TransferId(1))
            .unwrap();

        let sig = owner.sign_result(&id, &subject, status, &risk);
        prop_assert!(bridge.submit_screening_result(id, status, &risk, &sig).is_ok());
        prop_assert!(matches!(
            bridge.submit_screening_result(id, status, &risk, &sig),
            Err(Error::SignatureAlreadyUsed)
        ));
        prop_assert_eq!(bridge.consumed_signatures(), 1);
    }

    #[test]
    fn prop_batch_forwards_non_zero(addresses in prop::collection::vec(address_strategy(), 0..40)) {
        let owner = KeyPair::from_seed(&[1u8; 32]);
        let (mut bridge, mut rx) = frozen_bridge(&owner);

        let receipt = bridge
            .batch_compliance_update(&owner.address(), &addresses, ComplianceStatus::Approved, "low")
            .unwrap();

        let non_zero = addresses.iter().filter(|a| !a.is_zero()).count();
        prop_assert_eq!(receipt.forwarded, non_zero);
        prop_assert_eq!(receipt.skipped, addresses.len() - non_zero);

        let mut forwarded = Vec::new();
        while let Ok(command) = rx.try_recv() {
            forwarded.push(command);
        }
        prop_assert_eq!(forwarded.len(), non_zero);
        let all_non_zero_updates = forwarded.iter().all(|c| matches!(
            c,
            ForwardCommand::UpdateStatus { address, .. } if !address.is_zero()
        ));
        prop_assert!(all_non_zero_updates);
    }
}
