use std::collections::HashSet;

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

use super::*;
use crate::types::{Address, DisplaySkin, WalletFamily, WalletId};

fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(32);
    ProptestConfig { cases, ..ProptestConfig::default() }
}

/// Small pool so that sequences keep hitting the same wallets.
const ADDRESSES: usize = 5;

#[derive(Clone, Debug)]
enum Op {
    Pair { family: WalletFamily, address: usize, secs: i64 },
    Unpair(usize),
    Touch { address: usize, secs: i64 },
    Sweep(Vec<bool>),
    Remove(usize),
    Switch(usize),
    SetDefault(usize),
    Skin(usize, DisplaySkin),
    Pending { ticket: u64, family: WalletFamily },
}

fn arb_family() -> impl Strategy<Value = WalletFamily> { prop::sample::select(WalletFamily::ALL.to_vec()) }

fn arb_skin() -> impl Strategy<Value = DisplaySkin> { prop::sample::select(DisplaySkin::ALL.to_vec()) }

fn arb_op() -> impl Strategy<Value = Op> {
    let address = 0..ADDRESSES;
    prop_oneof![
        3 => (arb_family(), address.clone(), 0i64..4)
            .prop_map(|(family, address, secs)| Op::Pair { family, address, secs }),
        2 => address.clone().prop_map(Op::Unpair),
        1 => (address.clone(), 0i64..4).prop_map(|(address, secs)| Op::Touch { address, secs }),
        1 => prop::collection::vec(any::<bool>(), ADDRESSES).prop_map(Op::Sweep),
        2 => address.clone().prop_map(Op::Remove),
        1 => address.clone().prop_map(Op::Switch),
        1 => address.clone().prop_map(Op::SetDefault),
        1 => (address.clone(), arb_skin()).prop_map(|(address, skin)| Op::Skin(address, skin)),
        1 => (1u64..4, arb_family()).prop_map(|(ticket, family)| Op::Pending { ticket, family }),
    ]
}

fn address(n: usize) -> Address { Address::from(format!("0.0.{}", 100 + n).as_str()) }

fn at(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap() }

/// ID of the record holding `n`, or one no record has.
fn wallet_id(state: &SessionState, n: usize) -> WalletId {
    state
        .wallet_by_address(&address(n))
        .map(|r| r.id().clone())
        .unwrap_or_else(|| WalletId::derive(WalletFamily::HashPack, &address(n)))
}

fn defaults(state: &SessionState) -> usize { state.wallets().iter().filter(|r| r.is_default()).count() }

fn apply(state: &mut SessionState, op: &Op) {
    let prefs = PairingPrefs { skin: None, remote: None, default_skin: DisplaySkin::Classic };
    match op {
        Op::Pair { family, address: n, secs } => {
            state.apply_paired(*family, &address(*n), prefs, at(*secs));
        },
        Op::Unpair(n) => {
            state.apply_unpaired(&address(*n));
        },
        Op::Touch { address: n, secs } => {
            state.touch(&address(*n), at(*secs));
        },
        Op::Sweep(mask) => {
            let live: HashSet<_> =
                mask.iter().enumerate().filter(|(_, live)| **live).map(|(n, _)| address(n)).collect();
            state.sweep_inactive(&live);
        },
        Op::Remove(n) => {
            let id = wallet_id(state, *n);
            let _ = state.remove(&id);
        },
        Op::Switch(n) => {
            let id = wallet_id(state, *n);
            let _ = state.switch_active(&id);
        },
        Op::SetDefault(n) => {
            let id = wallet_id(state, *n);
            let _ = state.set_default(&id);
        },
        Op::Skin(n, skin) => {
            let id = wallet_id(state, *n);
            let _ = state.update_skin(&id, *skin);
        },
        Op::Pending { ticket, family } => {
            state.begin_pending(PendingWallet::new(PendingTicket(*ticket), *family, None, None, at(0)));
        },
    }
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn random_transitions_keep_session_consistent(ops in prop::collection::vec(arb_op(), 1..40)) {
        let mut state = SessionState::new();
        for op in &ops {
            let was_empty = state.is_empty();
            let had_default = defaults(&state) > 0;

            apply(&mut state, op);

            prop_assert!(state.is_consistent(), "inconsistent after {:?}: {:?}", op, state);
            prop_assert!(defaults(&state) <= 1);
            prop_assert_eq!(state.active_wallet_id().is_none(), state.is_empty());
            // A default only appears on the first pairing or when asked for
            if !had_default && defaults(&state) == 1 {
                prop_assert!(matches!(op, Op::SetDefault(_)) || (was_empty && matches!(op, Op::Pair { .. })), "unexpected default after {:?}", op);
            }
        }
    }

    #[test]
    fn repeated_pairing_of_live_wallet_changes_nothing(
        ops in prop::collection::vec(arb_op(), 0..30),
        family in arb_family(),
        n in 0..ADDRESSES,
        secs in 0i64..4,
    ) {
        let mut state = SessionState::new();
        for op in &ops {
            apply(&mut state, op);
        }
        let prefs = PairingPrefs { skin: None, remote: None, default_skin: DisplaySkin::Classic };
        let (id, _) = state.apply_paired(family, &address(n), prefs, at(secs));
        let before = state.clone();

        let (again, effects) = state.apply_paired(family, &address(n), prefs, at(secs + 1));

        prop_assert_eq!(again, id);
        prop_assert!(!effects.changed());
        prop_assert_eq!(state, before);
    }

    #[test]
    fn consistent_session_survives_reload(ops in prop::collection::vec(arb_op(), 0..40)) {
        let mut state = SessionState::new();
        for op in &ops {
            apply(&mut state, op);
        }

        let reloaded = SessionState::from_persisted(state.persisted());

        prop_assert_eq!(reloaded.persisted(), state.persisted());
    }
}
