use covalent_types::HybridTimestamp;
use proptest::prelude::*;

#[test]
fn tick_is_strictly_increasing() {
    let mut ts = HybridTimestamp::now();
    for _ in 0..1000 {
        let next = ts.tick();
        assert!(next > ts);
        ts = next;
    }
}

#[test]
fn tick_from_future_bumps_logical() {
    let future = HybridTimestamp::new(u64::MAX / 2, 3);
    let next = future.tick();
    assert_eq!(next.wall_time(), future.wall_time());
    assert_eq!(next.logical(), 4);
}

#[test]
fn zero_is_older_than_now() {
    assert!(HybridTimestamp::zero() < HybridTimestamp::now());
}

#[test]
fn ordering_uses_logical_on_equal_wall_time() {
    let a = HybridTimestamp::new(100, 1);
    let b = HybridTimestamp::new(100, 2);
    assert!(a < b);
    assert!(HybridTimestamp::new(101, 0) > b);
}

#[test]
fn receive_exceeds_both_inputs() {
    let local = HybridTimestamp::new(u64::MAX / 2, 5);
    let remote = HybridTimestamp::new(u64::MAX / 2, 9);
    let merged = local.receive(&remote);
    assert!(merged > local);
    assert!(merged > remote);
    assert_eq!(merged.logical(), 10);
}

proptest! {
    #[test]
    fn receive_is_monotonic(
        w1 in 1u64..1_000_000,
        l1 in 0u32..1000,
        w2 in 1u64..1_000_000,
        l2 in 0u32..1000,
    ) {
        let a = HybridTimestamp::new(w1, l1);
        let b = HybridTimestamp::new(w2, l2);
        let r = a.receive(&b);
        prop_assert!(r > a);
        prop_assert!(r > b);
    }
}
