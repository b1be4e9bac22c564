use core::sync::atomic::Ordering;

use grape::concurrency::atomic::{AtomicBitset, WORD_BITS};

#[test]
fn atomic_bitset_basic() {
    let b = AtomicBitset::new(130);
    assert_eq!(b.len_bits(), 130);

    assert!(!b.is_set(0));
    assert!(b.test_and_set(0, Ordering::Relaxed));
    assert!(b.is_set(0));
    assert!(!b.test_and_set(0, Ordering::Relaxed));

    assert!(b.test_and_set(129, Ordering::Relaxed));
    assert!(b.is_set(129));
    assert_eq!(b.count_ones(), 2);

    b.clear_all();
    assert!(!b.is_set(0));
    assert!(!b.is_set(129));
    assert!(b.is_empty());
}

#[test]
fn iteration_crosses_word_boundaries() {
    let b = AtomicBitset::new(3 * WORD_BITS);
    let marked = [0, WORD_BITS - 1, WORD_BITS, 2 * WORD_BITS + 5];
    for &bit in &marked {
        b.test_and_set(bit, Ordering::Relaxed);
    }
    assert_eq!(b.iter_ones().collect::<Vec<_>>(), marked);
    assert_eq!(
        b.iter_ones_in(1..2 * WORD_BITS).collect::<Vec<_>>(),
        vec![WORD_BITS - 1, WORD_BITS]
    );
    assert!(b.any_in_range(2 * WORD_BITS..3 * WORD_BITS));
    assert!(!b.any_in_range(1..WORD_BITS - 1));
}

#[test]
fn concurrent_sets_all_land() {
    let b = AtomicBitset::new(4096);
    std::thread::scope(|s| {
        for t in 0..4 {
            let b = &b;
            s.spawn(move || {
                for bit in (t..4096).step_by(4) {
                    b.test_and_set(bit, Ordering::Relaxed);
                }
            });
        }
    });
    assert_eq!(b.count_ones(), 4096);
}
