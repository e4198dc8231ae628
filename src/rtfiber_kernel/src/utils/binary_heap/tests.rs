use super::*;
use quickcheck_macros::quickcheck;

/// For any sequence of pushes, popping drains the heap in the comparator's
/// ascending order, the same property the teacher's own `sort` quickcheck
/// test checks against `Vec::sort_by_key`.
#[quickcheck]
fn heap_drains_in_sorted_order(values: Vec<i32>) -> bool {
    let mut heap: Vec<i32> = Vec::DEFAULT;
    for x in &values {
        heap.heap_push(*x, ());
    }
    let mut popped = Vec::new();
    while let Some(x) = heap.heap_pop(()) {
        popped.push(x);
    }
    let mut expected = values;
    expected.sort_unstable();
    popped == expected
}

#[test]
fn pops_in_ascending_order() {
    let mut heap: Vec<i32> = Vec::DEFAULT;
    for x in [5, 1, 4, 2, 8, 0, 9, 3] {
        heap.heap_push(x, ());
    }
    let mut popped = Vec::new();
    while let Some(x) = heap.heap_pop(()) {
        popped.push(x);
    }
    assert_eq!(popped, vec![0, 1, 2, 3, 4, 5, 8, 9]);
}

#[test]
fn remove_restores_heap_property() {
    let mut heap: Vec<i32> = Vec::DEFAULT;
    for x in [5, 1, 4, 2, 8, 0, 9, 3] {
        heap.heap_push(x, ());
    }
    // remove some element from the middle, then drain and check sortedness
    let removed = heap.heap_remove(2, ());
    assert!(removed.is_some());
    let mut popped = Vec::new();
    while let Some(x) = heap.heap_pop(()) {
        popped.push(x);
    }
    let mut expected: Vec<i32> = vec![5, 1, 4, 2, 8, 0, 9, 3];
    expected.remove(expected.iter().position(|&v| Some(v) == removed).unwrap());
    expected.sort_unstable();
    assert_eq!(popped, expected);
}

struct Reverse;
impl BinaryHeapCtx<i32> for Reverse {
    fn lt(&mut self, x: &i32, y: &i32) -> bool {
        x > y
    }
}

#[test]
fn contextful_comparator_inverts_order() {
    let mut heap: Vec<i32> = Vec::DEFAULT;
    for x in [5, 1, 4, 2, 8] {
        heap.heap_push(x, Reverse);
    }
    let mut popped = Vec::new();
    while let Some(x) = heap.heap_pop(Reverse) {
        popped.push(x);
    }
    assert_eq!(popped, vec![8, 5, 4, 2, 1]);
}
