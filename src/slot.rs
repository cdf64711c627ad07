//! The addressable, shared cell that holds a node.
//!
//! A [`Slot`] is the "shared pointer to an owning pointer" double indirection
//! called for in the spec's design notes: multiple [`crate::node::Node::AddressRef`]
//! values can hold the same `Slot` and keep working after the node inside it
//! is replaced by [`crate::node::Node::optimize`].
//!
//! Cycle detection lives here rather than inside `AddressRef` itself, because
//! every entry point into evaluating a slot's node -- whether the top-level
//! caller or a chain of address references -- has to go through the same
//! guard. Checking the thread-local visiting set *before* borrowing the
//! slot's `RefCell` is what turns a self-reference into a clean `Cycle` error
//! instead of a `RefCell` double-borrow panic.

use crate::error::{Error, Result};
use crate::node::Node;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// A shared, mutable handle to a node.
pub type Slot = Rc<RefCell<Node>>;

pub fn new_slot(node: Node) -> Slot {
    Rc::new(RefCell::new(node))
}

fn slot_id(slot: &Slot) -> usize {
    Rc::as_ptr(slot) as usize
}

thread_local! {
    static VISITING: RefCell<HashSet<usize>> = RefCell::new(HashSet::new());
}

struct VisitGuard(usize);

impl Drop for VisitGuard {
    fn drop(&mut self) {
        VISITING.with(|v| {
            v.borrow_mut().remove(&self.0);
        });
    }
}

fn enter(slot: &Slot) -> Result<VisitGuard> {
    let id = slot_id(slot);
    let inserted = VISITING.with(|v| v.borrow_mut().insert(id));
    if !inserted {
        return Err(Error::Cycle(
            "evaluation re-entered a slot that is already being evaluated".to_string(),
        ));
    }
    Ok(VisitGuard(id))
}

/// Runs `f` over the node at `slot`, without holding `slot`'s `RefCell`
/// borrowed for the duration of `f`.
///
/// A `rel`/`child`/leading-dot `AddressRef` anchors on `slot` itself (its own
/// wrapper, per `ParseContext::current`), and its node lives *inside* that
/// same slot as the wrapper's `value`. If we evaluated with the slot still
/// mutably borrowed, `AddressRef::resolve`'s `self.anchor.borrow()` would
/// re-borrow the same `RefCell` and panic. So for a `Wrapper`, the `value` is
/// taken out and the slot is left holding just its `children` (which is all
/// such a reference needs to navigate) while `f` runs, then the
/// (possibly now cache-updated) value is put back.
fn with_node<T>(slot: &Slot, f: impl FnOnce(&mut Node) -> Result<T>) -> Result<T> {
    let taken = {
        let mut borrowed = slot.borrow_mut();
        match &mut *borrowed {
            Node::Wrapper(w) => w.value.take(),
            _ => None,
        }
    };
    match taken {
        Some(mut value) => {
            let result = f(&mut value);
            if let Node::Wrapper(w) = &mut *slot.borrow_mut() {
                w.value = Some(value);
            }
            result
        }
        None => f(&mut slot.borrow_mut()),
    }
}

/// Evaluate `slot`'s node, guarding against reentrant evaluation of the same
/// slot anywhere in the current call chain.
pub fn eval_get(slot: &Slot) -> Result<String> {
    let _guard = enter(slot)?;
    with_node(slot, Node::get)
}

/// Same guard, for the integer-typed accessor.
pub fn eval_get_int(slot: &Slot) -> Result<i64> {
    let _guard = enter(slot)?;
    with_node(slot, Node::get_int)
}

/// Same guard, for the float-typed accessor.
pub fn eval_get_float(slot: &Slot) -> Result<f64> {
    let _guard = enter(slot)?;
    with_node(slot, Node::get_float)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Literal;

    #[test]
    fn eval_get_reads_through_slot() {
        let slot = new_slot(Node::Literal(Literal::string("hi")));
        assert_eq!(eval_get(&slot).unwrap(), "hi");
    }

    #[test]
    fn reentrant_eval_is_a_cycle_not_a_panic() {
        // A slot that, while being evaluated, tries to evaluate itself again
        // must fail cleanly rather than double-borrow its own RefCell.
        let slot = new_slot(Node::Literal(Literal::string("x")));
        let _g1 = enter(&slot).unwrap();
        let err = eval_get(&slot).unwrap_err();
        assert!(matches!(err, Error::Cycle(_)));
    }
}
