//! The clone engine: deep-copies a subtree while remapping internal
//! [`crate::node::AddressRef`]s so that addresses which pointed inside the
//! cloned region now point into the copy.

use crate::error::{Diagnostics, Error, Result};
use crate::node::Node;
use crate::slot::{new_slot, Slot};
use crate::wrapper::Wrapper;
use std::rc::Rc;

/// State threaded through a single `clone` operation: the ancestor mapping
/// (old `Wrapper` slot identity -> freshly-built new slot), the current path
/// (for error attribution), an error sink, and the strict/lenient policy.
pub struct CloneContext {
    ancestors: Vec<(usize, Slot)>,
    pub current_path: String,
    pub errors: Diagnostics,
    pub strict: bool,
}

impl CloneContext {
    pub fn strict() -> Self {
        CloneContext {
            ancestors: Vec::new(),
            current_path: String::new(),
            errors: Diagnostics::new(),
            strict: true,
        }
    }

    pub fn lenient() -> Self {
        CloneContext {
            ancestors: Vec::new(),
            current_path: String::new(),
            errors: Diagnostics::new(),
            strict: false,
        }
    }

    /// If `old` is a wrapper currently being cloned (i.e. an ancestor of the
    /// node being visited), return the slot its copy is being built into;
    /// otherwise `old` is outside the cloned region and is kept as-is.
    pub fn remap_anchor(&self, old: &Slot) -> Slot {
        let id = Rc::as_ptr(old) as usize;
        for (old_id, new_slot) in &self.ancestors {
            if *old_id == id {
                return new_slot.clone();
            }
        }
        old.clone()
    }

    fn push_path(&mut self, segment: &str) -> String {
        let saved = self.current_path.clone();
        if !segment.is_empty() {
            if self.current_path.is_empty() {
                self.current_path = segment.to_string();
            } else {
                self.current_path = format!("{}.{}", self.current_path, segment);
            }
        }
        saved
    }

    fn pop_path(&mut self, saved: String) {
        self.current_path = saved;
    }

    /// Strict: propagate the error. Lenient: record `(current_path, error)`
    /// and let the caller substitute a placeholder / skip the entry.
    fn report(&mut self, err: Error) -> Result<()> {
        if self.strict {
            Err(err)
        } else {
            self.errors.push(self.current_path.clone(), err);
            Ok(())
        }
    }
}

/// Deep-clone the node held in `old`, producing a brand new slot.
///
/// `Wrapper` slots get special treatment: a placeholder slot is allocated
/// and registered in `ctx` *before* descendants are cloned, so that any
/// `AddressRef` inside the subtree whose anchor is this wrapper gets
/// re-bound to the new copy instead of the original.
pub fn clone_slot(old: &Slot, ctx: &mut CloneContext) -> Result<Slot> {
    let is_wrapper = matches!(&*old.borrow(), Node::Wrapper(_));
    if !is_wrapper {
        let cloned = old.borrow().clone_node(ctx)?;
        return Ok(new_slot(cloned));
    }

    let new = new_slot(Node::Wrapper(Wrapper::new()));
    let old_id = Rc::as_ptr(old) as usize;
    ctx.ancestors.push((old_id, new.clone()));

    let built = clone_wrapper_contents(old, ctx);

    ctx.ancestors.pop();
    let built = built?;
    *new.borrow_mut() = Node::Wrapper(built);
    Ok(new)
}

fn clone_wrapper_contents(old: &Slot, ctx: &mut CloneContext) -> Result<Wrapper> {
    let mut built = Wrapper::new();
    let (value, children) = {
        let borrowed = old.borrow();
        let w = match &*borrowed {
            Node::Wrapper(w) => w,
            _ => unreachable!("clone_wrapper_contents called on a non-wrapper slot"),
        };
        (w.value_ref().map(|v| v.clone_node(ctx)), w.children_snapshot())
    };
    if let Some(cloned_value) = value {
        match cloned_value {
            Ok(node) => built.value = Some(Box::new(node)),
            Err(e) => ctx.report(e)?,
        }
    }
    for (name, child_slot) in children {
        let saved = ctx.push_path(&name);
        let result = clone_slot(&child_slot, ctx);
        ctx.pop_path(saved);
        match result {
            Ok(cloned_slot) => built.insert_child(name, cloned_slot),
            Err(e) => ctx.report(e)?,
        }
    }
    Ok(built)
}

/// Clone `old` (which must be a `Wrapper`) and merge the copy's children
/// into `target`, per the `clone`/merge operator's rules (spec §4.6):
/// existing keys in `target` are preserved, new keys are added, and a
/// non-wrapper conflict is a `MergeConflict`. `target`'s own value is also
/// absorbed from the clone if `target` doesn't already have one, so that
/// cloning a single wrapper with both a value and children (spec §8
/// scenario 5's `clone_source`) carries both across.
pub fn clone_and_merge_into(old: &Slot, target: &mut Wrapper, ctx: &mut CloneContext) -> Result<()> {
    let cloned = clone_slot(old, ctx)?;
    let borrowed = cloned.borrow();
    let w = match &*borrowed {
        Node::Wrapper(w) => w,
        _ => return Err(Error::MergeConflict("clone source is not a wrapper".to_string())),
    };
    if target.value_ref().is_none() {
        if let Some(v) = w.value_ref() {
            target.value = Some(Box::new(v.clone_node(ctx)?));
        }
    }
    for (name, slot) in w.children_snapshot() {
        target.insert_child_if_absent(name, slot)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::literal::Literal;
    use crate::node::reference::AddressRef;
    use crate::slot;

    #[test]
    fn clone_preserves_plain_value() {
        let mut root = Wrapper::new();
        root.add("src.a", Node::Literal(Literal::string("hi"))).unwrap();
        let src_slot = root.get_child_ptr("src").unwrap();
        let mut ctx = CloneContext::strict();
        let cloned = clone_slot(&src_slot, &mut ctx).unwrap();
        let a = {
            let b = cloned.borrow();
            if let Node::Wrapper(w) = &*b {
                w.get_child_ptr("a").unwrap()
            } else {
                panic!("expected wrapper")
            }
        };
        assert_eq!(slot::eval_get(&a).unwrap(), "hi");
    }

    #[test]
    fn clone_remaps_internal_address_ref() {
        let mut root = Wrapper::new();
        root.add("src.a", Node::Literal(Literal::settable_string("hi"))).unwrap();
        let src_slot = root.get_child_ptr("src").unwrap();
        root.add(
            "src.b",
            Node::AddressRef(AddressRef::new(src_slot.clone(), "a".to_string(), None)),
        )
        .unwrap();
        let src_slot = root.get_child_ptr("src").unwrap();

        let mut ctx = CloneContext::strict();
        let cloned = clone_slot(&src_slot, &mut ctx).unwrap();
        // Mutate the clone's `a`; the clone's `b` (an AddressRef rebound to
        // the clone) should see the new value, not the original's.
        {
            let b = cloned.borrow();
            if let Node::Wrapper(w) = &*b {
                let a_slot = w.get_child_ptr("a").unwrap();
                assert!(a_slot.borrow_mut().set("changed"));
            }
        }
        let b_slot = {
            let b = cloned.borrow();
            if let Node::Wrapper(w) = &*b {
                w.get_child_ptr("b").unwrap()
            } else {
                panic!()
            }
        };
        assert_eq!(slot::eval_get(&b_slot).unwrap(), "changed");
        // The original is untouched.
        let orig_a = root.get_child_ptr("src.a").unwrap();
        assert_eq!(slot::eval_get(&orig_a).unwrap(), "hi");
    }
}
