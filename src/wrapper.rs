//! The key tree: a mapping from path segments to child [`Slot`]s, and the
//! container type documents are built out of.

use crate::error::{Error, Result};
use crate::node::Node;
use crate::slot::{self, new_slot, Slot};
use crate::tstring::TString;

const INVALID_PATH_CHARS: &[char] = &[' ', '#', '$', '"', '\'', '(', ')', '{', '}', '[', ']'];

pub(crate) fn check_path(path: &str) -> Result<()> {
    if let Some(c) = path.chars().find(|c| INVALID_PATH_CHARS.contains(c)) {
        return Err(Error::ParseError(format!(
            "invalid character '{c}' in path '{path}'"
        )));
    }
    Ok(())
}

/// An insertion-ordered `String -> Slot` map: plain `Vec` + index, since the
/// tree's fan-out is small and round-tripping a document depends on
/// preserving declaration order (see spec invariant 1 / testable property 2,
/// "Insertion order vs sorted order").
#[derive(Debug, Default, Clone)]
pub struct OrderedMap {
    order: Vec<String>,
    entries: std::collections::HashMap<String, Slot>,
}

impl OrderedMap {
    fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: &str) -> Option<&Slot> {
        self.entries.get(key)
    }

    fn insert(&mut self, key: String, slot: Slot) {
        if !self.entries.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.entries.insert(key, slot);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Slot)> {
        self.order
            .iter()
            .map(move |k| (k.as_str(), self.entries.get(k).unwrap()))
    }
}

/// A subtree container: direct children by path segment, plus an optional
/// value node of its own (a `Wrapper`'s `get` delegates to that value).
#[derive(Debug, Default, Clone)]
pub struct Wrapper {
    children: OrderedMap,
    pub value: Option<Box<Node>>,
}

impl Wrapper {
    pub fn new() -> Self {
        Wrapper {
            children: OrderedMap::new(),
            value: None,
        }
    }

    pub fn get(&mut self) -> Result<String> {
        match &mut self.value {
            Some(v) => v.get(),
            None => Ok(String::new()),
        }
    }

    /// Descend `path` (dot-separated), returning the child slot if every
    /// intermediate segment is itself a `Wrapper`.
    pub fn get_child_ptr(&self, path: &str) -> Option<Slot> {
        let mut view = TString::new(path);
        view.trim();
        if let Some(head) = view.cut_front('.') {
            let head = head.as_str();
            let child = self.children.get(head)?;
            let borrowed = child.borrow();
            if let Node::Wrapper(w) = &*borrowed {
                return w.get_child_ptr(view.as_str());
            }
            None
        } else {
            self.children.get(view.as_str()).cloned()
        }
    }

    /// Evaluate the slot at `path`, or `None` if the path doesn't resolve.
    pub fn get_child(&self, path: &str) -> Option<Result<String>> {
        let slot = self.get_child_ptr(path)?;
        Some(slot::eval_get(&slot))
    }

    /// Delegate a write to a settable target at `path`.
    pub fn set(&self, path: &str, value: &str) -> bool {
        match self.get_child_ptr(path) {
            Some(slot) => slot.borrow_mut().set(value),
            None => false,
        }
    }

    /// Install `node` at `path`, creating intermediate wrappers as needed.
    /// Re-adding at an existing `Wrapper` slot replaces its `value`; adding
    /// at an existing non-`Wrapper` slot is a `DuplicateKey` error.
    pub fn add(&mut self, path: &str, node: Node) -> Result<Slot> {
        check_path(path)?;
        let mut view = TString::new(path);
        self.add_inner(&mut view, node)
    }

    fn add_inner(&mut self, path: &mut TString<'_>, node: Node) -> Result<Slot> {
        if let Some(head) = path.cut_front('.') {
            let head = head.as_str().to_string();
            if self.children.get(&head).is_none() {
                self.children.insert(head.clone(), new_slot(Node::Wrapper(Wrapper::new())));
            }
            let child_slot = self.children.get(&head).unwrap().clone();
            let is_wrapper = matches!(&*child_slot.borrow(), Node::Wrapper(_));
            if !is_wrapper {
                return Err(Error::DuplicateKey(format!(
                    "'{head}' is not a wrapper, cannot descend further"
                )));
            }
            let mut borrowed = child_slot.borrow_mut();
            if let Node::Wrapper(w) = &mut *borrowed {
                w.add_inner(path, node)
            } else {
                unreachable!()
            }
        } else {
            let key = path.as_str().to_string();
            match self.children.get(&key).cloned() {
                None => {
                    let slot = new_slot(node);
                    self.children.insert(key, slot.clone());
                    Ok(slot)
                }
                Some(slot) => {
                    let mut borrowed = slot.borrow_mut();
                    if let Node::Wrapper(w) = &mut *borrowed {
                        match node {
                            // A wrapper being installed over an existing wrapper slot
                            // (e.g. the result of `clone`/merge) flattens in rather
                            // than nesting, so its children stay path-addressable.
                            Node::Wrapper(mut incoming) => {
                                let children = incoming.children_snapshot();
                                if let Some(v) = incoming.value.take() {
                                    w.value = Some(v);
                                }
                                for (name, child) in children {
                                    w.insert_child_if_absent(name, child)?;
                                }
                            }
                            other => w.value = Some(Box::new(other)),
                        }
                        drop(borrowed);
                        Ok(slot.clone())
                    } else {
                        Err(Error::DuplicateKey(format!("duplicate key '{key}'")))
                    }
                }
            }
        }
    }

    /// Returns the wrapper slot at `path`, creating intermediate and leaf
    /// wrappers as needed without disturbing an existing leaf's value or
    /// children. Used to materialise a key's own slot and its container
    /// before parsing the key's value, so `rel`/`child`/`dep`/`sibling`/
    /// `clone` can see sibling keys declared on either side of this one.
    pub fn ensure_wrapper(&mut self, path: &str) -> Result<Slot> {
        check_path(path)?;
        let mut view = TString::new(path);
        self.ensure_wrapper_inner(&mut view)
    }

    fn ensure_wrapper_inner(&mut self, path: &mut TString<'_>) -> Result<Slot> {
        if let Some(head) = path.cut_front('.') {
            let head = head.as_str().to_string();
            if self.children.get(&head).is_none() {
                self.children
                    .insert(head.clone(), new_slot(Node::Wrapper(Wrapper::new())));
            }
            let child_slot = self.children.get(&head).unwrap().clone();
            let is_wrapper = matches!(&*child_slot.borrow(), Node::Wrapper(_));
            if !is_wrapper {
                return Err(Error::DuplicateKey(format!(
                    "'{head}' is not a wrapper, cannot descend further"
                )));
            }
            let mut borrowed = child_slot.borrow_mut();
            if let Node::Wrapper(w) = &mut *borrowed {
                w.ensure_wrapper_inner(path)
            } else {
                unreachable!()
            }
        } else {
            let key = path.as_str().to_string();
            match self.children.get(&key).cloned() {
                Some(slot) => {
                    let is_wrapper = matches!(&*slot.borrow(), Node::Wrapper(_));
                    if is_wrapper {
                        Ok(slot)
                    } else {
                        Err(Error::DuplicateKey(format!(
                            "'{key}' already has a non-wrapper value"
                        )))
                    }
                }
                None => {
                    let slot = new_slot(Node::Wrapper(Wrapper::new()));
                    self.children.insert(key, slot.clone());
                    Ok(slot)
                }
            }
        }
    }

    /// Visit direct children only, in insertion order.
    pub fn iterate_children<F: FnMut(&str, &Slot)>(&self, mut visit: F) {
        for (name, slot) in self.children.iter() {
            visit(name, slot);
        }
    }

    /// Own value, if any, used by [`crate::clone::clone_slot`].
    pub fn value_ref(&self) -> Option<&Node> {
        self.value.as_deref()
    }

    /// A snapshot of `(name, slot)` pairs, used by
    /// [`crate::clone::clone_slot`] to recurse without holding a borrow of
    /// `self` across the recursive call.
    pub fn children_snapshot(&self) -> Vec<(String, Slot)> {
        self.children
            .iter()
            .map(|(name, slot)| (name.to_string(), slot.clone()))
            .collect()
    }

    pub fn insert_child(&mut self, name: String, slot: Slot) {
        self.children.insert(name, slot);
    }

    /// Merge `other`'s children into `self`, preserving existing keys.
    /// Conflicting non-wrapper nodes are a `MergeConflict`.
    pub fn insert_child_if_absent(&mut self, name: String, incoming: Slot) -> Result<()> {
        match self.children.get(&name).cloned() {
            None => {
                self.children.insert(name, incoming);
                Ok(())
            }
            Some(existing) => {
                let existing_is_wrapper = matches!(&*existing.borrow(), Node::Wrapper(_));
                let incoming_is_wrapper = matches!(&*incoming.borrow(), Node::Wrapper(_));
                if existing_is_wrapper && incoming_is_wrapper {
                    let incoming_children = match &*incoming.borrow() {
                        Node::Wrapper(w) => w.children_snapshot(),
                        _ => unreachable!(),
                    };
                    let mut existing_mut = existing.borrow_mut();
                    if let Node::Wrapper(w) = &mut *existing_mut {
                        for (child_name, child_slot) in incoming_children {
                            w.insert_child_if_absent(child_name, child_slot)?;
                        }
                    }
                    Ok(())
                } else {
                    Err(Error::MergeConflict(format!(
                        "key '{name}' conflicts during merge"
                    )))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::literal::Literal;

    #[test]
    fn add_creates_intermediate_wrappers() {
        let mut root = Wrapper::new();
        root.add("a.b.c", Node::Literal(Literal::string("v"))).unwrap();
        let slot = root.get_child_ptr("a.b.c").unwrap();
        assert_eq!(slot::eval_get(&slot).unwrap(), "v");
    }

    #[test]
    fn duplicate_non_wrapper_key_errors() {
        let mut root = Wrapper::new();
        root.add("a", Node::Literal(Literal::string("1"))).unwrap();
        let err = root.add("a", Node::Literal(Literal::string("2"))).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(_)));
    }

    #[test]
    fn invalid_path_char_rejected() {
        let mut root = Wrapper::new();
        let err = root.add("a b", Node::Literal(Literal::string("1"))).unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
    }

    #[test]
    fn closing_bracket_in_path_rejected() {
        let mut root = Wrapper::new();
        let err = root.add("a]b", Node::Literal(Literal::string("1"))).unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
    }

    #[test]
    fn setting_value_on_existing_wrapper_slot() {
        let mut root = Wrapper::new();
        root.add("a.b", Node::Literal(Literal::string("inner"))).unwrap();
        root.add("a", Node::Literal(Literal::string("outer-value"))).unwrap();
        let slot = root.get_child_ptr("a").unwrap();
        assert_eq!(slot::eval_get(&slot).unwrap(), "outer-value");
        let slot = root.get_child_ptr("a.b").unwrap();
        assert_eq!(slot::eval_get(&slot).unwrap(), "inner");
    }
}
