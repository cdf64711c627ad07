use crate::clone::CloneContext;
use crate::error::{Error, Result};
use crate::node::Node;
use crate::slot::{self, Slot};

/// Resolves a dotted path against an anchor wrapper at evaluation time.
///
/// The resolved slot handle is cached after the first successful lookup
/// (spec §4.4): later `get`/`set` calls skip re-walking the path unless the
/// anchor never resolved in the first place.
#[derive(Debug, Clone)]
pub struct AddressRef {
    pub anchor: Slot,
    pub path: String,
    pub fallback: Option<Box<Node>>,
    cached: Option<Slot>,
}

impl AddressRef {
    pub fn new(anchor: Slot, path: String, fallback: Option<Box<Node>>) -> Self {
        AddressRef {
            anchor,
            path,
            fallback,
            cached: None,
        }
    }

    fn resolve(&mut self) -> Option<Slot> {
        if self.cached.is_none() {
            let target = match &*self.anchor.borrow() {
                Node::Wrapper(w) => w.get_child_ptr(&self.path),
                _ => None,
            };
            self.cached = target;
        }
        self.cached.clone()
    }

    pub fn get(&mut self) -> Result<String> {
        match self.resolve() {
            Some(target) => match slot::eval_get(&target) {
                Ok(v) => Ok(v),
                Err(e) => self.recover(e),
            },
            None => self.recover(Error::KeyNotFound(self.path.clone())),
        }
    }

    pub fn get_int(&mut self) -> Result<i64> {
        match self.resolve() {
            Some(target) => slot::eval_get_int(&target),
            None => Err(Error::KeyNotFound(self.path.clone())),
        }
    }

    pub fn get_float(&mut self) -> Result<f64> {
        match self.resolve() {
            Some(target) => slot::eval_get_float(&target),
            None => Err(Error::KeyNotFound(self.path.clone())),
        }
    }

    fn recover(&mut self, err: Error) -> Result<String> {
        match &mut self.fallback {
            Some(fb) => fb.get(),
            None => Err(err),
        }
    }

    pub fn readonly(&mut self) -> bool {
        match self.resolve() {
            Some(target) => !target.borrow_mut().set_capable(),
            None => true,
        }
    }

    pub fn set(&mut self, value: &str) -> bool {
        match self.resolve() {
            Some(target) => target.borrow_mut().set(value),
            None => false,
        }
    }

    pub fn clone_node(&self, ctx: &mut CloneContext) -> Result<AddressRef> {
        let fallback = match &self.fallback {
            Some(fb) => Some(Box::new(fb.clone_node(ctx)?)),
            None => None,
        };
        Ok(AddressRef {
            anchor: ctx.remap_anchor(&self.anchor),
            path: self.path.clone(),
            fallback,
            cached: None,
        })
    }
}

/// Returns the dotted path of the anchor's parent. String-typed only.
#[derive(Debug, Clone)]
pub struct UpRef {
    pub parent_path: String,
}

impl UpRef {
    pub fn get(&self) -> Result<String> {
        Ok(self.parent_path.clone())
    }

    pub fn clone_node(&self, _ctx: &mut CloneContext) -> UpRef {
        self.clone()
    }
}

/// Evaluates `primary`; on failure, evaluates `fallback`.
#[derive(Debug, Clone)]
pub struct FallbackWrapper {
    pub primary: Box<Node>,
    pub fallback: Box<Node>,
}

impl FallbackWrapper {
    pub fn get(&mut self) -> Result<String> {
        match self.primary.get() {
            Ok(v) => Ok(v),
            Err(_) => self.fallback.get(),
        }
    }

    pub fn get_int(&mut self) -> Result<i64> {
        match self.primary.get_int() {
            Ok(v) => Ok(v),
            Err(_) => self.fallback.get_int(),
        }
    }

    pub fn get_float(&mut self) -> Result<f64> {
        match self.primary.get_float() {
            Ok(v) => Ok(v),
            Err(_) => self.fallback.get_float(),
        }
    }

    pub fn clone_node(&self, ctx: &mut CloneContext) -> Result<FallbackWrapper> {
        Ok(FallbackWrapper {
            primary: Box::new(self.primary.clone_node(ctx)?),
            fallback: Box::new(self.fallback.clone_node(ctx)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::literal::Literal;
    use crate::slot::new_slot;
    use crate::wrapper::Wrapper;

    #[test]
    fn resolves_plain_target() {
        let mut root = Wrapper::new();
        root.add("key", Node::Literal(Literal::string("foo"))).unwrap();
        let root_slot = new_slot(Node::Wrapper(root));
        let mut addr = AddressRef::new(root_slot, "key".to_string(), None);
        assert_eq!(addr.get().unwrap(), "foo");
    }

    #[test]
    fn missing_key_without_fallback_is_not_found() {
        let root_slot = new_slot(Node::Wrapper(Wrapper::new()));
        let mut addr = AddressRef::new(root_slot, "missing".to_string(), None);
        assert!(matches!(addr.get().unwrap_err(), Error::KeyNotFound(_)));
    }

    #[test]
    fn missing_key_with_fallback_recovers() {
        let root_slot = new_slot(Node::Wrapper(Wrapper::new()));
        let mut addr = AddressRef::new(
            root_slot,
            "missing".to_string(),
            Some(Box::new(Node::Literal(Literal::string("fb")))),
        );
        assert_eq!(addr.get().unwrap(), "fb");
    }
}
