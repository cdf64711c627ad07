//! `Save`: writes `value.get()` to `target.get()`'s location on first
//! evaluation, then returns the cached string on every later `get` without
//! re-writing (spec §4.8, §9 Open Question 3).

use crate::clone::CloneContext;
use crate::error::Result;
use crate::node::Node;
use crate::node::collaborators::Collaborators;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct SaveNode {
    pub value: Box<Node>,
    pub target: Box<Node>,
    pub collaborators: Rc<Collaborators>,
    pub cached: Option<String>,
}

impl SaveNode {
    pub fn get(&mut self) -> Result<String> {
        if let Some(cached) = &self.cached {
            return Ok(cached.clone());
        }
        let rendered = self.value.get()?;
        let target = self.target.get()?;
        self.collaborators.fs.write(&target, &rendered);
        self.cached = Some(rendered.clone());
        Ok(rendered)
    }

    pub fn clone_node(&self, ctx: &mut CloneContext) -> Result<SaveNode> {
        Ok(SaveNode {
            value: Box::new(self.value.clone_node(ctx)?),
            target: Box::new(self.target.clone_node(ctx)?),
            collaborators: self.collaborators.clone(),
            cached: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::collaborators::mock::MockFile;
    use crate::node::collaborators::{FileBackend, SystemEnv, SystemProcess};
    use crate::node::literal::Literal;

    #[test]
    fn writes_once_then_caches() {
        let fs = Rc::new(MockFile::default());
        let collaborators = Rc::new(Collaborators {
            env: Rc::new(SystemEnv),
            process: Rc::new(SystemProcess),
            fs: fs.clone(),
            colour: Rc::new(crate::node::colour::DefaultColourProcessor),
        });
        let mut node = SaveNode {
            value: Box::new(Node::Literal(Literal::settable_string("first"))),
            target: Box::new(Node::Literal(Literal::string("out.txt"))),
            collaborators,
            cached: None,
        };
        assert_eq!(node.get().unwrap(), "first");
        assert_eq!(fs.read("out.txt").unwrap(), "first");

        if let Node::Literal(lit) = node.value.as_mut() {
            lit.set("second");
        }
        assert_eq!(node.get().unwrap(), "first");
        assert_eq!(fs.read("out.txt").unwrap(), "first");
    }
}
