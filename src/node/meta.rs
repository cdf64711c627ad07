//! `Env`, `Cmd`, `Poll` and `File` nodes: each wraps one argument subnode
//! (the name/command/path) and delegates to a collaborator (spec §6).
//! `Cmd` captures its subprocess once and caches the result; `Poll` is
//! identical except it re-runs on every `get` (spec §3's node table).

use crate::clone::CloneContext;
use crate::error::{Error, Result};
use crate::node::Node;
use crate::node::collaborators::Collaborators;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct EnvNode {
    pub name: Box<Node>,
    pub collaborators: Rc<Collaborators>,
}

impl EnvNode {
    pub fn get(&mut self) -> Result<String> {
        let name = self.name.get()?;
        self.collaborators
            .env
            .get(&name)
            .ok_or_else(|| Error::ExternalFailure(format!("environment variable '{name}' not set")))
    }

    pub fn set(&mut self, value: &str) -> bool {
        match self.name.get() {
            Ok(name) => self.collaborators.env.set(&name, value),
            Err(_) => false,
        }
    }

    pub fn clone_node(&self, ctx: &mut CloneContext) -> Result<EnvNode> {
        Ok(EnvNode {
            name: Box::new(self.name.clone_node(ctx)?),
            collaborators: self.collaborators.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CmdNode {
    pub command: Box<Node>,
    pub collaborators: Rc<Collaborators>,
    pub cached: Option<String>,
}

impl CmdNode {
    pub fn get(&mut self) -> Result<String> {
        if let Some(cached) = &self.cached {
            return Ok(cached.clone());
        }
        let command = self.command.get()?;
        let (stdout, ok) = self.collaborators.process.run(&command);
        if !ok {
            return Err(Error::ExternalFailure(format!("command '{command}' failed")));
        }
        self.cached = Some(stdout.clone());
        Ok(stdout)
    }

    pub fn clone_node(&self, ctx: &mut CloneContext) -> Result<CmdNode> {
        Ok(CmdNode {
            command: Box::new(self.command.clone_node(ctx)?),
            collaborators: self.collaborators.clone(),
            cached: None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PollNode {
    pub command: Box<Node>,
    pub collaborators: Rc<Collaborators>,
}

impl PollNode {
    pub fn get(&mut self) -> Result<String> {
        let command = self.command.get()?;
        let (stdout, ok) = self.collaborators.process.run(&command);
        if !ok {
            return Err(Error::ExternalFailure(format!("command '{command}' failed")));
        }
        Ok(stdout)
    }

    pub fn clone_node(&self, ctx: &mut CloneContext) -> Result<PollNode> {
        Ok(PollNode {
            command: Box::new(self.command.clone_node(ctx)?),
            collaborators: self.collaborators.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct FileNode {
    pub path: Box<Node>,
    pub collaborators: Rc<Collaborators>,
}

impl FileNode {
    pub fn get(&mut self) -> Result<String> {
        let path = self.path.get()?;
        self.collaborators
            .fs
            .read(&path)
            .ok_or_else(|| Error::ExternalFailure(format!("could not read file '{path}'")))
    }

    pub fn set(&mut self, value: &str) -> bool {
        match self.path.get() {
            Ok(path) => self.collaborators.fs.write(&path, value),
            Err(_) => false,
        }
    }

    pub fn clone_node(&self, ctx: &mut CloneContext) -> Result<FileNode> {
        Ok(FileNode {
            path: Box::new(self.path.clone_node(ctx)?),
            collaborators: self.collaborators.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::collaborators::mock::{MockEnv, MockFile};
    use crate::node::collaborators::SystemProcess;
    use crate::node::literal::Literal;

    fn collaborators_with_mocks() -> Rc<Collaborators> {
        Rc::new(Collaborators {
            env: Rc::new(MockEnv::default()),
            process: Rc::new(SystemProcess),
            fs: Rc::new(MockFile::default()),
            colour: Rc::new(crate::node::colour::DefaultColourProcessor),
        })
    }

    #[test]
    fn env_reads_and_writes_through_backend() {
        let collaborators = collaborators_with_mocks();
        collaborators.env.set("greeting", "hi");
        let mut node = EnvNode {
            name: Box::new(Node::Literal(Literal::string("greeting"))),
            collaborators: collaborators.clone(),
        };
        assert_eq!(node.get().unwrap(), "hi");
        assert!(node.set("bye"));
        assert_eq!(collaborators.env.get("greeting").unwrap(), "bye");
    }

    #[test]
    fn missing_env_var_is_external_failure() {
        let collaborators = collaborators_with_mocks();
        let mut node = EnvNode {
            name: Box::new(Node::Literal(Literal::string("nope"))),
            collaborators,
        };
        assert!(matches!(node.get().unwrap_err(), Error::ExternalFailure(_)));
    }

    #[test]
    fn file_round_trips_through_backend() {
        let collaborators = collaborators_with_mocks();
        let mut node = FileNode {
            path: Box::new(Node::Literal(Literal::string("key_file.txt"))),
            collaborators: collaborators.clone(),
        };
        assert!(node.set("content"));
        assert_eq!(node.get().unwrap(), "content");
    }

    #[test]
    fn cmd_runs_once_and_caches() {
        let collaborators = collaborators_with_mocks();
        let mut node = CmdNode {
            command: Box::new(Node::Literal(Literal::string("echo hello"))),
            collaborators,
            cached: None,
        };
        assert_eq!(node.get().unwrap(), "hello");
        assert_eq!(node.get().unwrap(), "hello");
    }
}
