//! External collaborator interfaces (spec §6): environment, subprocess and
//! filesystem access, plus the colour-space helper. The engine talks to the
//! outside world only through these traits, which test suites can mock.

use std::process::Command;
use std::rc::Rc;

pub trait EnvBackend {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&self, name: &str, value: &str) -> bool;
}

pub trait ProcessRunner {
    /// Runs `command` through the host shell; returns captured stdout and
    /// whether the process exited successfully.
    fn run(&self, command: &str) -> (String, bool);
}

pub trait FileBackend {
    fn read(&self, path: &str) -> Option<String>;
    fn write(&self, path: &str, contents: &str) -> bool;
}

pub struct SystemEnv;

impl EnvBackend for SystemEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn set(&self, name: &str, value: &str) -> bool {
        std::env::set_var(name, value);
        true
    }
}

pub struct SystemProcess;

impl ProcessRunner for SystemProcess {
    fn run(&self, command: &str) -> (String, bool) {
        match Command::new("sh").arg("-c").arg(command).output() {
            Ok(output) => (
                String::from_utf8_lossy(&output.stdout).trim_end_matches('\n').to_string(),
                output.status.success(),
            ),
            Err(_) => (String::new(), false),
        }
    }
}

pub struct SystemFile;

impl FileBackend for SystemFile {
    fn read(&self, path: &str) -> Option<String> {
        std::fs::read_to_string(path).ok()
    }

    fn write(&self, path: &str, contents: &str) -> bool {
        std::fs::write(path, contents).is_ok()
    }
}

/// The bundle of collaborators a `ParseContext` hands to every Env/Cmd/File
/// node it constructs, so evaluation never reaches for a global directly.
#[derive(Clone)]
pub struct Collaborators {
    pub env: Rc<dyn EnvBackend>,
    pub process: Rc<dyn ProcessRunner>,
    pub fs: Rc<dyn FileBackend>,
    pub colour: Rc<dyn crate::node::colour::ColourProcessor>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Collaborators {
            env: Rc::new(SystemEnv),
            process: Rc::new(SystemProcess),
            fs: Rc::new(SystemFile),
            colour: Rc::new(crate::node::colour::DefaultColourProcessor),
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct MockEnv(pub RefCell<HashMap<String, String>>);

    impl EnvBackend for MockEnv {
        fn get(&self, name: &str) -> Option<String> {
            self.0.borrow().get(name).cloned()
        }

        fn set(&self, name: &str, value: &str) -> bool {
            self.0.borrow_mut().insert(name.to_string(), value.to_string());
            true
        }
    }

    #[derive(Default)]
    pub struct MockFile(pub RefCell<HashMap<String, String>>);

    impl FileBackend for MockFile {
        fn read(&self, path: &str) -> Option<String> {
            self.0.borrow().get(path).cloned()
        }

        fn write(&self, path: &str, contents: &str) -> bool {
            self.0.borrow_mut().insert(path.to_string(), contents.to_string());
            true
        }
    }
}
