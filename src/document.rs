//! A minimal INI-style line reader/writer (SPEC_FULL §B): sections,
//! `key = value` lines, `;`/`#` comments, quoted values. Grounded directly in
//! `original_source/src/parse.cpp`'s `parse`/`write` pair; `\`-continuation is
//! parser-specific and unused by any scenario, so it is not implemented here.
//! This is deliberately a thin driver over [`crate::parse`] and
//! [`crate::wrapper::Wrapper`], not a general-purpose serializer.

use crate::error::{Diagnostics, Error, Result};
use crate::node::collaborators::Collaborators;
use crate::node::Node;
use crate::parse::{self, ParseContext};
use crate::slot::{self, new_slot, Slot};
use crate::tstring::TString;
use crate::wrapper::Wrapper;
use std::fmt;
use std::rc::Rc;

/// Characters `original_source/src/parse.cpp`'s `excluded_chars` bans from a
/// raw section or key name. Note this includes `.`: the file grammar itself
/// is strictly two levels (section, then key) — deeper nesting only comes
/// from `clone`/merge building structure at evaluation time.
const EXCLUDED_NAME_CHARS: &[char] = &[
    '\t', ' ', '"', '\'', '=', ';', '#', '[', ']', '(', ')', '{', '}', ':', '.', '$', '\\', '%',
];

fn check_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(|c| EXCLUDED_NAME_CHARS.contains(&c))
}

/// A parsed configuration document: a `Wrapper` tree rooted at `root`, whose
/// direct children are either sectionless top-level keys or named sections.
pub struct Document {
    pub root: Slot,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Document {
            root: new_slot(Node::Wrapper(Wrapper::new())),
        }
    }

    /// Parses `text` line by line, installing each key's value under its
    /// section (or at the root, if sectionless). A malformed line or key
    /// doesn't abort parsing; it's recorded in the returned [`Diagnostics`]
    /// and parsing continues, matching the source's `errorlist`-based
    /// `parse()`. Runs [`Node::optimize`] over the whole tree once finished.
    pub fn parse(text: &str, collaborators: Rc<Collaborators>) -> (Document, Diagnostics) {
        let doc = Document::new();
        let mut diagnostics = Diagnostics::new();
        let mut current_section = String::new();

        for (i, raw_line) in text.lines().enumerate() {
            let lineno = i + 1;
            let mut line = TString::new(raw_line);
            line.ltrim();
            if line.is_empty() || matches!(line.front(), Some(';') | Some('#')) {
                continue;
            }

            let mut maybe_section = line;
            if maybe_section.cut_front_back("[", "]") {
                let name = maybe_section.as_str();
                if check_name(name) {
                    current_section = name.to_string();
                } else {
                    diagnostics.push(
                        format!("line {lineno}"),
                        Error::ParseError(format!("invalid character in section name '{name}'")),
                    );
                }
                continue;
            }

            match line.cut_front('=') {
                Some(mut key) => {
                    key.trim();
                    let key_str = key.as_str();
                    if !check_name(key_str) {
                        diagnostics.push(
                            format!("line {lineno}"),
                            Error::ParseError(format!("invalid character in key '{key_str}'")),
                        );
                        continue;
                    }
                    let mut value = line;
                    value.trim();
                    let full_path = if current_section.is_empty() {
                        key_str.to_string()
                    } else {
                        format!("{current_section}.{key_str}")
                    };
                    if let Err(e) = doc.install(&full_path, value.as_str(), &collaborators) {
                        diagnostics.push(format!("key {full_path}"), e);
                    }
                }
                None => {
                    diagnostics.push(format!("line {lineno}"), Error::ParseError("unparsed line".to_string()));
                }
            }
        }

        doc.optimize();
        (doc, diagnostics)
    }

    fn install(&self, full_path: &str, raw_value: &str, collaborators: &Rc<Collaborators>) -> Result<()> {
        let container = section_path(full_path);
        let current = {
            let mut root = self.root.borrow_mut();
            match &mut *root {
                Node::Wrapper(w) => w.ensure_wrapper(full_path)?,
                _ => unreachable!(),
            }
        };
        let parent = if container.is_empty() {
            self.root.clone()
        } else {
            let mut root = self.root.borrow_mut();
            match &mut *root {
                Node::Wrapper(w) => w.ensure_wrapper(&container)?,
                _ => unreachable!(),
            }
        };
        let mut ctx = ParseContext {
            root: self.root.clone(),
            current,
            parent,
            current_path: full_path.to_string(),
            collaborators: collaborators.clone(),
        };
        let node = parse::parse_raw(&mut ctx, raw_value)?;
        let mut root = self.root.borrow_mut();
        match &mut *root {
            Node::Wrapper(w) => {
                w.add(full_path, node)?;
            }
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Replace every node in the tree with its `optimize()`d form where one
    /// exists (spec §4.3/§9), walking once after parsing.
    pub fn optimize(&self) {
        optimize_wrapper(&self.root);
    }
}

fn section_path(path: &str) -> String {
    match path.rfind('.') {
        Some(i) => path[..i].to_string(),
        None => String::new(),
    }
}

fn optimize_wrapper(slot: &Slot) {
    let children = {
        let mut borrowed = slot.borrow_mut();
        let Node::Wrapper(w) = &mut *borrowed else {
            return;
        };
        if let Some(v) = &w.value {
            if let Some(replacement) = v.optimize() {
                w.value = Some(Box::new(replacement));
            }
        }
        w.children_snapshot()
    };
    for (_, child) in children {
        let is_wrapper = matches!(&*child.borrow(), Node::Wrapper(_));
        if is_wrapper {
            optimize_wrapper(&child);
            continue;
        }
        let mut borrowed = child.borrow_mut();
        if let Some(replacement) = borrowed.optimize() {
            *borrowed = replacement;
        }
    }
}

fn write_keyval(f: &mut fmt::Formatter<'_>, name: &str, slot: &Slot) -> fmt::Result {
    write!(f, "{name} = ")?;
    match slot::eval_get(slot) {
        Ok(value) if value.is_empty() => writeln!(f),
        Ok(value) if value.starts_with(' ') || value.ends_with(' ') => writeln!(f, "\"{value}\""),
        Ok(mut value) => {
            if let Some(pos) = value.find("${") {
                value.insert(pos, '\\');
            }
            writeln!(f, "{value}")
        }
        Err(_) => writeln!(f),
    }
}

/// A child is only ever a genuine subsection if it's a `Wrapper` with
/// children of its own; `Document::install` wraps every leaf key in a
/// `Wrapper` too (see `ensure_wrapper`), so a childless `Wrapper` is still a
/// plain `key = value` line, not a `[section]`.
fn has_subsection(slot: &Slot) -> bool {
    matches!(&*slot.borrow(), Node::Wrapper(w) if !w.children_snapshot().is_empty())
}

fn write_wrapper_children(f: &mut fmt::Formatter<'_>, w: &Wrapper, prefix: &str) -> fmt::Result {
    for (name, slot) in w.children_snapshot() {
        let full_name = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        if !has_subsection(&slot) {
            write_keyval(f, &full_name, &slot)?;
            continue;
        }
        let has_value = matches!(&*slot.borrow(), Node::Wrapper(inner) if inner.value.is_some());
        if has_value {
            write_keyval(f, &full_name, &slot)?;
        }
        let borrowed = slot.borrow();
        if let Node::Wrapper(child_w) = &*borrowed {
            write_wrapper_children(f, child_w, &full_name)?;
        }
    }
    Ok(())
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let children = {
            let borrowed = self.root.borrow();
            match &*borrowed {
                Node::Wrapper(w) => w.children_snapshot(),
                _ => unreachable!(),
            }
        };
        let mut sections = Vec::new();
        for (name, slot) in &children {
            if has_subsection(slot) {
                sections.push((name.clone(), slot.clone()));
            } else {
                write_keyval(f, name, slot)?;
            }
        }
        for (name, slot) in sections {
            writeln!(f)?;
            writeln!(f, "[{name}]")?;
            let has_value = matches!(&*slot.borrow(), Node::Wrapper(inner) if inner.value.is_some());
            if has_value {
                write_keyval(f, &name, &slot)?;
            }
            let borrowed = slot.borrow();
            if let Node::Wrapper(w) = &*borrowed {
                write_wrapper_children(f, w, "")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
; a leading comment
root_key = top level

[server]
host = localhost
port = ${cache 60000 8080}
greeting = \" padded \"
escaped = \\${not_an_expr}
";

    #[test]
    fn parses_sections_and_keys_without_errors() {
        let (doc, diags) = Document::parse(SAMPLE, Rc::new(Collaborators::default()));
        assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags.iter().collect::<Vec<_>>());
        let root_key = match &*doc.root.borrow() {
            Node::Wrapper(w) => w.get_child_ptr("root_key").unwrap(),
            _ => unreachable!(),
        };
        assert_eq!(slot::eval_get(&root_key).unwrap(), "top level");
        let host = match &*doc.root.borrow() {
            Node::Wrapper(w) => w.get_child_ptr("server.host").unwrap(),
            _ => unreachable!(),
        };
        assert_eq!(slot::eval_get(&host).unwrap(), "localhost");
    }

    #[test]
    fn invalid_key_is_a_diagnostic_not_an_abort() {
        let text = "good = 1\nbad key = 2\nalso_good = 3\n";
        let (doc, diags) = Document::parse(text, Rc::new(Collaborators::default()));
        assert_eq!(diags.iter().count(), 1);
        let also_good = match &*doc.root.borrow() {
            Node::Wrapper(w) => w.get_child_ptr("also_good").unwrap(),
            _ => unreachable!(),
        };
        assert_eq!(slot::eval_get(&also_good).unwrap(), "3");
    }

    #[test]
    fn round_trips_escaped_and_quoted_values() {
        let text = "escaped = \\${literal}\npadded = \" x \"\n";
        let (doc, diags) = Document::parse(text, Rc::new(Collaborators::default()));
        assert!(diags.is_empty());
        let rendered = doc.to_string();
        assert!(rendered.contains("escaped = \\${literal}"));
        assert!(rendered.contains("padded = \" x \""));
    }
}
