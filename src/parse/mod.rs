//! The expression parser (spec §4.2): turns a raw value string plus a
//! [`ParseContext`] into a [`Node`], handling escapes, string interpolation,
//! fallback splitting and operator dispatch by head token.
//!
//! Grounded on `original_source/include/node/parse.hxx`'s `parse_raw` /
//! `parse_escaped` pair; our `Node` is untyped at the enum level (unlike the
//! source's `T`-templated `base<T>`), so every operator parser below just
//! produces a `Node` and lets `get`/`get_int`/`get_float` sort out typing at
//! evaluation time.

pub mod tokenize;

use crate::clone::{self, CloneContext};
use crate::error::{Error, Result};
use crate::node::cache::{ArrCacheNode, CacheNode, RefCacheNode};
use crate::node::clock::{ClockNode, SmoothNode};
use crate::node::collaborators::Collaborators;
use crate::node::colour::{GradientNode, GradientStop};
use crate::node::colour::ColourNode;
use crate::node::interp::StringInterp;
use crate::node::literal::Literal;
use crate::node::mapnode::MapNode;
use crate::node::meta::{CmdNode, EnvNode, FileNode, PollNode};
use crate::node::reference::{AddressRef, FallbackWrapper, UpRef};
use crate::node::save::SaveNode;
use crate::node::Node;
use crate::slot::Slot;
use crate::tstring::{find_enclosed, TString};
use crate::wrapper::Wrapper;
use std::rc::Rc;

/// State threaded through parsing a single key's value (spec §3's
/// `ParseContext`): `root` is the document root, `current` is the wrapper
/// slot *at the key's own path* (so `rel`/`child`/`clone`'s merge target can
/// see children declared either side of this key), `parent` is the wrapper
/// that directly contains the key (so `dep`/`sibling`/`clone`'s sources
/// resolve against the key's siblings, per `original_source/include/node/parse.hxx`).
pub struct ParseContext {
    pub root: Slot,
    pub current: Slot,
    pub parent: Slot,
    pub current_path: String,
    pub collaborators: Rc<Collaborators>,
}

/// A private-use sentinel standing in for an escaped `$` while we scan for
/// `${...}` spans, so `\$` can never be mistaken for the start of an
/// expression (spec §4.2: "`\$` is preserved ... so `${` inside an escape is
/// not expanded"). Restored to a literal `$` wherever text becomes final
/// literal content.
const ESCAPED_DOLLAR: char = '\u{E000}';

fn apply_escapes(s: &str) -> Result<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('$') => out.push(ESCAPED_DOLLAR),
            Some(other) => {
                return Err(Error::ParseError(format!("unknown escape sequence: \\{other}")))
            }
            None => return Err(Error::ParseError("dangling escape at end of value".to_string())),
        }
    }
    Ok(out)
}

fn restore_dollar(s: &str) -> String {
    s.replace(ESCAPED_DOLLAR, "$")
}

/// The wrapper directly containing `path` (drop its last dotted segment),
/// or `""` if `path` has no dot (its container is the document root).
fn section_path(path: &str) -> String {
    match path.rfind('.') {
        Some(i) => path[..i].to_string(),
        None => String::new(),
    }
}

/// Parse an unescaped node string (spec §4.2 `parse_raw`): trims surrounding
/// quotes, resolves backslash escapes, then either returns a `Plain` literal,
/// delegates entirely to [`parse_escaped`], or builds a [`StringInterp`].
pub fn parse_raw(ctx: &mut ParseContext, value: &str) -> Result<Node> {
    let mut view = TString::new(value);
    view.trim_quotes();
    let escaped = apply_escapes(view.as_str())?;
    let s = escaped.as_str();

    match find_enclosed(s, "${", '{', '}') {
        None => Ok(Node::plain(restore_dollar(s))),
        Some((start, end)) if start == 0 && end == s.len() => {
            let body = &s[2..end - 1];
            parse_escaped(ctx, body)
        }
        Some(_) => {
            let mut base = String::new();
            let mut spots = Vec::new();
            let mut rest = s;
            loop {
                match find_enclosed(rest, "${", '{', '}') {
                    Some((start, end)) => {
                        base.push_str(&restore_dollar(&rest[..start]));
                        let body = &rest[start + 2..end - 1];
                        let node = parse_escaped(ctx, body)?;
                        spots.push((base.len(), Box::new(node)));
                        rest = &rest[end..];
                    }
                    None => {
                        base.push_str(&restore_dollar(rest));
                        break;
                    }
                }
            }
            Ok(Node::StringInterp(StringInterp { base, spots }))
        }
    }
}

/// Parse the body of a `${...}` expression (spec §4.2 `parse_escaped`):
/// splits off a trailing `? fallback`, tokenizes the head, and dispatches on
/// the leading token.
pub fn parse_escaped(ctx: &mut ParseContext, body: &str) -> Result<Node> {
    let (head, fallback_str) = tokenize::split_fallback(body);
    let fallback = match fallback_str {
        Some(fb) => Some(Box::new(parse_raw(ctx, fb)?)),
        None => None,
    };
    let tokens = tokenize::tokenize(head);
    let op = build_operator(ctx, &tokens)?;
    Ok(match fallback {
        Some(fb) => Node::Fallback(FallbackWrapper {
            primary: Box::new(op),
            fallback: fb,
        }),
        None => op,
    })
}

fn build_operator(ctx: &mut ParseContext, tokens: &[String]) -> Result<Node> {
    if tokens.is_empty() {
        return Ok(Node::plain(ctx.current_path.clone()));
    }
    if tokens.len() == 1 {
        return build_single_token(ctx, &tokens[0]);
    }
    match tokens[0].as_str() {
        "dep" | "sibling" => build_sibling_ref(tokens, ctx.parent.clone()),
        "rel" | "child" => build_sibling_ref(tokens, ctx.current.clone()),
        "cmd" => {
            let sub = parse_raw(ctx, require_single_component(tokens, "cmd")?)?;
            Ok(Node::Cmd(CmdNode {
                command: Box::new(sub),
                collaborators: ctx.collaborators.clone(),
                cached: None,
            }))
        }
        "poll" => {
            let sub = parse_raw(ctx, require_single_component(tokens, "poll")?)?;
            Ok(Node::Poll(PollNode {
                command: Box::new(sub),
                collaborators: ctx.collaborators.clone(),
            }))
        }
        "file" => {
            let sub = parse_raw(ctx, require_single_component(tokens, "file")?)?;
            Ok(Node::File(FileNode {
                path: Box::new(sub),
                collaborators: ctx.collaborators.clone(),
            }))
        }
        "env" => {
            let sub = parse_raw(ctx, require_single_component(tokens, "env")?)?;
            Ok(Node::Env(EnvNode {
                name: Box::new(sub),
                collaborators: ctx.collaborators.clone(),
            }))
        }
        "save" => parse_save(ctx, tokens),
        "color" => parse_colour(ctx, tokens),
        "gradient" => parse_gradient(ctx, tokens),
        "clock" => parse_clock(tokens),
        "cache" => parse_cache(ctx, tokens),
        "refcache" => parse_refcache(ctx, tokens),
        "arrcache" => parse_arrcache(ctx, tokens),
        "map" => parse_map(ctx, tokens),
        "smooth" => parse_smooth(ctx, tokens),
        "var" => parse_var(tokens),
        "clone" => parse_clone(ctx, tokens),
        other => Err(Error::ParseError(format!(
            "unsupported operator or operator has the wrong type: {other}"
        ))),
    }
}

fn build_single_token(ctx: &mut ParseContext, token: &str) -> Result<Node> {
    if token == ".." {
        let container = section_path(&ctx.current_path);
        let grandparent = section_path(&container);
        return Ok(Node::UpRef(UpRef {
            parent_path: grandparent,
        }));
    }
    if let Some(rest) = token.strip_prefix('.') {
        return Ok(Node::AddressRef(AddressRef::new(
            ctx.current.clone(),
            rest.to_string(),
            None,
        )));
    }
    Ok(Node::AddressRef(AddressRef::new(
        ctx.root.clone(),
        token.to_string(),
        None,
    )))
}

fn build_sibling_ref(tokens: &[String], anchor: Slot) -> Result<Node> {
    if tokens.len() != 2 {
        return Err(Error::ParseError(format!(
            "{}: only accepts 1 component",
            tokens[0]
        )));
    }
    Ok(Node::AddressRef(AddressRef::new(
        anchor,
        tokens[1].clone(),
        None,
    )))
}

fn require_single_component<'a>(tokens: &'a [String], name: &str) -> Result<&'a str> {
    if tokens.len() != 2 {
        return Err(Error::ParseError(format!(
            "{name}: only accepts 1 component"
        )));
    }
    Ok(tokens[1].as_str())
}

fn parse_save(ctx: &mut ParseContext, tokens: &[String]) -> Result<Node> {
    if tokens.len() != 3 {
        return Err(Error::ParseError(
            "save: expects a value and a target".to_string(),
        ));
    }
    let value = parse_raw(ctx, &tokens[1])?;
    let target = parse_raw(ctx, &tokens[2])?;
    Ok(Node::Save(SaveNode {
        value: Box::new(value),
        target: Box::new(target),
        collaborators: ctx.collaborators.clone(),
        cached: None,
    }))
}

/// `${color [mode] [modifier] spec}`: the final token is always the colour
/// spec; of the remaining tokens, the first (if any) is the mode name and
/// the second (if any) is the modifier expression (spec §4.2).
fn parse_colour(ctx: &mut ParseContext, tokens: &[String]) -> Result<Node> {
    let args = &tokens[1..];
    if args.is_empty() {
        return Err(Error::ParseError(
            "color: expects at least a spec".to_string(),
        ));
    }
    let (spec_token, rest) = args.split_last().unwrap();
    let (mode, modifier) = match rest.len() {
        0 => (None, None),
        1 => (Some(rest[0].clone()), None),
        2 => (Some(rest[0].clone()), Some(rest[1].clone())),
        _ => return Err(Error::ParseError("color: too many arguments".to_string())),
    };
    let spec = parse_raw(ctx, spec_token)?;
    let modifier = match modifier {
        Some(m) => Some(Box::new(parse_raw(ctx, &m)?)),
        None => None,
    };
    Ok(Node::Colour(ColourNode {
        mode,
        modifier,
        spec: Box::new(spec),
        collaborators: ctx.collaborators.clone(),
    }))
}

/// `${gradient "pos:colour pos:colour ..." position}` (spec SPEC_FULL §B).
fn parse_gradient(ctx: &mut ParseContext, tokens: &[String]) -> Result<Node> {
    if tokens.len() != 3 {
        return Err(Error::ParseError(
            "gradient: expects stops and a position".to_string(),
        ));
    }
    let mut stops_view = TString::new(&tokens[1]);
    stops_view.trim_quotes();
    let mut stops = Vec::new();
    for entry in stops_view.as_str().split_whitespace() {
        let (pos_str, colour_str) = entry
            .split_once(':')
            .ok_or_else(|| Error::ParseError(format!("gradient: bad stop '{entry}'")))?;
        let position: f64 = pos_str
            .parse()
            .map_err(|_| Error::ParseError(format!("gradient: bad position '{pos_str}'")))?;
        let colour = ctx.collaborators.colour.parse(colour_str, None)?;
        stops.push(GradientStop { position, colour });
    }
    if stops.is_empty() {
        return Err(Error::ParseError("gradient: no stops given".to_string()));
    }
    stops.sort_by(|a, b| a.position.partial_cmp(&b.position).unwrap());
    let position = parse_raw(ctx, &tokens[2])?;
    Ok(Node::Gradient(GradientNode {
        stops,
        position: Box::new(position),
    }))
}

/// `${clock tick_ms [loop_count]}`.
fn parse_clock(tokens: &[String]) -> Result<Node> {
    if tokens.len() < 2 || tokens.len() > 3 {
        return Err(Error::ParseError(
            "clock: expects a tick duration and optional loop count".to_string(),
        ));
    }
    let tick_ms: u64 = tokens[1]
        .trim()
        .parse()
        .map_err(|_| Error::ParseError(format!("clock: bad tick duration '{}'", tokens[1])))?;
    let loop_count: u64 = if tokens.len() == 3 {
        tokens[2]
            .trim()
            .parse()
            .map_err(|_| Error::ParseError(format!("clock: bad loop count '{}'", tokens[2])))?
    } else {
        0
    };
    Ok(Node::Clock(ClockNode {
        tick_ms,
        loop_count,
        zero_point: None,
    }))
}

/// `${cache duration_ms source}` (spec §8 scenario 6).
fn parse_cache(ctx: &mut ParseContext, tokens: &[String]) -> Result<Node> {
    if tokens.len() != 3 {
        return Err(Error::ParseError(
            "cache: expects a duration and a source".to_string(),
        ));
    }
    let duration = parse_raw(ctx, &tokens[1])?;
    let source = parse_raw(ctx, &tokens[2])?;
    Ok(Node::Cache(CacheNode {
        source: Box::new(source),
        duration_ms: Box::new(duration),
        cached: None,
    }))
}

/// `${refcache source trigger}`.
fn parse_refcache(ctx: &mut ParseContext, tokens: &[String]) -> Result<Node> {
    if tokens.len() != 3 {
        return Err(Error::ParseError(
            "refcache: expects a source and a trigger".to_string(),
        ));
    }
    let source = parse_raw(ctx, &tokens[1])?;
    let trigger = parse_raw(ctx, &tokens[2])?;
    Ok(Node::RefCache(RefCacheNode {
        source: Box::new(source),
        trigger: Box::new(trigger),
        cached: None,
    }))
}

/// `${arrcache source calculator}`.
fn parse_arrcache(ctx: &mut ParseContext, tokens: &[String]) -> Result<Node> {
    if tokens.len() != 3 {
        return Err(Error::ParseError(
            "arrcache: expects a source and a calculator".to_string(),
        ));
    }
    let source = parse_raw(ctx, &tokens[1])?;
    let calculator = parse_raw(ctx, &tokens[2])?;
    Ok(Node::ArrCache(ArrCacheNode {
        source: Box::new(source),
        calculator: Box::new(calculator),
        cached: None,
    }))
}

/// `${map min:max min:max value}` or `${map min max min max value}` (spec
/// §4.2, §8 scenario 4). `from_range` of zero is rejected.
fn parse_map(ctx: &mut ParseContext, tokens: &[String]) -> Result<Node> {
    let args = &tokens[1..];
    let mut i = 0;
    let (from_min, from_max) = consume_range(args, &mut i, "map")?;
    let (to_min, to_max) = consume_range(args, &mut i, "map")?;
    if i + 1 != args.len() {
        return Err(Error::ParseError(
            "map: expects exactly one value expression after the ranges".to_string(),
        ));
    }
    let from_range = from_max - from_min;
    if from_range == 0.0 {
        return Err(Error::ParseError(
            "map: from_range must not be zero".to_string(),
        ));
    }
    let value = parse_raw(ctx, &args[i])?;
    Ok(Node::Map(MapNode {
        from_min,
        from_range,
        to_min,
        to_range: to_max - to_min,
        value: Box::new(value),
    }))
}

fn consume_range(args: &[String], i: &mut usize, name: &str) -> Result<(f64, f64)> {
    let tok = args
        .get(*i)
        .ok_or_else(|| Error::ParseError(format!("{name}: missing range")))?;
    if let Some((a, b)) = tok.split_once(':') {
        let lo: f64 = a
            .trim()
            .parse()
            .map_err(|_| Error::ParseError(format!("{name}: bad range '{tok}'")))?;
        let hi: f64 = b
            .trim()
            .parse()
            .map_err(|_| Error::ParseError(format!("{name}: bad range '{tok}'")))?;
        *i += 1;
        Ok((lo, hi))
    } else {
        let lo: f64 = tok
            .trim()
            .parse()
            .map_err(|_| Error::ParseError(format!("{name}: bad range bound '{tok}'")))?;
        let hi_tok = args
            .get(*i + 1)
            .ok_or_else(|| Error::ParseError(format!("{name}: missing range bound")))?;
        let hi: f64 = hi_tok
            .trim()
            .parse()
            .map_err(|_| Error::ParseError(format!("{name}: bad range bound '{hi_tok}'")))?;
        *i += 2;
        Ok((lo, hi))
    }
}

/// `${smooth target factor}` (SPEC_FULL §B).
fn parse_smooth(ctx: &mut ParseContext, tokens: &[String]) -> Result<Node> {
    if tokens.len() != 3 {
        return Err(Error::ParseError(
            "smooth: expects a target and a factor".to_string(),
        ));
    }
    let target = parse_raw(ctx, &tokens[1])?;
    let factor: f64 = tokens[2]
        .trim()
        .parse()
        .map_err(|_| Error::ParseError(format!("smooth: bad factor '{}'", tokens[2])))?;
    Ok(Node::Smooth(SmoothNode {
        target: Box::new(target),
        factor,
        last: None,
    }))
}

fn parse_var(tokens: &[String]) -> Result<Node> {
    match tokens.len() {
        2 => {
            let mut v = TString::new(&tokens[1]);
            v.trim_quotes();
            Ok(Node::Literal(Literal::settable_string(v.as_str())))
        }
        3 => {
            let mut v = TString::new(&tokens[2]);
            v.trim_quotes();
            match tokens[1].as_str() {
                "int" => {
                    let n: i64 = v
                        .as_str()
                        .trim()
                        .parse()
                        .map_err(|_| Error::ParseError(format!("var: bad int '{}'", v.as_str())))?;
                    Ok(Node::Literal(Literal::settable_int(n)))
                }
                "float" => {
                    let n: f64 = v.as_str().trim().parse().map_err(|_| {
                        Error::ParseError(format!("var: bad float '{}'", v.as_str()))
                    })?;
                    Ok(Node::Literal(Literal::settable_float(n)))
                }
                other => Err(Error::ParseError(format!("var: invalid type '{other}'"))),
            }
        }
        _ => Err(Error::ParseError("var: invalid token count".to_string())),
    }
}

/// `${clone A B ... Z}` (spec §4.6). Sources are resolved against
/// `ctx.parent` (the key's own container), per SPEC_FULL §B's reading of
/// `original_source/include/node/parse.hxx`'s `context.get_parent()`.
fn parse_clone(ctx: &mut ParseContext, tokens: &[String]) -> Result<Node> {
    if tokens.len() < 2 {
        return Err(Error::ParseError(
            "clone: expects at least one source".to_string(),
        ));
    }
    let sources = &tokens[1..];
    if sources.len() == 1 {
        let src_slot = resolve_clone_source(ctx, &sources[0])?;
        let mut clone_ctx = CloneContext::strict();
        let cloned_slot = clone::clone_slot(&src_slot, &mut clone_ctx)?;
        let node = cloned_slot.borrow().clone();
        return Ok(node);
    }
    let mut built = Wrapper::new();
    for (i, token) in sources.iter().enumerate() {
        let src_slot = resolve_clone_source(ctx, token)?;
        let is_last = i == sources.len() - 1;
        let is_wrapper = matches!(&*src_slot.borrow(), Node::Wrapper(_));
        if is_wrapper {
            let mut clone_ctx = CloneContext::strict();
            clone::clone_and_merge_into(&src_slot, &mut built, &mut clone_ctx)?;
        } else if is_last {
            let mut clone_ctx = CloneContext::strict();
            let cloned = src_slot.borrow().clone_node(&mut clone_ctx)?;
            built.value = Some(Box::new(cloned));
        } else {
            return Err(Error::ParseError(format!(
                "clone: '{token}' is not a wrapper and is not the final argument"
            )));
        }
    }
    Ok(Node::Wrapper(built))
}

fn resolve_clone_source(ctx: &ParseContext, path: &str) -> Result<Slot> {
    let parent = ctx.parent.borrow();
    match &*parent {
        Node::Wrapper(w) => w
            .get_child_ptr(path)
            .ok_or_else(|| Error::ParseError(format!("clone: can't find node to clone at '{path}'"))),
        _ => Err(Error::ParseError(
            "clone: parent context is not a wrapper".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::{self, new_slot};

    fn fresh_ctx() -> (Slot, ParseContext) {
        let root = new_slot(Node::Wrapper(Wrapper::new()));
        let ctx = ParseContext {
            root: root.clone(),
            current: root.clone(),
            parent: root.clone(),
            current_path: String::new(),
            collaborators: Rc::new(Collaborators::default()),
        };
        (root, ctx)
    }

    fn install(root: &Slot, path: &str, raw: &str) -> Slot {
        let container = section_path(path);
        let current = {
            let mut r = root.borrow_mut();
            match &mut *r {
                Node::Wrapper(w) => w.ensure_wrapper(path).unwrap(),
                _ => unreachable!(),
            }
        };
        let parent = if container.is_empty() {
            root.clone()
        } else {
            let mut r = root.borrow_mut();
            match &mut *r {
                Node::Wrapper(w) => w.ensure_wrapper(&container).unwrap(),
                _ => unreachable!(),
            }
        };
        let mut ctx = ParseContext {
            root: root.clone(),
            current,
            parent,
            current_path: path.to_string(),
            collaborators: Rc::new(Collaborators::default()),
        };
        let node = parse_raw(&mut ctx, raw).unwrap();
        let mut r = root.borrow_mut();
        match &mut *r {
            Node::Wrapper(w) => w.add(path, node).unwrap(),
            _ => unreachable!(),
        }
    }

    #[test]
    fn plain_value_round_trips() {
        let (root, _) = fresh_ctx();
        let slot = install(&root, "key", "foo");
        assert_eq!(slot::eval_get(&slot).unwrap(), "foo");
    }

    #[test]
    fn reference_resolves_to_root_relative_path() {
        let (root, _) = fresh_ctx();
        install(&root, "key", "foo");
        let slot = install(&root, "a.ref", "${key}");
        assert_eq!(slot::eval_get(&slot).unwrap(), "foo");
    }

    #[test]
    fn child_reference_resolves_against_own_subtree_without_panicking() {
        let (root, _) = fresh_ctx();
        install(&root, "k.x", "5");
        let slot = install(&root, "k", "${child x}");
        assert_eq!(slot::eval_get(&slot).unwrap(), "5");
    }

    #[test]
    fn rel_reference_resolves_against_own_subtree_without_panicking() {
        let (root, _) = fresh_ctx();
        install(&root, "k.x", "5");
        let slot = install(&root, "k", "${rel x}");
        assert_eq!(slot::eval_get(&slot).unwrap(), "5");
    }

    #[test]
    fn leading_dot_reference_resolves_against_own_subtree_without_panicking() {
        let (root, _) = fresh_ctx();
        install(&root, "k.x", "5");
        let slot = install(&root, "k", "${.x}");
        assert_eq!(slot::eval_get(&slot).unwrap(), "5");
    }

    #[test]
    fn whitespace_inside_braces_is_trimmed() {
        let (root, _) = fresh_ctx();
        install(&root, "key", "foo");
        let slot = install(&root, "a.ref-space", "${ key }");
        assert_eq!(slot::eval_get(&slot).unwrap(), "foo");
    }

    #[test]
    fn newline_escape_is_literal() {
        let (root, _) = fresh_ctx();
        let slot = install(&root, "newline", "hello\\nworld");
        assert_eq!(slot::eval_get(&slot).unwrap(), "hello\nworld");
    }

    #[test]
    fn escaped_dollar_does_not_expand() {
        let (root, _) = fresh_ctx();
        let slot = install(&root, "key", "\\${not_an_expr}");
        assert_eq!(slot::eval_get(&slot).unwrap(), "${not_an_expr}");
    }

    #[test]
    fn cycle_recovers_through_fallback_after_break() {
        let (root, _) = fresh_ctx();
        install(&root, "x", "${y}");
        let y_slot = install(&root, "y", "${x}");
        // Both report Cycle.
        assert!(matches!(slot::eval_get(&y_slot).unwrap_err(), Error::Cycle(_)));
        let x_slot = root.borrow().clone();
        let x_slot = match x_slot {
            Node::Wrapper(w) => w.get_child_ptr("x").unwrap(),
            _ => unreachable!(),
        };
        assert!(matches!(slot::eval_get(&x_slot).unwrap_err(), Error::Cycle(_)));
        // Breaking the cycle by redefining y as empty lets x resolve.
        install(&root, "y", "");
        let x_slot = match &*root.borrow() {
            Node::Wrapper(w) => w.get_child_ptr("x").unwrap(),
            _ => unreachable!(),
        };
        assert_eq!(slot::eval_get(&x_slot).unwrap(), "");
    }

    #[test]
    fn not_found_without_fallback_reports_key_not_found() {
        let (root, _) = fresh_ctx();
        let slot = install(&root, "a", "${test.key-nexist}");
        assert!(matches!(slot::eval_get(&slot).unwrap_err(), Error::KeyNotFound(_)));
    }

    #[test]
    fn fallback_recovers_trailing_spaces_preserved() {
        let (root, _) = fresh_ctx();
        let slot = install(&root, "a", "${test.key-nexist ? \" f a i l '}");
        assert_eq!(slot::eval_get(&slot).unwrap(), " f a i l '");
    }

    #[test]
    fn map_extrapolates_then_clamps() {
        let (root, _) = fresh_ctx();
        let low = install(&root, "low", "${map 5:10 0:2 7.5}");
        assert_eq!(slot::eval_get(&low).unwrap(), "1");
        let high = install(&root, "high", "${map 5:10 0:2 20}");
        assert_eq!(slot::eval_get(&high).unwrap(), "2");
    }

    #[test]
    fn clone_merges_in_order_and_preserves_existing_keys() {
        let (root, _) = fresh_ctx();
        install(&root, "src1.key1", "a");
        install(&root, "src2.key2.b", "b");
        install(&root, "src3", "c");
        let merge = install(&root, "merge", "${clone src1 src2 src3}");
        assert_eq!(slot::eval_get(&merge).unwrap(), "c");
        let key1 = match &*root.borrow() {
            Node::Wrapper(w) => w.get_child_ptr("merge.key1").unwrap(),
            _ => unreachable!(),
        };
        assert_eq!(slot::eval_get(&key1).unwrap(), "a");
        let key2b = match &*root.borrow() {
            Node::Wrapper(w) => w.get_child_ptr("merge.key2.b").unwrap(),
            _ => unreachable!(),
        };
        assert_eq!(slot::eval_get(&key2b).unwrap(), "b");
    }

    #[test]
    fn clone_merge_conflict_when_non_wrapper_is_not_final() {
        let (root, _) = fresh_ctx();
        install(&root, "src1.key1", "a");
        install(&root, "src2.key2.b", "b");
        {
            let mut r = root.borrow_mut();
            match &mut *r {
                // Installed directly as a bare literal (not via `install`, which
                // always wraps a key's own slot), so it's a genuine non-wrapper.
                Node::Wrapper(w) => {
                    w.add("src3", Node::Literal(crate::node::Literal::string("c")))
                        .unwrap();
                }
                _ => unreachable!(),
            }
        }
        let container = {
            let mut r = root.borrow_mut();
            match &mut *r {
                Node::Wrapper(w) => w.ensure_wrapper("merge").unwrap(),
                _ => unreachable!(),
            }
        };
        let mut ctx = ParseContext {
            root: root.clone(),
            current: container,
            parent: root.clone(),
            current_path: "merge".to_string(),
            collaborators: Rc::new(Collaborators::default()),
        };
        let err = parse_raw(&mut ctx, "${clone src3 src2 src1}").unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
    }

    #[test]
    fn cache_returns_source_value() {
        let (root, _) = fresh_ctx();
        install(&root, "source", "60");
        let slot = install(&root, "cache", "${cache ${source} hello}");
        assert_eq!(slot::eval_get(&slot).unwrap(), "hello");
        assert_eq!(slot::eval_get(&slot).unwrap(), "hello");
    }
}
