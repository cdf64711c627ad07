//! `Colour` and `Gradient` nodes, plus the `ColourProcessor` collaborator
//! (spec §6) that does the actual colour-space math. The engine only ever
//! sees RGB triples and an opaque `parse`/`modify`/`format` interface; a
//! richer colour-space library is explicitly out of scope (spec §1), so
//! `DefaultColourProcessor` is a minimal stand-in: hex and `hsv(h,s,v)`
//! parsing, and a small "channel op value" modifier grammar operating on
//! hue/saturation/value.

use crate::clone::CloneContext;
use crate::error::{Error, Result};
use crate::node::Node;
use crate::node::collaborators::Collaborators;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Colour {
    fn to_hsv(self) -> (f64, f64, f64) {
        let (r, g, b) = (self.r as f64 / 255.0, self.g as f64 / 255.0, self.b as f64 / 255.0);
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;
        let hue = if delta == 0.0 {
            0.0
        } else if max == r {
            60.0 * (((g - b) / delta).rem_euclid(6.0))
        } else if max == g {
            60.0 * ((b - r) / delta + 2.0)
        } else {
            60.0 * ((r - g) / delta + 4.0)
        };
        let sat = if max == 0.0 { 0.0 } else { delta / max };
        (hue, sat, max)
    }

    fn from_hsv(h: f64, s: f64, v: f64) -> Colour {
        let h = h.rem_euclid(360.0);
        let c = v * s;
        let x = c * (1.0 - ((h / 60.0).rem_euclid(2.0) - 1.0).abs());
        let m = v - c;
        let (r1, g1, b1) = match (h / 60.0) as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        Colour {
            r: (((r1 + m) * 255.0).round().clamp(0.0, 255.0)) as u8,
            g: (((g1 + m) * 255.0).round().clamp(0.0, 255.0)) as u8,
            b: (((b1 + m) * 255.0).round().clamp(0.0, 255.0)) as u8,
        }
    }

    fn lerp(a: Colour, b: Colour, t: f64) -> Colour {
        let t = t.clamp(0.0, 1.0);
        let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * t).round() as u8;
        Colour {
            r: mix(a.r, b.r),
            g: mix(a.g, b.g),
            b: mix(a.b, b.b),
        }
    }
}

pub trait ColourProcessor {
    fn parse(&self, spec: &str, mode: Option<&str>) -> Result<Colour>;
    fn modify(&self, modspec: &str, colour: Colour) -> Result<Colour>;
    fn format(&self, colour: Colour) -> String;
}

pub struct DefaultColourProcessor;

impl ColourProcessor for DefaultColourProcessor {
    fn parse(&self, spec: &str, mode: Option<&str>) -> Result<Colour> {
        let spec = spec.trim();
        match mode {
            None | Some("rgb") => parse_hex(spec),
            Some("hsv") => parse_hsv(spec),
            Some(other) => Err(Error::ParseError(format!("unknown colour mode '{other}'"))),
        }
    }

    fn modify(&self, modspec: &str, colour: Colour) -> Result<Colour> {
        let (mut h, mut s, mut v) = colour.to_hsv();
        for clause in modspec.split(',') {
            let clause = clause.trim();
            if clause.is_empty() {
                continue;
            }
            let mut parts = clause.split_whitespace();
            let channel = parts.next().ok_or_else(|| Error::ParseError("empty modifier clause".into()))?;
            let op = parts.next().ok_or_else(|| Error::ParseError(format!("missing operator in '{clause}'")))?;
            let operand: f64 = parts
                .next()
                .ok_or_else(|| Error::ParseError(format!("missing operand in '{clause}'")))?
                .parse()
                .map_err(|_| Error::ParseError(format!("bad operand in '{clause}'")))?;
            let target = match channel {
                "hue" => &mut h,
                "sat" => &mut s,
                "lum" | "val" => &mut v,
                other => return Err(Error::ParseError(format!("unknown colour channel '{other}'"))),
            };
            *target = match op {
                "+" => *target + operand,
                "-" => *target - operand,
                "*" => *target * operand,
                "/" => *target / operand,
                other => return Err(Error::ParseError(format!("unknown colour operator '{other}'"))),
            };
        }
        Ok(Colour::from_hsv(h, s.clamp(0.0, 1.0), v.clamp(0.0, 1.0)))
    }

    fn format(&self, colour: Colour) -> String {
        format!("#{:02X}{:02X}{:02X}", colour.r, colour.g, colour.b)
    }
}

fn parse_hex(spec: &str) -> Result<Colour> {
    let s = spec.strip_prefix('#').ok_or_else(|| Error::ParseError(format!("'{spec}' is not a hex colour")))?;
    let expand = |c: char| -> String { [c, c].iter().collect() };
    let (rs, gs, bs) = match s.len() {
        3 => {
            let mut chars = s.chars();
            (expand(chars.next().unwrap()), expand(chars.next().unwrap()), expand(chars.next().unwrap()))
        }
        6 => (s[0..2].to_string(), s[2..4].to_string(), s[4..6].to_string()),
        _ => return Err(Error::ParseError(format!("'{spec}' is not a 3- or 6-digit hex colour"))),
    };
    let byte = |s: &str| u8::from_str_radix(s, 16).map_err(|_| Error::ParseError(format!("'{spec}' has non-hex digits")));
    Ok(Colour {
        r: byte(&rs)?,
        g: byte(&gs)?,
        b: byte(&bs)?,
    })
}

fn parse_hsv(spec: &str) -> Result<Colour> {
    let inner = spec
        .strip_prefix("hsv(")
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| Error::ParseError(format!("'{spec}' is not an hsv(...) colour")))?;
    let mut parts = inner.split(',').map(|p| p.trim());
    let h: f64 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(|| Error::ParseError("bad hue".into()))?;
    let s: f64 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(|| Error::ParseError("bad saturation".into()))?;
    let v: f64 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(|| Error::ParseError("bad value".into()))?;
    Ok(Colour::from_hsv(h, s, v))
}

#[derive(Debug, Clone)]
pub struct ColourNode {
    pub mode: Option<String>,
    pub modifier: Option<Box<Node>>,
    pub spec: Box<Node>,
    pub collaborators: Rc<Collaborators>,
}

impl ColourNode {
    pub fn get(&mut self) -> Result<String> {
        let spec_str = self.spec.get()?;
        let colour = self.collaborators.colour.parse(&spec_str, self.mode.as_deref())?;
        let colour = match &mut self.modifier {
            Some(m) => self.collaborators.colour.modify(&m.get()?, colour)?,
            None => colour,
        };
        Ok(self.collaborators.colour.format(colour))
    }

    pub fn clone_node(&self, ctx: &mut CloneContext) -> Result<ColourNode> {
        let modifier = match &self.modifier {
            Some(m) => Some(Box::new(m.clone_node(ctx)?)),
            None => None,
        };
        Ok(ColourNode {
            mode: self.mode.clone(),
            modifier,
            spec: Box::new(self.spec.clone_node(ctx)?),
            collaborators: self.collaborators.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct GradientStop {
    pub position: f64,
    pub colour: Colour,
}

#[derive(Debug, Clone)]
pub struct GradientNode {
    pub stops: Vec<GradientStop>,
    pub position: Box<Node>,
}

impl GradientNode {
    pub fn get(&mut self) -> Result<String> {
        let pos = self.position.get_float()?;
        if self.stops.is_empty() {
            return Err(Error::ParseError("gradient has no stops".to_string()));
        }
        let pos = pos.clamp(self.stops[0].position, self.stops[self.stops.len() - 1].position);
        let mut lo = &self.stops[0];
        let mut hi = &self.stops[self.stops.len() - 1];
        for window in self.stops.windows(2) {
            if pos >= window[0].position && pos <= window[1].position {
                lo = &window[0];
                hi = &window[1];
                break;
            }
        }
        let span = hi.position - lo.position;
        let t = if span == 0.0 { 0.0 } else { (pos - lo.position) / span };
        let colour = Colour::lerp(lo.colour, hi.colour, t);
        Ok(DefaultColourProcessor.format(colour))
    }

    pub fn clone_node(&self, ctx: &mut CloneContext) -> Result<GradientNode> {
        Ok(GradientNode {
            stops: self.stops.clone(),
            position: Box::new(self.position.clone_node(ctx)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::literal::Literal;

    #[test]
    fn parses_hex_and_formats_round_trip() {
        let c = DefaultColourProcessor.parse("#123456", None).unwrap();
        assert_eq!(DefaultColourProcessor.format(c), "#123456");
    }

    #[test]
    fn parses_hsv_mode() {
        let c = DefaultColourProcessor.parse("hsv(180, 1, 0.75)", Some("hsv")).unwrap();
        assert_eq!(DefaultColourProcessor.format(c), "#00BFBF");
    }

    #[test]
    fn modify_scales_lum() {
        let base = DefaultColourProcessor.parse("#808080", None).unwrap();
        let modified = DefaultColourProcessor.modify("lum * 1.5", base).unwrap();
        assert!(modified.r > base.r);
    }

    #[test]
    fn gradient_interpolates_between_stops() {
        let mut node = GradientNode {
            stops: vec![
                GradientStop { position: 0.0, colour: Colour { r: 0, g: 0, b: 0 } },
                GradientStop { position: 1.0, colour: Colour { r: 255, g: 255, b: 255 } },
            ],
            position: Box::new(Node::Literal(Literal::string("0.5"))),
        };
        assert_eq!(node.get().unwrap(), "#808080");
    }
}
