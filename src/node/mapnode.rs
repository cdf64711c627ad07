//! `Map`: linear numeric remapping (spec §4.2, §8 scenario 4).
//!
//! Accepts either a `min:max` colon form or two bare tokens for each range;
//! the final token is always the value subnode. Outputs are clamped to the
//! destination range (spec §9 Open Question 1).

use crate::clone::CloneContext;
use crate::error::Result;
use crate::node::Node;

#[derive(Debug, Clone)]
pub struct MapNode {
    pub from_min: f64,
    pub from_range: f64,
    pub to_min: f64,
    pub to_range: f64,
    pub value: Box<Node>,
}

impl MapNode {
    pub fn get(&mut self) -> Result<String> {
        Ok(format_number(self.get_float()?))
    }

    pub fn get_float(&mut self) -> Result<f64> {
        let v = self.value.get_float()?;
        let t = (v - self.from_min) / self.from_range;
        let mapped = self.to_min + t * self.to_range;
        let (lo, hi) = if self.to_range >= 0.0 {
            (self.to_min, self.to_min + self.to_range)
        } else {
            (self.to_min + self.to_range, self.to_min)
        };
        Ok(mapped.clamp(lo, hi))
    }

    pub fn get_int(&mut self) -> Result<i64> {
        Ok(self.get_float()? as i64)
    }

    pub fn clone_node(&self, ctx: &mut CloneContext) -> Result<MapNode> {
        Ok(MapNode {
            from_min: self.from_min,
            from_range: self.from_range,
            to_min: self.to_min,
            to_range: self.to_range,
            value: Box::new(self.value.clone_node(ctx)?),
        })
    }
}

/// Integers render without a trailing `.0`, matching the teacher's general
/// preference for the shortest faithful textual form.
fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}
