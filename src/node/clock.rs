//! `Clock` and `Smooth` (SPEC_FULL §B): `Clock` is an integer-typed node
//! returning `(steady_elapsed / tick) mod loop`; `Smooth` is an exponentially
//! smoothed numeric follower with a single `mutable last` cell.

use crate::clone::CloneContext;
use crate::error::Result;
use crate::node::Node;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct ClockNode {
    pub tick_ms: u64,
    pub loop_count: u64,
    pub zero_point: Option<Instant>,
}

impl ClockNode {
    pub fn get(&mut self) -> Result<String> {
        Ok(self.get_int()?.to_string())
    }

    pub fn get_int(&mut self) -> Result<i64> {
        let zero = *self.zero_point.get_or_insert_with(Instant::now);
        let elapsed_ms = zero.elapsed().as_millis() as u64;
        let ticks = elapsed_ms.checked_div(self.tick_ms).unwrap_or(0);
        let value = if self.loop_count == 0 { ticks } else { ticks % self.loop_count };
        Ok(value as i64)
    }

    pub fn clone_node(&self, _ctx: &mut CloneContext) -> ClockNode {
        ClockNode {
            tick_ms: self.tick_ms,
            loop_count: self.loop_count,
            zero_point: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmoothNode {
    pub target: Box<Node>,
    pub factor: f64,
    pub last: Option<f64>,
}

impl SmoothNode {
    pub fn get(&mut self) -> Result<String> {
        Ok(format!("{}", self.get_float()?))
    }

    pub fn get_float(&mut self) -> Result<f64> {
        let target = self.target.get_float()?;
        let next = match self.last {
            Some(last) => last + (target - last) * self.factor,
            None => target,
        };
        self.last = Some(next);
        Ok(next)
    }

    pub fn clone_node(&self, ctx: &mut CloneContext) -> Result<SmoothNode> {
        Ok(SmoothNode {
            target: Box::new(self.target.clone_node(ctx)?),
            factor: self.factor,
            last: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::literal::Literal;

    #[test]
    fn clock_starts_at_zero() {
        let mut clock = ClockNode {
            tick_ms: 1000,
            loop_count: 10,
            zero_point: None,
        };
        assert_eq!(clock.get_int().unwrap(), 0);
    }

    #[test]
    fn smooth_follows_target_geometrically() {
        let mut smooth = SmoothNode {
            target: Box::new(Node::Literal(Literal::settable_float(10.0))),
            factor: 0.5,
            last: None,
        };
        assert_eq!(smooth.get_float().unwrap(), 10.0);
        assert_eq!(smooth.get_float().unwrap(), 10.0);
    }

    #[test]
    fn smooth_moves_toward_changed_target() {
        let target = Box::new(Node::Literal(Literal::settable_float(0.0)));
        let mut smooth = SmoothNode {
            target,
            factor: 0.5,
            last: None,
        };
        assert_eq!(smooth.get_float().unwrap(), 0.0);
        if let Node::Literal(lit) = smooth.target.as_mut() {
            lit.set("10");
        }
        assert_eq!(smooth.get_float().unwrap(), 5.0);
        assert_eq!(smooth.get_float().unwrap(), 7.5);
    }
}
