//! The cache family (spec §4.7): `Cache` memoizes by wall-clock expiry,
//! `RefCache` by trigger-value change, `ArrCache` computes its sequence once
//! and indexes into it.

use crate::clone::CloneContext;
use crate::error::{Error, Result};
use crate::node::Node;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CacheNode {
    pub source: Box<Node>,
    pub duration_ms: Box<Node>,
    pub cached: Option<(String, Instant)>,
}

impl CacheNode {
    pub fn get(&mut self) -> Result<String> {
        if let Some((value, expire)) = &self.cached {
            if Instant::now() < *expire {
                return Ok(value.clone());
            }
        }
        let value = self.source.get()?;
        let duration_ms = self.duration_ms.get_int()?;
        let expire = Instant::now() + Duration::from_millis(duration_ms.max(0) as u64);
        self.cached = Some((value.clone(), expire));
        Ok(value)
    }

    pub fn clone_node(&self, ctx: &mut CloneContext) -> Result<CacheNode> {
        Ok(CacheNode {
            source: Box::new(self.source.clone_node(ctx)?),
            duration_ms: Box::new(self.duration_ms.clone_node(ctx)?),
            cached: None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RefCacheNode {
    pub source: Box<Node>,
    pub trigger: Box<Node>,
    pub cached: Option<(String, String)>,
}

impl RefCacheNode {
    pub fn get(&mut self) -> Result<String> {
        let trigger_value = self.trigger.get()?;
        if let Some((value, last_trigger)) = &self.cached {
            if *last_trigger == trigger_value {
                return Ok(value.clone());
            }
        }
        let value = self.source.get()?;
        self.cached = Some((value.clone(), trigger_value));
        Ok(value)
    }

    pub fn clone_node(&self, ctx: &mut CloneContext) -> Result<RefCacheNode> {
        Ok(RefCacheNode {
            source: Box::new(self.source.clone_node(ctx)?),
            trigger: Box::new(self.trigger.clone_node(ctx)?),
            cached: None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ArrCacheNode {
    pub source: Box<Node>,
    pub calculator: Box<Node>,
    pub cached: Option<Vec<String>>,
}

impl ArrCacheNode {
    pub fn get(&mut self) -> Result<String> {
        if self.cached.is_none() {
            let rendered = self.source.get()?;
            self.cached = Some(rendered.split_whitespace().map(str::to_string).collect());
        }
        let index = self.calculator.get_int()?;
        let arr = self.cached.as_ref().unwrap();
        let idx = usize::try_from(index).map_err(|_| Error::IndexOutOfRange(format!("{index}")))?;
        arr.get(idx)
            .cloned()
            .ok_or_else(|| Error::IndexOutOfRange(format!("index {index} out of range (len {})", arr.len())))
    }

    pub fn clone_node(&self, ctx: &mut CloneContext) -> Result<ArrCacheNode> {
        Ok(ArrCacheNode {
            source: Box::new(self.source.clone_node(ctx)?),
            calculator: Box::new(self.calculator.clone_node(ctx)?),
            cached: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::literal::Literal;
    use std::thread::sleep;

    #[test]
    fn cache_is_stable_without_clock_advance() {
        let mut node = CacheNode {
            source: Box::new(Node::Literal(Literal::string("hello"))),
            duration_ms: Box::new(Node::Literal(Literal::settable_int(60))),
            cached: None,
        };
        assert_eq!(node.get().unwrap(), "hello");
        assert_eq!(node.get().unwrap(), "hello");
    }

    #[test]
    fn cache_reevaluates_after_expiry() {
        let source = Box::new(Node::Literal(Literal::settable_string("first")));
        let mut node = CacheNode {
            source,
            duration_ms: Box::new(Node::Literal(Literal::settable_int(1))),
            cached: None,
        };
        assert_eq!(node.get().unwrap(), "first");
        if let Node::Literal(lit) = node.source.as_mut() {
            lit.set("second");
        }
        sleep(std::time::Duration::from_millis(5));
        assert_eq!(node.get().unwrap(), "second");
    }

    #[test]
    fn refcache_reevaluates_when_trigger_changes() {
        let trigger = Box::new(Node::Literal(Literal::settable_string("t1")));
        let mut node = RefCacheNode {
            source: Box::new(Node::Literal(Literal::settable_string("v1"))),
            trigger,
            cached: None,
        };
        assert_eq!(node.get().unwrap(), "v1");
        if let Node::Literal(lit) = node.source.as_mut() {
            lit.set("v2");
        }
        assert_eq!(node.get().unwrap(), "v1");
        if let Node::Literal(lit) = node.trigger.as_mut() {
            lit.set("t2");
        }
        assert_eq!(node.get().unwrap(), "v2");
    }

    #[test]
    fn arrcache_indexes_and_reports_out_of_range() {
        let mut node = ArrCacheNode {
            source: Box::new(Node::Literal(Literal::string("a b c"))),
            calculator: Box::new(Node::Literal(Literal::settable_int(1))),
            cached: None,
        };
        assert_eq!(node.get().unwrap(), "b");
        if let Node::Literal(lit) = node.calculator.as_mut() {
            lit.set("9");
        }
        assert!(matches!(node.get().unwrap_err(), Error::IndexOutOfRange(_)));
    }
}
