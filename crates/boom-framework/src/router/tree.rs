//! The segment tree behind [`Router`](super::Router).
//!
//! Children of a node are tried literal first, then the named capture, then
//! the wildcard, backtracking when a branch does not reach a node with routes.

use std::collections::HashMap;
use std::sync::Arc;

use boom_core::{BoomError, BoomResult};
use http::Method;

use super::path::Segment;
use super::{Middleware, Route};

/// A matched branch: the nodes visited (root first) and the captures made.
pub(crate) type Trail<'a> = (Vec<&'a Node>, Vec<(String, String)>);

#[derive(Default)]
pub(crate) struct Node {
    statics: HashMap<String, Node>,
    param: Option<(String, Box<Node>)>,
    wildcard: Option<(String, Box<Node>)>,
    pub(crate) routes: HashMap<Method, Arc<Route>>,
    pub(crate) middlewares: Vec<Middleware>,
}

impl Node {
    /// Walks (and grows) the tree along `segments`, returning the final node.
    ///
    /// Two captures at the same position must share a name, otherwise the
    /// templates are ambiguous.
    pub(crate) fn insert(&mut self, uri: &str, segments: &[Segment]) -> BoomResult<&mut Node> {
        let Some((head, rest)) = segments.split_first() else {
            return Ok(self);
        };

        let child = match head {
            Segment::Static(literal) => self.statics.entry(literal.clone()).or_default(),
            Segment::Param(name) => {
                let (existing, child) = self
                    .param
                    .get_or_insert_with(|| (name.clone(), Box::default()));
                if *existing != *name {
                    return Err(BoomError::RouteConflict(format!(
                        "`{uri}` captures `:{name}` where `:{existing}` is already captured"
                    )));
                }
                child.as_mut()
            }
            Segment::Wildcard(name) => {
                let (existing, child) = self
                    .wildcard
                    .get_or_insert_with(|| (name.clone(), Box::default()));
                if *existing != *name {
                    return Err(BoomError::RouteConflict(format!(
                        "`{uri}` captures `*{name}` where `*{existing}` is already captured"
                    )));
                }
                child.as_mut()
            }
        };

        child.insert(uri, rest)
    }

    /// The nodes reached from `self` by following `segments` as literals
    /// only, starting with `self`.
    pub(crate) fn literal_chain<'a>(&'a self, segments: &[&str]) -> Vec<&'a Node> {
        let mut chain = vec![self];
        let mut node = self;
        for segment in segments {
            match node.statics.get(*segment) {
                Some(child) => {
                    chain.push(child);
                    node = child;
                }
                None => break,
            }
        }
        chain
    }

    /// Depth-first search for nodes that carry routes and consume the whole
    /// path, in priority order. `found` is offered every candidate and
    /// returns `true` to stop the search.
    pub(crate) fn search<'a>(
        &'a self,
        segments: &[&str],
        trail: &mut Trail<'a>,
        found: &mut dyn FnMut(&Trail<'a>) -> bool,
    ) -> bool {
        trail.0.push(self);

        let stop = match segments.split_first() {
            None => !self.routes.is_empty() && found(trail),
            Some((head, rest)) => {
                self.statics
                    .get(*head)
                    .is_some_and(|child| child.search(rest, trail, found))
                    || self.param.as_ref().is_some_and(|(name, child)| {
                        trail.1.push((name.clone(), (*head).to_string()));
                        let stop = child.search(rest, trail, found);
                        trail.1.pop();
                        stop
                    })
                    || self.wildcard.as_ref().is_some_and(|(name, child)| {
                        trail.1.push((name.clone(), segments.join("/")));
                        trail.0.push(child);
                        let stop = !child.routes.is_empty() && found(trail);
                        trail.0.pop();
                        trail.1.pop();
                        stop
                    })
            }
        };

        trail.0.pop();
        stop
    }
}
