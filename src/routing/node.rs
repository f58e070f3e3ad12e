//! Route tree nodes.
//!
//! # Responsibilities
//! - Store per-method handlers for one path segment
//! - Own static children and at most one variable child
//! - Create, look up, remove and prune chains of nodes
//! - Resolve a request path to a handler, binding variables on the way
//!
//! # Design Decisions
//! - The variable child is its own `Option` field, so "at most one variable
//!   child" holds by construction; a second, differently named one is rejected
//! - Static children keep insertion order and unique literals
//! - Exact literal beats variable at the same depth; no backtracking
//! - Removal is decided by the parent, which detaches children left empty

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use axum::response::Response;

use crate::dispatch::{Context, DispatchError};
use crate::http::Method;
use crate::routing::error::RouteError;
use crate::routing::handler::Handler;
use crate::routing::path::{join_segments, Segment};

/// A path and the methods bound on it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RouteInfo {
    pub path: String,
    pub methods: Vec<Method>,
}

/// A node of the route tree.
///
/// The endpoint `/a/b/c` is three nodes below the root: `a` has the child `b`,
/// which has the child `c`. A node created from `{user_id}` matches any
/// segment and exposes it to handlers as the URL variable `user_id`.
#[derive(Debug, Clone, Default)]
pub struct Route {
    segment: String,
    variable: bool,
    handlers: BTreeMap<Method, Handler>,
    children: Vec<Route>,
    variable_child: Option<Box<Route>>,
}

impl Route {
    /// The root node, representing the empty prefix.
    pub fn root() -> Self {
        Self::default()
    }

    fn from_segment(segment: &Segment) -> Self {
        Self {
            segment: segment.name().to_string(),
            variable: segment.is_variable(),
            ..Self::default()
        }
    }

    /// The literal, or the variable name for variable nodes.
    pub fn segment(&self) -> &str {
        &self.segment
    }

    pub fn is_variable(&self) -> bool {
        self.variable
    }

    /// Static children in insertion order.
    pub fn children(&self) -> &[Route] {
        &self.children
    }

    pub fn variable_child(&self) -> Option<&Route> {
        self.variable_child.as_deref()
    }

    pub fn handler(&self, method: Method) -> Option<&Handler> {
        self.handlers.get(&method)
    }

    /// Methods with a bound handler, in [`Method`] order.
    pub fn allowed_methods(&self) -> Vec<Method> {
        self.handlers.keys().copied().collect()
    }

    /// No handlers and no children of either kind.
    pub fn is_prunable(&self) -> bool {
        self.handlers.is_empty() && self.children.is_empty() && self.variable_child.is_none()
    }

    fn display_segment(&self) -> Cow<'_, str> {
        if self.variable {
            Cow::Owned(format!("{{{}}}", self.segment))
        } else {
            Cow::Borrowed(&self.segment)
        }
    }

    /// Ensure a chain of nodes exists for `segments` and return the last one.
    ///
    /// Existing nodes are reused, so adding the same path twice returns the same
    /// node.
    pub fn add_route(&mut self, segments: &[Segment]) -> Result<&mut Route, RouteError> {
        let Some((first, rest)) = segments.split_first() else {
            return Ok(self);
        };

        match first {
            Segment::Static(literal) => {
                let index = match self.children.iter().position(|c| c.segment == *literal) {
                    Some(index) => index,
                    None => {
                        self.children.push(Route::from_segment(first));
                        self.children.len() - 1
                    }
                };
                self.children[index].add_route(rest)
            }
            Segment::Variable(name) => {
                if let Some(existing) = &self.variable_child {
                    if existing.segment != *name {
                        return Err(RouteError::ConflictingVariableRoute {
                            existing: existing.segment.clone(),
                            attempted: name.clone(),
                        });
                    }
                }
                self.variable_child
                    .get_or_insert_with(|| Box::new(Route::from_segment(first)))
                    .add_route(rest)
            }
        }
    }

    /// Bind `handler` to `method` on this node.
    pub fn add_handler(&mut self, method: Method, handler: Handler) -> Result<(), RouteError> {
        if let Some(existing) = self.handlers.get(&method) {
            return Err(RouteError::HandlerAlreadyExists {
                path: self.display_segment().into_owned(),
                method,
                existing: existing.clone(),
                attempted: handler,
            });
        }
        self.handlers.insert(method, handler);
        Ok(())
    }

    /// Find the node declared by `segments`.
    ///
    /// Declared segments match by shape: a literal only matches a static child
    /// and `{name}` only the variable child called `name`.
    pub fn get_route(&self, segments: &[Segment]) -> Result<&Route, RouteError> {
        let Some((first, rest)) = segments.split_first() else {
            return Ok(self);
        };
        match self.child(first) {
            Some(child) => child.get_route(rest),
            None => Err(not_found(segments)),
        }
    }

    /// Mutable variant of [`Route::get_route`].
    pub fn get_route_mut(&mut self, segments: &[Segment]) -> Result<&mut Route, RouteError> {
        let Some((first, rest)) = segments.split_first() else {
            return Ok(self);
        };
        let child = match first {
            Segment::Static(literal) => self.children.iter_mut().find(|c| c.segment == *literal),
            Segment::Variable(name) => self
                .variable_child
                .as_deref_mut()
                .filter(|c| c.segment == *name),
        };
        match child {
            Some(child) => child.get_route_mut(rest),
            None => Err(not_found(segments)),
        }
    }

    fn child(&self, segment: &Segment) -> Option<&Route> {
        match segment {
            Segment::Static(literal) => self.children.iter().find(|c| c.segment == *literal),
            Segment::Variable(name) => self
                .variable_child
                .as_deref()
                .filter(|c| c.segment == *name),
        }
    }

    /// How many leading `segments` already exist as nodes.
    pub fn existing_depth(&self, segments: &[Segment]) -> usize {
        match segments.split_first() {
            Some((first, rest)) => match self.child(first) {
                Some(child) => 1 + child.existing_depth(rest),
                None => 0,
            },
            None => 0,
        }
    }

    /// Bind `handler` to `method` at `segments`, creating the chain on a miss.
    pub fn bind(&mut self, segments: &[Segment], method: Method, handler: Handler) -> Result<(), RouteError> {
        let node = if self.get_route(segments).is_ok() {
            self.get_route_mut(segments)?
        } else {
            self.add_route(segments)?
        };
        node.add_handler(method, handler)
            .map_err(|e| e.at_path(&join_segments(segments)))
    }

    /// Unbind `method` at `segments` if it is still bound to `handler`.
    /// Nodes are left in place.
    pub fn unbind(&mut self, segments: &[Segment], method: Method, handler: &Handler) -> bool {
        match self.get_route_mut(segments) {
            Ok(node) if node.handlers.get(&method).is_some_and(|bound| bound.same_as(handler)) => {
                node.handlers.remove(&method);
                true
            }
            _ => false,
        }
    }

    /// Detach the node at `segments` if it has no handlers and no children.
    pub fn prune(&mut self, segments: &[Segment]) -> bool {
        let Some((last, parent)) = segments.split_last() else {
            return false;
        };
        let Ok(parent) = self.get_route_mut(parent) else {
            return false;
        };
        if parent.child(last).is_some_and(Route::is_prunable) {
            parent.detach_child(last)
        } else {
            false
        }
    }

    /// Remove the node reached by `segments`, with its whole subtree.
    ///
    /// The root cannot be removed, so an empty path removes nothing. Ancestors
    /// left without handlers or children are pruned.
    pub fn remove_route(&mut self, segments: &[Segment]) -> bool {
        let Some((first, rest)) = segments.split_first() else {
            return false;
        };
        if rest.is_empty() {
            return self.detach_child(first);
        }
        self.modify_child(first, |child| child.remove_route(rest))
    }

    /// Unbind the handler for `method` at `segments`, pruning nodes left empty.
    pub fn remove_handler(&mut self, segments: &[Segment], method: Method) -> bool {
        match segments.split_first() {
            None => self.handlers.remove(&method).is_some(),
            Some((first, rest)) => {
                self.modify_child(first, |child| child.remove_handler(rest, method))
            }
        }
    }

    fn detach_child(&mut self, segment: &Segment) -> bool {
        match segment {
            Segment::Static(literal) => {
                match self.children.iter().position(|c| c.segment == *literal) {
                    Some(index) => {
                        self.children.remove(index);
                        true
                    }
                    None => false,
                }
            }
            Segment::Variable(name) => {
                if self.variable_child.as_ref().is_some_and(|c| c.segment == *name) {
                    self.variable_child = None;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Run `op` on the child matching `segment`; if it reports a change and
    /// leaves the child prunable, detach the child.
    fn modify_child(&mut self, segment: &Segment, op: impl FnOnce(&mut Route) -> bool) -> bool {
        match segment {
            Segment::Static(literal) => {
                let Some(index) = self.children.iter().position(|c| c.segment == *literal) else {
                    return false;
                };
                let changed = op(&mut self.children[index]);
                if changed && self.children[index].is_prunable() {
                    self.children.remove(index);
                }
                changed
            }
            Segment::Variable(name) => {
                let Some(child) = self
                    .variable_child
                    .as_deref_mut()
                    .filter(|c| c.segment == *name)
                else {
                    return false;
                };
                let changed = op(child);
                if changed && child.is_prunable() {
                    self.variable_child = None;
                }
                changed
            }
        }
    }

    /// Resolve request segments to the handler for `method`.
    ///
    /// Each variable node passed on the way records its request segment
    /// (percent-decoded) in `url_data`.
    pub fn resolve(
        &self,
        segments: &[&str],
        method: Method,
        url_data: &mut HashMap<String, String>,
    ) -> Result<&Handler, DispatchError> {
        let Some((first, rest)) = segments.split_first() else {
            return match self.handlers.get(&method) {
                Some(handler) => Ok(handler),
                None if !self.handlers.is_empty() => Err(DispatchError::MethodNotAllowed {
                    allowed: self.allowed_methods(),
                }),
                None => Err(DispatchError::NotFound),
            };
        };

        if let Some(child) = self.children.iter().find(|c| c.segment == *first) {
            return child.resolve(rest, method, url_data);
        }
        if let Some(child) = self.variable_child.as_deref() {
            let value = urlencoding::decode(first)
                .map(Cow::into_owned)
                .unwrap_or_else(|_| (*first).to_string());
            url_data.insert(child.segment.clone(), value);
            return child.resolve(rest, method, url_data);
        }
        Err(DispatchError::NotFound)
    }

    /// Resolve `segments` and run the matched handler with `ctx`.
    pub async fn dispatch(
        &self,
        segments: &[&str],
        method: Method,
        mut ctx: Context,
    ) -> Result<Response, DispatchError> {
        let handler = self.resolve(segments, method, &mut ctx.url_data)?.clone();
        handler.call(ctx).await.map_err(DispatchError::Handler)
    }

    /// Pre-order listing of every node below this one, static children first.
    pub(crate) fn collect(&self, prefix: &str, out: &mut Vec<RouteInfo>) {
        let children = self.children.iter().chain(self.variable_child.as_deref());
        for child in children {
            let path = format!("{prefix}/{}", child.display_segment());
            out.push(RouteInfo {
                path: path.clone(),
                methods: child.allowed_methods(),
            });
            child.collect(&path, out);
        }
    }
}

fn not_found(remaining: &[Segment]) -> RouteError {
    RouteError::RouteNotFound {
        remaining: remaining.iter().map(Segment::to_string).collect(),
    }
}
