//! Exact-literal route table for one listening port.
//!
//! Paths are compared byte for byte against the request path; there
//! are no parameters, wildcards or prefixes. Methods are compared
//! exactly as written in the config (case-sensitive).

use std::collections::HashMap;

use crate::config::model::RouteSpec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub method: String,
    pub target: String,
}

/// Outcome of looking up a request in a [`RouteTable`].
#[derive(Debug, PartialEq, Eq)]
pub enum Dispatch<'a> {
    NotFound,
    MethodNotAllowed { allowed: &'a str },
    Forward(&'a Route),
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, Route>,
}

impl RouteTable {
    #[must_use]
    pub fn from_specs(specs: &[RouteSpec]) -> Self {
        let routes = specs
            .iter()
            .map(|spec| {
                (
                    spec.path.clone(),
                    Route {
                        method: spec.method.clone(),
                        target: spec.target.clone(),
                    },
                )
            })
            .collect();
        Self { routes }
    }

    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<&Route> {
        self.routes.get(path)
    }

    #[must_use]
    pub fn dispatch(&self, method: &str, path: &str) -> Dispatch<'_> {
        match self.lookup(path) {
            None => Dispatch::NotFound,
            Some(route) if route.method != method => Dispatch::MethodNotAllowed {
                allowed: &route.method,
            },
            Some(route) => Dispatch::Forward(route),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
