use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Node;

use crate::handler::DynHandler;

/// The route table: one radix tree per method, with the finalized handler
/// chain stored at each leaf. Pattern matching and parameter extraction are
/// `matchit`'s job; this wrapper only discriminates the outcome.
pub(crate) struct Router {
    routes: HashMap<Method, Node<Arc<Vec<DynHandler>>>>,
}

pub(crate) enum Lookup {
    /// A route matched: its frozen chain and the extracted parameters.
    Route {
        handlers: Arc<Vec<DynHandler>>,
        params: Vec<(String, String)>,
    },
    NotFound,
    /// The path is known under other methods.
    MethodNotAllowed { allowed: String },
    /// The path matches a registered pattern up to a trailing slash.
    Redirect { location: String },
}

impl Router {
    pub(crate) fn new() -> Self {
        Self {
            routes: HashMap::with_capacity(6),
        }
    }

    pub(crate) fn route(
        &mut self,
        method: Method,
        pattern: &str,
        chain: Arc<Vec<DynHandler>>,
    ) -> Result<(), matchit::InsertError> {
        self.routes.entry(method).or_default().insert(pattern, chain)
    }

    pub(crate) fn lookup(&self, method: &Method, path: &str) -> Lookup {
        let node = match self.routes.get(method) {
            Some(node) => node,
            None => return self.miss(path),
        };

        match node.at(path) {
            Ok(matched) => Lookup::Route {
                handlers: Arc::clone(matched.value),
                params: matched
                    .params
                    .iter()
                    .map(|(key, value)| (key.to_owned(), value.to_owned()))
                    .collect(),
            },
            Err(err) if err.tsr() && *method != Method::CONNECT => Lookup::Redirect {
                location: toggle_trailing_slash(path),
            },
            Err(_) => self.miss(path),
        }
    }

    fn miss(&self, path: &str) -> Lookup {
        let allowed = self.allowed(path);

        if allowed.is_empty() {
            Lookup::NotFound
        } else {
            Lookup::MethodNotAllowed { allowed }
        }
    }

    /// The methods under which `path` is routable, for the `Allow` header.
    fn allowed(&self, path: &str) -> String {
        let mut methods: Vec<&str> = self
            .routes
            .iter()
            .filter(|(_, node)| node.at(path).is_ok())
            .map(|(method, _)| method.as_str())
            .collect();

        methods.sort_unstable();
        methods.join(", ")
    }
}

fn toggle_trailing_slash(path: &str) -> String {
    match path.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() => stripped.to_owned(),
        _ => format!("{}/", path),
    }
}
