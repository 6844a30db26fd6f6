//! Namespace-qualified path segments.
//!
//! A path is a `/`-separated list of steps. Each step is one of:
//!
//! ```text
//! local            element with this local name and no namespace
//! prefix:local     namespace looked up in a Namespaces map
//! {uri}local       Clark notation
//! *:local          any namespace
//! ```

/// Prefix-to-URI map used to resolve `prefix:local` steps.
#[derive(Debug, Clone, Copy)]
pub struct Namespaces(pub &'static [(&'static str, &'static str)]);

impl Namespaces {
    /// Map without any prefixes.
    pub const EMPTY: Namespaces = Namespaces(&[]);

    /// Resolve a prefix to its URI.
    pub fn resolve(&self, prefix: &str) -> Option<&'static str> {
        self.0
            .iter()
            .find(|(p, _)| *p == prefix)
            .map(|(_, uri)| *uri)
    }
}

/// Namespace constraint of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NsMatch<'a> {
    /// Element must have no namespace.
    None,
    /// Element must be in this namespace.
    Uri(&'a str),
    /// Any namespace.
    Any,
}

/// One parsed step of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Step<'a> {
    pub ns: NsMatch<'a>,
    pub local: &'a str,
}

impl<'a> Step<'a> {
    /// Parse a single step. Unknown prefixes yield `None` so the lookup
    /// simply finds nothing.
    pub fn parse(step: &'a str, namespaces: &Namespaces) -> Option<Step<'a>> {
        if let Some(rest) = step.strip_prefix('{') {
            let (uri, local) = rest.split_once('}')?;
            let ns = if uri == "*" {
                NsMatch::Any
            } else {
                NsMatch::Uri(uri)
            };
            return Some(Step { ns, local });
        }

        match step.split_once(':') {
            Some(("*", local)) => Some(Step {
                ns: NsMatch::Any,
                local,
            }),
            Some((prefix, local)) => Some(Step {
                ns: NsMatch::Uri(namespaces.resolve(prefix)?),
                local,
            }),
            None => Some(Step {
                ns: NsMatch::None,
                local: step,
            }),
        }
    }

    pub fn matches(&self, namespace: Option<&str>, local: &str) -> bool {
        if self.local != local {
            return false;
        }
        match (&self.ns, namespace) {
            (NsMatch::Any, _) => true,
            (NsMatch::None, None) => true,
            (NsMatch::Uri(uri), Some(ns)) => *uri == ns,
            _ => false,
        }
    }
}

/// Split a path into steps, failing if any prefix is unknown.
pub(crate) fn parse_path<'a>(path: &'a str, namespaces: &Namespaces) -> Option<Vec<Step<'a>>> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| Step::parse(s, namespaces))
        .collect()
}
