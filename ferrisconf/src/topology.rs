//! Links between device interfaces.
//!
//! The topology only holds device ids and interface names; it never owns a
//! session. Links are undirected and stored with their ports ordered.

use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::DeviceId;

/// One end of a link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Port {
    pub device: DeviceId,
    pub interface: String,
}

impl Port {
    pub fn new(device: impl Into<DeviceId>, interface: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            interface: interface.into(),
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device, self.interface)
    }
}

/// An undirected link; `a <= b` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    a: Port,
    b: Port,
}

impl Link {
    pub fn new(a: Port, b: Port) -> Result<Self> {
        if a == b {
            return Err(Error::invalid(format!("cannot link {} to itself", a)));
        }
        Ok(if a <= b { Self { a, b } } else { Self { a: b, b: a } })
    }

    pub fn ports(&self) -> (&Port, &Port) {
        (&self.a, &self.b)
    }

    pub fn touches(&self, device: &DeviceId) -> bool {
        self.a.device == *device || self.b.device == *device
    }

    /// The port on the other side of `port`, if `port` is an end of this link.
    pub fn peer_of(&self, port: &Port) -> Option<&Port> {
        if *port == self.a {
            Some(&self.b)
        } else if *port == self.b {
            Some(&self.a)
        } else {
            None
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {}", self.a, self.b)
    }
}

/// Set of links, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    links: IndexSet<Link>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a link. A port may belong to one link only.
    pub fn link(&mut self, a: Port, b: Port) -> Result<Link> {
        let link = Link::new(a, b)?;
        if self.links.contains(&link) {
            return Ok(link);
        }
        let (a, b) = link.ports();
        for port in [a, b] {
            if let Some(existing) = self.link_of(port) {
                return Err(Error::invalid(format!("{} is already linked ({})", port, existing)));
            }
        }
        self.links.insert(link.clone());
        Ok(link)
    }

    /// Remove the link between `a` and `b`. Returns whether it existed.
    pub fn unlink(&mut self, a: Port, b: Port) -> bool {
        match Link::new(a, b) {
            Ok(link) => self.links.shift_remove(&link),
            Err(_) => false,
        }
    }

    /// Drop every link touching `device`. Returns how many.
    pub fn remove_device(&mut self, device: &DeviceId) -> usize {
        let before = self.links.len();
        self.links.retain(|l| !l.touches(device));
        before - self.links.len()
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.iter()
    }

    pub fn links_of<'a>(&'a self, device: &'a DeviceId) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.iter().filter(move |l| l.touches(device))
    }

    pub fn link_of(&self, port: &Port) -> Option<&Link> {
        self.links.iter().find(|l| l.peer_of(port).is_some())
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links_are_undirected() {
        let mut topology = Topology::new();
        let link = topology
            .link(Port::new("r2", "Gi2"), Port::new("r1", "Gi2"))
            .unwrap();
        assert_eq!(link.ports().0.device.as_str(), "r1");
        assert_eq!(link.to_string(), "r1:Gi2 <-> r2:Gi2");

        // same link in the other direction is a no-op
        topology.link(Port::new("r1", "Gi2"), Port::new("r2", "Gi2")).unwrap();
        assert_eq!(topology.len(), 1);
        assert_eq!(
            link.peer_of(&Port::new("r2", "Gi2")),
            Some(&Port::new("r1", "Gi2"))
        );
    }

    #[test]
    fn test_port_used_once() {
        let mut topology = Topology::new();
        topology.link(Port::new("r1", "Gi2"), Port::new("r2", "Gi2")).unwrap();
        assert!(topology.link(Port::new("r1", "Gi2"), Port::new("r3", "Gi1")).is_err());
        assert!(topology.link(Port::new("r1", "Gi3"), Port::new("r1", "Gi3")).is_err());
    }

    #[test]
    fn test_unlink_and_remove_device() {
        let mut topology = Topology::new();
        topology.link(Port::new("r1", "Gi2"), Port::new("r2", "Gi2")).unwrap();
        topology.link(Port::new("r1", "Gi3"), Port::new("r3", "Gi2")).unwrap();
        topology.link(Port::new("r2", "Gi3"), Port::new("r3", "Gi3")).unwrap();

        let r1 = DeviceId::new("r1");
        assert_eq!(topology.links_of(&r1).count(), 2);
        assert!(topology.unlink(Port::new("r2", "Gi2"), Port::new("r1", "Gi2")));
        assert!(!topology.unlink(Port::new("r2", "Gi2"), Port::new("r1", "Gi2")));
        assert_eq!(topology.remove_device(&DeviceId::new("r3")), 2);
        assert!(topology.is_empty());
    }
}
