//! Foreign object kinds

use std::fmt;

/// Kind of foreign object a handle owns
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// The event loop
    MainLoop,
    /// Library context bound to a loop
    Context,
    /// Connection to the server (the "core" proxy)
    Core,
    /// Registry proxy enumerating server objects
    Registry,
    /// Proxy bound to a single server node
    Node,
}

impl HandleKind {
    /// Position in the construction chain. Kinds with a higher depth
    /// must be released before any kind with a lower depth.
    pub fn depth(self) -> u8 {
        match self {
            HandleKind::MainLoop => 0,
            HandleKind::Context => 1,
            HandleKind::Core => 2,
            HandleKind::Registry => 3,
            HandleKind::Node => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HandleKind::MainLoop => "main-loop",
            HandleKind::Context => "context",
            HandleKind::Core => "core",
            HandleKind::Registry => "registry",
            HandleKind::Node => "node",
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_depth_ordering() {
        let chain = [
            HandleKind::MainLoop,
            HandleKind::Context,
            HandleKind::Core,
            HandleKind::Registry,
            HandleKind::Node,
        ];
        for pair in chain.windows(2) {
            assert!(pair[0].depth() < pair[1].depth());
        }
    }
}
