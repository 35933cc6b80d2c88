#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}

/// `tuple![a, b, c]` builds a `Node::Tuple` from node handles.
#[macro_export]
macro_rules! tuple {
    ($($node:expr),* $(,)?) => {
        $crate::Node::tuple(vec![ $(::std::sync::Arc::clone(&$node)),* ])
    };
}

/// `resampled!(node)` wraps a node handle in a re-entrant reference.
#[macro_export]
macro_rules! resampled {
    ($node:expr) => {
        $crate::Node::resampled(&$node)
    };
}
