use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Declare a process-unique identifier type for an engine resource.
macro_rules! engine_id {
    ($name:ident, $label:literal) => {
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            /// Allocate the next id of this kind
            pub fn next() -> Self {
                static NEXT: AtomicU64 = AtomicU64::new(1);
                Self(NEXT.fetch_add(1, Ordering::Relaxed))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

engine_id!(LayerId, "layer");
engine_id!(FeatureId, "feature");
engine_id!(InteractionId, "interaction");
engine_id!(OverlayId, "overlay");
engine_id!(ListenerKey, "listener");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_per_kind() {
        let a = LayerId::next();
        let b = LayerId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn display_includes_kind() {
        assert_eq!(OverlayId(7).to_string(), "overlay#7");
        assert_eq!(LayerId(3).to_string(), "layer#3");
    }
}
