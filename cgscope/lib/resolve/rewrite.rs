//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// An image reference ready to be pulled from outside the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullTarget {
    /// The reference to pull.
    pub reference: String,

    /// Whether the registry's certificate must not be verified.
    pub insecure: bool,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Points references at the internal registry service to its external route.
///
/// The registry segment is everything before the first `/` and must equal `internal_registry`
/// exactly. Without a route, or for any other registry, the reference is returned unchanged.
pub fn rewrite(
    reference: &str,
    internal_registry: &str,
    external_route: Option<&str>,
) -> PullTarget {
    let route = external_route.map(str::trim).filter(|route| !route.is_empty());

    match (route, reference.split_once('/')) {
        (Some(route), Some((registry, remainder))) if registry == internal_registry => {
            tracing::debug!("rewriting {reference} through registry route {route}");
            PullTarget {
                reference: format!("{route}/{remainder}"),
                insecure: true,
            }
        }
        _ => PullTarget {
            reference: reference.to_string(),
            insecure: false,
        },
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::config::DEFAULT_INTERNAL_REGISTRY;

    use super::*;

    const ROUTE: &str = "default-route-openshift-image-registry.apps.demo.example.com";

    #[test]
    fn test_internal_references_are_rewritten() {
        let target = rewrite(
            "image-registry.openshift-image-registry.svc:5000/shop/web@sha256:ab12",
            DEFAULT_INTERNAL_REGISTRY,
            Some(ROUTE),
        );

        assert_eq!(target.reference, format!("{ROUTE}/shop/web@sha256:ab12"));
        assert!(target.insecure);
    }

    #[test]
    fn test_other_references_are_unchanged() {
        for reference in [
            "quay.io/org/web:1",
            "nginx",
            "library/nginx:latest",
            "image-registry.openshift-image-registry.svc:5001/shop/web:1",
            "image-registry.openshift-image-registry.svc/shop/web:1",
        ] {
            let target = rewrite(reference, DEFAULT_INTERNAL_REGISTRY, Some(ROUTE));
            assert_eq!(target.reference, reference);
            assert!(!target.insecure);
        }
    }

    #[test]
    fn test_missing_route_is_a_no_op() {
        let reference = "image-registry.openshift-image-registry.svc:5000/shop/web:1";
        for route in [None, Some(""), Some("  ")] {
            let target = rewrite(reference, DEFAULT_INTERNAL_REGISTRY, route);
            assert_eq!(target.reference, reference);
            assert!(!target.insecure);
        }
    }
}
