/// Path prefixes excluded from instrumentation.
///
/// Matching is per path segment: `/analytics` covers `/analytics` and
/// `/analytics/metrics` but not `/analyticsfoo`.
#[derive(Debug, Clone, Default)]
pub struct ExemptPaths {
    prefixes: Vec<String>,
}

impl ExemptPaths {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let prefixes = prefixes
            .into_iter()
            .map(|p| {
                let p = p.as_ref().trim().trim_end_matches('/');
                if p.starts_with('/') || p.is_empty() {
                    p.to_string()
                } else {
                    format!("/{p}")
                }
            })
            .collect();

        Self { prefixes }
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.prefixes.iter().any(|prefix| {
            path.strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_matches_whole_segments() {
        let exempt = ExemptPaths::new(["/analytics"]);

        assert!(exempt.is_exempt("/analytics"));
        assert!(exempt.is_exempt("/analytics/"));
        assert!(exempt.is_exempt("/analytics/metrics"));
        assert!(!exempt.is_exempt("/analyticsfoo"));
        assert!(!exempt.is_exempt("/"));
        assert!(!exempt.is_exempt("/api/analytics"));
    }

    #[test]
    fn test_prefixes_are_normalized() {
        let exempt = ExemptPaths::new(["dashboard/", " /health "]);

        assert_eq!(exempt.prefixes(), ["/dashboard", "/health"]);
        assert!(exempt.is_exempt("/dashboard/index.html"));
        assert!(exempt.is_exempt("/health"));
    }

    #[test]
    fn test_root_prefix_exempts_everything() {
        let exempt = ExemptPaths::new(["/"]);
        assert!(exempt.is_exempt("/"));
        assert!(exempt.is_exempt("/anything"));
    }

    #[test]
    fn test_no_prefixes_exempts_nothing() {
        let exempt = ExemptPaths::new(Vec::<String>::new());
        assert!(!exempt.is_exempt("/analytics"));
    }
}
