//! Integration tests for types

#[cfg(test)]
mod tests {
    use plugpm_types::*;
    use std::str::FromStr;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_version_range_inclusive() {
        let range = VersionRange::parse("1.0.0:2.0.0").unwrap();

        assert!(range.matches(&v("1.0.0")));
        assert!(range.matches(&v("1.5.0")));
        assert!(range.matches(&v("2.0.0")));
        assert!(!range.matches(&v("0.9.9")));
        assert!(!range.matches(&v("2.0.1")));
    }

    #[test]
    fn test_dependency_with_range() {
        let dep = PackageDependency::from_str("nuxeo-jsf-ui:9.10.0:9.10.0").unwrap();
        assert_eq!(dep.name, "nuxeo-jsf-ui");

        assert!(dep.matches("nuxeo-jsf-ui", &v("9.10.0")));
        assert!(!dep.matches("nuxeo-jsf-ui", &v("9.10.0-HF01")));
        assert!(!dep.matches("nuxeo-web-ui", &v("9.10.0")));
    }

    #[test]
    fn test_package_state_serialization() {
        let json = serde_json::to_string(&PackageState::Downloaded).unwrap();
        assert_eq!(json, r#""downloaded""#);
        let kind: PackageType = serde_json::from_str(r#""hot_fix""#).unwrap();
        assert_eq!(kind, PackageType::HotFix);
    }

    #[test]
    fn test_package_round_trip_through_json() {
        let pkg = Package::new("test-opt-dep4", v("1.0.0"))
            .with_optional_dependency(PackageDependency::parse("zz-nuxeo-jsf-ui").unwrap())
            .with_platform_range("server", "[9.10,10.10]")
            .with_state(PackageState::Downloaded);
        let json = serde_json::to_string(&pkg).unwrap();
        let back: Package = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pkg);
        assert!(back.is_local());
    }

    #[test]
    fn test_platform_compatibility() {
        let pkg = Package::new("addon", v("1.0.0")).with_target_platforms(["server-10.10*"]);
        let platform = PlatformId::parse("server-10.10-HF05").unwrap();
        assert!(is_compatible(&pkg, &platform));

        let old = PlatformId::parse("server-9.10").unwrap();
        assert!(!is_compatible(&pkg, &old));
    }

    #[test]
    fn test_strategy_kind_parsing() {
        assert_eq!(StrategyKind::from_str("CUDF").unwrap(), StrategyKind::Cudf);
        assert_eq!(StrategyKind::from_str("p2cudf").unwrap(), StrategyKind::Cudf);
        assert_eq!(StrategyKind::from_str("legacy").unwrap(), StrategyKind::Legacy);
        assert!(StrategyKind::from_str("sat").is_err());
        assert_eq!(StrategyKind::Legacy.to_string(), "legacy");
    }
}
