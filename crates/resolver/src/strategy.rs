//! Resolution strategies and the resolver facade

use crate::catalogue::Catalogue;
use crate::legacy::BacktrackingResolver;
use crate::order::Orderer;
use crate::reconcile::reconcile;
use crate::request::Request;
use crate::resolution::Resolution;
use crate::solver::{ConstraintSolver, ReferenceSolver, SolverAdapter};
use plugpm_config::ResolverConfig;
use plugpm_errors::{ResolverError, UserFacingError};
use plugpm_events::{EventEmitter, EventMessage, EventSender, EventSource, ResolverEvent};
use plugpm_types::{package_id, Package, StrategyKind};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Anything that turns a request into a resolution
pub trait Resolver {
    fn resolve(&self, request: &Request) -> Resolution;
}

/// Universe encoding plus an external constraint solver
#[derive(Clone)]
pub struct CudfResolver {
    catalogue: Arc<dyn Catalogue>,
    solver: Arc<dyn ConstraintSolver>,
    events: Option<EventSender>,
}

impl CudfResolver {
    pub fn new(catalogue: Arc<dyn Catalogue>, solver: Arc<dyn ConstraintSolver>) -> Self {
        Self {
            catalogue,
            solver,
            events: None,
        }
    }

    #[must_use]
    pub fn with_event_sender(mut self, events: Option<EventSender>) -> Self {
        self.events = events;
        self
    }
}

impl Resolver for CudfResolver {
    fn resolve(&self, request: &Request) -> Resolution {
        SolverAdapter::new(self.catalogue.as_ref(), self.solver.as_ref())
            .with_event_sender(self.events.clone())
            .resolve(request)
            .unwrap_or_else(Resolution::failed)
    }
}

/// Backtracking over a single root package
#[derive(Clone)]
pub struct LegacyResolver {
    catalogue: Arc<dyn Catalogue>,
    max_depth: usize,
    node_budget: u64,
    events: Option<EventSender>,
}

impl LegacyResolver {
    pub fn new(catalogue: Arc<dyn Catalogue>, max_depth: usize, node_budget: u64) -> Self {
        Self {
            catalogue,
            max_depth,
            node_budget,
            events: None,
        }
    }

    #[must_use]
    pub fn with_event_sender(mut self, events: Option<EventSender>) -> Self {
        self.events = events;
        self
    }
}

impl Resolver for LegacyResolver {
    fn resolve(&self, request: &Request) -> Resolution {
        BacktrackingResolver::new(self.catalogue.as_ref(), self.max_depth, self.node_budget)
            .with_event_sender(self.events.clone())
            .resolve(request)
            .unwrap_or_else(Resolution::failed)
    }
}

/// The configured strategy
#[derive(Clone)]
pub enum Strategy {
    Cudf(CudfResolver),
    Legacy(LegacyResolver),
}

impl Strategy {
    /// Build the strategy `kind` from configuration
    pub fn build(
        kind: StrategyKind,
        config: &ResolverConfig,
        catalogue: Arc<dyn Catalogue>,
        solver: Arc<dyn ConstraintSolver>,
        events: Option<EventSender>,
    ) -> Self {
        match kind {
            StrategyKind::Cudf => {
                Self::Cudf(CudfResolver::new(catalogue, solver).with_event_sender(events))
            }
            StrategyKind::Legacy => Self::Legacy(
                LegacyResolver::new(
                    catalogue,
                    config.resolver.max_depth,
                    config.resolver.solver_node_budget,
                )
                .with_event_sender(events),
            ),
        }
    }

    #[must_use]
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Cudf(_) => StrategyKind::Cudf,
            Self::Legacy(_) => StrategyKind::Legacy,
        }
    }
}

impl Resolver for Strategy {
    fn resolve(&self, request: &Request) -> Resolution {
        match self {
            Self::Cudf(resolver) => resolver.resolve(request),
            Self::Legacy(resolver) => resolver.resolve(request),
        }
    }
}

/// Resolver facade: strategy, categorization, optional dependency
/// reconciliation and ordering
pub struct DependencyResolver {
    config: ResolverConfig,
    catalogue: Arc<dyn Catalogue>,
    solver: Arc<dyn ConstraintSolver>,
    strategy: Strategy,
    events: Option<EventSender>,
}

impl DependencyResolver {
    /// Resolver using the configured strategy and the bundled solver
    pub fn new(config: &ResolverConfig, catalogue: Arc<dyn Catalogue>) -> Self {
        let solver: Arc<dyn ConstraintSolver> =
            Arc::new(ReferenceSolver::new(config.resolver.solver_node_budget));
        let strategy = Strategy::build(
            config.strategy(),
            config,
            catalogue.clone(),
            solver.clone(),
            None,
        );
        Self {
            config: config.clone(),
            catalogue,
            solver,
            strategy,
            events: None,
        }
    }

    /// Set event sender for progress reporting
    #[must_use]
    pub fn with_event_sender(mut self, sender: EventSender) -> Self {
        self.events = Some(sender);
        self.rebuild();
        self
    }

    /// Swap the constraint solver used by the cudf strategy
    #[must_use]
    pub fn with_solver(mut self, solver: Arc<dyn ConstraintSolver>) -> Self {
        self.solver = solver;
        self.rebuild();
        self
    }

    /// Switch strategy regardless of configuration
    #[must_use]
    pub fn with_strategy(mut self, kind: StrategyKind) -> Self {
        self.config.resolver.strategy = kind;
        self.rebuild();
        self
    }

    fn rebuild(&mut self) {
        self.strategy = Strategy::build(
            self.config.strategy(),
            &self.config,
            self.catalogue.clone(),
            self.solver.clone(),
            self.events.clone(),
        );
    }

    #[must_use]
    pub fn strategy(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// An empty request carrying the configured snapshot and keep defaults
    #[must_use]
    pub fn request(&self) -> Request {
        Request::new()
            .allow_snapshot(self.config.resolver.allow_snapshot)
            .keep(self.config.resolver.keep)
    }

    fn sequence(
        &self,
        resolution: Resolution,
        events: &RequestEvents<'_>,
    ) -> Result<Resolution, ResolverError> {
        let installed = self.catalogue.list_installed_packages();
        let reconciliation = reconcile(
            &installed,
            &resolution.install_ids(),
            &resolution.removal_ids(),
            |id| self.catalogue.get_package(id),
        );
        for (package, trigger) in &reconciliation.forced {
            events.emit_with_meta(EventMessage::from_source(
                ResolverEvent::ForcedReinstall {
                    package: package.clone(),
                    trigger: trigger.clone(),
                },
                EventSource::ORDERING,
            ));
        }

        let orderer = self
            .refreshed_packages(&resolution)
            .into_iter()
            .fold(Orderer::new(self.catalogue.as_ref()), Orderer::with_package);
        let install =
            orderer.order_install(&reconciliation.to_install, &reconciliation.to_remove)?;
        for (package, dependency) in &install.unmet_optional {
            events.emit_with_meta(EventMessage::from_source(
                ResolverEvent::UnmetOptionalDependency {
                    package: package.clone(),
                    dependency: dependency.clone(),
                },
                EventSource::ORDERING,
            ));
        }
        let remove = orderer.order_remove(&reconciliation.to_remove)?;

        Ok(resolution.with_order(install.ordered, remove, reconciliation.forced))
    }

    /// Remote builds of the refreshed SNAPSHOTs, whose declarations replace
    /// the installed copies for ordering
    fn refreshed_packages(&self, resolution: &Resolution) -> Vec<Package> {
        resolution
            .selected_versions()
            .iter()
            .filter(|(name, version)| {
                resolution
                    .refreshed_ids()
                    .contains(&package_id(name, version))
            })
            .filter_map(|(name, version)| {
                self.catalogue
                    .find_remote_packages(name)
                    .into_iter()
                    .find(|pkg| &pkg.version == version)
            })
            .collect()
    }

    fn failed(resolution: Resolution, events: &RequestEvents<'_>) -> Resolution {
        let message = resolution.failure_message().unwrap_or_default().to_string();
        warn!(%message, request = %events.correlation_id, "dependency resolution failed");
        events.emit(ResolverEvent::ResolutionFailed {
            message,
            code: resolution
                .failure()
                .and_then(UserFacingError::user_code)
                .map(str::to_string),
        });
        resolution
    }
}

/// Emitter for one resolve call: every event carries the request's
/// correlation id and the strategy label
struct RequestEvents<'r> {
    sender: Option<&'r EventSender>,
    correlation_id: String,
    strategy: StrategyKind,
}

impl EventEmitter for RequestEvents<'_> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.sender
    }

    fn emit_with_meta(&self, mut message: EventMessage) {
        message.meta = message
            .meta
            .with_correlation_id(self.correlation_id.clone())
            .with_label("strategy", self.strategy.to_string());
        if let Some(sender) = self.sender {
            // receiver may be gone
            let _ = sender.send(message);
        }
    }
}

impl Resolver for DependencyResolver {
    fn resolve(&self, request: &Request) -> Resolution {
        let started = Instant::now();
        let events = RequestEvents {
            sender: self.events.as_ref(),
            correlation_id: Uuid::new_v4().to_string(),
            strategy: self.strategy.kind(),
        };
        events.emit(ResolverEvent::ResolutionStarted {
            install: request.install.clone(),
            remove: request.remove.clone(),
            upgrade: request.upgrade.clone(),
            strategy: self.strategy.kind().to_string(),
        });
        debug!(
            strategy = %self.strategy.kind(),
            request_id = %events.correlation_id,
            ?request,
            "resolving"
        );

        let resolution = self.strategy.resolve(request);
        if resolution.is_failed() {
            return Self::failed(resolution, &events);
        }
        let resolution = resolution.categorize(self.catalogue.as_ref());
        if resolution.is_failed() {
            return Self::failed(resolution, &events);
        }

        let resolution = match self.sequence(resolution, &events) {
            Ok(resolution) => resolution,
            Err(err) => return Self::failed(Resolution::failed(err), &events),
        };

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            install = ?resolution.ordered_install(),
            remove = ?resolution.ordered_remove(),
            fallback = resolution.is_fallback(),
            duration_ms,
            request_id = %events.correlation_id,
            "dependency resolution complete"
        );
        events.emit(ResolverEvent::ResolutionCompleted {
            to_install: resolution.ordered_install().to_vec(),
            to_remove: resolution.ordered_remove().to_vec(),
            fallback: resolution.is_fallback(),
            duration_ms,
        });
        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::MemoryCatalogue;
    use plugpm_types::{Package, PackageDependency, PackageState, Version};

    fn pkg(name: &str, version: &str) -> Package {
        Package::new(name, Version::parse(version).unwrap())
    }

    fn catalogue() -> Arc<dyn Catalogue> {
        Arc::new(MemoryCatalogue::new(
            vec![pkg("base", "1.0").with_state(PackageState::Installed)],
            vec![
                pkg("app", "1.0")
                    .with_dependency(PackageDependency::parse("lib").unwrap())
                    .with_dependency(PackageDependency::parse("base").unwrap()),
                pkg("lib", "1.0"),
            ],
        ))
    }

    #[test]
    fn test_strategy_follows_config() {
        let mut config = ResolverConfig::default();
        assert_eq!(
            DependencyResolver::new(&config, catalogue()).strategy(),
            StrategyKind::Cudf
        );
        config.resolver.strategy = StrategyKind::Legacy;
        assert_eq!(
            DependencyResolver::new(&config, catalogue()).strategy(),
            StrategyKind::Legacy
        );
    }

    #[test]
    fn test_both_strategies_agree_on_simple_install() {
        for kind in [StrategyKind::Cudf, StrategyKind::Legacy] {
            let resolver =
                DependencyResolver::new(&ResolverConfig::default(), catalogue()).with_strategy(kind);
            let resolution = resolver.resolve(&resolver.request().with_install(["app-1.0.0"]));
            assert!(resolution.is_validated(), "{kind}: {resolution}");
            assert_eq!(
                resolution.ordered_install(),
                ["lib-1.0.0", "app-1.0.0"],
                "{kind}"
            );
            assert!(resolution.ordered_remove().is_empty());
        }
    }

    #[test]
    fn test_failure_becomes_failed_resolution() {
        let resolver = DependencyResolver::new(&ResolverConfig::default(), catalogue());
        let resolution = resolver.resolve(&Request::new().with_install(["ghost"]));
        assert!(resolution.is_failed());
        assert_eq!(
            resolution.failure(),
            Some(&ResolverError::UnknownPackage {
                package: "ghost".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_events_emitted() {
        let (tx, mut rx) = plugpm_events::channel();
        let resolver =
            DependencyResolver::new(&ResolverConfig::default(), catalogue()).with_event_sender(tx);
        let resolution = resolver.resolve(&Request::new().with_install(["app-1.0.0"]));
        assert!(resolution.is_validated());
        drop(resolver);

        let mut events = Vec::new();
        while let Some(message) = rx.recv().await {
            events.push(message.event);
        }
        assert!(matches!(
            events.first(),
            Some(ResolverEvent::ResolutionStarted { strategy, .. }) if strategy == "cudf"
        ));
        assert!(matches!(
            events.last(),
            Some(ResolverEvent::ResolutionCompleted { fallback: false, .. })
        ));
    }

    #[tokio::test]
    async fn test_events_share_request_correlation() {
        let (tx, mut rx) = plugpm_events::channel();
        let resolver =
            DependencyResolver::new(&ResolverConfig::default(), catalogue()).with_event_sender(tx);
        resolver.resolve(&Request::new().with_install(["app-1.0.0"]));
        resolver.resolve(&Request::new().with_install(["app-1.0.0"]));
        drop(resolver);

        let mut correlations = Vec::new();
        while let Some(message) = rx.recv().await {
            // strategy-level diagnostics are not request scoped
            let Some(id) = message.meta.correlation_id else {
                continue;
            };
            assert_eq!(
                message.meta.labels.get("strategy").map(String::as_str),
                Some("cudf")
            );
            if matches!(message.event, ResolverEvent::ResolutionStarted { .. }) {
                correlations.push(Vec::new());
            }
            if let Some(current) = correlations.last_mut() {
                current.push(id);
            }
        }
        assert_eq!(correlations.len(), 2);
        for ids in &correlations {
            assert!(ids.len() >= 2);
            assert!(ids.iter().all(|id| id == &ids[0]));
        }
        assert_ne!(correlations[0][0], correlations[1][0]);
    }

    #[tokio::test]
    async fn test_failure_event_carries_code() {
        let (tx, mut rx) = plugpm_events::channel();
        let resolver = DependencyResolver::new(&ResolverConfig::default(), catalogue())
            .with_strategy(StrategyKind::Legacy)
            .with_event_sender(tx);
        let resolution =
            resolver.resolve(&Request::new().with_install(["app-1.0.0"]).with_remove(["lib"]));
        assert!(resolution.is_failed());
        drop(resolver);

        let mut last = None;
        while let Some(message) = rx.recv().await {
            last = Some(message.event);
        }
        assert!(matches!(
            last,
            Some(ResolverEvent::ResolutionFailed { code: Some(ref code), .. })
                if code == "resolver.unsupported_request"
        ));
    }
}
