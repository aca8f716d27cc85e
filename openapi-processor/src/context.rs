use crate::report::{ProcessingReport, ProcessingSummary};
use permit_api::models::{Role, UrlMapping};
use permit_api::PermitApi;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, error, warn};

/// Mutable reconciliation state for one processing run.
///
/// Built once per run, owned by the pipeline that created it and turned into
/// a [`ProcessingReport`] when the run finishes.
#[derive(Debug, Default)]
pub struct ProcessorContext {
    /// Resource keys created or confirmed in this run
    pub resources: HashSet<String>,
    /// Resource key to the action keys created or confirmed for it
    pub actions: HashMap<String, BTreeSet<String>>,
    /// Role keys processed
    pub roles: HashSet<String>,
    /// `resource#role` to whether the resource role exists remotely
    pub resource_roles: HashMap<String, bool>,
    /// `object_resource#key` to the subject resource the relation points at
    pub relations: HashMap<String, String>,
    /// `resource#role#relation` keys of derived roles processed
    pub derived_roles: HashSet<String>,
    /// Mappings to push once every resource and action is in place
    pub mappings: Vec<UrlMapping>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Remote resource keys, fetched once at the start of the run
    pub existing_resources: HashSet<String>,
    /// Remote roles by key, fetched once at the start of the run
    pub existing_roles: HashMap<String, Role>,
    /// Prefix for every emitted mapping URL
    pub base_url: String,
}

impl ProcessorContext {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Snapshot the remote resources and roles.
    ///
    /// A failed listing only costs the create-vs-update shortcut: creates of
    /// entities that already exist fall back to updates on conflict.
    pub async fn seed(&mut self, api: &dyn PermitApi) {
        match api.list_resources().await {
            Ok(resources) => {
                self.existing_resources = resources.into_iter().map(|r| r.key).collect();
                debug!("Found {} existing resource(s)", self.existing_resources.len());
            }
            Err(e) => self.warn(format!("Could not list existing resources: {}", e)),
        }

        match api.list_roles().await {
            Ok(roles) => {
                self.existing_roles = roles.into_iter().map(|r| (r.key.clone(), r)).collect();
                debug!("Found {} existing role(s)", self.existing_roles.len());
            }
            Err(e) => self.warn(format!("Could not list existing roles: {}", e)),
        }
    }

    /// Mark a resource as processed and give it an empty action set.
    ///
    /// Returns false when the resource was already registered in this run.
    pub fn register_resource(&mut self, key: &str) -> bool {
        if !self.resources.insert(key.to_string()) {
            return false;
        }
        self.actions.insert(key.to_string(), BTreeSet::new());
        true
    }

    pub fn has_action(&self, resource: &str, action: &str) -> bool {
        self.actions
            .get(resource)
            .is_some_and(|actions| actions.contains(action))
    }

    pub fn record_action(&mut self, resource: &str, action: &str) {
        self.actions
            .entry(resource.to_string())
            .or_default()
            .insert(action.to_string());
    }

    /// Record a failed remote write
    pub fn error(&mut self, message: String) {
        error!("{}", message);
        self.errors.push(message);
    }

    /// Record a skipped or best-effort step
    pub fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn summary(&self) -> ProcessingSummary {
        ProcessingSummary {
            resources: self.resources.len(),
            actions: self.actions.values().map(BTreeSet::len).sum(),
            roles: self.roles.len(),
            resource_roles: self.resource_roles.len(),
            relations: self.relations.len(),
            derived_roles: self.derived_roles.len(),
            url_mappings: self.mappings.len(),
        }
    }

    pub fn into_report(self, execution_time_ms: u128) -> ProcessingReport {
        ProcessingReport {
            summary: self.summary(),
            errors: self.errors,
            warnings: self.warnings,
            execution_time_ms,
        }
    }
}
