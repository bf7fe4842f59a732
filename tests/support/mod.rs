//! In-memory cluster used by the reconciliation stories
//!
//! `FakeCluster` behaves like the parts of the API server the engine relies
//! on: creates are unique per identity, replaces are checked against the
//! stored resourceVersion, and deleting an App cascades to every object it
//! controls, the way the garbage collector would.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::error::ErrorResponse;
use kube::ResourceExt;
use tokio::sync::Barrier;

use ingress_manager::builder::{DependentKind, DependentResource};
use ingress_manager::cluster::ClusterApi;
use ingress_manager::crd::{App, AppSpec, IngressSpec};
use ingress_manager::Error;

/// A mutation that reached the fake's store
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Call {
    Create(DependentKind),
    Update(DependentKind),
    Delete(DependentKind),
}

type Key = (DependentKind, String, String);

#[derive(Default)]
struct State {
    apps: HashMap<(String, String), App>,
    objects: HashMap<Key, DependentResource>,
    next_version: u64,
    calls: Vec<Call>,
    fail_next_create: HashMap<DependentKind, Error>,
    fail_next_get: HashMap<DependentKind, Error>,
    race_next_update: HashSet<DependentKind>,
}

impl State {
    fn bump(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }
}

#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<State>,
    create_gate: Option<Barrier>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every create until `parties` creates are waiting, so concurrent
    /// passes all observe the dependent as absent before any of them writes
    pub fn with_create_gate(parties: usize) -> Self {
        Self {
            create_gate: Some(Barrier::new(parties)),
            ..Self::default()
        }
    }

    /// Store an App, assigning the uid and resourceVersion the API server would
    pub fn put_app(&self, mut app: App) -> App {
        let mut state = self.state.lock().unwrap();
        let ns = app.namespace().unwrap_or_else(|| "default".to_string());
        let name = app.name_any();
        app.metadata.namespace = Some(ns.clone());
        app.metadata.uid = Some(format!("uid-{ns}-{name}"));
        app.metadata.resource_version = Some(state.bump());
        state.apps.insert((ns, name), app.clone());
        app
    }

    /// Change an App's spec in place
    pub fn edit_app(&self, ns: &str, name: &str, edit: impl FnOnce(&mut AppSpec)) {
        let mut state = self.state.lock().unwrap();
        let version = state.bump();
        let app = state
            .apps
            .get_mut(&(ns.to_string(), name.to_string()))
            .expect("app exists");
        edit(&mut app.spec);
        app.metadata.resource_version = Some(version);
    }

    /// Delete an App and cascade to everything it controls
    pub fn delete_app(&self, ns: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        let Some(app) = state.apps.remove(&(ns.to_string(), name.to_string())) else {
            return;
        };
        let uid = app.uid();
        state.objects.retain(|_, obj| {
            !obj.meta()
                .owner_references
                .iter()
                .flatten()
                .any(|r| Some(&r.uid) == uid.as_ref() && r.controller == Some(true))
        });
    }

    pub fn dependent(
        &self,
        kind: DependentKind,
        ns: &str,
        name: &str,
    ) -> Option<DependentResource> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .get(&(kind, ns.to_string(), name.to_string()))
            .cloned()
    }

    pub fn exists(&self, kind: DependentKind, ns: &str, name: &str) -> bool {
        self.dependent(kind, ns, name).is_some()
    }

    pub fn object_count(&self) -> usize {
        self.state.lock().unwrap().objects.len()
    }

    /// Change the live workload's image behind the operator's back
    pub fn set_live_image(&self, ns: &str, name: &str, image: &str) {
        let mut state = self.state.lock().unwrap();
        let version = state.bump();
        let key = (DependentKind::Workload, ns.to_string(), name.to_string());
        let Some(DependentResource::Workload(deployment)) = state.objects.get_mut(&key) else {
            panic!("no workload {ns}/{name}");
        };
        set_first_image(deployment, image);
        deployment.metadata.resource_version = Some(version);
    }

    /// Make the next create of `kind` fail with `error`
    pub fn fail_next_create(&self, kind: DependentKind, error: Error) {
        self.state
            .lock()
            .unwrap()
            .fail_next_create
            .insert(kind, error);
    }

    /// Make the next get of `kind` fail with `error`
    pub fn fail_next_get(&self, kind: DependentKind, error: Error) {
        self.state.lock().unwrap().fail_next_get.insert(kind, error);
    }

    /// Let another writer touch the live `kind` right before the next replace
    /// lands, so the replace carries a stale resourceVersion
    pub fn race_next_update(&self, kind: DependentKind) {
        self.state.lock().unwrap().race_next_update.insert(kind);
    }

    /// Mutations applied so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }
}

fn set_first_image(deployment: &mut Deployment, image: &str) {
    let container = deployment
        .spec
        .as_mut()
        .and_then(|s| s.template.spec.as_mut())
        .and_then(|s| s.containers.first_mut())
        .expect("workload has a container");
    container.image = Some(image.to_string());
}

fn key_of(resource: &DependentResource) -> Key {
    (
        resource.kind(),
        resource.namespace().to_string(),
        resource.name().to_string(),
    )
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn get_app(&self, namespace: &str, name: &str) -> Result<Option<App>, Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .apps
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn get_dependent(
        &self,
        kind: DependentKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DependentResource>, Error> {
        let failure = self.state.lock().unwrap().fail_next_get.remove(&kind);
        if let Some(err) = failure {
            return Err(err);
        }
        Ok(self.dependent(kind, namespace, name))
    }

    async fn create_dependent(
        &self,
        resource: &DependentResource,
    ) -> Result<DependentResource, Error> {
        if let Some(gate) = &self.create_gate {
            gate.wait().await;
        }

        let mut state = self.state.lock().unwrap();
        let (kind, ns, name) = key_of(resource);
        if let Some(err) = state.fail_next_create.remove(&kind) {
            return Err(err);
        }
        if state.objects.contains_key(&(kind, ns.clone(), name.clone())) {
            return Err(Error::conflict(kind, &ns, &name, "already exists"));
        }

        let mut stored = resource.clone();
        stored.meta_mut().resource_version = Some(state.bump());
        state.objects.insert((kind, ns, name), stored.clone());
        state.calls.push(Call::Create(kind));
        Ok(stored)
    }

    async fn update_dependent(
        &self,
        resource: &DependentResource,
    ) -> Result<DependentResource, Error> {
        let mut state = self.state.lock().unwrap();
        let key = key_of(resource);
        let (kind, ns, name) = key.clone();
        if state.race_next_update.remove(&kind) && state.objects.contains_key(&key) {
            let version = state.bump();
            if let Some(current) = state.objects.get_mut(&key) {
                current.meta_mut().resource_version = Some(version);
            }
        }
        let Some(current) = state.objects.get(&key) else {
            return Err(Error::not_found(kind, &ns, &name));
        };
        if current.meta().resource_version != resource.meta().resource_version {
            return Err(Error::conflict(
                kind,
                &ns,
                &name,
                "the object has been modified",
            ));
        }

        let mut stored = resource.clone();
        stored.meta_mut().resource_version = Some(state.bump());
        state.objects.insert(key, stored.clone());
        state.calls.push(Call::Update(kind));
        Ok(stored)
    }

    async fn delete_dependent(
        &self,
        kind: DependentKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        let key = (kind, namespace.to_string(), name.to_string());
        if state.objects.remove(&key).is_none() {
            return Err(Error::not_found(kind, namespace, name));
        }
        state.calls.push(Call::Delete(kind));
        Ok(())
    }
}

/// An App in `default` with the given flags and a routable ingress section
pub fn sample_app(name: &str, enable_service: bool, enable_ingress: bool) -> App {
    let mut spec = AppSpec::new("nginx:1.25");
    spec.enable_service = enable_service;
    spec.enable_ingress = enable_ingress;
    spec.ingress = Some(IngressSpec {
        host: format!("{name}.example.com"),
        path: "/".to_string(),
        class_name: Some("nginx".to_string()),
    });
    let mut app = App::new(name, spec);
    app.metadata.namespace = Some("default".to_string());
    app
}

/// A 503 from the API server
pub fn unavailable() -> Error {
    Error::Kube(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: "etcdserver: leader changed".to_string(),
        reason: "ServiceUnavailable".to_string(),
        code: 503,
    }))
}
