//! Cluster API capability
//!
//! The reconciliation engine talks to the cluster only through [`ClusterApi`],
//! which keeps the engine testable against mocks and in-memory fakes. Calls
//! are single attempts; retrying is the router's job.

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, PostParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::builder::{DependentKind, DependentResource};
use crate::crd::App;
use crate::Error;

/// Trait abstracting the Kubernetes operations a reconciliation pass needs
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Fetch an App, `None` if it does not exist
    async fn get_app(&self, namespace: &str, name: &str) -> Result<Option<App>, Error>;

    /// Fetch a dependent, `None` if it does not exist
    async fn get_dependent(
        &self,
        kind: DependentKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DependentResource>, Error>;

    /// Create a dependent
    ///
    /// Fails with [`Error::Conflict`] if an object with the same identity exists.
    async fn create_dependent(
        &self,
        resource: &DependentResource,
    ) -> Result<DependentResource, Error>;

    /// Replace a dependent
    ///
    /// Fails with [`Error::Conflict`] if the carried resourceVersion is stale.
    async fn update_dependent(
        &self,
        resource: &DependentResource,
    ) -> Result<DependentResource, Error>;

    /// Delete a dependent
    ///
    /// Fails with [`Error::NotFound`] if it does not exist.
    async fn delete_dependent(
        &self,
        kind: DependentKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), Error>;
}

/// [`ClusterApi`] backed by a kube-rs client
pub struct KubeClusterApi {
    client: Client,
    field_manager: String,
}

impl KubeClusterApi {
    /// Create a new KubeClusterApi wrapping the given client
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        }
    }

    async fn get<K>(
        &self,
        kind: DependentKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<K>, Error>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        self.api::<K>(namespace)
            .get_opt(name)
            .await
            .map_err(|e| Error::from_kube(kind, namespace, name, e))
    }

    async fn create<K>(&self, kind: DependentKind, obj: &K) -> Result<K, Error>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let (namespace, name) = identity(obj);
        self.api::<K>(&namespace)
            .create(&self.post_params(), obj)
            .await
            .map_err(|e| Error::from_kube(kind, &namespace, &name, e))
    }

    async fn replace<K>(&self, kind: DependentKind, obj: &K) -> Result<K, Error>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let (namespace, name) = identity(obj);
        self.api::<K>(&namespace)
            .replace(&name, &self.post_params(), obj)
            .await
            .map_err(|e| Error::from_kube(kind, &namespace, &name, e))
    }

    async fn delete<K>(
        &self,
        kind: DependentKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), Error>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        self.api::<K>(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| Error::from_kube(kind, namespace, name, e))?;
        Ok(())
    }
}

fn identity<K: Resource>(obj: &K) -> (String, String) {
    let meta = obj.meta();
    (
        meta.namespace.clone().unwrap_or_default(),
        meta.name.clone().unwrap_or_default(),
    )
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn get_app(&self, namespace: &str, name: &str) -> Result<Option<App>, Error> {
        let api: Api<App> = self.api(namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_dependent(
        &self,
        kind: DependentKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DependentResource>, Error> {
        let found = match kind {
            DependentKind::Workload => self
                .get::<Deployment>(kind, namespace, name)
                .await?
                .map(DependentResource::Workload),
            DependentKind::Endpoint => self
                .get::<Service>(kind, namespace, name)
                .await?
                .map(DependentResource::Endpoint),
            DependentKind::Route => self
                .get::<Ingress>(kind, namespace, name)
                .await?
                .map(DependentResource::Route),
        };
        Ok(found)
    }

    async fn create_dependent(
        &self,
        resource: &DependentResource,
    ) -> Result<DependentResource, Error> {
        let kind = resource.kind();
        debug!(
            %kind,
            namespace = resource.namespace(),
            name = resource.name(),
            "creating dependent"
        );
        let created = match resource {
            DependentResource::Workload(d) => {
                DependentResource::Workload(self.create(kind, d).await?)
            }
            DependentResource::Endpoint(s) => {
                DependentResource::Endpoint(self.create(kind, s).await?)
            }
            DependentResource::Route(i) => DependentResource::Route(self.create(kind, i).await?),
        };
        Ok(created)
    }

    async fn update_dependent(
        &self,
        resource: &DependentResource,
    ) -> Result<DependentResource, Error> {
        let kind = resource.kind();
        debug!(
            %kind,
            namespace = resource.namespace(),
            name = resource.name(),
            resource_version = ?resource.meta().resource_version,
            "replacing dependent"
        );
        let updated = match resource {
            DependentResource::Workload(d) => {
                DependentResource::Workload(self.replace(kind, d).await?)
            }
            DependentResource::Endpoint(s) => {
                DependentResource::Endpoint(self.replace(kind, s).await?)
            }
            DependentResource::Route(i) => {
                DependentResource::Route(self.replace(kind, i).await?)
            }
        };
        Ok(updated)
    }

    async fn delete_dependent(
        &self,
        kind: DependentKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), Error> {
        debug!(%kind, namespace, name, "deleting dependent");
        match kind {
            DependentKind::Workload => self.delete::<Deployment>(kind, namespace, name).await,
            DependentKind::Endpoint => self.delete::<Service>(kind, namespace, name).await,
            DependentKind::Route => self.delete::<Ingress>(kind, namespace, name).await,
        }
    }
}
