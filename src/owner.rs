//! Ownership Binder
//!
//! Stamps a built dependent with a controller owner reference to its App.
//! The cluster garbage collector relies on the reference to cascade deletes,
//! and `Controller::owns` relies on it to map dependent events back to the App.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};

use crate::builder::DependentResource;
use crate::crd::App;
use crate::{Error, Result};

/// Attach a single controlling owner reference to `resource`
///
/// The reference blocks owner deletion, so a foreground delete of the App
/// waits for its dependents to go first.
///
/// Any existing owner references are replaced, so binding an already-bound
/// resource yields the same resource.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if the App has no name or uid, or if it
/// lives in a different namespace than the resource.
pub fn bind(mut resource: DependentResource, owner: &App) -> Result<DependentResource> {
    let owner_ref = owner.controller_owner_ref(&()).ok_or_else(|| {
        Error::configuration(format!(
            "app {} has no uid and cannot own a {}",
            owner.name_any(),
            resource.kind()
        ))
    })?;

    let owner_ns = owner.namespace().unwrap_or_default();
    if owner_ns != resource.namespace() {
        return Err(Error::configuration(format!(
            "app {}/{} cannot own {} in namespace {:?}",
            owner_ns,
            owner.name_any(),
            resource.kind(),
            resource.namespace()
        )));
    }

    let owner_ref = OwnerReference {
        block_owner_deletion: Some(true),
        ..owner_ref
    };
    resource.meta_mut().owner_references = Some(vec![owner_ref]);
    Ok(resource)
}

/// Returns true if `resource` is controlled by `owner`
pub fn is_owned_by(resource: &DependentResource, owner: &App) -> bool {
    let Some(uid) = owner.uid() else {
        return false;
    };
    resource
        .meta()
        .owner_references
        .iter()
        .flatten()
        .any(|r| r.uid == uid && r.controller == Some(true))
}
