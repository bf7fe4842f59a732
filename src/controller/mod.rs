//! Controller implementation for the App CRD
//!
//! A pass follows the Kubernetes controller pattern: observe the App and its
//! dependents, diff against the spec, and issue the minimal set of mutations.

mod app;

pub use app::{
    observe, plan, reconcile_app, wanted, Context, DependentChanges, DependentState, Mutation,
    PassOutcome,
};
