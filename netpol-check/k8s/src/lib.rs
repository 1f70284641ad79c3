#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! The Kubernetes surface of netpol-check: the API types the tool touches,
//! conversions into the core evaluation model, and the read-only cluster
//! session.

pub mod client;
pub mod convert;

pub use self::client::Session;
pub use k8s_openapi::api::{
    core::v1::{Container, ContainerPort, Namespace, Pod, PodSpec, PodStatus},
    networking::v1::{
        IPBlock, NetworkPolicy, NetworkPolicyEgressRule, NetworkPolicyIngressRule,
        NetworkPolicyPeer, NetworkPolicyPort, NetworkPolicySpec,
    },
};
pub use k8s_openapi::apimachinery::pkg::{
    apis::meta::v1::{LabelSelector, LabelSelectorRequirement, ObjectMeta},
    util::intstr::IntOrString,
};
pub use kube::{api::ListParams, Api, Client, ResourceExt};
