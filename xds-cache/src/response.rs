use crate::request::{DeltaRequest, SotwRequest};
use crate::resource::ResourceRef;

/// A state-of-the-world response: a full replacement of the client's view
/// for one type-tag at one version.
#[derive(Debug, Clone)]
pub struct Response {
    pub type_url: String,
    pub version: String,
    pub resources: Vec<ResourceRef>,
    pub request: SotwRequest,
    /// `true` only for responses emitted by the heartbeat loop
    /// (`spec.md §4.7`); such responses may repeat a previously-delivered
    /// version on purpose.
    pub heartbeat: bool,
}

/// A delta response: only the resources that changed against what the
/// stream already knew, plus removals.
#[derive(Debug, Clone)]
pub struct DeltaResponse {
    pub type_url: String,
    pub system_version: String,
    pub resources: Vec<ResourceRef>,
    pub removed_resources: Vec<String>,
    pub request: DeltaRequest,
}
