//! # Custom Resource Definitions
//!
//! CRD types for the Aqua Scanner Account Controller.
//!
//! An `AquaScannerAccount` is created by a team in its `-tools` namespace. The
//! controller answers by provisioning a scanner identity in Aqua and publishing the
//! credential in the resource status.

mod status;

pub use status::*;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// AquaScannerAccount Custom Resource Definition
///
/// `AquaScannerAccountSpec` carries no tunable fields: the account identity is derived from the
/// namespace the resource lives in.
///
/// # Example
///
/// ```yaml
/// apiVersion: mamoa.devops.gov.bc.ca/v1
/// kind: AquaScannerAccount
/// metadata:
///   name: aqua-scanner-account
///   namespace: abc123-tools
/// spec: {}
/// ```
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    kind = "AquaScannerAccount",
    group = "mamoa.devops.gov.bc.ca",
    version = "v1",
    namespaced,
    status = "AquaScannerAccountStatus",
    shortname = "asa",
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.state"}, {"name":"Account", "type":"string", "jsonPath":".status.accountName"}, {"name":"Message", "type":"string", "jsonPath":".status.message"}"#
)]
#[serde(rename_all = "camelCase")]
#[allow(
    clippy::empty_structs_with_brackets,
    reason = "An empty `spec` must serialize as an object, not null"
)]
pub struct AquaScannerAccountSpec {}
