//! # Namespace Contacts
//!
//! Extracts the technical lead's email from the namespace `contacts` annotation.
//!
//! The annotation is a YAML list written by the project registry:
//!
//! ```yaml
//! - role: Product Owner
//!   email: owner@example.com
//!   rocketchat:
//! - role: Technical Lead
//!   email: lead@example.com
//!   rocketchat:
//! ```

use crate::constants::{CONTACTS_ANNOTATION, TECHNICAL_LEAD_ROLE};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct Contact {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

/// Email of the first `Technical Lead` in a contacts annotation value
pub fn technical_contact_from_annotation(contacts: &str) -> Option<String> {
    let parsed: Vec<Contact> = match serde_yaml::from_str(contacts) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Unable to parse namespace contacts annotation: {}", e);
            return None;
        }
    };

    parsed
        .into_iter()
        .find(|contact| contact.role.as_deref().map(str::trim) == Some(TECHNICAL_LEAD_ROLE))
        .and_then(|contact| contact.email)
        .map(|email| email.trim().to_string())
        .filter(|email| !email.is_empty())
}

/// Technical lead email from a namespace's annotations, if recorded
pub fn technical_contact(annotations: &BTreeMap<String, String>) -> Option<String> {
    annotations
        .get(CONTACTS_ANNOTATION)
        .and_then(|contacts| technical_contact_from_annotation(contacts))
}
