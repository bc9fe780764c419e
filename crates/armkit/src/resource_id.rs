//! Resource identifier parsing.
//!
//! Identifiers follow
//! `subscriptions/<sub>/resourceGroups/<rg>/providers/<provider>/<type>/<name-path>`
//! where `<name-path>` may hold nested sub-resource segments.

use crate::error::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

static RESOURCE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^/?subscriptions/([^/]+)/resourceGroups/([^/]+)/providers/([^/]+)/([^/]+)/(.+)$",
    )
    .expect("resource id pattern is valid")
});

/// Components of a parsed resource identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    pub subscription: String,
    pub resource_group: String,
    pub provider: String,
    pub resource_type: String,
    /// Final segment of the name path.
    pub resource_name: String,
}

impl ResourceId {
    /// `<provider>/<type>`, e.g. `Microsoft.Network/virtualNetworks`.
    pub fn full_type(&self) -> String {
        format!("{}/{}", self.provider, self.resource_type)
    }
}

/// Parse a resource identifier.
///
/// Fails with [`Error::MalformedIdentifier`] when the `providers` anchor is
/// missing or any segment is empty.
pub fn parse(id: &str) -> Result<ResourceId> {
    let malformed = || Error::MalformedIdentifier { id: id.to_string() };

    let caps = RESOURCE_ID.captures(id).ok_or_else(malformed)?;
    let resource_name = caps[5].rsplit('/').next().unwrap_or_default();
    if resource_name.is_empty() {
        return Err(malformed());
    }

    Ok(ResourceId {
        subscription: caps[1].to_string(),
        resource_group: caps[2].to_string(),
        provider: caps[3].to_string(),
        resource_type: caps[4].to_string(),
        resource_name: resource_name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_id() {
        let id = parse("subscriptions/S/resourceGroups/G/providers/P/Type/Name").unwrap();
        assert_eq!(
            id,
            ResourceId {
                subscription: "S".into(),
                resource_group: "G".into(),
                provider: "P".into(),
                resource_type: "Type".into(),
                resource_name: "Name".into(),
            }
        );
    }

    #[test]
    fn test_parse_leading_slash_and_nested_name() {
        let id = parse(
            "/subscriptions/0000/resourceGroups/rg-net/providers/Microsoft.Network/virtualNetworks/vnet1/subnets/default",
        )
        .unwrap();
        assert_eq!(id.resource_group, "rg-net");
        assert_eq!(id.provider, "Microsoft.Network");
        assert_eq!(id.resource_type, "virtualNetworks");
        assert_eq!(id.resource_name, "default");
        assert_eq!(id.full_type(), "Microsoft.Network/virtualNetworks");
    }

    #[test]
    fn test_parse_anchors_are_case_insensitive() {
        let id = parse("/SUBSCRIPTIONS/s/resourcegroups/g/PROVIDERS/microsoft.insights/components/app")
            .unwrap();
        assert_eq!(id.provider, "microsoft.insights");
        assert_eq!(id.resource_name, "app");
    }

    #[test]
    fn test_parse_without_providers_fails() {
        for bad in [
            "subscriptions/S/resourceGroups/G",
            "subscriptions/S/resourceGroups/G/Type/Name",
            "",
            "not an id",
        ] {
            match parse(bad) {
                Err(Error::MalformedIdentifier { id }) => assert_eq!(id, bad),
                other => panic!("expected MalformedIdentifier for {bad:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_parse_trailing_slash_fails() {
        assert!(parse("subscriptions/S/resourceGroups/G/providers/P/Type/Name/").is_err());
    }
}
