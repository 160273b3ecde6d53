//! Resolution of service endpoints from a signing region.

use std::fmt;

use url::Url;

use crate::error::{ConfigError, ConfigResult};

/// Regions an endpoint can be derived for.
const KNOWN_REGIONS: &[&str] = &[
    "af-south-1",
    "ap-east-1",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-south-1",
    "ap-south-2",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-southeast-3",
    "ap-southeast-4",
    "ap-southeast-5",
    "ap-southeast-7",
    "ca-central-1",
    "ca-west-1",
    "cn-north-1",
    "cn-northwest-1",
    "eu-central-1",
    "eu-central-2",
    "eu-north-1",
    "eu-south-1",
    "eu-south-2",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "il-central-1",
    "me-central-1",
    "me-south-1",
    "mx-central-1",
    "sa-east-1",
    "us-east-1",
    "us-east-2",
    "us-gov-east-1",
    "us-gov-west-1",
    "us-west-1",
    "us-west-2",
];

/// Whether `region` is a region endpoints can be resolved for.
pub fn is_known_region(region: &str) -> bool {
    KNOWN_REGIONS.contains(&region)
}

/// The service an endpoint is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceFamily {
    DynamoDb,
    DynamoDbStreams,
    CloudWatch,
}

impl ServiceFamily {
    /// Host prefix of the service's regional endpoint.
    pub fn prefix(&self) -> &'static str {
        match self {
            ServiceFamily::DynamoDb => "dynamodb",
            ServiceFamily::DynamoDbStreams => "streams.dynamodb",
            ServiceFamily::CloudWatch => "monitoring",
        }
    }
}

/// A concrete service endpoint together with the region requests are signed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    region: String,
    uri: String,
    explicit: bool,
}

impl Endpoint {
    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Whether the URI was supplied by the user rather than derived from the region.
    pub fn is_explicit(&self) -> bool {
        self.explicit
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.uri, self.region)
    }
}

/// Resolve the endpoint for `service` in `region`.
///
/// An explicit endpoint is used verbatim once it is checked to be a
/// well-formed http(s) URI. The region must be known either way since it is
/// the signing region.
pub fn resolve_endpoint(
    region: &str,
    explicit: Option<&str>,
    service: ServiceFamily,
) -> ConfigResult<Endpoint> {
    if !is_known_region(region) {
        return Err(ConfigError::UnknownRegion {
            region: region.to_string(),
        });
    }

    let uri = match explicit {
        Some(endpoint) => {
            check_endpoint(endpoint)?;
            endpoint.to_string()
        }
        None => format!(
            "https://{}.{}.{}",
            service.prefix(),
            region,
            dns_suffix(region)
        ),
    };

    Ok(Endpoint {
        region: region.to_string(),
        uri,
        explicit: explicit.is_some(),
    })
}

fn dns_suffix(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        "amazonaws.com.cn"
    } else {
        "amazonaws.com"
    }
}

fn check_endpoint(endpoint: &str) -> ConfigResult<()> {
    let invalid = |reason: &str| ConfigError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(endpoint).map_err(|e| invalid(&e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid("scheme must be http or https"));
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(invalid("missing host")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_from_region() {
        let endpoint = resolve_endpoint("us-west-2", None, ServiceFamily::DynamoDb).unwrap();
        assert_eq!(endpoint.uri(), "https://dynamodb.us-west-2.amazonaws.com");
        assert_eq!(endpoint.region(), "us-west-2");
        assert!(!endpoint.is_explicit());

        let streams =
            resolve_endpoint("eu-west-1", None, ServiceFamily::DynamoDbStreams).unwrap();
        assert_eq!(
            streams.uri(),
            "https://streams.dynamodb.eu-west-1.amazonaws.com"
        );

        let monitoring = resolve_endpoint("us-east-1", None, ServiceFamily::CloudWatch).unwrap();
        assert_eq!(monitoring.uri(), "https://monitoring.us-east-1.amazonaws.com");
    }

    #[test]
    fn test_resolve_china_region() {
        let endpoint = resolve_endpoint("cn-north-1", None, ServiceFamily::DynamoDb).unwrap();
        assert_eq!(endpoint.uri(), "https://dynamodb.cn-north-1.amazonaws.com.cn");
    }

    #[test]
    fn test_explicit_endpoint_used_verbatim() {
        for region in ["us-east-1", "ap-southeast-2"] {
            let endpoint = resolve_endpoint(
                region,
                Some("http://localhost:8000"),
                ServiceFamily::DynamoDbStreams,
            )
            .unwrap();
            assert_eq!(endpoint.uri(), "http://localhost:8000");
            assert_eq!(endpoint.region(), region);
            assert!(endpoint.is_explicit());
        }
    }

    #[test]
    fn test_unknown_region() {
        let err = resolve_endpoint("mars-north-1", None, ServiceFamily::DynamoDb).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRegion { region } if region == "mars-north-1"));

        // An override does not excuse an unknown signing region.
        let err = resolve_endpoint("nowhere", Some("http://localhost:8000"), ServiceFamily::DynamoDb)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRegion { .. }));
    }

    #[test]
    fn test_malformed_endpoint() {
        for bad in ["localhost:8000", "ftp://example.com", "not a url", "http://"] {
            let err = resolve_endpoint("us-east-1", Some(bad), ServiceFamily::DynamoDb).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidEndpoint { .. }),
                "{} should be rejected",
                bad
            );
        }
    }
}
