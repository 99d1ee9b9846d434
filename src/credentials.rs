// Short-lived AWS credentials for NASA Earthdata S3 buckets.
//
// The credential-issuing endpoints hand out temporary keys scoped to a single
// dataset's buckets, all of which live in us-west-2.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::Error;

// The only region the Earthdata direct-access buckets are served from
pub const DEFAULT_REGION: &str = "us-west-2";

pub const ENDPOINTS: [(&str, &str); 3] = [
    // ESA's SAFE granules via ASF
    ("sentinel1", "https://sentinel1.asf.alaska.edu/s3credentials"),
    // OPERA products via ASF
    ("opera", "https://cumulus.asf.alaska.edu/s3credentials"),
    // Test OPERA products (the UAT venue, uat.urs.earthdata.nasa.gov)
    ("opera-uat", "https://cumulus-test.asf.alaska.edu/s3credentials"),
];

/// Returns the credential-issuing endpoint for the given dataset identifier
pub fn endpoint_url(dataset: &str) -> Result<&'static str, Error> {
    ENDPOINTS
        .iter()
        .find(|(name, _)| *name == dataset)
        .map(|(_, url)| *url)
        .ok_or_else(|| Error::UnknownDataset(format!("Unknown dataset: {dataset}")))
}

/// A set of temporary S3 credentials as returned by an Earthdata
/// `s3credentials` endpoint (`accessKeyId`, `secretAccessKey`, `sessionToken`)
#[derive(Debug, Clone, Deserialize)]
pub struct AwsCredentials {
    #[serde(rename = "accessKeyId")]
    pub access_key_id: String,
    #[serde(rename = "secretAccessKey")]
    pub secret_access_key: String,
    #[serde(rename = "sessionToken")]
    pub session_token: String,
    #[serde(default, deserialize_with = "deserialize_expiration")]
    pub expiration: Option<DateTime<Utc>>,
}

impl AwsCredentials {
    /// Parses a credential endpoint JSON response, rejecting records with a
    /// missing or empty required field
    pub fn from_json(body: &str) -> Result<AwsCredentials, Error> {
        let creds: AwsCredentials = serde_json::from_str(body)?;
        creds.validate()?;
        Ok(creds)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.access_key_id.is_empty() {
            return Err(Error::MissingCredential("accessKeyId"));
        }
        if self.secret_access_key.is_empty() {
            return Err(Error::MissingCredential("secretAccessKey"));
        }
        if self.session_token.is_empty() {
            return Err(Error::MissingCredential("sessionToken"));
        }
        Ok(())
    }

    /// Whether the expiration timestamp (if the endpoint provided one) has
    /// passed. Informational only: no operation refuses an expired record
    pub fn has_expired(&self) -> bool {
        matches!(self.expiration, Some(t) if t < Utc::now())
    }

    /// The `AWS_`-prefixed environment variable form of the three keys
    pub fn to_env(&self) -> [(&'static str, &str); 3] {
        [
            ("AWS_ACCESS_KEY_ID", self.access_key_id.as_str()),
            ("AWS_SECRET_ACCESS_KEY", self.secret_access_key.as_str()),
            ("AWS_SESSION_TOKEN", self.session_token.as_str()),
        ]
    }

    /// A plain (access key, secret key, session token) tuple for APIs that
    /// don't take the record type
    pub fn frozen(&self) -> (String, String, String) {
        (
            self.access_key_id.clone(),
            self.secret_access_key.clone(),
            self.session_token.clone(),
        )
    }

    /// Shell `export` statements for the three variables, one per line
    pub fn format_export(&self) -> String {
        let mut out = String::new();
        for (name, value) in self.to_env() {
            out.push_str(&format!("export {name}='{value}'\n"));
        }
        out
    }

    /// Writes the three variables into the process environment. They stay set
    /// until overwritten or process exit; prefer passing the record (or its
    /// `to_env` pairs) explicitly where possible
    pub fn set_env(&self) {
        for (name, value) in self.to_env() {
            std::env::set_var(name, value);
        }
    }
}

fn deserialize_expiration<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(s) => parse_expiration(&s).map(Some).map_err(serde::de::Error::custom),
    }
}

fn parse_expiration(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    // The ASF endpoints format expiration as e.g. "2024-01-01 00:55:33+00:00"
    DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z")
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid expiration {s:?}: {e}"))
}
