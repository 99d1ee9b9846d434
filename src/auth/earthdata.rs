// Earthdata Login (URS) authentication
//
// The s3credentials endpoints authenticate via URS: the endpoint redirects to
// urs.earthdata.nasa.gov, which accepts HTTP Basic credentials and redirects
// back with a session cookie. reqwest's redirect handling plus a cookie store
// cover the round trip; we only supply the Basic credentials.
use crate::credentials::{endpoint_url, AwsCredentials};
use crate::Error;

const URS_HOST: &str = "urs.earthdata.nasa.gov";

pub struct EarthdataAuth {
    username: String,
    password: String,
}

impl EarthdataAuth {
    /// Resolves URS credentials from `$EARTHDATA_USERNAME`/`$EARTHDATA_PASSWORD`,
    /// falling back to the `urs.earthdata.nasa.gov` entry of `~/.netrc`
    pub fn new() -> Result<EarthdataAuth, Error> {
        let from_env = std::env::var("EARTHDATA_USERNAME")
            .ok()
            .zip(std::env::var("EARTHDATA_PASSWORD").ok());
        if let Some((username, password)) = from_env {
            return Ok(EarthdataAuth { username, password });
        }
        Self::from_netrc()
    }

    fn from_netrc() -> Result<EarthdataAuth, Error> {
        let no_creds = || {
            Error::AuthError(format!(
                "No Earthdata credentials: set EARTHDATA_USERNAME/EARTHDATA_PASSWORD \
                 or add a '{URS_HOST}' machine to ~/.netrc"
            ))
        };
        let home = std::env::var("HOME").map_err(|_| no_creds())?;
        let content =
            std::fs::read_to_string(format!("{home}/.netrc")).map_err(|_| no_creds())?;
        let (username, password) = parse_netrc(&content, URS_HOST).ok_or_else(no_creds)?;
        Ok(EarthdataAuth { username, password })
    }

    /// Fetches temporary S3 credentials for the given dataset.
    ///
    /// The dataset identifier is validated before any network traffic, then a
    /// single authenticated GET of the endpoint performs the whole handshake.
    /// No caching: every call is a fresh login
    pub async fn fetch_credentials(
        &self,
        client: &reqwest::Client,
        dataset: &str,
    ) -> Result<AwsCredentials, Error> {
        let url = endpoint_url(dataset)?;
        let resp = client
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            return Err(Error::AuthError(format!(
                "Credential request failed, code={}: {}",
                status,
                resp.text().await?,
            )));
        }
        AwsCredentials::from_json(&resp.text().await?)
    }
}

/// One-shot convenience: login and exchange for dataset credentials
pub async fn get_s3_credentials(dataset: &str) -> Result<AwsCredentials, Error> {
    // Reject unknown datasets before looking up login configuration
    endpoint_url(dataset)?;
    let auth = EarthdataAuth::new()?;
    let client = reqwest::Client::builder().cookie_store(true).build()?;
    auth.fetch_credentials(&client, dataset).await
}

/// Fetches fresh credentials for `dataset` and returns the plain
/// (access key, secret key, session token) tuple
pub async fn get_frozen_credentials(dataset: &str) -> Result<(String, String, String), Error> {
    Ok(get_s3_credentials(dataset).await?.frozen())
}

fn parse_netrc(content: &str, machine: &str) -> Option<(String, String)> {
    let mut words = content.split_whitespace();
    let mut current: Option<&str> = None;
    let mut login = None;
    let mut password = None;
    while let Some(word) = words.next() {
        match word {
            "machine" => current = words.next(),
            "login" if current == Some(machine) => login = words.next(),
            "password" if current == Some(machine) => password = words.next(),
            _ => {}
        }
    }
    Some((login?.to_string(), password?.to_string()))
}

#[cfg(test)]
mod tests {
    use super::{get_s3_credentials, parse_netrc};
    use crate::Error;

    #[test]
    fn test_parse_netrc() {
        let content = "machine example.com login foo password bar\n\
                       machine urs.earthdata.nasa.gov\n  login edl_user\n  password hunter2\n";
        assert_eq!(
            parse_netrc(content, "urs.earthdata.nasa.gov"),
            Some(("edl_user".to_string(), "hunter2".to_string()))
        );
        assert_eq!(parse_netrc(content, "other.host"), None);
        assert_eq!(parse_netrc("", "urs.earthdata.nasa.gov"), None);
    }

    #[tokio::test]
    async fn test_unknown_dataset_fails_before_login() {
        // Dataset validation happens before credential lookup, so this fails
        // with UnknownDataset even with no Earthdata credentials configured
        let res = get_s3_credentials("unknown-x").await;
        match res {
            Err(Error::UnknownDataset(msg)) => {
                assert!(msg.contains("Unknown dataset: unknown-x"))
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    #[ignore] // requires a real Earthdata login (netrc or EARTHDATA_* env)
    async fn test_fetch_sentinel1_credentials() {
        let creds = get_s3_credentials("sentinel1").await.unwrap();
        assert!(!creds.has_expired());
    }
}
