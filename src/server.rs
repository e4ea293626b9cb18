use std::time::Duration;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::{error::ProbeError, logging::SounderLogger};

/// One candidate test endpoint from the directory service.
///
/// Identity and location come from the directory and never change;
/// `distance_km` and `avg_latency` are attached by selection, on returned
/// copies. A `Server` is a plain value, cloned freely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub id: String,
    pub url: String,
    pub name: String,
    pub sponsor: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,

    #[serde(skip)]
    pub distance_km: Option<f64>,
    #[serde(skip)]
    pub avg_latency: Option<Duration>,
}

impl Server {
    /// Everything up to the final path segment of `url`. The test servers
    /// host their probe resources beside the upload endpoint.
    fn base_url(&self) -> &str {
        match self.url.rsplit_once('/') {
            Some((base, _)) => base,
            None => self.url.as_str(),
        }
    }

    /// Download probe resource for one ladder rung.
    pub fn download_url(&self, size: u32) -> String {
        format!("{}/random{size}x{size}.jpg", self.base_url())
    }

    /// Small fixed resource used by latency trials.
    pub fn latency_url(&self) -> String {
        format!("{}/latency.txt", self.base_url())
    }

    /// Uploads POST to the base endpoint itself.
    pub fn upload_url(&self) -> &str {
        &self.url
    }
}

/// Where the directory service geolocated the client.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClientLocation {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerDirectory {
    pub client: ClientLocation,
    pub servers: Vec<Server>,
}

/// Retrieve the candidate pool. Any failure here is fatal; without a
/// directory there is nothing to measure against.
pub async fn fetch_server_list(
    client: &reqwest::Client,
    url: &str,
) -> Result<ServerDirectory, ProbeError> {
    SounderLogger::fetching_directory(url);
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|err| ProbeError::ConfigUnavailable(err.into()))?;
    if !response.status().is_success() {
        return Err(ProbeError::ConfigUnavailable(anyhow!(
            "directory returned {}",
            response.status()
        )));
    }
    let body = response
        .bytes()
        .await
        .map_err(|err| ProbeError::ConfigUnavailable(err.into()))?;
    let directory: ServerDirectory = serde_json::from_slice(&body)
        .map_err(|err| ProbeError::ConfigUnavailable(err.into()))?;
    SounderLogger::directory_loaded(directory.servers.len());
    Ok(directory)
}

/// Locate a specific server by id for the override path.
pub fn find_server(id: &str, servers: &[Server]) -> Option<Server> {
    servers.iter().find(|s| s.id == id).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(url: &str) -> Server {
        Server {
            id: "1234".to_string(),
            url: url.to_string(),
            name: "Townsville".to_string(),
            sponsor: "Example ISP".to_string(),
            country: "US".to_string(),
            lat: 0.0,
            lon: 0.0,
            distance_km: None,
            avg_latency: None,
        }
    }

    #[test]
    fn probe_urls_derive_beside_the_upload_endpoint() {
        let s = server("http://host.example/speedtest/upload.php");
        assert_eq!(
            s.download_url(350),
            "http://host.example/speedtest/random350x350.jpg"
        );
        assert_eq!(s.latency_url(), "http://host.example/speedtest/latency.txt");
        assert_eq!(s.upload_url(), "http://host.example/speedtest/upload.php");
    }

    #[test]
    fn find_server_matches_exact_id_only() {
        let servers = vec![server("http://a.example/u.php"), {
            let mut s = server("http://b.example/u.php");
            s.id = "5678".to_string();
            s
        }];
        assert_eq!(find_server("5678", &servers).unwrap().url, "http://b.example/u.php");
        assert!(find_server("56", &servers).is_none());
    }

    #[test]
    fn directory_payload_decodes() {
        let raw = r#"{
            "client": { "lat": 40.71, "lon": -74.0 },
            "servers": [{
                "id": "5032",
                "url": "http://host.example/speedtest/upload.php",
                "name": "New York, NY",
                "sponsor": "Example ISP",
                "country": "US",
                "lat": 40.75,
                "lon": -73.98
            }]
        }"#;
        let directory: ServerDirectory = serde_json::from_str(raw).unwrap();
        assert_eq!(directory.servers.len(), 1);
        assert_eq!(directory.servers[0].id, "5032");
        assert!(directory.servers[0].avg_latency.is_none());
    }
}
