//! Geolocation of a node's exit address using an MMDB database

use crate::proxy::client::ProbeClient;
use crate::Result;
use anyhow::{anyhow, bail};
use async_trait::async_trait;
use maxminddb::{geoip2, Reader};
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

/// Endpoint answering with the caller's public IP as plain text
pub const DEFAULT_IP_ECHO_URL: &str = "https://api.ipify.org";

/// Resolves where a node exits to the internet
#[async_trait]
pub trait GeoLookup: Send + Sync {
    /// Public IP address seen by remote hosts when going through the node
    async fn public_ip(&self, client: &ProbeClient) -> Result<String>;

    /// English country name for an address, empty when unknown
    fn country_name(&self, ip: &str) -> String;
}

/// GeoLocator for looking up IP addresses in MMDB databases
pub struct GeoLocator {
    reader: Arc<Reader<Vec<u8>>>,
}

impl GeoLocator {
    /// Create a new GeoLocator from an MMDB file path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = Reader::open_readfile(path)?;
        Ok(Self {
            reader: Arc::new(reader),
        })
    }

    /// English country name of an IP address string, `None` when the
    /// database has no record for it
    pub fn country_of(&self, ip_str: &str) -> Result<Option<String>> {
        let ip: IpAddr = ip_str.trim().parse()?;
        let lookup_result = self.reader.lookup(ip)?;

        // City records also decode from country-only databases
        let city: Option<geoip2::City> = lookup_result.decode()?;
        Ok(city.and_then(|city| city.country.names.english.map(String::from)))
    }
}

impl Clone for GeoLocator {
    fn clone(&self) -> Self {
        Self {
            reader: Arc::clone(&self.reader),
        }
    }
}

/// Public IP from an echo endpoint, country from an optional MMDB file
#[derive(Clone)]
pub struct MmdbGeoLookup {
    locator: Option<GeoLocator>,
    ip_echo_url: String,
}

impl MmdbGeoLookup {
    pub fn new(locator: Option<GeoLocator>) -> Self {
        Self {
            locator,
            ip_echo_url: DEFAULT_IP_ECHO_URL.to_string(),
        }
    }

    /// Open the database at `path` if given. A database that fails to open
    /// is logged and lookups fall back to empty country names.
    pub fn from_optional_path(path: Option<&str>) -> Self {
        let locator = path.and_then(|path| match GeoLocator::from_path(path) {
            Ok(locator) => Some(locator),
            Err(e) => {
                tracing::warn!(path, error = %e, "failed to open MMDB database, countries will be unrecognized");
                None
            }
        });
        Self::new(locator)
    }

    pub fn with_ip_echo_url(mut self, url: impl Into<String>) -> Self {
        self.ip_echo_url = url.into();
        self
    }
}

#[async_trait]
impl GeoLookup for MmdbGeoLookup {
    async fn public_ip(&self, client: &ProbeClient) -> Result<String> {
        let response = client.get(&self.ip_echo_url).await?;
        if !response.status.is_success() {
            bail!("ip echo endpoint returned {}", response.status);
        }
        let text = response.text();
        let ip = text.trim();
        ip.parse::<IpAddr>()
            .map_err(|_| anyhow!("ip echo endpoint returned a non-address body: {:?}", ip))?;
        Ok(ip.to_string())
    }

    fn country_name(&self, ip: &str) -> String {
        let Some(locator) = &self.locator else {
            return String::new();
        };
        match locator.country_of(ip) {
            Ok(country) => country.unwrap_or_default(),
            Err(e) => {
                tracing::debug!(ip, error = %e, "country lookup failed");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_without_database_is_empty() {
        let geo = MmdbGeoLookup::new(None);
        assert_eq!(geo.country_name("8.8.8.8"), "");
        assert_eq!(geo.country_name(""), "");
    }

    #[test]
    fn test_missing_database_file_falls_back() {
        let geo = MmdbGeoLookup::from_optional_path(Some("/nonexistent/GeoLite2-Country.mmdb"));
        assert!(geo.locator.is_none());
        assert_eq!(geo.country_name("1.1.1.1"), "");
    }

    #[test]
    fn test_ip_echo_url_override() {
        let geo = MmdbGeoLookup::new(None).with_ip_echo_url("http://echo.test/ip");
        assert_eq!(geo.ip_echo_url, "http://echo.test/ip");
    }
}
