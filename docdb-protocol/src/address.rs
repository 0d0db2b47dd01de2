use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::error::Error;

pub const DEFAULT_PORT: u16 = 27017;
pub const DEFAULT_HOST: &str = "localhost";

/// Address of a server. Host names are kept unresolved and lower-cased, since the same address
/// is used to identify a server in topology descriptions.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServerAddress {
    host: String,
    port: u16,
}

impl ServerAddress {
    pub fn new<S: Into<String>>(host: S, port: u16) -> Self {
        ServerAddress {
            host: host.into().to_lowercase(),
            port,
        }
    }

    #[inline]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Default for ServerAddress {
    fn default() -> Self {
        ServerAddress::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl From<SocketAddr> for ServerAddress {
    fn from(addr: SocketAddr) -> Self {
        ServerAddress::new(addr.ip().to_string(), addr.port())
    }
}

impl FromStr for ServerAddress {
    type Err = Error;

    /// Accepts `host`, `host:port` and `[ipv6]:port`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::Configuration(format!("Invalid server address: {value}"));

        if value.is_empty() {
            return Err(invalid());
        }

        if let Some(rest) = value.strip_prefix('[') {
            let (host, rest) = rest.split_once(']').ok_or_else(invalid)?;
            let port = match rest.strip_prefix(':') {
                Some(port) => port.parse().map_err(|_| invalid())?,
                None if rest.is_empty() => DEFAULT_PORT,
                None => return Err(invalid()),
            };

            return Ok(ServerAddress::new(host, port));
        }

        match value.rsplit_once(':') {
            Some((host, _)) if host.contains(':') => Err(invalid()),
            Some((host, port)) if !host.is_empty() => Ok(ServerAddress::new(
                host,
                port.parse().map_err(|_| invalid())?,
            )),
            Some(_) => Err(invalid()),
            None => Ok(ServerAddress::new(value, DEFAULT_PORT)),
        }
    }
}

impl From<&str> for ServerAddress {
    /// Lenient conversion for literals; unparsable input keeps the whole string as a host.
    fn from(value: &str) -> Self {
        value
            .parse()
            .unwrap_or_else(|_| ServerAddress::new(value, DEFAULT_PORT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_host_with_default_port() {
        let address: ServerAddress = "Db1.Example.COM".parse().unwrap();
        assert_eq!(address.host(), "db1.example.com");
        assert_eq!(address.port(), DEFAULT_PORT);
    }

    #[test]
    fn should_parse_host_and_port() {
        let address: ServerAddress = "db1:27018".parse().unwrap();
        assert_eq!(address, ServerAddress::new("db1", 27018));
        assert_eq!(address.to_string(), "db1:27018");
    }

    #[test]
    fn should_parse_ipv6() {
        let address: ServerAddress = "[::1]:27019".parse().unwrap();
        assert_eq!(address.host(), "::1");
        assert_eq!(address.port(), 27019);
        assert_eq!(address.to_string(), "[::1]:27019");

        let address: ServerAddress = "[::1]".parse().unwrap();
        assert_eq!(address.port(), DEFAULT_PORT);
    }

    #[test]
    fn should_reject_invalid_addresses() {
        assert!("".parse::<ServerAddress>().is_err());
        assert!(":27017".parse::<ServerAddress>().is_err());
        assert!("db1:port".parse::<ServerAddress>().is_err());
        assert!("[::1".parse::<ServerAddress>().is_err());
    }
}
