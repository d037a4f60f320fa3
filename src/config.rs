use dotenv::dotenv;
use std::{
    env::var,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
};

pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub images_dir: PathBuf,
    pub workers: usize,
}

impl Config {
    pub fn get() -> Self {
        dotenv().ok();
        Self::from_lookup(|key| var(key).ok())
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        Self {
            host: lookup("RIS_HOST")
                .and_then(|host| host.trim().parse::<IpAddr>().ok())
                .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            port: lookup("RIS_PORT")
                .and_then(|port| port.trim().parse::<u16>().ok())
                .unwrap_or(8000),
            images_dir: lookup("RIS_IMAGES_DIR")
                .map(|images_dir| images_dir.trim().to_string())
                .filter(|images_dir| !images_dir.is_empty())
                .map_or_else(|| PathBuf::from("./Images/"), PathBuf::from),
            workers: lookup("RIS_WORKERS")
                .and_then(|workers| workers.trim().parse::<usize>().ok())
                .unwrap_or(4)
                .max(1),
        }
    }

    pub fn address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let vars = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();

        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = Config::default();

        assert_eq!(config.address(), "0.0.0.0:8000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.images_dir, PathBuf::from("./Images/"));
        assert_eq!(config.workers, 4);
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("RIS_HOST", "127.0.0.1"),
            ("RIS_PORT", " 9090 "),
            ("RIS_IMAGES_DIR", "/srv/images"),
            ("RIS_WORKERS", "16"),
        ]);

        assert_eq!(config.address(), "127.0.0.1:9090".parse::<SocketAddr>().unwrap());
        assert_eq!(config.images_dir, PathBuf::from("/srv/images"));
        assert_eq!(config.workers, 16);
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = config(&[
            ("RIS_HOST", "localhost"),
            ("RIS_PORT", "99999"),
            ("RIS_IMAGES_DIR", "  "),
            ("RIS_WORKERS", "0"),
        ]);

        assert_eq!(config.address(), "0.0.0.0:8000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.images_dir, PathBuf::from("./Images/"));
        assert_eq!(config.workers, 1);
    }
}
