//! Connect-string parsing and server rotation. Hosts are shuffled once at
//! parse time so that many clients started at once do not all stampede
//! the same server.

use std::time::Duration;

use rand::seq::SliceRandom;

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    pub host: String,
    pub port: u16,
}

impl HostEntry {
    pub fn to_addr_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parses `host1:port1,host2:port2,.../chroot` into a shuffled server list
/// and an optional chroot suffix, then hands out servers round-robin with
/// a bounded random backoff between full passes.
pub struct HostProvider {
    hosts: Vec<HostEntry>,
    chroot: Option<String>,
    cursor: usize,
    passes_without_connect: u32,
}

impl HostProvider {
    /// # Test
    ///
    /// ```
    /// use coord_client_engine::hosts::HostProvider;
    ///
    /// let hosts = HostProvider::parse("a:2181,b:2181/app/service").unwrap();
    /// assert_eq!(hosts.chroot(), Some("/app/service"));
    /// assert_eq!(hosts.len(), 2);
    /// ```
    pub fn parse(connect_string: &str) -> Result<Self, Error> {
        let connect_string = connect_string.trim();
        if connect_string.is_empty() {
            return Err(Error::Config("empty connect string".into()));
        }

        let (hosts_part, chroot) = match connect_string.find('/') {
            Some(idx) => {
                let chroot = &connect_string[idx..];
                if chroot != "/" && !chroot.starts_with('/') {
                    return Err(Error::Config(format!("invalid chroot: {chroot}")));
                }
                (&connect_string[..idx], Some(chroot.to_string()))
            }
            None => (connect_string, None),
        };

        if hosts_part.is_empty() {
            return Err(Error::Config("connect string has no hosts".into()));
        }

        let mut hosts = Vec::new();
        for part in hosts_part.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let (host, port) = part
                .rsplit_once(':')
                .ok_or_else(|| Error::Config(format!("missing port in host: {part}")))?;

            if host.is_empty() {
                return Err(Error::Config(format!("missing host in entry: {part}")));
            }

            let port: u16 = port
                .parse()
                .map_err(|_| Error::Config(format!("invalid port in entry: {part}")))?;

            hosts.push(HostEntry {
                host: host.to_string(),
                port,
            });
        }

        if hosts.is_empty() {
            return Err(Error::Config("connect string has no hosts".into()));
        }

        hosts.shuffle(&mut rand::rng());

        Ok(Self {
            hosts,
            chroot,
            cursor: 0,
            passes_without_connect: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn chroot(&self) -> Option<&str> {
        self.chroot.as_deref()
    }

    /// Cycles to the next server in shuffled order.
    pub fn next_server(&mut self) -> &HostEntry {
        let entry = &self.hosts[self.cursor];
        self.cursor = (self.cursor + 1) % self.hosts.len();
        if self.cursor == 0 {
            self.passes_without_connect += 1;
        }

        entry
    }

    /// Call after a successful `CONNECTED` transition to reset the backoff
    /// counter — a stampede only matters across failed passes.
    pub fn note_connected(&mut self) {
        self.passes_without_connect = 0;
    }

    /// A bounded random sleep between 0 and 1s, applied once a full pass of
    /// the host list has gone by without reaching `CONNECTED`.
    pub fn backoff(&self) -> Option<Duration> {
        if self.passes_without_connect == 0 {
            return None;
        }

        use rand::Rng;
        Some(Duration::from_millis(rand::rng().random_range(0..=1000)))
    }
}
