//! Bloom filter with an exact backing set
//!
//! The bit array answers "maybe present" quickly; the exact set confirms a
//! hit ("double check") and is the only thing persisted to disk. Bits are
//! rebuilt from the exact set on load, so removed URLs stop being maybe-present
//! after a restart.

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::blacklist::BlacklistError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomConfig {
    /// Number of bits in the filter
    pub size: usize,
    /// One hash function per entry; the value is how many SHA-256 rounds it applies
    pub depths: Vec<usize>,
}

impl FromStr for BloomConfig {
    type Err = BlacklistError;

    /// Parses `"<size> <depth> [<depth>...]"`, e.g. `"256 1 2"`
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let invalid = || BlacklistError::InvalidConfig(line.trim().to_string());

        let mut parts = line.split_whitespace();
        let size: usize = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(invalid)?;

        let depths = parts
            .map(|s| s.parse::<usize>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;

        if size == 0 || depths.is_empty() || depths.contains(&0) {
            return Err(invalid());
        }

        Ok(Self { size, depths })
    }
}

pub struct BloomFilter {
    bits: Vec<bool>,
    depths: Vec<usize>,
    urls: HashSet<String>,
    path: Option<PathBuf>,
}

impl BloomFilter {
    /// Create a filter, loading previously saved URLs from `path` if it exists
    pub fn new(config: BloomConfig, path: Option<PathBuf>) -> Self {
        let mut filter = Self {
            bits: vec![false; config.size],
            depths: config.depths,
            urls: HashSet::new(),
            path,
        };
        filter.load();
        filter
    }

    pub fn add(&mut self, url: &str) {
        self.insert(url);
        self.save();
    }

    /// Bloom test only; may report URLs that were never added or were removed
    pub fn check(&self, url: &str) -> bool {
        self.indexes(url).all(|i| self.bits[i])
    }

    /// Bloom test confirmed by the exact set
    pub fn double_check(&self, url: &str) -> bool {
        self.check(url) && self.urls.contains(url)
    }

    /// Remove from the exact set. Bits stay set, so `check` may still pass.
    pub fn remove(&mut self, url: &str) -> bool {
        let removed = self.urls.remove(url);
        if removed {
            self.save();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    fn insert(&mut self, url: &str) {
        let indexes: Vec<usize> = self.indexes(url).collect();
        for i in indexes {
            self.bits[i] = true;
        }
        self.urls.insert(url.to_string());
    }

    fn indexes<'a>(&'a self, url: &'a str) -> impl Iterator<Item = usize> + 'a {
        self.depths
            .iter()
            .map(move |&depth| hash_index(url, depth, self.bits.len()))
    }

    fn load(&mut self) {
        let Some(path) = self.path.clone() else {
            return;
        };
        match fs::read_to_string(&path) {
            Ok(content) => {
                for line in content.lines().filter(|l| !l.is_empty()) {
                    self.insert(line);
                }
                tracing::info!(path = %path.display(), urls = self.urls.len(), "loaded blacklist");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), "failed to read blacklist: {}", e),
        }
    }

    fn save(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = write_urls(path, &self.urls) {
            tracing::warn!(path = %path.display(), "failed to save blacklist: {}", e);
        }
    }
}

fn write_urls(path: &Path, urls: &HashSet<String>) -> std::io::Result<()> {
    let mut sorted: Vec<&String> = urls.iter().collect();
    sorted.sort();
    let mut content = String::new();
    for url in sorted {
        content.push_str(url);
        content.push('\n');
    }
    fs::write(path, content)
}

fn hash_index(url: &str, depth: usize, size: usize) -> usize {
    let mut digest = Sha256::digest(url.as_bytes());
    for _ in 1..depth {
        digest = Sha256::digest(digest.as_slice());
    }
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % size as u64) as usize
}
