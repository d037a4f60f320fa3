//! Storage backends for uploaded images.
//!
//! Stores are flat namespaces of image names. Writes never overwrite: `create`
//! fails with [`StoreError::AlreadyExists`] when the name is taken, so
//! uniqueness never relies on a check followed by a write.

use crate::image::StoredImage;
use rand::Rng;
use std::{
    fs::{File, OpenOptions, create_dir_all, read_dir},
    io::{self, ErrorKind, Write},
    path::{Path, PathBuf, is_separator},
};

#[cfg(test)]
use std::{
    collections::BTreeMap,
    io::Cursor,
    sync::{Mutex, PoisonError},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("image {0} already exists")]
    AlreadyExists(String),

    #[error("image {0} not found")]
    NotFound(String),

    #[error("invalid image name {0:?}")]
    InvalidName(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub trait ImageStore: Send + Sync {
    /// Writes `contents` under `name`, failing if the name is already taken.
    fn create(&self, name: &str, contents: &[u8]) -> Result<(), StoreError>;

    /// Names of every stored image, in no particular order.
    fn list(&self) -> Result<Vec<String>, StoreError>;

    fn open(&self, name: &str) -> Result<StoredImage, StoreError>;
}

/// Picks one name uniformly at random, or `None` when there is nothing to pick.
pub fn pick_random<'a, R: Rng + ?Sized>(names: &'a [String], rng: &mut R) -> Option<&'a str> {
    if names.is_empty() {
        return None;
    }

    Some(&names[rng.random_range(0..names.len())])
}

fn check_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() || name == "." || name == ".." || name.chars().any(is_separator) {
        return Err(StoreError::InvalidName(name.into()));
    }

    Ok(())
}

/// A flat directory on local disk.
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the storage directory if it does not exist yet.
    pub fn init(&self) -> Result<(), StoreError> {
        create_dir_all(&self.root)?;
        Ok(())
    }
}

impl ImageStore for DirStore {
    fn create(&self, name: &str, contents: &[u8]) -> Result<(), StoreError> {
        check_name(name)?;
        self.init()?;

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.root.join(name))
        {
            Ok(file) => file,
            Err(error) if error.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists(name.into()));
            }
            Err(error) => return Err(error.into()),
        };

        file.write_all(contents)?;
        file.flush()?;

        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = match read_dir(&self.root) {
            Ok(entries) => entries,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(error) => return Err(error.into()),
        };

        let mut names = vec![];

        for entry in entries {
            let Ok(entry) = entry else { continue };
            let is_file = entry.file_type().is_ok_and(|file_type| file_type.is_file());

            if !is_file {
                continue;
            }

            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };

            if check_name(&name).is_ok() {
                names.push(name);
            }
        }

        Ok(names)
    }

    fn open(&self, name: &str) -> Result<StoredImage, StoreError> {
        check_name(name)?;

        let file = match File::open(self.root.join(name)) {
            Ok(file) => file,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(name.into()));
            }
            Err(error) => return Err(error.into()),
        };

        let size = file.metadata()?.len();

        Ok(StoredImage::new(name, size, Box::new(file)))
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    images: Mutex<BTreeMap<String, Vec<u8>>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.images.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}

#[cfg(test)]
impl ImageStore for MemoryStore {
    fn create(&self, name: &str, contents: &[u8]) -> Result<(), StoreError> {
        check_name(name)?;

        let mut images = self.images.lock().unwrap_or_else(PoisonError::into_inner);

        if images.contains_key(name) {
            return Err(StoreError::AlreadyExists(name.into()));
        }

        images.insert(name.into(), contents.to_vec());

        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect())
    }

    fn open(&self, name: &str) -> Result<StoredImage, StoreError> {
        let contents = self
            .get(name)
            .ok_or_else(|| StoreError::NotFound(name.into()))?;
        let size = contents.len() as u64;

        Ok(StoredImage::new(name, size, Box::new(Cursor::new(contents))))
    }
}
