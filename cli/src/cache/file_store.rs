use aqicore::cache::{CacheError, Cached, TtlStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// JSON file whose modification time is the write timestamp.
pub struct FileStore<T> {
    path: PathBuf,
    _value: PhantomData<T>,
}

impl<T> FileStore<T> {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            _value: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> TtlStore<T> for FileStore<T> {
    fn read(&self) -> Result<Option<Cached<T>>, CacheError> {
        let metadata = match fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let age = SystemTime::now()
            .duration_since(metadata.modified()?)
            .unwrap_or(Duration::ZERO);

        let contents = fs::read_to_string(&self.path)?;
        let value = serde_json::from_str(&contents)
            .map_err(|err| CacheError::Corrupt(format!("{}: {}", self.path.display(), err)))?;
        Ok(Some(Cached { value, age }))
    }

    fn write(&mut self, value: &T) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents =
            serde_json::to_string(value).map_err(|err| CacheError::Corrupt(err.to_string()))?;
        fs::write(&self.path, contents)?;
        Ok(())
    }
}
