use stowage_common::{Result, StowageError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    work_dir: String,
    prefix: String,
}

impl PathResolver {
    /// `work_dir` must be absolute; a missing trailing `/` is added.
    pub fn new(work_dir: &str) -> Result<Self> {
        if !work_dir.starts_with('/') {
            return Err(StowageError::Config(format!(
                "work dir must be absolute: {work_dir}"
            )));
        }

        let work_dir = if work_dir.ends_with('/') {
            work_dir.to_string()
        } else {
            format!("{work_dir}/")
        };
        let prefix = work_dir[1..].to_string();

        Ok(Self { work_dir, prefix })
    }

    pub fn work_dir(&self) -> &str {
        &self.work_dir
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn absolute(&self, path: &str) -> String {
        format!("{}{path}", self.prefix)
    }

    pub fn relative(&self, key: &str) -> String {
        key.strip_prefix(self.prefix.as_str())
            .unwrap_or(key)
            .to_string()
    }
}

impl Default for PathResolver {
    fn default() -> Self {
        Self {
            work_dir: "/".to_string(),
            prefix: String::new(),
        }
    }
}
