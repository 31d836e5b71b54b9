use std::path::Path;

/// Deployment profile, read from `ROCKET_PROFILE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Development,
    Production,
}

impl Profile {
    pub fn current() -> Self {
        match dotenvy::var("ROCKET_PROFILE").as_deref() {
            Ok("production") | Ok("release") => Profile::Production,
            _ => Profile::Development,
        }
    }

    /// Later files override earlier ones; secrets always win.
    pub fn env_files(self) -> [&'static str; 3] {
        match self {
            Profile::Development => ["config/common.env", "config/dev.env", ".secrets.env"],
            Profile::Production => ["config/common.env", "config/prod.env", ".secrets.env"],
        }
    }
}

/// Result of loading the profile's env files. Tracing is not installed yet
/// when this runs, so the caller logs it afterwards.
#[derive(Debug, Default)]
pub struct LoadedEnvironment {
    pub loaded: Vec<&'static str>,
    pub skipped: Vec<&'static str>,
}

impl LoadedEnvironment {
    pub fn log(&self) {
        for path in &self.loaded {
            tracing::info!("Loaded environment from: {}", path);
        }
        for path in &self.skipped {
            tracing::warn!("Environment file {} not found, skipping", path);
        }
    }
}

pub fn load_environment() -> Result<LoadedEnvironment, dotenvy::Error> {
    load_env_files(&Profile::current().env_files())
}

fn load_env_files(paths: &[&'static str]) -> Result<LoadedEnvironment, dotenvy::Error> {
    let mut result = LoadedEnvironment::default();

    for &path in paths {
        if !Path::new(path).exists() {
            result.skipped.push(path);
            continue;
        }
        dotenvy::from_filename_override(path)?;
        result.loaded.push(path);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn profile_follows_rocket_profile() {
        temp_env::with_var("ROCKET_PROFILE", Some("production"), || {
            assert_eq!(Profile::current(), Profile::Production);
        });
        temp_env::with_var("ROCKET_PROFILE", None::<&str>, || {
            assert_eq!(Profile::current(), Profile::Development);
        });
    }

    #[test]
    fn secrets_file_is_loaded_last() {
        for profile in [Profile::Development, Profile::Production] {
            assert_eq!(profile.env_files()[2], ".secrets.env");
        }
        assert_eq!(Profile::Production.env_files()[1], "config/prod.env");
    }

    #[test]
    #[serial]
    fn missing_files_are_skipped() {
        let result = load_env_files(&["does/not/exist.env"]).unwrap();
        assert!(result.loaded.is_empty());
        assert_eq!(result.skipped, vec!["does/not/exist.env"]);
    }
}
