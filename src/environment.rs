//! Child environment assembly

use std::collections::BTreeMap;
use std::ffi::OsString;

use sidecar_config::EnvNames;

use crate::service::ServiceConfig;

/// Variables layered over the inherited environment of the child.
///
/// Pure: the same inputs always produce the same map. The entry point is
/// passed through as an `OsString` so non-UTF-8 paths survive.
#[must_use]
pub fn build(config: &ServiceConfig, names: &EnvNames) -> BTreeMap<String, OsString> {
    let mut env = BTreeMap::new();
    env.insert(
        names.entry_point.clone(),
        config.entry_point.clone().into_os_string(),
    );
    env.insert(names.debug.clone(), config.run_mode.debug_flag().into());
    env.insert(
        names.environment.clone(),
        config.run_mode.environment_name().into(),
    );
    env.insert(names.port.clone(), config.port.to_string().into());
    env.insert(
        names.admin_key.clone(),
        config.admin_key.expose().to_string().into(),
    );
    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::AdminKey;
    use sidecar_utils::types::RunMode;
    use std::path::PathBuf;

    fn service(run_mode: RunMode) -> ServiceConfig {
        ServiceConfig {
            entry_point: PathBuf::from("/svc/app"),
            port: 5000,
            run_mode,
            admin_key: AdminKey::generate(10),
        }
    }

    #[test]
    fn test_default_environment() {
        let config = service(RunMode::default());
        let env = build(&config, &EnvNames::default());

        assert_eq!(env.len(), 5);
        assert_eq!(env["FLASK_APP"], "/svc/app");
        assert_eq!(env["FLASK_DEBUG"], "0");
        assert_eq!(env["FLASK_ENV"], "development");
        assert_eq!(env["FLASK_RUN_PORT"], "5000");
        assert_eq!(env["FLASK_SERVER_ADMIN_KEY"], config.admin_key.expose());
    }

    #[test]
    fn test_debug_environment() {
        let env = build(&service(RunMode::Debug), &EnvNames::default());

        assert_eq!(env["FLASK_DEBUG"], "1");
        assert_eq!(env["FLASK_ENV"], "development");
    }

    #[test]
    fn test_production_environment() {
        let env = build(&service(RunMode::Production), &EnvNames::default());

        assert_eq!(env["FLASK_DEBUG"], "0");
        assert_eq!(env["FLASK_ENV"], "production");
    }

    #[test]
    fn test_custom_names() {
        let names = EnvNames {
            entry_point: "APP_MODULE".to_string(),
            port: "PORT".to_string(),
            ..EnvNames::default()
        };
        let env = build(&service(RunMode::Debug), &names);

        assert_eq!(env["APP_MODULE"], "/svc/app");
        assert_eq!(env["PORT"], "5000");
        assert!(!env.contains_key("FLASK_APP"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let config = service(RunMode::Debug);
        let names = EnvNames::default();
        assert_eq!(build(&config, &names), build(&config, &names));
    }
}
