use envconfig::Envconfig;

use cleanup_common::profiles::ConnectionProfiles;

#[derive(Envconfig)]
pub struct Config {
    #[envconfig(
        from = "CONFIG_DATABASE_URL",
        default = "mysql://cleanup@localhost:3306/ops"
    )]
    pub config_database_url: String,

    #[envconfig(from = "CONFIG_TABLE", default = "c_sup_cleanup_config")]
    pub config_table: String,

    /// Unset runs every active group.
    #[envconfig(from = "GROUP_ID")]
    pub group_id: Option<i64>,

    #[envconfig(from = "DRY_RUN", default = "false")]
    pub dry_run: bool,

    #[envconfig(from = "CONNECTION_PROFILES", default = "")]
    pub connection_profiles: ConnectionProfiles,

    #[envconfig(from = "REPORT_JSON", default = "false")]
    pub report_json: bool,

    #[envconfig(from = "LOG_LEVEL", default = "info")]
    pub log_level: String,
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::init_from_hashmap(&HashMap::new()).unwrap();

        assert_eq!(config.config_table, "c_sup_cleanup_config");
        assert_eq!(config.group_id, None);
        assert!(!config.dry_run);
        assert!(!config.report_json);
        assert!(config.connection_profiles.is_empty());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_group_and_profiles_from_env() {
        let env = HashMap::from([
            ("GROUP_ID".to_owned(), "3".to_owned()),
            ("DRY_RUN".to_owned(), "true".to_owned()),
            (
                "CONNECTION_PROFILES".to_owned(),
                "prod_main=mysql://u:p@db1:3306;archive=mysql://u:p@db2:3306".to_owned(),
            ),
        ]);

        let config = Config::init_from_hashmap(&env).unwrap();

        assert_eq!(config.group_id, Some(3));
        assert!(config.dry_run);
        assert_eq!(
            config.connection_profiles.names(),
            vec!["archive", "prod_main"]
        );
    }

    #[test]
    fn test_malformed_profiles_are_rejected() {
        let env = HashMap::from([("CONNECTION_PROFILES".to_owned(), "prod_main".to_owned())]);

        assert!(Config::init_from_hashmap(&env).is_err());
    }
}
