/// Database configuration.
///
/// The URL itself is chosen by the CLI's resolution chain (flag, then
/// [`DbConfig::ENV_VAR`], then config file, then [`DbConfig::DEFAULT_URL`]).
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Full PostgreSQL connection URL.
    pub database_url: String,
}

impl DbConfig {
    /// URL used when nothing else names a database.
    pub const DEFAULT_URL: &str = "postgresql://localhost:5432/plateful";

    /// Environment variable overriding the config file's `database.url`.
    pub const ENV_VAR: &str = "PLATEFUL_DATABASE_URL";

    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    /// Extract the database name from the URL.
    ///
    /// Returns `None` when the URL has no path component. Query strings
    /// (`?sslmode=...`) are not part of the name.
    pub fn database_name(&self) -> Option<&str> {
        let without_query = self
            .database_url
            .split_once('?')
            .map_or(self.database_url.as_str(), |(head, _)| head);
        let (head, name) = without_query.rsplit_once('/')?;
        if head.ends_with('/') || name.is_empty() {
            // "postgresql://host" has only the "//" separator.
            return None;
        }
        Some(name)
    }

    /// URL of the `postgres` maintenance database on the same host, used to
    /// issue `CREATE DATABASE`.
    pub fn maintenance_url(&self) -> String {
        match self.database_name() {
            Some(name) => {
                let pos = self
                    .database_url
                    .rfind(&format!("/{name}"))
                    .unwrap_or(self.database_url.len());
                format!("{}/postgres", &self.database_url[..pos])
            }
            None => format!("{}/postgres", self.database_url.trim_end_matches('/')),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_url() {
        let cfg = DbConfig::new(DbConfig::DEFAULT_URL);
        assert_eq!(cfg.database_url, "postgresql://localhost:5432/plateful");
    }

    #[test]
    fn database_name_extraction() {
        let cfg = DbConfig::new("postgresql://localhost:5432/mydb");
        assert_eq!(cfg.database_name(), Some("mydb"));
    }

    #[test]
    fn database_name_ignores_query_string() {
        let cfg = DbConfig::new("postgresql://localhost:5432/mydb?sslmode=disable");
        assert_eq!(cfg.database_name(), Some("mydb"));
    }

    #[test]
    fn database_name_missing() {
        let cfg = DbConfig::new("postgresql://localhost:5432");
        assert_eq!(cfg.database_name(), None);
    }

    #[test]
    fn maintenance_url_swaps_database() {
        let cfg = DbConfig::new("postgresql://user:pw@db:5432/plateful");
        assert_eq!(cfg.maintenance_url(), "postgresql://user:pw@db:5432/postgres");
    }

    #[test]
    fn maintenance_url_without_database() {
        let cfg = DbConfig::new("postgresql://db:5432/");
        assert_eq!(cfg.maintenance_url(), "postgresql://db:5432/postgres");
    }
}
