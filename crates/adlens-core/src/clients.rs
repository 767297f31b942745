//! Client roster loaded from `config/clients.yaml`.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub name: String,
    /// Numeric ad account id. An `act_` prefix is accepted and stripped.
    pub ad_account_id: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub notes: Option<String>,
}

fn default_active() -> bool {
    true
}

impl ClientConfig {
    /// Generate a URL-safe slug from the client name.
    #[must_use]
    pub fn slug(&self) -> String {
        self.name
            .to_lowercase()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' {
                    c
                } else if c == ' ' {
                    '-'
                } else {
                    '\0'
                }
            })
            .filter(|&c| c != '\0')
            .collect::<String>()
            .split('-')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-")
    }

    /// The ad account id without the `act_` prefix, if configured.
    #[must_use]
    pub fn normalized_account_id(&self) -> Option<String> {
        self.ad_account_id.as_deref().map(normalize_account_id)
    }
}

/// Strip the `act_` prefix the ads platform uses in URLs.
#[must_use]
pub fn normalize_account_id(raw: &str) -> String {
    raw.trim().trim_start_matches("act_").to_string()
}

#[derive(Debug, Deserialize)]
pub struct ClientsFile {
    pub clients: Vec<ClientConfig>,
}

/// Load and validate the client roster from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_clients(path: &Path) -> Result<ClientsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ClientsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let clients_file: ClientsFile =
        serde_yaml::from_str(&content).map_err(ConfigError::ClientsFileParse)?;

    validate_clients(&clients_file)?;

    Ok(clients_file)
}

fn validate_clients(clients_file: &ClientsFile) -> Result<(), ConfigError> {
    let mut seen_slugs = HashSet::new();
    let mut seen_accounts = HashSet::new();

    for client in &clients_file.clients {
        if client.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "client name must be non-empty".to_string(),
            ));
        }

        let slug = client.slug();
        if slug.is_empty() || !seen_slugs.insert(slug.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate or empty client slug: '{}' (from client '{}')",
                slug, client.name
            )));
        }

        if let Some(account) = client.normalized_account_id() {
            if account.is_empty() || !account.chars().all(|c| c.is_ascii_digit()) {
                return Err(ConfigError::Validation(format!(
                    "client '{}' has invalid ad_account_id '{}'; expected digits",
                    client.name,
                    client.ad_account_id.as_deref().unwrap_or_default()
                )));
            }
            if !seen_accounts.insert(account.clone()) {
                return Err(ConfigError::Validation(format!(
                    "ad account {account} is assigned to more than one client"
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(name: &str, account: Option<&str>) -> ClientConfig {
        ClientConfig {
            name: name.to_string(),
            ad_account_id: account.map(str::to_string),
            is_active: true,
            notes: None,
        }
    }

    #[test]
    fn slug_simple_name() {
        assert_eq!(client("Northwind Dental", None).slug(), "northwind-dental");
    }

    #[test]
    fn slug_special_characters() {
        assert_eq!(client("Joe's Pizza & Co.", None).slug(), "joes-pizza-co");
    }

    #[test]
    fn account_prefix_is_stripped() {
        let c = client("Acme", Some("act_123456"));
        assert_eq!(c.normalized_account_id().as_deref(), Some("123456"));
    }

    #[test]
    fn validate_rejects_empty_name() {
        let file = ClientsFile {
            clients: vec![client("   ", None)],
        };
        let err = validate_clients(&file).unwrap_err();
        assert!(err.to_string().contains("non-empty"));
    }

    #[test]
    fn validate_rejects_duplicate_slug() {
        let file = ClientsFile {
            clients: vec![client("Acme Corp", None), client("acme  corp", None)],
        };
        let err = validate_clients(&file).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn validate_rejects_non_numeric_account() {
        let file = ClientsFile {
            clients: vec![client("Acme", Some("act_12ab"))],
        };
        let err = validate_clients(&file).unwrap_err();
        assert!(err.to_string().contains("invalid ad_account_id"));
    }

    #[test]
    fn validate_rejects_shared_account() {
        let file = ClientsFile {
            clients: vec![
                client("Acme", Some("act_42")),
                client("Globex", Some("42")),
            ],
        };
        let err = validate_clients(&file).unwrap_err();
        assert!(err.to_string().contains("more than one client"));
    }

    #[test]
    fn validate_accepts_valid_clients() {
        let file = ClientsFile {
            clients: vec![client("Acme", Some("act_42")), client("Globex", None)],
        };
        assert!(validate_clients(&file).is_ok());
    }

    #[test]
    fn load_clients_from_real_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("config")
            .join("clients.yaml");
        let result = load_clients(&path);
        assert!(result.is_ok(), "failed to load clients.yaml: {result:?}");
        assert!(!result.unwrap().clients.is_empty());
    }
}
