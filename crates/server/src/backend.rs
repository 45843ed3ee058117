//! Store selection from `[sheets]` settings.

use std::sync::Arc;

use sheetsink::{MemoryStore, TabularStore};
use sheetsink_config::{Backend, SheetsSettings};
use sheetsink_sheets_client::{ServiceAccount, SheetsClient, StaticToken, TokenSource};

use crate::error::ServerError;

/// Build the configured store.
///
/// The Google client is blocking; call this outside the async runtime.
pub fn build_store(settings: &SheetsSettings) -> Result<Arc<dyn TabularStore>, ServerError> {
    match settings.backend {
        Backend::Memory => {
            tracing::warn!("using in-memory backend, submissions are lost on exit");
            Ok(Arc::new(MemoryStore::new("memory").with_format_log(false)))
        }
        Backend::Google => {
            let spreadsheet_id = settings
                .spreadsheet_id
                .as_deref()
                .filter(|id| !id.trim().is_empty())
                .ok_or(ServerError::MissingSetting("sheets.spreadsheet_id"))?;

            let auth: Arc<dyn TokenSource> = match (&settings.access_token, &settings.credentials_file) {
                (Some(token), _) => {
                    tracing::info!("authenticating with a static access token");
                    Arc::new(StaticToken::new(token.clone()))
                }
                (None, Some(path)) => {
                    let account = ServiceAccount::from_file(path)?;
                    tracing::info!("authenticating as {}", account.client_email());
                    Arc::new(account)
                }
                (None, None) => return Err(ServerError::MissingSetting("sheets.credentials_file")),
            };

            let client = SheetsClient::with_base_url(
                spreadsheet_id,
                auth,
                settings.request_timeout(),
                &settings.api_base,
            )?;
            tracing::info!("writing to spreadsheet {}", spreadsheet_id);
            Ok(Arc::new(client))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_memory_backend() {
        let settings = SheetsSettings {
            backend: Backend::Memory,
            ..SheetsSettings::default()
        };
        let store = build_store(&settings).unwrap();
        assert_eq!(store.workbook_id(), "memory");
    }

    #[test]
    fn test_google_backend_with_token() {
        let settings = SheetsSettings {
            spreadsheet_id: Some("1AbC".into()),
            access_token: Some("ya29.dev".into()),
            ..SheetsSettings::default()
        };
        let store = build_store(&settings).unwrap();
        assert_eq!(store.workbook_id(), "1AbC");
    }

    #[test]
    fn test_google_backend_requirements() {
        let settings = SheetsSettings::default();
        assert!(matches!(
            build_store(&settings),
            Err(ServerError::MissingSetting("sheets.spreadsheet_id"))
        ));

        let settings = SheetsSettings {
            spreadsheet_id: Some("1AbC".into()),
            ..SheetsSettings::default()
        };
        assert!(matches!(
            build_store(&settings),
            Err(ServerError::MissingSetting("sheets.credentials_file"))
        ));
    }

    #[test]
    fn test_unreadable_key_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        let settings = SheetsSettings {
            spreadsheet_id: Some("1AbC".into()),
            credentials_file: Some(file.path().to_path_buf()),
            ..SheetsSettings::default()
        };
        assert!(matches!(build_store(&settings), Err(ServerError::Sheets(_))));
    }
}
