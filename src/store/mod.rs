//! JSON persistence for the token state used by the CLI.

use std::{fs, io::Write, path::Path};

use crate::token::{Token, TokenError};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("state file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("state file {path} is not valid token state: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("state file {path} is inconsistent: {source}")]
    Invalid {
        path: String,
        #[source]
        source: TokenError,
    },
}

pub fn load(path: &Path) -> Result<Token, StoreError> {
    let bytes = fs::read(path).map_err(|source| StoreError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let token: Token = serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
        path: path.display().to_string(),
        source,
    })?;
    token.validate().map_err(|source| StoreError::Invalid {
        path: path.display().to_string(),
        source,
    })?;
    Ok(token)
}

/// Writes to a sibling temp file first, then renames over `path`.
pub fn save(path: &Path, token: &Token) -> Result<(), StoreError> {
    let io_err = |source: std::io::Error| StoreError::Io {
        path: path.display().to_string(),
        source,
    };
    let json = serde_json::to_vec_pretty(token).map_err(|source| StoreError::Json {
        path: path.display().to_string(),
        source,
    })?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    let tmp = path.with_extension("tmp");
    let mut f = fs::File::create(&tmp).map_err(io_err)?;
    f.write_all(&json).map_err(io_err)?;
    f.sync_all().map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{accounts::signers, config::TokenConfig};

    #[test]
    fn save_then_load_restores_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("token.json");
        let s = signers(2);
        let mut token =
            Token::deploy(s[0].address(), TokenConfig::default().resolve().unwrap()).unwrap();
        token.transfer(&s[0].address(), &s[1].address(), 1_000).unwrap();

        save(&path, &token).unwrap();
        let restored = load(&path).unwrap();
        assert_eq!(restored, token);
        assert_eq!(restored.balance_of(&s[1].address()), 1_000);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn load_reports_missing_and_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(matches!(load(&missing), Err(StoreError::Io { .. })));

        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, b"{ not json").unwrap();
        assert!(matches!(load(&corrupt), Err(StoreError::Json { .. })));
    }

    #[test]
    fn load_rejects_tampered_state() {
        let dir = tempfile::tempdir().unwrap();
        let s = signers(1);
        let token =
            Token::deploy(s[0].address(), TokenConfig::default().resolve().unwrap()).unwrap();
        let json = serde_json::to_string(&token).unwrap();
        assert!(json.contains(r#""tax_fee_percent":5"#));

        let path = dir.path().join("tax.json");
        fs::write(&path, json.replace(r#""tax_fee_percent":5"#, r#""tax_fee_percent":200"#))
            .unwrap();
        assert!(matches!(
            load(&path),
            Err(StoreError::Invalid {
                source: TokenError::InvalidTaxFee(200),
                ..
            })
        ));

        let supply = format!(r#""total_supply":{}"#, token.total_supply());
        assert!(json.contains(&supply));
        let path = dir.path().join("supply.json");
        fs::write(&path, json.replace(&supply, r#""total_supply":1"#)).unwrap();
        assert!(matches!(
            load(&path),
            Err(StoreError::Invalid {
                source: TokenError::SupplyMismatch { supply: 1, .. },
                ..
            })
        ));
    }
}
