// ABOUTME: Materializes a base64-encoded keystore from the environment into a file on disk.
// ABOUTME: Runs once at startup, before the TLS listener is built; every failure is fatal.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

/// Environment variable holding the base64-encoded keystore.
pub const KEYSTORE_BASE64_VAR: &str = "KEYSTORE_BASE64";

/// Environment variable naming where the decoded keystore is written.
pub const KEYSTORE_TEMP_PATH_VAR: &str = "KEYSTORE_TEMP_PATH";

/// File name used under the platform temp directory when no destination is configured.
pub const DEFAULT_KEYSTORE_FILE_NAME: &str = "server-keystore.pem";

/// Errors that abort keystore materialization.
#[derive(Debug, Error)]
pub enum KeystoreError {
    #[error("failed to decode KEYSTORE_BASE64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("failed to create keystore directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write keystore to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where the keystore comes from and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretSource {
    encoded_value: Option<String>,
    destination_path: PathBuf,
}

/// Result of a successful materialization run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterializeOutcome {
    /// No secret was configured; nothing was written.
    Skipped,
    /// The decoded keystore was written to `path`.
    Materialized { path: PathBuf, bytes: usize },
}

impl MaterializeOutcome {
    /// Location of the freshly written keystore, if any. Handed to the TLS
    /// loader instead of publishing it through process-wide state.
    pub fn keystore_location(&self) -> Option<&Path> {
        match self {
            Self::Skipped => None,
            Self::Materialized { path, .. } => Some(path),
        }
    }
}

/// The destination used when `KEYSTORE_TEMP_PATH` is unset or empty.
pub fn default_destination() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_KEYSTORE_FILE_NAME)
}

impl SecretSource {
    /// Build a source from explicit values. An empty or whitespace-only
    /// `encoded_value` is treated as absent.
    pub fn new(encoded_value: Option<String>, destination_path: impl Into<PathBuf>) -> Self {
        Self {
            encoded_value: encoded_value.filter(|v| !v.trim().is_empty()),
            destination_path: destination_path.into(),
        }
    }

    /// Read `KEYSTORE_BASE64` and `KEYSTORE_TEMP_PATH` from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Read the recognized keys through `lookup`, applying defaults.
    ///
    /// Recognized keys:
    /// - KEYSTORE_BASE64: base64 keystore (default: unset, materialization disabled)
    /// - KEYSTORE_TEMP_PATH: destination file (default: `<temp dir>/server-keystore.pem`)
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let encoded_value = lookup(KEYSTORE_BASE64_VAR);
        let destination_path = lookup(KEYSTORE_TEMP_PATH_VAR)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_destination);

        Self::new(encoded_value, destination_path)
    }

    /// Whether a secret is configured.
    pub fn is_configured(&self) -> bool {
        self.encoded_value.is_some()
    }

    pub fn destination_path(&self) -> &Path {
        &self.destination_path
    }

    /// Decode the secret and write it to the destination path.
    ///
    /// Consumes the source: materialization happens at most once per process.
    /// Decoding completes before the filesystem is touched, so malformed input
    /// never leaves a file behind.
    pub fn materialize(self) -> Result<MaterializeOutcome, KeystoreError> {
        let Some(encoded) = self.encoded_value else {
            tracing::info!(
                "no {} provided, using default keystore location",
                KEYSTORE_BASE64_VAR
            );
            return Ok(MaterializeOutcome::Skipped);
        };

        tracing::info!("decoding keystore from {}", KEYSTORE_BASE64_VAR);
        let bytes = decode_keystore(&encoded)?;

        let path = self.destination_path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| KeystoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        write_secret_file(&path, &bytes).map_err(|source| KeystoreError::Write {
            path: path.clone(),
            source,
        })?;

        tracing::info!(path = %path.display(), bytes = bytes.len(), "keystore decoded and written");

        Ok(MaterializeOutcome::Materialized {
            path,
            bytes: bytes.len(),
        })
    }
}

/// Decode standard (padded) base64. Surrounding whitespace is trimmed; any
/// character outside the alphabet inside the value, whitespace included, is
/// rejected.
pub fn decode_keystore(encoded: &str) -> Result<Vec<u8>, KeystoreError> {
    Ok(STANDARD.decode(encoded.trim().as_bytes())?)
}

/// Truncating write. On Unix the file is owner-only before any byte lands in it:
/// new files are created with mode 0600 and existing ones are tightened first.
fn write_secret_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        options.mode(0o600);
        if path.is_file() {
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }
    }

    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn encode(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    #[test]
    fn absent_secret_is_skipped_without_touching_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("nested").join("server.pem");

        let outcome = SecretSource::new(None, &dest).materialize().unwrap();

        assert_eq!(outcome, MaterializeOutcome::Skipped);
        assert!(outcome.keystore_location().is_none());
        assert!(!dest.exists());
        assert!(!dir.path().join("nested").exists());
    }

    #[test]
    fn empty_and_whitespace_secrets_are_skipped() {
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("server.pem");

        for value in ["", " ", "\n\t  \r\n"] {
            let source = SecretSource::new(Some(value.to_string()), &dest);
            assert!(!source.is_configured());
            assert_eq!(source.materialize().unwrap(), MaterializeOutcome::Skipped);
        }
        assert!(!dest.exists());
    }

    #[test]
    fn hello_is_written_and_directories_created() {
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("x").join("y").join("out.bin");

        let outcome = SecretSource::new(Some(encode(b"hello")), &dest)
            .materialize()
            .unwrap();

        assert!(dir.path().join("x").join("y").is_dir());
        assert_eq!(fs::read(&dest).unwrap(), vec![0x68, 0x65, 0x6c, 0x6c, 0x6f]);
        assert_eq!(outcome.keystore_location(), Some(dest.as_path()));
        assert_eq!(
            outcome,
            MaterializeOutcome::Materialized {
                path: dest.clone(),
                bytes: 5
            }
        );
    }

    #[test]
    fn written_bytes_match_decoded_input() {
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("keystore.bin");
        let payload: Vec<u8> = (0..=255u8).cycle().take(1500).collect();

        SecretSource::new(Some(encode(&payload)), &dest)
            .materialize()
            .unwrap();

        assert_eq!(fs::read(&dest).unwrap(), payload);
    }

    #[test]
    fn invalid_base64_fails_and_writes_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("sub").join("server.pem");

        let err = SecretSource::new(Some("not-valid-base64!!".to_string()), &dest)
            .materialize()
            .unwrap_err();

        assert!(matches!(err, KeystoreError::Decode(_)));
        assert!(err.to_string().contains("KEYSTORE_BASE64"), "got: {}", err);
        assert!(!dest.exists());
        assert!(!dir.path().join("sub").exists());
    }

    #[test]
    fn bad_padding_is_rejected() {
        assert!(matches!(
            decode_keystore("aGVsbG8"),
            Err(KeystoreError::Decode(_))
        ));
        assert!(matches!(
            decode_keystore("aGVsbG8=="),
            Err(KeystoreError::Decode(_))
        ));
        assert!(matches!(
            decode_keystore("aGVs=bG8"),
            Err(KeystoreError::Decode(_))
        ));
    }

    #[test]
    fn url_safe_alphabet_is_rejected() {
        // 0xfb 0xff encodes to "+/8=" in the standard alphabet.
        assert_eq!(decode_keystore("+/8=").unwrap(), vec![0xfb, 0xff]);
        assert!(decode_keystore("-_8=").is_err());
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        assert_eq!(decode_keystore(" aGVsbG8=\n").unwrap(), b"hello");
    }

    #[test]
    fn inner_whitespace_is_rejected_and_writes_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("tls").join("server.pem");

        for value in ["aG Vs bG8=", "aG Vs\tbG\n8=", "aGVs\r\nbG8="] {
            let err = SecretSource::new(Some(value.to_string()), &dest)
                .materialize()
                .unwrap_err();
            assert!(matches!(err, KeystoreError::Decode(_)), "{:?} should fail", value);
        }
        assert!(!dest.exists());
        assert!(!dir.path().join("tls").exists());
    }

    #[test]
    fn second_run_overwrites_instead_of_appending() {
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("server.pem");
        fs::write(&dest, b"stale contents that are much longer than the new ones").unwrap();

        for _ in 0..2 {
            SecretSource::new(Some(encode(b"fresh")), &dest)
                .materialize()
                .unwrap();
        }

        assert_eq!(fs::read(&dest).unwrap(), b"fresh");
    }

    #[test]
    fn existing_directory_is_fine() {
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("server.pem");

        let outcome = SecretSource::new(Some(encode(b"k")), &dest)
            .materialize()
            .unwrap();

        assert_eq!(outcome.keystore_location(), Some(dest.as_path()));
    }

    #[test]
    fn write_failure_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        // A directory already sits at the destination, so the write must fail.
        let dest = dir.path().join("occupied");
        fs::create_dir(&dest).unwrap();

        let err = SecretSource::new(Some(encode(b"k")), &dest)
            .materialize()
            .unwrap_err();

        assert!(matches!(err, KeystoreError::Write { .. }), "got: {:?}", err);
        assert!(err.to_string().contains("occupied"));
    }

    #[test]
    fn directory_failure_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        // A regular file blocks creation of the parent directory.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"file").unwrap();
        let dest = blocker.join("child").join("server.pem");

        let err = SecretSource::new(Some(encode(b"k")), &dest)
            .materialize()
            .unwrap_err();

        assert!(matches!(err, KeystoreError::CreateDir { .. }), "got: {:?}", err);
        assert!(!dest.exists());
    }

    #[cfg(unix)]
    #[test]
    fn file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("server.pem");
        SecretSource::new(Some(encode(b"k")), &dest)
            .materialize()
            .unwrap();

        let mode = fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn existing_world_readable_file_is_tightened() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("server.pem");
        fs::write(&dest, b"old key material").unwrap();
        fs::set_permissions(&dest, fs::Permissions::from_mode(0o644)).unwrap();

        SecretSource::new(Some(encode(b"new")), &dest)
            .materialize()
            .unwrap();

        let mode = fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(fs::read(&dest).unwrap(), b"new");
    }

    #[test]
    fn from_vars_applies_defaults() {
        let source = SecretSource::from_vars(|_| None);

        assert!(!source.is_configured());
        assert_eq!(source.destination_path(), default_destination());
        assert!(source.destination_path().ends_with(DEFAULT_KEYSTORE_FILE_NAME));
    }

    #[test]
    fn from_vars_reads_recognized_keys() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (KEYSTORE_BASE64_VAR, "aGVsbG8="),
            (KEYSTORE_TEMP_PATH_VAR, "/var/run/keys/server.pem"),
        ]);

        let source = SecretSource::from_vars(|k| vars.get(k).map(|v| v.to_string()));

        assert!(source.is_configured());
        assert_eq!(
            source.destination_path(),
            Path::new("/var/run/keys/server.pem")
        );
    }

    #[test]
    fn from_vars_treats_blank_path_as_unset() {
        let source = SecretSource::from_vars(|k| {
            (k == KEYSTORE_TEMP_PATH_VAR).then(|| "   ".to_string())
        });

        assert_eq!(source.destination_path(), default_destination());
    }

    #[test]
    fn from_vars_keeps_path_verbatim() {
        let source = SecretSource::from_vars(|k| {
            (k == KEYSTORE_TEMP_PATH_VAR).then(|| "/tmp/keys/ server.pem ".to_string())
        });

        assert_eq!(
            source.destination_path(),
            Path::new("/tmp/keys/ server.pem ")
        );
    }
}
