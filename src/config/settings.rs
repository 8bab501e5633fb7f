// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Timeless Love

//! Typed settings built from a resolved [`EnvLayer`].

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use url::Url;

use super::env_files::EnvLayer;
use super::error::{ConfigError, FieldIssue};

pub const DEFAULT_JWT_ALGORITHM: Algorithm = Algorithm::HS256;
pub const DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES: u32 = 15;
pub const DEFAULT_REFRESH_TOKEN_EXPIRE_DAYS: u32 = 7;
pub const DEFAULT_DEBUG: &str = "false";
pub const DEFAULT_API_VERSION: &str = "v1";
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://localhost:3000";
pub const DEFAULT_MEDIA_MAX_FILE_SIZE_MB: u32 = 50;
pub const DEFAULT_MEDIA_MAX_MEMORY_SIZE_MB: u32 = 200;
pub const DEFAULT_MEDIA_THUMBNAIL_SIZE: u32 = 400;
pub const DEFAULT_MEDIA_UPLOAD_URL_EXPIRES_SECONDS: u64 = 300;
pub const DEFAULT_MEDIA_ACCESS_URL_EXPIRES_SECONDS: u64 = 3600;
pub const DEFAULT_STORAGE_BUCKET_NAME: &str = "memories";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_HEALTH_PROBE_TABLE: &str = "family_units";
pub const DEFAULT_HEALTH_PROBE_TIMEOUT_SECONDS: u64 = 5;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// A credential that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString([redacted])")
    }
}

/// Process-wide runtime parameters.
///
/// Built once at startup and shared read-only behind an `Arc`. Raw string
/// fields (`debug`, `cors_origins`) are kept as supplied; their typed views
/// are recomputed by [`Settings::is_debug`] and
/// [`Settings::cors_origins_list`] on every call.
#[derive(Debug, Clone)]
pub struct Settings {
    // Supabase
    pub supabase_url: Url,
    pub supabase_anon_key: SecretString,
    pub supabase_service_role_key: SecretString,
    pub supabase_jwt_secret: SecretString,
    pub supabase_db_url: Option<SecretString>,
    pub supabase_db_password: Option<SecretString>,
    pub supabase_access_token: Option<SecretString>,

    // Token signing
    pub jwt_secret_key: SecretString,
    pub jwt_algorithm: Algorithm,
    pub jwt_access_token_expire_minutes: u32,
    pub jwt_refresh_token_expire_days: u32,

    // Runtime
    pub environment: String,
    pub debug: String,
    pub api_version: String,
    pub cors_origins: String,

    // Media
    pub media_max_file_size_mb: u32,
    pub media_max_memory_size_mb: u32,
    pub media_thumbnail_size: u32,
    pub media_upload_url_expires_seconds: u64,
    pub media_access_url_expires_seconds: u64,

    pub storage_bucket_name: String,
    pub cloudflare_tunnel_token: Option<SecretString>,

    // HTTP server
    pub host: String,
    pub port: u16,
    pub request_timeout_seconds: u64,

    // Health probe
    pub health_probe_table: String,
    pub health_probe_timeout_seconds: u64,
}

impl Settings {
    /// Build settings from a merged environment.
    ///
    /// Keys match case-insensitively and unknown keys are ignored. All
    /// problems are collected before failing so the error names every
    /// missing or malformed field at once.
    pub fn from_env(env: &EnvLayer) -> Result<Self, ConfigError> {
        let mut fields = FieldReader::new(env);

        let supabase_url = fields.url("SUPABASE_URL");
        let supabase_anon_key = fields.secret("SUPABASE_ANON_KEY");
        let supabase_service_role_key = fields.secret("SUPABASE_SERVICE_ROLE_KEY");
        let supabase_jwt_secret = fields.secret("SUPABASE_JWT_SECRET");
        let supabase_db_url = fields.optional_secret("SUPABASE_DB_URL");
        let supabase_db_password = fields.optional_secret("SUPABASE_DB_PASSWORD");
        let supabase_access_token = fields.optional_secret("SUPABASE_ACCESS_TOKEN");

        let jwt_secret_key = fields.secret("JWT_SECRET_KEY");
        let jwt_algorithm = fields.parsed_or("JWT_ALGORITHM", DEFAULT_JWT_ALGORITHM);
        let jwt_access_token_expire_minutes = fields.parsed_or(
            "JWT_ACCESS_TOKEN_EXPIRE_MINUTES",
            DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES,
        );
        let jwt_refresh_token_expire_days = fields.parsed_or(
            "JWT_REFRESH_TOKEN_EXPIRE_DAYS",
            DEFAULT_REFRESH_TOKEN_EXPIRE_DAYS,
        );

        let environment = fields.string_or("ENVIRONMENT", super::DEFAULT_ENVIRONMENT);
        let debug = fields.raw_or("DEBUG", DEFAULT_DEBUG);
        let api_version = fields.string_or("API_VERSION", DEFAULT_API_VERSION);
        let cors_origins = fields.raw_or("CORS_ORIGINS", DEFAULT_CORS_ORIGINS);

        let media_max_file_size_mb =
            fields.parsed_or("MEDIA_MAX_FILE_SIZE_MB", DEFAULT_MEDIA_MAX_FILE_SIZE_MB);
        let media_max_memory_size_mb =
            fields.parsed_or("MEDIA_MAX_MEMORY_SIZE_MB", DEFAULT_MEDIA_MAX_MEMORY_SIZE_MB);
        let media_thumbnail_size =
            fields.parsed_or("MEDIA_THUMBNAIL_SIZE", DEFAULT_MEDIA_THUMBNAIL_SIZE);
        let media_upload_url_expires_seconds = fields.parsed_or(
            "MEDIA_UPLOAD_URL_EXPIRES_SECONDS",
            DEFAULT_MEDIA_UPLOAD_URL_EXPIRES_SECONDS,
        );
        let media_access_url_expires_seconds = fields.parsed_or(
            "MEDIA_ACCESS_URL_EXPIRES_SECONDS",
            DEFAULT_MEDIA_ACCESS_URL_EXPIRES_SECONDS,
        );

        let storage_bucket_name =
            fields.string_or("STORAGE_BUCKET_NAME", DEFAULT_STORAGE_BUCKET_NAME);
        let cloudflare_tunnel_token = fields.optional_secret("CLOUDFLARE_TUNNEL_TOKEN");

        let host = fields.string_or("HOST", DEFAULT_HOST);
        let port = fields.parsed_or("PORT", DEFAULT_PORT);
        let request_timeout_seconds =
            fields.parsed_or("REQUEST_TIMEOUT_SECONDS", DEFAULT_REQUEST_TIMEOUT_SECONDS);

        let health_probe_table = fields.string_or("HEALTH_PROBE_TABLE", DEFAULT_HEALTH_PROBE_TABLE);
        let health_probe_timeout_seconds = fields.parsed_or(
            "HEALTH_PROBE_TIMEOUT_SECONDS",
            DEFAULT_HEALTH_PROBE_TIMEOUT_SECONDS,
        );

        // The probe has to give up before the request timeout fires.
        if request_timeout_seconds == 0 {
            fields.reject("REQUEST_TIMEOUT_SECONDS", "must be greater than zero");
        }
        if health_probe_timeout_seconds == 0 {
            fields.reject("HEALTH_PROBE_TIMEOUT_SECONDS", "must be greater than zero");
        } else if health_probe_timeout_seconds >= request_timeout_seconds {
            fields.reject(
                "HEALTH_PROBE_TIMEOUT_SECONDS",
                format!("must be less than REQUEST_TIMEOUT_SECONDS ({request_timeout_seconds})"),
            );
        }

        fields.finish()?;

        // finish() guarantees every required field was read successfully.
        let Some(supabase_url) = supabase_url else {
            return Err(ConfigError::Validation {
                issues: vec![FieldIssue::Missing {
                    key: "SUPABASE_URL",
                }],
            });
        };

        Ok(Self {
            supabase_url,
            supabase_anon_key,
            supabase_service_role_key,
            supabase_jwt_secret,
            supabase_db_url,
            supabase_db_password,
            supabase_access_token,
            jwt_secret_key,
            jwt_algorithm,
            jwt_access_token_expire_minutes,
            jwt_refresh_token_expire_days,
            environment,
            debug,
            api_version,
            cors_origins,
            media_max_file_size_mb,
            media_max_memory_size_mb,
            media_thumbnail_size,
            media_upload_url_expires_seconds,
            media_access_url_expires_seconds,
            storage_bucket_name,
            cloudflare_tunnel_token,
            host,
            port,
            request_timeout_seconds,
            health_probe_table,
            health_probe_timeout_seconds,
        })
    }

    /// `true` iff `DEBUG` equals `"true"`, ignoring case.
    pub fn is_debug(&self) -> bool {
        self.debug.to_lowercase() == "true"
    }

    /// `CORS_ORIGINS` split on commas with surrounding whitespace trimmed.
    ///
    /// Order is preserved and empty segments are passed through as-is.
    pub fn cors_origins_list(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(|origin| origin.trim().to_string())
            .collect()
    }

    /// Socket address the HTTP server binds to.
    pub fn bind_address(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    /// Path prefix the versioned API is mounted under, e.g. `/api/v1`.
    pub fn api_prefix(&self) -> String {
        format!("/api/{}", self.api_version)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn health_probe_timeout(&self) -> Duration {
        Duration::from_secs(self.health_probe_timeout_seconds)
    }

    pub fn access_token_ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.jwt_access_token_expire_minutes) * 60)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.jwt_refresh_token_expire_days) * 24 * 60 * 60)
    }

    pub fn upload_url_ttl(&self) -> Duration {
        Duration::from_secs(self.media_upload_url_expires_seconds)
    }

    pub fn access_url_ttl(&self) -> Duration {
        Duration::from_secs(self.media_access_url_expires_seconds)
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        u64::from(self.media_max_file_size_mb) * BYTES_PER_MB
    }

    pub fn max_memory_size_bytes(&self) -> u64 {
        u64::from(self.media_max_memory_size_mb) * BYTES_PER_MB
    }
}

/// Reads typed fields out of an [`EnvLayer`], accumulating every issue.
struct FieldReader<'a> {
    env: &'a EnvLayer,
    issues: Vec<FieldIssue>,
}

impl<'a> FieldReader<'a> {
    fn new(env: &'a EnvLayer) -> Self {
        Self {
            env,
            issues: Vec::new(),
        }
    }

    /// Trimmed value, `None` when absent or blank.
    fn present(&self, key: &str) -> Option<&'a str> {
        self.env
            .get(key)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    fn required(&mut self, key: &'static str) -> Option<&'a str> {
        let value = self.present(key);
        if value.is_none() {
            self.issues.push(FieldIssue::Missing { key });
        }
        value
    }

    fn secret(&mut self, key: &'static str) -> SecretString {
        SecretString::new(self.required(key).unwrap_or_default())
    }

    fn optional_secret(&mut self, key: &'static str) -> Option<SecretString> {
        self.present(key).map(SecretString::new)
    }

    fn url(&mut self, key: &'static str) -> Option<Url> {
        let raw = self.required(key)?;
        match Url::parse(raw) {
            Ok(url) => Some(url),
            Err(e) => {
                self.issues.push(FieldIssue::Invalid {
                    key,
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    /// Trimmed value, or `default` when absent or blank.
    fn string_or(&mut self, key: &'static str, default: &str) -> String {
        self.present(key).unwrap_or(default).to_string()
    }

    /// Value exactly as supplied, or `default` when the key is absent.
    fn raw_or(&mut self, key: &'static str, default: &str) -> String {
        self.env.get(key).unwrap_or(default).to_string()
    }

    fn parsed_or<T>(&mut self, key: &'static str, default: T) -> T
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let Some(raw) = self.present(key) else {
            return default;
        };
        match raw.parse() {
            Ok(value) => value,
            Err(e) => {
                self.issues.push(FieldIssue::Invalid {
                    key,
                    reason: e.to_string(),
                });
                default
            }
        }
    }

    /// Record a value that parsed but violates a constraint.
    fn reject(&mut self, key: &'static str, reason: impl Into<String>) {
        self.issues.push(FieldIssue::Invalid {
            key,
            reason: reason.into(),
        });
    }

    fn finish(self) -> Result<(), ConfigError> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation {
                issues: self.issues,
            })
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn required_env() -> EnvLayer {
        EnvLayer::from_pairs([
            ("SUPABASE_URL", "https://project.supabase.co"),
            ("SUPABASE_ANON_KEY", "anon-key"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service-role-key"),
            ("SUPABASE_JWT_SECRET", "supabase-jwt-secret"),
            ("JWT_SECRET_KEY", "jwt-secret"),
        ])
    }

    /// Settings with every required field set and defaults elsewhere.
    pub(crate) fn test_settings() -> Settings {
        Settings::from_env(&required_env()).expect("required env is complete")
    }

    fn with(pairs: &[(&str, &str)]) -> Settings {
        let mut env = required_env();
        for (key, value) in pairs {
            env.set(*key, *value);
        }
        Settings::from_env(&env).expect("valid settings")
    }

    #[test]
    fn defaults_apply_when_only_required_fields_are_set() {
        let settings = test_settings();

        assert_eq!(settings.supabase_url.as_str(), "https://project.supabase.co/");
        assert_eq!(settings.supabase_service_role_key.expose(), "service-role-key");
        assert_eq!(settings.jwt_algorithm, Algorithm::HS256);
        assert_eq!(settings.jwt_access_token_expire_minutes, 15);
        assert_eq!(settings.jwt_refresh_token_expire_days, 7);
        assert_eq!(settings.environment, "development");
        assert_eq!(settings.debug, "false");
        assert_eq!(settings.api_version, "v1");
        assert_eq!(settings.media_max_file_size_mb, 50);
        assert_eq!(settings.media_max_memory_size_mb, 200);
        assert_eq!(settings.media_thumbnail_size, 400);
        assert_eq!(settings.media_upload_url_expires_seconds, 300);
        assert_eq!(settings.media_access_url_expires_seconds, 3600);
        assert_eq!(settings.storage_bucket_name, "memories");
        assert_eq!(settings.host, "0.0.0.0");
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.health_probe_table, "family_units");
        assert!(settings.supabase_db_url.is_none());
        assert!(settings.cloudflare_tunnel_token.is_none());
    }

    #[test]
    fn every_missing_required_field_is_reported() {
        let env = EnvLayer::from_pairs([("SUPABASE_ANON_KEY", "anon-key")]);

        let err = Settings::from_env(&env).unwrap_err();

        assert_eq!(
            err.missing_fields(),
            vec![
                "SUPABASE_URL",
                "SUPABASE_SERVICE_ROLE_KEY",
                "SUPABASE_JWT_SECRET",
                "JWT_SECRET_KEY",
            ]
        );
        let message = err.to_string();
        for key in err.missing_fields() {
            assert!(message.contains(key), "{message} should name {key}");
        }
    }

    #[test]
    fn blank_required_field_counts_as_missing() {
        let mut env = required_env();
        env.set("JWT_SECRET_KEY", "   ");

        let err = Settings::from_env(&env).unwrap_err();
        assert_eq!(err.missing_fields(), vec!["JWT_SECRET_KEY"]);
    }

    #[test]
    fn coercion_failures_are_reported_with_missing_fields() {
        let mut env = required_env();
        env.set("SUPABASE_JWT_SECRET", "");
        env.set("JWT_ACCESS_TOKEN_EXPIRE_MINUTES", "fifteen");
        env.set("PORT", "70000");
        env.set("JWT_ALGORITHM", "HS999");

        let err = Settings::from_env(&env).unwrap_err();
        let ConfigError::Validation { issues } = &err else {
            panic!("expected validation error, got {err:?}");
        };
        let keys: Vec<_> = issues.iter().map(FieldIssue::key).collect();
        assert_eq!(
            keys,
            vec![
                "SUPABASE_JWT_SECRET",
                "JWT_ALGORITHM",
                "JWT_ACCESS_TOKEN_EXPIRE_MINUTES",
                "PORT",
            ]
        );
        assert!(matches!(issues[0], FieldIssue::Missing { .. }));
        assert!(matches!(issues[2], FieldIssue::Invalid { .. }));
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let mut env = required_env();
        env.set("REQUEST_TIMEOUT_SECONDS", "0");
        env.set("HEALTH_PROBE_TIMEOUT_SECONDS", "0");

        let err = Settings::from_env(&env).unwrap_err();
        let ConfigError::Validation { issues } = &err else {
            panic!("expected validation error, got {err:?}");
        };
        let keys: Vec<_> = issues.iter().map(FieldIssue::key).collect();
        assert_eq!(
            keys,
            vec!["REQUEST_TIMEOUT_SECONDS", "HEALTH_PROBE_TIMEOUT_SECONDS"]
        );
        assert!(err.to_string().contains("must be greater than zero"));
    }

    #[test]
    fn health_check_timeout_must_be_shorter_than_request_timeout() {
        for (request, health_check) in [("1", "3"), ("5", "5")] {
            let mut env = required_env();
            env.set("REQUEST_TIMEOUT_SECONDS", request);
            env.set("HEALTH_PROBE_TIMEOUT_SECONDS", health_check);

            let err = Settings::from_env(&env).unwrap_err();
            let ConfigError::Validation { issues } = &err else {
                panic!("expected validation error, got {err:?}");
            };
            assert!(
                matches!(
                    issues.as_slice(),
                    [FieldIssue::Invalid {
                        key: "HEALTH_PROBE_TIMEOUT_SECONDS",
                        ..
                    }]
                ),
                "request={request} health_check={health_check}: {issues:?}"
            );
        }

        let settings = with(&[
            ("REQUEST_TIMEOUT_SECONDS", "2"),
            ("HEALTH_PROBE_TIMEOUT_SECONDS", "1"),
        ]);
        assert!(settings.health_probe_timeout() < settings.request_timeout());
    }

    #[test]
    fn malformed_supabase_url_is_invalid() {
        let mut env = required_env();
        env.set("SUPABASE_URL", "not a url");

        let err = Settings::from_env(&env).unwrap_err();
        let ConfigError::Validation { issues } = err else {
            panic!("expected validation error");
        };
        assert!(matches!(
            issues.as_slice(),
            [FieldIssue::Invalid {
                key: "SUPABASE_URL",
                ..
            }]
        ));
    }

    #[test]
    fn keys_match_case_insensitively_and_unknown_keys_are_ignored() {
        let env = EnvLayer::from_pairs([
            ("supabase_url", "https://project.supabase.co"),
            ("Supabase_Anon_Key", "anon-key"),
            ("supabase_service_role_key", "service-role-key"),
            ("SUPABASE_JWT_SECRET", "supabase-jwt-secret"),
            ("jwt_secret_key", "jwt-secret"),
            ("api_version", "v3"),
            ("SOMETHING_UNRELATED", "whatever"),
        ]);

        let settings = Settings::from_env(&env).unwrap();
        assert_eq!(settings.api_version, "v3");
        assert_eq!(settings.supabase_anon_key.expose(), "anon-key");
    }

    #[test]
    fn is_debug_only_accepts_true_ignoring_case() {
        for (raw, expected) in [
            ("true", true),
            ("True", true),
            ("TRUE", true),
            ("", false),
            ("false", false),
            ("1", false),
            ("yes", false),
        ] {
            assert_eq!(with(&[("DEBUG", raw)]).is_debug(), expected, "DEBUG={raw:?}");
        }
        assert!(!test_settings().is_debug());
    }

    #[test]
    fn cors_origins_are_split_and_trimmed_in_order() {
        assert_eq!(
            with(&[("CORS_ORIGINS", "a, b,c")]).cors_origins_list(),
            vec!["a", "b", "c"]
        );
        assert_eq!(
            with(&[("CORS_ORIGINS", "a,, b ")]).cors_origins_list(),
            vec!["a", "", "b"]
        );
        assert_eq!(
            test_settings().cors_origins_list(),
            vec!["http://localhost:5173", "http://localhost:3000"]
        );
    }

    #[test]
    fn derived_values_follow_stored_fields() {
        let settings = with(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "9100"),
            ("JWT_ACCESS_TOKEN_EXPIRE_MINUTES", "30"),
            ("JWT_REFRESH_TOKEN_EXPIRE_DAYS", "2"),
            ("MEDIA_MAX_FILE_SIZE_MB", "3"),
            ("API_VERSION", "v2"),
        ]);

        assert_eq!(settings.bind_address().unwrap().to_string(), "127.0.0.1:9100");
        assert_eq!(settings.api_prefix(), "/api/v2");
        assert_eq!(settings.access_token_ttl(), Duration::from_secs(1800));
        assert_eq!(settings.refresh_token_ttl(), Duration::from_secs(2 * 86_400));
        assert_eq!(settings.max_file_size_bytes(), 3 * 1024 * 1024);
        assert_eq!(settings.upload_url_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let rendered = format!("{:?}", test_settings());
        assert!(rendered.contains("[redacted]"));
        assert!(!rendered.contains("service-role-key"));
        assert!(!rendered.contains("jwt-secret"));
    }
}
