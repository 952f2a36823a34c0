use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_cors_origins, parse_embedding_provider,
    parse_environment, parse_f32, parse_u32, parse_u64,
};
use super::secret::load_or_create_secret_key;
use super::types::{
    AdminSettings, ApiSettings, ConfigError, CorsSettings, DatabaseSettings,
    EmbeddingProviderKind, EmbeddingSettings, QuizSettings, RuntimeSettings, SecuritySettings,
    ServerHost, ServerPort, ServerSettings, Settings, TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("QUIZCHECK_HOST", "0.0.0.0");
        let port = env_or_default("QUIZCHECK_PORT", "8000");

        let environment = parse_environment(
            env_optional("QUIZCHECK_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config = env_optional("QUIZCHECK_STRICT_CONFIG")
            .map(|value| parse_bool(&value))
            .unwrap_or(false)
            || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Quizcheck API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let secret_key = match env_optional("SECRET_KEY") {
            Some(value) => value,
            None => load_or_create_secret_key(),
        };
        let access_token_expire_minutes = parse_u64(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            env_or_default("ACCESS_TOKEN_EXPIRE_MINUTES", "720"),
        )?;
        let algorithm = env_or_default("ALGORITHM", "HS256");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let database_url = env_or_default("DATABASE_URL", "sqlite://quizcheck.db");
        let max_connections = parse_u32(
            "DATABASE_MAX_CONNECTIONS",
            env_or_default("DATABASE_MAX_CONNECTIONS", "5"),
        )?;

        let question_bank_dir = env_or_default("QUESTION_BANK_DIR", "uploaded_files");
        let max_upload_size_mb =
            parse_u64("MAX_UPLOAD_SIZE_MB", env_or_default("MAX_UPLOAD_SIZE_MB", "10"))?;
        let scoring_threshold =
            parse_f32("SCORING_THRESHOLD", env_or_default("SCORING_THRESHOLD", "0.833"))?;
        let session_ttl_minutes =
            parse_u64("SESSION_TTL_MINUTES", env_or_default("SESSION_TTL_MINUTES", "720"))?;
        let session_sweep_interval_seconds = parse_u64(
            "SESSION_SWEEP_INTERVAL_SECONDS",
            env_or_default("SESSION_SWEEP_INTERVAL_SECONDS", "300"),
        )?;

        let embedding_provider = parse_embedding_provider(env_optional("EMBEDDING_PROVIDER"))?;
        let embedding_model_dir = env_or_default("EMBEDDING_MODEL_DIR", "models/all-MiniLM-L6-v2");
        let embedding_model_repo =
            env_or_default("EMBEDDING_MODEL_REPO", "sentence-transformers/all-MiniLM-L6-v2");
        let embedding_auto_download = env_optional("EMBEDDING_AUTO_DOWNLOAD")
            .map(|value| parse_bool(&value))
            .unwrap_or(false);
        let embedding_api_url = env_or_default("EMBEDDING_API_URL", "https://api.openai.com/v1");
        let embedding_api_key = env_or_default("EMBEDDING_API_KEY", "");
        let embedding_model = env_or_default("EMBEDDING_MODEL", "text-embedding-3-small");
        let embedding_request_timeout = parse_u64(
            "EMBEDDING_REQUEST_TIMEOUT",
            env_or_default("EMBEDDING_REQUEST_TIMEOUT", "60"),
        )?;

        let first_superuser_login = env_or_default("FIRST_SUPERUSER_LOGIN", "admin");
        let first_superuser_password = env_or_default("FIRST_SUPERUSER_PASSWORD", "");

        let log_level = env_or_default("QUIZCHECK_LOG_LEVEL", "info");
        let json = env_optional("QUIZCHECK_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            security: SecuritySettings { secret_key, access_token_expire_minutes, algorithm },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings { database_url, max_connections },
            quiz: QuizSettings {
                question_bank_dir,
                max_upload_size_mb,
                scoring_threshold,
                session_ttl_minutes,
                session_sweep_interval_seconds,
            },
            embedding: EmbeddingSettings {
                provider: embedding_provider,
                model_dir: embedding_model_dir,
                model_repo: embedding_model_repo,
                auto_download: embedding_auto_download,
                api_url: embedding_api_url,
                api_key: embedding_api_key,
                model: embedding_model,
                request_timeout: embedding_request_timeout,
            },
            admin: AdminSettings { first_superuser_login, first_superuser_password },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn quiz(&self) -> &QuizSettings {
        &self.quiz
    }

    pub(crate) fn embedding(&self) -> &EmbeddingSettings {
        &self.embedding
    }

    pub(crate) fn admin(&self) -> &AdminSettings {
        &self.admin
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.quiz.scoring_threshold) {
            return Err(ConfigError::InvalidValue {
                field: "SCORING_THRESHOLD",
                value: self.quiz.scoring_threshold.to_string(),
            });
        }

        if self.quiz.session_ttl_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "SESSION_TTL_MINUTES",
                value: "0".to_string(),
            });
        }

        if self.quiz.session_sweep_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "SESSION_SWEEP_INTERVAL_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.quiz.max_upload_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "MAX_UPLOAD_SIZE_MB",
                value: "0".to_string(),
            });
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "DATABASE_MAX_CONNECTIONS",
                value: "0".to_string(),
            });
        }

        if self.quiz.question_bank_dir.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "QUESTION_BANK_DIR",
                value: String::from("<empty>"),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.admin.first_superuser_password.is_empty() {
            return Err(ConfigError::MissingSecret("FIRST_SUPERUSER_PASSWORD"));
        }
        if self.embedding.provider == EmbeddingProviderKind::OpenAi
            && self.embedding.api_key.is_empty()
        {
            return Err(ConfigError::MissingSecret("EMBEDDING_API_KEY"));
        }

        Ok(())
    }
}
