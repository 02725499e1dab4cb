//! 配置系统
//! 从环境变量加载所有配置，使用 Secret 包装敏感信息

use config::{Config, ConfigError, Environment};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址，例如 "0.0.0.0:3000"
    pub addr: String,
    /// 优雅关闭超时时间（秒）
    pub graceful_shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// JWT 密钥（使用 Secret 包装，防止日志泄露）
    pub jwt_secret: Secret<String>,
    /// 访问令牌过期时间（秒）
    pub access_token_exp_secs: u64,
    /// 刷新令牌过期时间（秒）
    pub refresh_token_exp_secs: u64,
    /// 密码最小长度
    pub password_min_length: usize,
    /// 密码必须包含大写字母
    pub password_require_uppercase: bool,
    /// 密码必须包含数字
    pub password_require_digit: bool,
    /// 最大登录失败次数
    pub max_login_attempts: u32,
    /// 登录锁定持续时间（秒）
    pub login_lockout_duration_secs: u64,
    /// Argon2 内存开销（KiB）
    pub password_hash_memory_kib: u32,
    /// Argon2 迭代次数
    pub password_hash_iterations: u32,
    /// 刷新令牌 Cookie 是否仅限 HTTPS
    pub secure_cookies: bool,
}

/// 客户端会话行为
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// 剩余有效期低于该值时主动刷新（秒）
    pub refresh_threshold_secs: u64,
    /// 过期检查间隔（秒）
    pub expiry_check_interval_secs: u64,
    /// 会话事件总线容量
    pub event_bus_capacity: usize,
    /// 过期刷新令牌清理间隔（秒）
    pub token_cleanup_interval_secs: u64,
}

/// 公司层级的数据可见范围策略
#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct HierarchyConfig {
    /// 合并视图下是否包含上级公司
    pub include_ancestors: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    /// 启动时写入演示数据
    pub demo: bool,
    /// 演示管理员密码
    pub demo_password: Secret<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub session: SessionConfig,
    pub hierarchy: HierarchyConfig,
    pub seed: SeedConfig,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("server.addr", "0.0.0.0:3000")?
            .set_default("server.graceful_shutdown_timeout_secs", 30)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("security.jwt_secret", "change-this-secret-in-production-min-32-chars!")?
            .set_default("security.access_token_exp_secs", 900)?
            .set_default("security.refresh_token_exp_secs", 604800)?
            .set_default("security.password_min_length", 8)?
            .set_default("security.password_require_uppercase", true)?
            .set_default("security.password_require_digit", true)?
            .set_default("security.max_login_attempts", 5)?
            .set_default("security.login_lockout_duration_secs", 1800)?
            .set_default("security.password_hash_memory_kib", 65536)?
            .set_default("security.password_hash_iterations", 3)?
            .set_default("security.secure_cookies", true)?
            .set_default("session.refresh_threshold_secs", 60)?
            .set_default("session.expiry_check_interval_secs", 30)?
            .set_default("session.event_bus_capacity", 256)?
            .set_default("session.token_cleanup_interval_secs", 3600)?
            .set_default("hierarchy.include_ancestors", false)?
            .set_default("seed.demo", false)?
            .set_default("seed.demo_password", "Demo-Passw0rd")?;

        // 从环境变量加载配置（前缀为 ERP_）
        settings = settings.add_source(
            Environment::with_prefix("ERP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 验证端口范围
        if let Some(port_str) = self.server.addr.split(':').next_back() {
            if let Ok(port) = port_str.parse::<u16>() {
                if port != 0 && port < 1024 {
                    return Err(ConfigError::Message("Server port should be >= 1024".to_string()));
                }
            }
        }

        // 验证日志级别
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        // 验证日志格式
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    self.logging.format
                )))
            }
        }

        // 验证 JWT 密钥长度（至少 32 字符）
        if self.security.jwt_secret.expose_secret().len() < 32 {
            return Err(ConfigError::Message(
                "JWT secret must be at least 32 characters long".to_string(),
            ));
        }

        // 验证令牌过期时间
        if self.security.access_token_exp_secs < 60 || self.security.access_token_exp_secs > 86400 {
            return Err(ConfigError::Message(
                "access_token_exp_secs must be between 60 and 86400 (1 minute to 24 hours)"
                    .to_string(),
            ));
        }

        if self.security.refresh_token_exp_secs < 3600
            || self.security.refresh_token_exp_secs > 2592000
        {
            return Err(ConfigError::Message(
                "refresh_token_exp_secs must be between 3600 and 2592000 (1 hour to 30 days)"
                    .to_string(),
            ));
        }

        // 验证密码策略
        if self.security.password_min_length < 6 || self.security.password_min_length > 128 {
            return Err(ConfigError::Message(
                "password_min_length must be between 6 and 128".to_string(),
            ));
        }

        // 验证登录失败锁定配置
        if self.security.max_login_attempts < 1 || self.security.max_login_attempts > 20 {
            return Err(ConfigError::Message(
                "max_login_attempts must be between 1 and 20".to_string(),
            ));
        }

        // 会话刷新阈值必须小于访问令牌有效期，否则每次检查都会触发刷新
        if self.session.refresh_threshold_secs >= self.security.access_token_exp_secs {
            return Err(ConfigError::Message(
                "refresh_threshold_secs must be shorter than access_token_exp_secs".to_string(),
            ));
        }

        if self.session.token_cleanup_interval_secs == 0 {
            return Err(ConfigError::Message(
                "token_cleanup_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.session.expiry_check_interval_secs == 0 {
            return Err(ConfigError::Message(
                "expiry_check_interval_secs must be at least 1".to_string(),
            ));
        }

        if self.session.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "event_bus_capacity must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// 单元测试用配置：低成本哈希、短令牌有效期
#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            graceful_shutdown_timeout_secs: 5,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        security: SecurityConfig {
            jwt_secret: Secret::new("test-secret-key-for-testing-only-min-32-chars".to_string()),
            access_token_exp_secs: 300,
            refresh_token_exp_secs: 3600,
            password_min_length: 8,
            password_require_uppercase: true,
            password_require_digit: true,
            max_login_attempts: 3,
            login_lockout_duration_secs: 300,
            password_hash_memory_kib: 1024,
            password_hash_iterations: 1,
            secure_cookies: false,
        },
        session: SessionConfig {
            refresh_threshold_secs: 60,
            expiry_check_interval_secs: 30,
            event_bus_capacity: 64,
            token_cleanup_interval_secs: 3600,
        },
        hierarchy: HierarchyConfig::default(),
        seed: SeedConfig {
            demo: false,
            demo_password: Secret::new("Demo-Passw0rd".to_string()),
        },
    }
}
