//! 配置模块，负责加载JSON配置文件

use crate::parser::ParseLimits;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置文件不存在: {0}")]
    NotFound(String),

    #[error("无法读取配置文件 {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("无法解析JSON配置文件 {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 查询解析与渲染配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// 解析树最大深度
    pub max_depth: usize,
    /// 解析树最大节点数
    pub max_nodes: usize,
    /// `$top` 的上限，未设置时不限制
    pub max_top: Option<u64>,
    /// 实体名到数据库表名的映射
    pub table_mapping: HashMap<String, String>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        let limits = ParseLimits::default();
        Self {
            max_depth: limits.max_depth,
            max_nodes: limits.max_nodes,
            max_top: None,
            table_mapping: HashMap::new(),
        }
    }
}

impl QueryConfig {
    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let display = path_ref.display().to_string();

        if !path_ref.exists() {
            return Err(ConfigError::NotFound(display));
        }

        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    pub fn limits(&self) -> ParseLimits {
        ParseLimits {
            max_depth: self.max_depth,
            max_nodes: self.max_nodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_valid_json_config() {
        let temp_file = "test_query_config.json";
        let mut file = fs::File::create(temp_file).unwrap();
        writeln!(
            file,
            r#"{{
            "max_depth": 8,
            "max_top": 100,
            "table_mapping": {{ "User": "users" }}
        }}"#
        )
        .unwrap();

        let config = QueryConfig::from_json_file(temp_file).unwrap();
        assert_eq!(config.max_depth, 8);
        assert_eq!(config.max_nodes, ParseLimits::default().max_nodes);
        assert_eq!(config.max_top, Some(100));
        assert_eq!(config.table_mapping.get("User").map(String::as_str), Some("users"));
        assert!(!config.table_mapping.contains_key("Order"));

        fs::remove_file(temp_file).ok();
    }

    #[test]
    fn test_invalid_json_config() {
        let temp_file = "test_invalid_query_config.json";
        let mut file = fs::File::create(temp_file).unwrap();
        writeln!(file, "invalid json").unwrap();

        let result = QueryConfig::from_json_file(temp_file);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));

        fs::remove_file(temp_file).ok();
    }

    #[test]
    fn test_missing_file() {
        let result = QueryConfig::from_json_file("non_existent_query_config.json");
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_default_config() {
        let config = QueryConfig::default();
        assert_eq!(config.limits(), ParseLimits::default());
        assert!(config.max_top.is_none());
    }
}
