use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Declarative mini-program configuration as found in the entry file.
/// 入口檔中的小程式設定物件。
///
/// Keys the picker does not interpret are kept in `extra` and written back verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub pages: Vec<String>,
    #[serde(
        rename = "subPackages",
        alias = "subpackages",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sub_packages: Option<Vec<SubPackageConfig>>,
    #[serde(rename = "tabBar", default, skip_serializing_if = "Option::is_none")]
    pub tab_bar: Option<TabBarConfig>,
    /// Dropped from generated output since it may name pages that are no longer built.
    #[serde(rename = "preloadRule", default, skip_serializing_if = "Option::is_none")]
    pub preload_rule: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    /// Top-level keys as spelled in the source, in source order.
    #[serde(skip)]
    source_keys: Vec<String>,
}

/// 分包設定。 / One sub-package entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubPackageConfig {
    pub root: String,
    #[serde(default)]
    pub pages: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabBarConfig {
    #[serde(default)]
    pub list: Vec<TabBarItem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabBarItem {
    #[serde(rename = "pagePath")]
    pub page_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AppConfig {
    /// Builds a config from a parsed literal; anything but a plain object is rejected.
    /// 由解析後的字面值建立設定；非物件即視為格式錯誤。
    pub fn from_value(value: Value) -> Result<Self, String> {
        let source_keys = match &value {
            Value::Object(map) => map.keys().cloned().collect(),
            other => return Err(format!("expected an object, found {}", kind_of(other))),
        };
        let mut config: Self = serde_json::from_value(value).map_err(|err| err.to_string())?;
        config.source_keys = source_keys;
        Ok(config)
    }

    /// Serializes the config, keeping the source key order and spelling.
    /// Keys that are new to the source come last; dropped keys stay dropped.
    /// 依原始鍵順序與拼寫輸出設定。
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        let typed = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            other => return Ok(other),
        };
        let mut out = Map::with_capacity(typed.len());
        for key in &self.source_keys {
            if let Some(value) = typed.get(canonical_key(key)) {
                out.insert(key.clone(), value.clone());
            }
        }
        for (key, value) in typed {
            let known = self.source_keys.iter().any(|source| canonical_key(source) == key);
            if !known {
                out.insert(key, value);
            }
        }
        Ok(Value::Object(out))
    }

    /// Paths referenced by the tab bar, in declaration order.
    pub fn tab_bar_paths(&self) -> impl Iterator<Item = &str> {
        self.tab_bar
            .iter()
            .flat_map(|tab_bar| tab_bar.list.iter())
            .map(|item| item.page_path.as_str())
    }
}

fn canonical_key(key: &str) -> &str {
    match key {
        "subpackages" => "subPackages",
        other => other,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_keys_survive_a_round_trip() {
        let value = json!({
            "pages": ["pages/index/index"],
            "window": { "navigationBarTitleText": "Demo" },
            "subpackages": [{ "root": "pkg/", "pages": ["a"], "independent": true }],
            "tabBar": { "custom": true, "list": [{ "pagePath": "pages/index/index", "iconPath": "i.png" }] },
            "preloadRule": { "pages/index/index": { "packages": ["pkg/"] } }
        });

        let config = AppConfig::from_value(value).unwrap();
        assert_eq!(config.extra["window"]["navigationBarTitleText"], "Demo");
        let sub = &config.sub_packages.as_ref().unwrap()[0];
        assert_eq!(sub.extra["independent"], true);
        assert_eq!(config.tab_bar_paths().collect::<Vec<_>>(), vec!["pages/index/index"]);

        let back = config.to_value().unwrap();
        assert!(back.get("subpackages").is_some());
        assert!(back.get("subPackages").is_none());
        assert_eq!(back["tabBar"]["custom"], true);
        assert_eq!(back["tabBar"]["list"][0]["iconPath"], "i.png");
        assert!(back["tabBar"]["list"][0].get("text").is_none());
    }

    #[test]
    fn write_back_keeps_source_key_order() {
        let value = json!({
            "window": { "navigationBarTitleText": "Demo" },
            "pages": ["a", "b"],
            "preloadRule": { "a": { "packages": ["pkg/"] } },
            "debug": true,
            "tabBar": { "list": [{ "pagePath": "a" }] }
        });
        let mut config = AppConfig::from_value(value).unwrap();
        config.pages.pop();
        config.preload_rule = None;
        config.sub_packages = Some(Vec::new());

        let back = config.to_value().unwrap();
        let keys: Vec<_> = back.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["window", "pages", "debug", "tabBar", "subPackages"]);
        assert_eq!(back["pages"], json!(["a"]));
    }

    #[test]
    fn non_object_values_are_rejected() {
        let err = AppConfig::from_value(json!(["pages"])).unwrap_err();
        assert!(err.contains("an array"));
        assert!(AppConfig::from_value(json!({ "pages": "oops" })).is_err());
    }

    #[test]
    fn missing_optional_sections_stay_absent() {
        let config = AppConfig::from_value(json!({ "pages": [] })).unwrap();
        let back = config.to_value().unwrap();
        assert_eq!(back, json!({ "pages": [] }));
    }
}
