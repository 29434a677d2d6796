// src/models/api.rs

use serde::Deserialize;
use std::{collections::HashMap, fmt};

// --- 通用结构体 ---

/// `__NEXT_DATA__` 中的外层结构
#[derive(Deserialize, Debug, Clone)]
pub struct NextData<T> {
    pub props: NextProps<T>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NextProps<T> {
    pub page_props: T,
}

/// 站点上的 id 有时是数字，有时是字符串。
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum RawId {
    Number(i64),
    Text(String),
}

impl fmt::Display for RawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawId::Number(n) => write!(f, "{}", n),
            RawId::Text(s) => f.write_str(s),
        }
    }
}

// --- 分类一览页 ---

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CollectionsPage {
    pub initial_data: Vec<CategoryPayload>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CategoryPayload {
    pub id: RawId,
    pub title: String,
}

// --- 分类详情页 ---

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ModulePage {
    pub module_data: ModuleData,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ModuleData {
    pub sign_list: Vec<SignPayload>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SignPayload {
    pub id: RawId,
    #[serde(default)]
    pub sign_definitions: HashMap<String, Vec<DefinitionPayload>>,
    pub default_video_url: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DefinitionPayload {
    pub def: String,
    #[serde(default)]
    pub pos: Option<String>,
}
