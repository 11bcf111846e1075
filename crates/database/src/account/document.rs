use crate::serde_helpers::{flexible_datetime, serialize_u64_as_number};
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{collections::BTreeMap, fmt, str::FromStr};
use utoipa::ToSchema;

/// 存储文件对外暴露的URL前缀
pub const DOCUMENT_URL_PREFIX: &str = "/uploads/documents";

/// 单个KYC文件大小上限 5MB
pub const MAX_DOCUMENT_SIZE: u64 = 5 * 1024 * 1024;

pub const ALLOWED_MIMETYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "application/pdf"];

/// KYC文件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    AadharFront,
    AadharBack,
    PanCard,
    CancelledCheck,
}

impl DocumentType {
    pub const ALL: [DocumentType; 4] = [
        DocumentType::AadharFront,
        DocumentType::AadharBack,
        DocumentType::PanCard,
        DocumentType::CancelledCheck,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::AadharFront => "aadhar_front",
            DocumentType::AadharBack => "aadhar_back",
            DocumentType::PanCard => "pan_card",
            DocumentType::CancelledCheck => "cancelled_check",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown document type: {}", s))
    }
}

/// 账户上挂载的单个KYC文件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountDocument {
    #[serde(rename = "_id")]
    #[schema(value_type = String)]
    pub id: ObjectId,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    /// 存储目录下的文件名
    pub filename: String,
    pub original_name: String,
    pub mimetype: String,
    #[serde(serialize_with = "serialize_u64_as_number")]
    pub size: u64,
    #[serde(with = "flexible_datetime")]
    pub upload_date: DateTime<Utc>,
    pub url: String,
}

impl AccountDocument {
    pub fn new(doc_type: DocumentType, filename: String, original_name: String, mimetype: String, size: u64) -> Self {
        let url = format!("{}/{}", DOCUMENT_URL_PREFIX, filename);
        Self {
            id: ObjectId::new(),
            doc_type,
            filename,
            original_name,
            mimetype,
            size,
            upload_date: Utc::now(),
            url,
        }
    }
}

/// 按类型索引的文件集合，每种类型最多保留一份
///
/// 对外（BSON / JSON）仍然是数组形态。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentSet(BTreeMap<DocumentType, AccountDocument>);

impl DocumentSet {
    /// 同类型文件直接替换，返回被替换掉的旧文件
    pub fn upsert(&mut self, document: AccountDocument) -> Option<AccountDocument> {
        self.0.insert(document.doc_type, document)
    }

    pub fn remove_by_id(&mut self, id: &ObjectId) -> Option<AccountDocument> {
        let doc_type = self.0.values().find(|d| &d.id == id).map(|d| d.doc_type)?;
        self.0.remove(&doc_type)
    }

    pub fn get(&self, doc_type: DocumentType) -> Option<&AccountDocument> {
        self.0.get(&doc_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccountDocument> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<AccountDocument> {
        self.0.values().cloned().collect()
    }
}

impl IntoIterator for DocumentSet {
    type Item = AccountDocument;
    type IntoIter = std::collections::btree_map::IntoValues<DocumentType, AccountDocument>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_values()
    }
}

impl FromIterator<AccountDocument> for DocumentSet {
    fn from_iter<I: IntoIterator<Item = AccountDocument>>(iter: I) -> Self {
        let mut set = DocumentSet::default();
        for document in iter {
            set.upsert(document);
        }
        set
    }
}

impl Serialize for DocumentSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.0.values())
    }
}

impl<'de> Deserialize<'de> for DocumentSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // 历史数据中同类型可能出现多条，后出现的覆盖先出现的
        let documents = Vec::<AccountDocument>::deserialize(deserializer)?;
        Ok(documents.into_iter().collect())
    }
}
