//! Output record types
//!
//! Records are kept as JSON objects so the store stays agnostic of the
//! fields an extractor produces; the only field the store relies on is
//! `url`.

use crate::catalog::Pair;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field names of a cross-reference placeholder
const CRAWLED_IN_MAIN: &str = "crawled_in_main_category";
const CRAWLED_IN_SUB: &str = "crawled_in_sub_category";

/// One record stored in a shard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedRecord(Map<String, Value>);

impl ExtractedRecord {
    /// Wraps a field map as a record
    ///
    /// Returns None if the map has no string `url` field.
    pub fn from_fields(fields: Map<String, Value>) -> Option<Self> {
        match fields.get("url") {
            Some(Value::String(_)) => Some(Self(fields)),
            _ => None,
        }
    }

    /// Placeholder written when `url` was already captured under `owner`
    pub fn cross_reference(url: &str, owner: &Pair) -> Self {
        let mut fields = Map::new();
        fields.insert(
            CRAWLED_IN_MAIN.to_string(),
            Value::String(owner.main_category.clone()),
        );
        fields.insert(
            CRAWLED_IN_SUB.to_string(),
            Value::String(owner.sub_category.clone()),
        );
        fields.insert("url".to_string(), Value::String(url.to_string()));
        Self(fields)
    }

    pub fn url(&self) -> Option<&str> {
        self.0.get("url").and_then(Value::as_str)
    }

    /// The owning pair if this record is a cross-reference placeholder
    pub fn cross_reference_owner(&self) -> Option<Pair> {
        let main = self.0.get(CRAWLED_IN_MAIN)?.as_str()?;
        let sub = self.0.get(CRAWLED_IN_SUB)?.as_str()?;
        Some(Pair::new(main, sub))
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Fields extracted from a course page
///
/// Empty fields are left out of the serialized record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub objectives: Vec<String>,

    /// Section title -> lecture titles, in page order
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub course_content: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_audience: Vec<String>,
}

impl CourseRecord {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Appends a course section and its lecture titles
    pub fn push_section(&mut self, title: String, lectures: Vec<String>) {
        let lectures = lectures.into_iter().map(Value::String).collect();
        self.course_content.insert(title, Value::Array(lectures));
    }
}

impl From<CourseRecord> for ExtractedRecord {
    fn from(course: CourseRecord) -> Self {
        fn strings(values: Vec<String>) -> Value {
            Value::Array(values.into_iter().map(Value::String).collect())
        }

        let mut fields = Map::new();
        if let Some(title) = course.title {
            fields.insert("title".to_string(), Value::String(title));
        }
        fields.insert("url".to_string(), Value::String(course.url));
        if let Some(bio) = course.bio {
            fields.insert("bio".to_string(), Value::String(bio));
        }
        if !course.objectives.is_empty() {
            fields.insert("objectives".to_string(), strings(course.objectives));
        }
        if !course.course_content.is_empty() {
            fields.insert(
                "course_content".to_string(),
                Value::Object(course.course_content),
            );
        }
        if !course.requirements.is_empty() {
            fields.insert("requirements".to_string(), strings(course.requirements));
        }
        if let Some(description) = course.description {
            fields.insert("description".to_string(), Value::String(description));
        }
        if !course.target_audience.is_empty() {
            fields.insert(
                "target_audience".to_string(),
                strings(course.target_audience),
            );
        }
        Self(fields)
    }
}

/// On-disk body of a shard file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardFile {
    pub main_category: String,
    pub sub_category: String,
    #[serde(default)]
    pub courses: Vec<ExtractedRecord>,
}
