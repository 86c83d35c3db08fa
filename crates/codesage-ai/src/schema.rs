//! 结构化输出 schema
//!
//! 模型返回的 JSON 在边界处严格校验：类型不符、缺少必填字段、出现未声明字段都视为错误，
//! 不做任何类型转换 (例如字符串 "true" 不是布尔值)。

use codesage_core::{CodeSageError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// 字段类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Boolean,
    String,
    Integer,
    Number,
}

impl FieldType {
    /// JSON Schema 类型名
    pub fn json_type(&self) -> &'static str {
        match self {
            FieldType::Boolean => "boolean",
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
        }
    }

    /// Gemini OpenAPI 子集的类型名
    pub fn gemini_type(&self) -> &'static str {
        match self {
            FieldType::Boolean => "BOOLEAN",
            FieldType::String => "STRING",
            FieldType::Integer => "INTEGER",
            FieldType::Number => "NUMBER",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::Boolean => value.is_boolean(),
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Number => value.is_number(),
        }
    }
}

/// schema 字段
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchemaField {
    pub name: String,
    pub field_type: FieldType,
    pub description: String,
    pub required: bool,
}

/// 扁平对象 schema
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseSchema {
    pub name: String,
    pub fields: Vec<SchemaField>,
}

impl ResponseSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// 添加必填字段
    pub fn field(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
    ) -> Self {
        self.fields.push(SchemaField {
            name: name.into(),
            field_type,
            description: description.into(),
            required: true,
        });
        self
    }

    /// 添加可选字段
    pub fn optional_field(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
    ) -> Self {
        self.fields.push(SchemaField {
            name: name.into(),
            field_type,
            description: description.into(),
            required: false,
        });
        self
    }

    fn required_names(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect()
    }

    /// 标准 JSON Schema (OpenAI response_format 使用)
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| {
                (
                    f.name.clone(),
                    json!({ "type": f.field_type.json_type(), "description": f.description }),
                )
            })
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": self.required_names(),
            "additionalProperties": false,
        })
    }

    /// Gemini responseSchema
    pub fn to_gemini_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| {
                (
                    f.name.clone(),
                    json!({ "type": f.field_type.gemini_type(), "description": f.description }),
                )
            })
            .collect();

        json!({
            "type": "OBJECT",
            "properties": properties,
            "required": self.required_names(),
        })
    }

    /// 追加到提示词末尾的格式说明 (供不支持原生结构化输出的提供商使用)
    pub fn instruction(&self) -> String {
        format!(
            "Respond with a single JSON object and nothing else. It must match this JSON Schema exactly:\n{}",
            self.to_json_schema()
        )
    }

    /// 校验模型输出
    pub fn validate(&self, value: &Value) -> Result<()> {
        let object = value.as_object().ok_or_else(|| {
            CodeSageError::SchemaViolation(format!("{}: 期望 JSON 对象, 实际为 {}", self.name, value))
        })?;

        for key in object.keys() {
            if !self.fields.iter().any(|f| &f.name == key) {
                return Err(CodeSageError::SchemaViolation(format!(
                    "{}: 未声明的字段 `{}`",
                    self.name, key
                )));
            }
        }

        for field in &self.fields {
            match object.get(&field.name) {
                Some(v) if field.field_type.matches(v) => {}
                Some(v) => {
                    return Err(CodeSageError::SchemaViolation(format!(
                        "{}: 字段 `{}` 应为 {}, 实际为 {}",
                        self.name,
                        field.name,
                        field.field_type.json_type(),
                        v
                    )));
                }
                None if field.required => {
                    return Err(CodeSageError::SchemaViolation(format!(
                        "{}: 缺少必填字段 `{}`",
                        self.name, field.name
                    )));
                }
                None => {}
            }
        }

        Ok(())
    }

    /// 解析文本并校验
    pub fn parse(&self, text: &str) -> Result<Value> {
        let value = extract_json(text)?;
        self.validate(&value)?;
        Ok(value)
    }
}

/// 从模型文本中取出 JSON 对象
///
/// 只接受整段 JSON 或被 markdown 代码块包裹的 JSON, 夹杂在说明文字里的对象视为违约。
pub fn extract_json(text: &str) -> Result<Value> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(unfenced)
        .map_err(|e| CodeSageError::SchemaViolation(format!("响应不是 JSON 对象 ({}): {}", e, trimmed)))
}
