// SPDX-FileCopyrightText: © 2023 Technical University of Munich, Chair of Connected Mobility
// SPDX-FileCopyrightText: © 2023 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

/// Value type declared by an input component or an output slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ValueType {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "int")]
    Int,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "bool")]
    Bool,
    #[serde(rename = "json")]
    Json,
}

impl ValueType {
    /// Return true if `value` conforms to this declared type.
    pub fn conforms(&self, value: &serde_json::Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Int => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Bool => value.is_boolean(),
            Self::Json => true,
        }
    }
}

/// Hint for the coordinator's frontend on how to render an input component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FormControlType {
    #[serde(rename = "input")]
    Input,
    #[serde(rename = "select")]
    Select,
    #[serde(rename = "textarea")]
    TextArea,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: serde_json::Value,
}

/// One typed component of an input slot. `value` is only populated
/// transiently on a per-invocation copy, never on the registered definition,
/// and is not part of the registration payload.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IptComponent {
    pub value_type: ValueType,
    pub formcontrol_type: FormControlType,
    pub hint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    pub allow_multi: bool,
    #[serde(default)]
    pub select_options: Vec<SelectOption>,
    #[serde(default, skip_serializing)]
    pub value: Option<serde_json::Value>,
}

impl IptComponent {
    /// Return true if `value` matches the declared type, honoring
    /// `allow_multi` (a homogeneous array of conforming elements).
    pub fn accepts(&self, value: &serde_json::Value) -> bool {
        if self.allow_multi {
            match value.as_array() {
                Some(elements) => elements.iter().all(|element| self.value_type.conforms(element)),
                None => false,
            }
        } else {
            self.value_type.conforms(value)
        }
    }
}

/// One named input slot a function accepts.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FunctionIpt {
    pub key: String,
    pub display: String,
    pub must: bool,
    pub components: Vec<IptComponent>,
}

/// One named output slot a function produces.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FunctionOpt {
    pub key: String,
    pub description: String,
    pub value_type: ValueType,
    pub is_array: bool,
}

/// Wire form of one function within the registration request/response.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub group_name: String,
    pub description: String,
    pub ipts: Vec<FunctionIpt>,
    pub opts: Vec<FunctionOpt>,
    pub progress_milestones: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RegisterFunctionsRequest {
    pub who: String,
    #[serde(rename = "groupName_map_functions")]
    pub group_name_map_functions: std::collections::HashMap<String, Vec<FunctionSpec>>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RegisterFunctionsResponse {
    #[serde(rename = "groupName_map_functions")]
    pub group_name_map_functions: std::collections::HashMap<String, Vec<FunctionSpec>>,
}

/// Implemented by every registrable function body.
///
/// `run` receives its own copy of the input slots with resolved component
/// values and reports logs, progress milestones and the terminal result
/// through the event sender; it never returns an error to the caller.
#[async_trait::async_trait]
pub trait FunctionInterface: Send + Sync {
    fn ipt_config(&self) -> Vec<FunctionIpt>;
    fn opt_config(&self) -> Vec<FunctionOpt>;
    fn all_progress_milestones(&self) -> Vec<String>;
    async fn run(&self, ipts: Vec<FunctionIpt>, event_sender: crate::function_run::RunEventSender);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_type_conformance() {
        assert!(ValueType::Int.conforms(&serde_json::json!(3)));
        assert!(!ValueType::Int.conforms(&serde_json::json!(3.5)));
        assert!(!ValueType::Int.conforms(&serde_json::json!("3")));
        assert!(ValueType::Float.conforms(&serde_json::json!(3)));
        assert!(ValueType::String.conforms(&serde_json::json!("x")));
        assert!(ValueType::Bool.conforms(&serde_json::json!(false)));
        assert!(ValueType::Json.conforms(&serde_json::json!({"k": 1})));
    }

    #[test]
    fn component_accepts_multi() {
        let component = IptComponent {
            value_type: ValueType::Int,
            formcontrol_type: FormControlType::Input,
            hint: String::new(),
            default_value: None,
            allow_multi: true,
            select_options: vec![],
            value: None,
        };
        assert!(component.accepts(&serde_json::json!([1, 2, 3])));
        assert!(!component.accepts(&serde_json::json!([1, "2"])));
        assert!(!component.accepts(&serde_json::json!(1)));
    }

    #[test]
    fn component_value_not_serialized() {
        let component = IptComponent {
            value_type: ValueType::Int,
            formcontrol_type: FormControlType::Input,
            hint: String::from("input integer numbers"),
            default_value: None,
            allow_multi: true,
            select_options: vec![],
            value: Some(serde_json::json!([1, 2])),
        };
        let serialized = serde_json::to_value(&component).unwrap();
        assert!(serialized.get("value").is_none());
    }
}
