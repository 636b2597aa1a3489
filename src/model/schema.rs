use serde::{Deserialize, Serialize};

/// node id
pub type NodeId = String;

/// Role of a declared parameter within a node schema.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ParameterRole {
    /// Carries an upstream value; a bare identifier renders unquoted.
    Input,
    /// Produced by the call; never rendered as an argument.
    Output,
    /// Plain configuration value.
    #[default]
    Parameter,
}

/// A named input or output slot declared by a node's schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
    #[serde(default)]
    pub data_type: String,
}

/// A declared parameter of a node's underlying function.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default)]
    pub data_type: String,
    #[serde(default)]
    pub role: ParameterRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// UI widget hint, advisory only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub widget: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
}

/// Declarative description of a node's function id, ports, and parameters.
///
/// Supplied by the algorithm catalog; the compiler only consumes schema,
/// it never invents it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeSchema {
    pub function_id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub inputs: Vec<Port>,
    #[serde(default)]
    pub outputs: Vec<Port>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Import lines required by the underlying function.
    #[serde(default)]
    pub imports: Vec<String>,
}

impl NodeSchema {
    /// find a declared input port by name
    pub fn input(
        &self,
        name: &str,
    ) -> Option<&Port> {
        self.inputs.iter().find(|p| p.name == name)
    }

    /// find a declared output port by name
    pub fn output(
        &self,
        name: &str,
    ) -> Option<&Port> {
        self.outputs.iter().find(|p| p.name == name)
    }
}

/// Shape of one column of a tabular value flowing through a port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(default)]
    pub dtype: String,
}
