//! RPC definitions: procedure identity plus ordered, typed parameters

use crate::error::DetailsError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single positional RPC parameter
///
/// The JSON form is externally tagged by the remote type, e.g. `{"string": "1234"}`
/// or `{"array": ["a", "b"]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Parameter {
    /// Literal string value
    String(String),

    /// Reference to a remote variable or global by name
    Ref(String),

    /// List value, subscripted 1..n on the remote side
    Array(Vec<String>),

    /// Keyed list value, subscripted by the map keys on the remote side
    NamedArray(BTreeMap<String, String>),
}

impl Parameter {
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    pub fn reference(value: impl Into<String>) -> Self {
        Self::Ref(value.into())
    }

    pub fn array<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Array(values.into_iter().map(Into::into).collect())
    }

    pub fn named_array<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::NamedArray(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Type tag understood by the remote host
    pub fn remote_type(&self) -> &'static str {
        match self {
            Parameter::String(_) => "string",
            Parameter::Ref(_) => "ref",
            Parameter::Array(_) | Parameter::NamedArray(_) => "array",
        }
    }
}

/// Definition of one remote procedure call
///
/// Immutable once built. `name` and `context` identify the procedure on the remote
/// host; the order of `parameters` is significant and maps to 1-based slots.
///
/// # Example
///
/// ```
/// use charon_api::{Parameter, RpcDetails};
///
/// let details = RpcDetails::builder()
///     .name("IBLHS AMCMS GET INS")
///     .context("IBLHS AMCMS RPCS")
///     .parameter(Parameter::string("1234"))
///     .build()
///     .unwrap();
///
/// assert_eq!(details.parameters().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RpcDetailsRepr")]
pub struct RpcDetails {
    name: String,
    context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    parameters: Vec<Parameter>,
}

impl RpcDetails {
    pub fn builder() -> RpcDetailsBuilder {
        RpcDetailsBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Parameters paired with their 1-based remote slot
    pub fn positional_parameters(&self) -> impl Iterator<Item = (u32, &Parameter)> {
        (1u32..).zip(self.parameters.iter())
    }
}

/// Builder for [`RpcDetails`]
#[derive(Debug, Default, Clone)]
pub struct RpcDetailsBuilder {
    name: Option<String>,
    context: Option<String>,
    version: Option<String>,
    parameters: Vec<Parameter>,
}

impl RpcDetailsBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Append one parameter in the next positional slot
    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Replace all parameters
    pub fn parameters(mut self, parameters: Vec<Parameter>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn build(self) -> Result<RpcDetails, DetailsError> {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or(DetailsError::MissingName)?;
        let context = self
            .context
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| DetailsError::MissingContext { rpc: name.clone() })?;

        Ok(RpcDetails {
            name,
            context,
            version: self.version.filter(|v| !v.trim().is_empty()),
            parameters: self.parameters,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcDetailsRepr {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    parameters: Vec<Parameter>,
}

impl TryFrom<RpcDetailsRepr> for RpcDetails {
    type Error = DetailsError;

    fn try_from(repr: RpcDetailsRepr) -> Result<Self, Self::Error> {
        let mut builder = RpcDetails::builder().parameters(repr.parameters);
        if let Some(name) = repr.name {
            builder = builder.name(name);
        }
        if let Some(context) = repr.context {
            builder = builder.context(context);
        }
        if let Some(version) = repr.version {
            builder = builder.version(version);
        }
        builder.build()
    }
}
