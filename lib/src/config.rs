// Copyright 2024 The extdiff Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Tool definitions loaded from TOML.
//!
//! ```toml
//! [diff-tools.vimdiff]
//! program = "nvim"
//! options = ["-d"]
//!
//! [diff-tools.mytool]
//! kind = "list"
//! interactive = false
//! ```

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use serde::de::IntoDeserializer as _;
use thiserror::Error;
use toml_edit::Document;
use toml_edit::DocumentMut;

use crate::file_util::IoResultExt as _;
use crate::file_util::PathError;
use crate::tool::ToolConfig;
use crate::tool::ToolKind;

const TOOLS_TABLE: &str = "diff-tools";

/// Error that can occur when loading tool definitions.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    /// Config file cannot be read.
    #[error("Failed to read configuration file")]
    Read(#[source] PathError),
    /// TOML file or text cannot be parsed.
    #[error("Configuration cannot be parsed as TOML document")]
    Parse {
        /// Source error.
        #[source]
        error: Box<toml_edit::TomlError>,
        /// Source file path.
        source_path: Option<PathBuf>,
    },
    /// A tool definition has an unexpected shape.
    #[error("Invalid type or value for {name}")]
    Type {
        /// Dotted config name.
        name: String,
        /// Source error.
        #[source]
        error: Box<toml_edit::de::Error>,
        /// Source file path.
        source_path: Option<PathBuf>,
    },
}

/// One parsed TOML document.
#[derive(Clone, Debug)]
pub struct ConfigLayer {
    /// Source file path of this layer if any.
    pub path: Option<PathBuf>,
    /// Configuration variables.
    pub data: DocumentMut,
}

impl ConfigLayer {
    /// Parses TOML document `text` into new layer.
    pub fn parse(text: &str) -> Result<Self, ConfigLoadError> {
        let data = Document::parse(text).map_err(|error| ConfigLoadError::Parse {
            error: Box::new(error),
            source_path: None,
        })?;
        Ok(Self {
            path: None,
            data: data.into_mut(),
        })
    }

    /// Loads TOML file from the specified `path`.
    pub fn load_from_file(path: PathBuf) -> Result<Self, ConfigLoadError> {
        let text = fs::read_to_string(&path)
            .context(&path)
            .map_err(ConfigLoadError::Read)?;
        let data = Document::parse(text).map_err(|error| ConfigLoadError::Parse {
            error: Box::new(error),
            source_path: Some(path.clone()),
        })?;
        Ok(Self {
            path: Some(path),
            data: data.into_mut(),
        })
    }

    /// Returns the `[diff-tools.<name>]` definitions in document order.
    pub fn tool_definitions(&self) -> Result<Vec<(String, ToolDefinition)>, ConfigLoadError> {
        let Some(item) = self.data.get(TOOLS_TABLE) else {
            return Ok(vec![]);
        };
        let type_error = |name: String, error: toml_edit::de::Error| ConfigLoadError::Type {
            name,
            error: Box::new(error),
            source_path: self.path.clone(),
        };
        let Some(table) = item.as_table_like() else {
            return Err(type_error(TOOLS_TABLE.to_owned(), expected_table()));
        };
        table
            .iter()
            .map(|(name, item)| {
                let dotted_name = format!("{TOOLS_TABLE}.{name}");
                let value = item
                    .clone()
                    .into_value()
                    .map_err(|_| type_error(dotted_name.clone(), expected_table()))?;
                let definition = ToolDefinition::deserialize(value.into_deserializer())
                    .map_err(|error| type_error(dotted_name, error))?;
                Ok((name.to_owned(), definition))
            })
            .collect()
    }
}

fn expected_table() -> toml_edit::de::Error {
    <toml_edit::de::Error as serde::de::Error>::custom("expected a table")
}

/// Options given as `"-a -b"` or `["-a", "-b"]`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ToolOptions {
    /// Whitespace-separated text.
    String(String),
    /// One argument per element.
    Vec(Vec<String>),
}

impl ToolOptions {
    fn into_args(self) -> Vec<String> {
        match self {
            Self::String(text) => text.split_whitespace().map(str::to_owned).collect(),
            Self::Vec(args) => args,
        }
    }
}

/// A `[diff-tools.<name>]` table. Unset keys keep the value of the tool being
/// overridden, or the defaults of its kind.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ToolDefinition {
    /// Program to execute.
    pub program: Option<String>,
    /// `tree` or `list`.
    pub kind: Option<ToolKind>,
    /// Replaces the default options.
    pub options: Option<ToolOptions>,
    /// See [`ToolConfig::recursive`].
    pub recursive: Option<bool>,
    /// See [`ToolConfig::interactive`].
    pub interactive: Option<bool>,
    /// See [`ToolConfig::supports_cleanup`].
    pub cleanup: Option<bool>,
    /// See [`ToolConfig::swap_operands`].
    pub swap_operands: Option<bool>,
}

impl ToolDefinition {
    /// Builds settings for `name` from this definition on top of `base`.
    pub fn apply(self, name: &str, base: Option<ToolConfig>) -> ToolConfig {
        let mut config = match (base, self.kind) {
            (Some(base), None) => base,
            (Some(base), Some(kind)) if base.kind == kind => base,
            (_, kind) => ToolConfig::new(name, kind.unwrap_or(ToolKind::Tree)),
        };
        if let Some(program) = self.program {
            config.program = program;
        }
        if let Some(options) = self.options {
            config.options = options.into_args();
        }
        if let Some(recursive) = self.recursive {
            config.recursive = recursive;
        }
        if let Some(interactive) = self.interactive {
            config.interactive = interactive;
        }
        if let Some(cleanup) = self.cleanup {
            config.supports_cleanup = cleanup;
        }
        if let Some(swap_operands) = self.swap_operands {
            config.swap_operands = swap_operands;
        }
        config
    }
}
