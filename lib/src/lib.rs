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

//! Resolves a request to compare two versions of some files into a pair of
//! filesystem snapshots, and hands them to an external comparison tool.
//!
//! The entry point is [`compare::Dispatcher`]. The repository itself is
//! reached only through the capability traits in [`engine`].

#![warn(missing_docs)]
#![deny(unused_must_use)]
#![forbid(unsafe_code)]

pub mod compare;
pub mod config;
pub mod delta;
pub mod engine;
pub mod file_util;
pub mod location;
pub mod lock;
pub mod plan;
pub mod repo_path;
pub mod revision;
pub mod staging;
pub mod tool;
